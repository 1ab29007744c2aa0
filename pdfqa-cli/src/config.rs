//! Application configuration: TOML file, then environment, then flags.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use clap::ValueEnum;
use pdfqa_rag::openai::{DEFAULT_BASE_URL, DEFAULT_EMBEDDING_MODEL};
use pdfqa_rag::synthesis::DEFAULT_CHAT_MODEL;
use pdfqa_rag::{
    AnswerSynthesizer, Backend, BackendKind, CollectionSchema, DistanceMetric, EmbeddingProvider,
    HashEmbeddingProvider, OpenAIChatSynthesizer, OpenAIEmbeddingProvider, PassthroughSynthesizer,
    QdrantVectorIndex, RagConfig, RagPipeline, RetryPolicy, SqliteVectorIndex,
};
use serde::Deserialize;
use tracing::{info, warn};

use crate::cli::Overrides;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum EmbedderKind {
    /// OpenAI-compatible embeddings API.
    #[default]
    Openai,
    /// Offline token hashing; no API key needed.
    Hash,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LlmKind {
    /// OpenAI-compatible chat completions API.
    #[default]
    Openai,
    /// Return the retrieved context instead of a generated answer.
    None,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub provider: EmbedderKind,
    pub model: String,
    pub dimension: usize,
    pub base_url: String,
    pub api_key: Option<String>,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: EmbedderKind::default(),
            model: DEFAULT_EMBEDDING_MODEL.to_string(),
            dimension: 384,
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub provider: LlmKind,
    pub model: String,
    pub base_url: String,
    pub api_key: Option<String>,
    pub temperature: f32,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            provider: LlmKind::default(),
            model: DEFAULT_CHAT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            temperature: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct QdrantSettings {
    /// gRPC endpoint, e.g. `https://xyz.cloud.qdrant.io:6334`. Unset disables the backend.
    pub url: Option<String>,
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct NetworkSettings {
    pub timeout_secs: u64,
    pub retry_attempts: u32,
    pub retry_backoff_ms: u64,
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self { timeout_secs: 30, retry_attempts: 3, retry_backoff_ms: 200 }
    }
}

/// Everything the `pdfqa` binary needs to build a pipeline.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub collection: String,
    pub data_dir: PathBuf,
    pub metric: DistanceMetric,
    pub rag: RagConfig,
    pub embedding: EmbeddingSettings,
    pub llm: LlmSettings,
    pub qdrant: QdrantSettings,
    pub network: NetworkSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            collection: "pdfqa".to_string(),
            data_dir: PathBuf::from("./pdfqa-data"),
            metric: DistanceMetric::Cosine,
            rag: RagConfig::default(),
            embedding: EmbeddingSettings::default(),
            llm: LlmSettings::default(),
            qdrant: QdrantSettings::default(),
            network: NetworkSettings::default(),
        }
    }
}

impl AppConfig {
    /// Load the file (if any), then apply the process environment and flags.
    pub fn load(path: Option<&Path>, overrides: &Overrides) -> anyhow::Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok().filter(|v| !v.is_empty()));
        config.apply_overrides(overrides);
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read config file {}", path.display()))?;
        Self::from_toml(&text).with_context(|| format!("invalid config file {}", path.display()))
    }

    pub fn from_toml(text: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Fill in values from environment variables.
    ///
    /// `OPENAI_API_KEY` and `OPENAI_BASE_URL` apply to both the embedder and
    /// the LLM unless the file set them; `QDRANT_URL`, `QDRANT_API_KEY`,
    /// `PDFQA_DATA_DIR` and `PDFQA_COLLECTION` always win over the file.
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(key) = var("OPENAI_API_KEY") {
            self.embedding.api_key.get_or_insert_with(|| key.clone());
            self.llm.api_key.get_or_insert(key);
        }
        if let Some(url) = var("OPENAI_BASE_URL") {
            if self.embedding.base_url == DEFAULT_BASE_URL {
                self.embedding.base_url = url.clone();
            }
            if self.llm.base_url == DEFAULT_BASE_URL {
                self.llm.base_url = url;
            }
        }
        if let Some(url) = var("QDRANT_URL") {
            self.qdrant.url = Some(url);
        }
        if let Some(key) = var("QDRANT_API_KEY") {
            self.qdrant.api_key = Some(key);
        }
        if let Some(dir) = var("PDFQA_DATA_DIR") {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(collection) = var("PDFQA_COLLECTION") {
            self.collection = collection;
        }
    }

    pub fn apply_overrides(&mut self, overrides: &Overrides) {
        if let Some(embedder) = overrides.embedder {
            self.embedding.provider = embedder;
        }
        if let Some(llm) = overrides.llm {
            self.llm.provider = llm;
        }
        if let Some(collection) = &overrides.collection {
            self.collection = collection.clone();
        }
        if let Some(k) = overrides.top_k {
            self.rag.top_k = k;
        }
        if let Some(dir) = &overrides.data_dir {
            self.data_dir = dir.clone();
        }
        if overrides.local_only {
            self.qdrant.url = None;
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        self.rag.validate()?;
        if self.collection.trim().is_empty() {
            bail!("collection name must not be empty");
        }
        if self.embedding.dimension == 0 {
            bail!("embedding dimension must be greater than zero");
        }
        if self.embedding.provider == EmbedderKind::Openai && self.embedding.api_key.is_none() {
            bail!("OPENAI_API_KEY is required for the openai embedder (or use --embedder hash)");
        }
        if self.llm.provider == LlmKind::Openai && self.llm.api_key.is_none() {
            bail!("OPENAI_API_KEY is required for the openai llm (or use --llm none)");
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.network.timeout_secs.max(1))
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::default()
            .with_max_attempts(self.network.retry_attempts)
            .with_initial_backoff(Duration::from_millis(self.network.retry_backoff_ms))
    }

    fn schema(&self) -> CollectionSchema {
        CollectionSchema { dimension: self.embedding.dimension, metric: self.metric }
    }

    fn embedder(&self) -> anyhow::Result<Arc<dyn EmbeddingProvider>> {
        let settings = &self.embedding;
        Ok(match settings.provider {
            EmbedderKind::Hash => Arc::new(HashEmbeddingProvider::new(settings.dimension)),
            EmbedderKind::Openai => Arc::new(
                OpenAIEmbeddingProvider::new(settings.api_key.clone().unwrap_or_default())?
                    .with_base_url(settings.base_url.as_str())
                    .with_model(settings.model.as_str())
                    .with_dimensions(settings.dimension)
                    .with_timeout(self.timeout())?,
            ),
        })
    }

    fn synthesizer(&self) -> anyhow::Result<Arc<dyn AnswerSynthesizer>> {
        let settings = &self.llm;
        Ok(match settings.provider {
            LlmKind::None => Arc::new(PassthroughSynthesizer),
            LlmKind::Openai => Arc::new(
                OpenAIChatSynthesizer::new(settings.api_key.clone().unwrap_or_default())?
                    .with_base_url(settings.base_url.as_str())
                    .with_model(settings.model.as_str())
                    .with_temperature(settings.temperature)
                    .with_timeout(self.timeout())?,
            ),
        })
    }

    async fn backends(&self) -> anyhow::Result<Vec<Backend>> {
        let mut backends = Vec::new();

        match &self.qdrant.url {
            Some(url) => {
                let index = QdrantVectorIndex::connect(url, self.qdrant.api_key.clone(), self.timeout())?
                    .with_retry_policy(self.retry_policy())
                    .with_batch_size(self.rag.batch_size);
                info!(url = %url, "using managed qdrant backend");
                backends.push(Backend::new(
                    "qdrant",
                    BackendKind::ManagedCloud,
                    Arc::new(index),
                    self.collection.as_str(),
                    self.schema(),
                ));
            }
            None => warn!("QDRANT_URL not set, managed backend disabled"),
        }

        let index = SqliteVectorIndex::open(&self.data_dir)
            .await
            .with_context(|| format!("cannot open local index in {}", self.data_dir.display()))?
            .with_batch_size(self.rag.batch_size);
        info!(path = %index.path().display(), "using local sqlite backend");
        backends.push(Backend::new(
            "sqlite",
            BackendKind::LocalPersistent,
            Arc::new(index),
            self.collection.as_str(),
            self.schema(),
        ));

        Ok(backends)
    }

    /// Build the pipeline described by this configuration.
    pub async fn build_pipeline(&self) -> anyhow::Result<RagPipeline> {
        let mut builder = RagPipeline::builder()
            .config(self.rag.clone())
            .embedding_provider(self.embedder()?)
            .synthesizer(self.synthesizer()?);
        for backend in self.backends().await? {
            builder = builder.backend(backend);
        }
        Ok(builder.build()?)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = AppConfig::default();
        assert_eq!(config.collection, "pdfqa");
        assert_eq!(config.data_dir, PathBuf::from("./pdfqa-data"));
        assert_eq!(config.rag.chunk_size, 1000);
        assert_eq!(config.rag.chunk_overlap, 100);
        assert_eq!(config.rag.top_k, 3);
        assert_eq!(config.embedding.dimension, 384);
        assert_eq!(config.embedding.model, "text-embedding-3-small");
        assert_eq!(config.network.retry_attempts, 3);
        assert!(config.qdrant.url.is_none());
    }

    #[test]
    fn parses_partial_toml() {
        let config = AppConfig::from_toml(
            r#"
            collection = "papers"
            metric = "dot_product"

            [rag]
            chunk_size = 500
            chunk_overlap = 50

            [embedding]
            provider = "hash"
            dimension = 128

            [llm]
            provider = "none"

            [qdrant]
            url = "http://localhost:6334"
            "#,
        )
        .unwrap();
        assert_eq!(config.collection, "papers");
        assert_eq!(config.metric, DistanceMetric::DotProduct);
        assert_eq!(config.rag.chunk_size, 500);
        assert_eq!(config.rag.top_k, 3);
        assert_eq!(config.embedding.provider, EmbedderKind::Hash);
        assert_eq!(config.embedding.dimension, 128);
        assert_eq!(config.llm.provider, LlmKind::None);
        assert_eq!(config.qdrant.url.as_deref(), Some("http://localhost:6334"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn unknown_provider_is_rejected() {
        assert!(AppConfig::from_toml("[embedding]\nprovider = \"word2vec\"").is_err());
    }

    #[test]
    fn environment_then_flags() {
        let mut config = AppConfig::default();
        config.apply_env(env(&[
            ("OPENAI_API_KEY", "sk-env"),
            ("QDRANT_URL", "https://cloud.example:6334"),
            ("QDRANT_API_KEY", "qk"),
            ("PDFQA_DATA_DIR", "/tmp/pdfqa"),
        ]));
        assert_eq!(config.embedding.api_key.as_deref(), Some("sk-env"));
        assert_eq!(config.llm.api_key.as_deref(), Some("sk-env"));
        assert_eq!(config.qdrant.api_key.as_deref(), Some("qk"));
        assert_eq!(config.data_dir, PathBuf::from("/tmp/pdfqa"));
        assert!(config.validate().is_ok());

        let overrides = Overrides {
            embedder: Some(EmbedderKind::Hash),
            top_k: Some(7),
            data_dir: Some(PathBuf::from("/var/pdfqa")),
            local_only: true,
            ..Overrides::default()
        };
        config.apply_overrides(&overrides);
        assert_eq!(config.embedding.provider, EmbedderKind::Hash);
        assert_eq!(config.rag.top_k, 7);
        assert_eq!(config.data_dir, PathBuf::from("/var/pdfqa"));
        assert!(config.qdrant.url.is_none());
    }

    #[test]
    fn file_api_key_is_not_replaced_by_environment() {
        let mut config =
            AppConfig::from_toml("[embedding]\napi_key = \"sk-file\"").unwrap();
        config.apply_env(env(&[("OPENAI_API_KEY", "sk-env")]));
        assert_eq!(config.embedding.api_key.as_deref(), Some("sk-file"));
        assert_eq!(config.llm.api_key.as_deref(), Some("sk-env"));
    }

    #[test]
    fn openai_without_key_is_a_configuration_error() {
        let err = AppConfig::default().validate().unwrap_err();
        assert!(err.to_string().contains("OPENAI_API_KEY"));

        let mut offline = AppConfig::default();
        offline.embedding.provider = EmbedderKind::Hash;
        offline.llm.provider = LlmKind::None;
        assert!(offline.validate().is_ok());

        offline.rag.chunk_overlap = offline.rag.chunk_size;
        assert!(offline.validate().is_err());
    }

    #[tokio::test]
    async fn offline_pipeline_uses_local_backend_only() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.embedding.provider = EmbedderKind::Hash;
        config.llm.provider = LlmKind::None;
        config.data_dir = dir.path().to_path_buf();

        let pipeline = config.build_pipeline().await.unwrap();
        let names: Vec<&str> = pipeline.backends().map(|b| b.name.as_str()).collect();
        assert_eq!(names, ["sqlite"]);
        assert!(dir.path().join(SqliteVectorIndex::FILE_NAME).exists());
    }

    #[tokio::test]
    async fn configured_qdrant_comes_first() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.embedding.provider = EmbedderKind::Hash;
        config.llm.provider = LlmKind::None;
        config.data_dir = dir.path().to_path_buf();
        config.qdrant.url = Some("http://localhost:6334".to_string());

        let pipeline = config.build_pipeline().await.unwrap();
        let kinds: Vec<BackendKind> = pipeline.backends().map(|b| b.kind).collect();
        assert_eq!(kinds, [BackendKind::ManagedCloud, BackendKind::LocalPersistent]);
    }
}
