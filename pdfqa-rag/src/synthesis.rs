//! Answer synthesis: "stuff" every retrieved passage into one prompt and ask
//! a language model.

use async_trait::async_trait;

use crate::error::Result;

/// The default stuff prompt. `{context}` and `{question}` are substituted.
pub const DEFAULT_TEMPLATE: &str = "Use the following pieces of context to answer the question at the end. If you don't know the answer, just say that you don't know, don't try to make up an answer.\n\n{context}\n\nQuestion: {question}\nHelpful Answer:";

/// Builds the single prompt used for stuff-style answering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StuffPrompt {
    template: String,
}

impl Default for StuffPrompt {
    fn default() -> Self {
        Self { template: DEFAULT_TEMPLATE.to_string() }
    }
}

impl StuffPrompt {
    /// Use a custom template containing `{context}` and `{question}`.
    pub fn with_template(template: impl Into<String>) -> Self {
        Self { template: template.into() }
    }

    /// Join passages, in the order received, with blank lines.
    pub fn context(passages: &[String]) -> String {
        passages.join("\n\n")
    }

    /// Render the prompt for `question` over `passages`.
    pub fn render(&self, question: &str, passages: &[String]) -> String {
        self.template
            .replace("{context}", &Self::context(passages))
            .replace("{question}", question)
    }
}

/// Produces an answer to a query from retrieved passages.
#[async_trait]
pub trait AnswerSynthesizer: Send + Sync {
    /// Answer `query` using `passages` as the only context.
    ///
    /// Fails with [`RagError::Generation`](crate::RagError::Generation) when
    /// the model cannot be reached or returns nothing usable.
    async fn answer(&self, query: &str, passages: &[String]) -> Result<String>;

    /// A short identifier used in logs and errors.
    fn name(&self) -> &str;
}

/// An offline synthesizer that returns the stuffed context itself.
///
/// Used when no language model is configured and in tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughSynthesizer;

#[async_trait]
impl AnswerSynthesizer for PassthroughSynthesizer {
    async fn answer(&self, _query: &str, passages: &[String]) -> Result<String> {
        Ok(StuffPrompt::context(passages))
    }

    fn name(&self) -> &str {
        "passthrough"
    }
}

#[cfg(feature = "openai")]
pub use chat::{DEFAULT_CHAT_MODEL, OpenAIChatSynthesizer};

#[cfg(feature = "openai")]
mod chat {
    use std::time::Duration;

    use async_trait::async_trait;
    use serde::{Deserialize, Serialize};
    use tracing::{debug, error};

    use super::{AnswerSynthesizer, StuffPrompt};
    use crate::error::{RagError, Result};
    use crate::openai::{DEFAULT_BASE_URL, DEFAULT_TIMEOUT, api_error_detail, http_client};

    /// The default chat model.
    pub const DEFAULT_CHAT_MODEL: &str = "gpt-4o-mini";

    const PROVIDER: &str = "openai";

    /// An [`AnswerSynthesizer`] backed by an OpenAI-compatible
    /// `/chat/completions` endpoint.
    ///
    /// The stuffed prompt is sent as a single user message. Temperature
    /// defaults to 0.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// use pdfqa_rag::synthesis::OpenAIChatSynthesizer;
    ///
    /// let llm = OpenAIChatSynthesizer::new("sk-...")?.with_model("gpt-4o-mini");
    /// let answer = llm.answer("What is covered?", &passages).await?;
    /// ```
    #[derive(Debug, Clone)]
    pub struct OpenAIChatSynthesizer {
        client: reqwest::Client,
        api_key: String,
        base_url: String,
        model: String,
        temperature: f32,
        prompt: StuffPrompt,
    }

    impl OpenAIChatSynthesizer {
        /// Create a synthesizer with the given API key and default settings.
        ///
        /// # Errors
        ///
        /// Returns [`RagError::Configuration`] if the key is empty.
        pub fn new(api_key: impl Into<String>) -> Result<Self> {
            let api_key = api_key.into();
            if api_key.trim().is_empty() {
                return Err(RagError::Configuration("OpenAI API key must not be empty".into()));
            }
            Ok(Self {
                client: http_client(DEFAULT_TIMEOUT)?,
                api_key,
                base_url: DEFAULT_BASE_URL.into(),
                model: DEFAULT_CHAT_MODEL.into(),
                temperature: 0.0,
                prompt: StuffPrompt::default(),
            })
        }

        /// Set the model name.
        pub fn with_model(mut self, model: impl Into<String>) -> Self {
            self.model = model.into();
            self
        }

        /// Point the synthesizer at another OpenAI-compatible server.
        pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
            self.base_url = base_url.into().trim_end_matches('/').to_string();
            self
        }

        /// Set the sampling temperature.
        pub fn with_temperature(mut self, temperature: f32) -> Self {
            self.temperature = temperature;
            self
        }

        /// Replace the prompt.
        pub fn with_prompt(mut self, prompt: StuffPrompt) -> Self {
            self.prompt = prompt;
            self
        }

        /// Set the per-request timeout.
        pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
            self.client = http_client(timeout)?;
            Ok(self)
        }

        fn generation_error(message: String) -> RagError {
            RagError::Generation { provider: PROVIDER.into(), message }
        }
    }

    #[derive(Serialize)]
    struct ChatRequest<'a> {
        model: &'a str,
        messages: [ChatMessage<'a>; 1],
        temperature: f32,
    }

    #[derive(Serialize)]
    struct ChatMessage<'a> {
        role: &'a str,
        content: &'a str,
    }

    #[derive(Deserialize)]
    struct ChatResponse {
        #[serde(default)]
        choices: Vec<Choice>,
    }

    #[derive(Deserialize)]
    struct Choice {
        message: ResponseMessage,
    }

    #[derive(Deserialize)]
    struct ResponseMessage {
        #[serde(default)]
        content: Option<String>,
    }

    #[async_trait]
    impl AnswerSynthesizer for OpenAIChatSynthesizer {
        async fn answer(&self, query: &str, passages: &[String]) -> Result<String> {
            let prompt = self.prompt.render(query, passages);
            debug!(
                provider = PROVIDER,
                model = %self.model,
                passages = passages.len(),
                prompt_len = prompt.len(),
                "requesting answer"
            );

            let body = ChatRequest {
                model: &self.model,
                messages: [ChatMessage { role: "user", content: &prompt }],
                temperature: self.temperature,
            };

            let response = self
                .client
                .post(format!("{}/chat/completions", self.base_url))
                .bearer_auth(&self.api_key)
                .json(&body)
                .send()
                .await
                .map_err(|e| {
                    error!(provider = PROVIDER, error = %e, "chat request failed");
                    Self::generation_error(format!("request failed: {e}"))
                })?;

            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                error!(provider = PROVIDER, %status, "chat API error");
                return Err(Self::generation_error(format!(
                    "API returned {status}: {}",
                    api_error_detail(body)
                )));
            }

            let chat: ChatResponse = response
                .json()
                .await
                .map_err(|e| Self::generation_error(format!("failed to parse response: {e}")))?;

            chat.choices
                .into_iter()
                .next()
                .and_then(|c| c.message.content)
                .map(|content| content.trim().to_string())
                .filter(|content| !content.is_empty())
                .ok_or_else(|| Self::generation_error("model returned no answer".into()))
        }

        fn name(&self) -> &str {
            PROVIDER
        }
    }
}
