use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::config::{EmbedderKind, LlmKind};

/// Ask questions about a PDF and compare vector index latency.
#[derive(Debug, Parser)]
#[command(name = "pdfqa", version, about)]
pub struct Cli {
    /// TOML configuration file.
    #[arg(long, global = true, env = "PDFQA_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log output format.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,

    /// Increase log verbosity (-v debug, -vv trace). `RUST_LOG` takes precedence.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(flatten)]
    pub overrides: Overrides,

    #[command(subcommand)]
    pub command: Command,
}

/// Settings that override the configuration file and environment.
#[derive(Debug, Default, Args)]
pub struct Overrides {
    /// Embedding provider.
    #[arg(long, global = true, value_enum)]
    pub embedder: Option<EmbedderKind>,

    /// Answer generator.
    #[arg(long, global = true, value_enum)]
    pub llm: Option<LlmKind>,

    /// Collection name used on every backend.
    #[arg(long, global = true)]
    pub collection: Option<String>,

    /// Number of passages retrieved per query.
    #[arg(short = 'k', long, global = true)]
    pub top_k: Option<usize>,

    /// Directory of the local index.
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Skip the managed Qdrant backend even if it is configured.
    #[arg(long, global = true)]
    pub local_only: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Load a PDF, chunk and embed it, and upsert it into every backend.
    Ingest {
        /// Path of the PDF.
        pdf: PathBuf,
    },
    /// Answer one question with every backend.
    Ask {
        /// The question.
        query: String,
        /// Print the report as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Run several questions against every backend and compare latency.
    Compare {
        /// A question; repeat for several. Defaults to a built-in set.
        #[arg(short, long = "query")]
        queries: Vec<String>,
        /// Ingest this PDF before comparing.
        #[arg(long)]
        pdf: Option<PathBuf>,
        /// Print the report as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Delete the collection from every backend.
    Cleanup,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Pretty,
    Json,
}
