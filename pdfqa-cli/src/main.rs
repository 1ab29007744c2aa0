//! `pdfqa`: ask questions about a PDF against a managed Qdrant collection and a
//! local SQLite index, and compare how long each takes.

mod cli;
mod config;
mod logging;
mod report;

use std::path::Path;

use anyhow::Context;
use clap::Parser;
use pdfqa_rag::{Document, RagPipeline};
use tracing::{info, warn};

use crate::cli::{Cli, Command};
use crate::config::AppConfig;

const DEFAULT_QUERIES: [&str; 3] = [
    "What is the main topic of this document?",
    "Summarize the key findings.",
    "What methods or approaches are described?",
];

async fn load_documents(path: &Path) -> anyhow::Result<Vec<Document>> {
    let is_text = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("txt") || ext.eq_ignore_ascii_case("md"));
    let documents = if is_text {
        vec![pdfqa_rag::load_text(path).await?]
    } else {
        pdfqa_rag::load_pdf(path).await?
    };
    Ok(documents)
}

async fn ingest(pipeline: &RagPipeline, path: &Path) -> anyhow::Result<()> {
    let documents =
        load_documents(path).await.with_context(|| format!("cannot load {}", path.display()))?;
    let report = pipeline.ingest(&documents).await?;
    for failure in report.failures() {
        warn!(backend = %failure.backend, operation = %failure.operation, "{}", failure.message);
    }
    println!("{}", report::ingest(&report));
    Ok(())
}

async fn prepare(pipeline: &RagPipeline) {
    for failure in pipeline.prepare().await.into_iter().filter_map(Result::err) {
        warn!(backend = %failure.backend, kind = %failure.kind, "backend unavailable: {}", failure.message);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = AppConfig::load(cli.config.as_deref(), &cli.overrides)?;
    let pipeline = config.build_pipeline().await?;
    info!(
        collection = %config.collection,
        backends = pipeline.backends().count(),
        top_k = config.rag.top_k,
        "pipeline ready"
    );

    match cli.command {
        Command::Ingest { pdf } => ingest(&pipeline, &pdf).await?,
        Command::Ask { query, json } => {
            prepare(&pipeline).await;
            let answers = pipeline.ask(&query).await;
            if json {
                println!("{}", report::json(&answers)?);
            } else {
                println!("{}", report::answers(&answers));
            }
        }
        Command::Compare { queries, pdf, json } => {
            match pdf {
                Some(pdf) => ingest(&pipeline, &pdf).await?,
                None => prepare(&pipeline).await,
            }
            let queries: Vec<String> = if queries.is_empty() {
                DEFAULT_QUERIES.iter().map(|q| q.to_string()).collect()
            } else {
                queries
            };
            let comparison = pipeline.compare(&queries).await?;
            if json {
                println!("{}", report::json(&comparison)?);
            } else {
                println!("{}", report::comparison(&comparison));
            }
        }
        Command::Cleanup => println!("{}", report::cleanup(&pipeline.cleanup().await)),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    logging::init(cli.log_format, cli.verbose);
    run(cli).await
}
