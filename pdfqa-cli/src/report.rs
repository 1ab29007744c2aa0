//! Human-readable and JSON rendering of pipeline reports.

use std::time::Duration;

use pdfqa_rag::{BackendAnswer, CleanupOutcome, ComparisonReport, IngestReport};
use serde::Serialize;

/// Longest passage excerpt shown in text output, in characters.
const EXCERPT_CHARS: usize = 160;

fn millis(duration: Duration) -> String {
    format!("{:.1} ms", duration.as_secs_f64() * 1000.0)
}

fn excerpt(text: &str) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= EXCERPT_CHARS {
        return flat;
    }
    let cut: String = flat.chars().take(EXCERPT_CHARS).collect();
    format!("{cut}...")
}

pub fn json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

pub fn ingest(report: &IngestReport) -> String {
    let mut lines = vec![format!(
        "Ingested {} page(s) as {} chunk(s)",
        report.documents, report.chunks
    )];
    for outcome in &report.backends {
        lines.push(match &outcome.failure {
            None => format!(
                "  {:<12} {:>6} records  {}",
                outcome.backend,
                outcome.records_written,
                millis(outcome.latency)
            ),
            Some(failure) => format!(
                "  {:<12} FAILED during {} ({}): {}",
                outcome.backend, failure.operation, failure.kind, failure.message
            ),
        });
    }
    lines.join("\n")
}

fn answer_lines(answer: &BackendAnswer, lines: &mut Vec<String>) {
    match &answer.failure {
        Some(failure) => lines.push(format!(
            "[{}] FAILED during {} ({}) after {}: {}",
            answer.backend,
            failure.operation,
            failure.kind,
            millis(answer.latency),
            failure.message
        )),
        None => lines.push(format!(
            "[{}] {} (retrieval {})",
            answer.backend,
            millis(answer.latency),
            millis(answer.retrieval_latency)
        )),
    }
    if let Some(text) = &answer.answer {
        lines.push(format!("  Answer: {}", text.trim()));
    }
    for (rank, passage) in answer.passages.iter().enumerate() {
        let page = passage.metadata.get("page").map(String::as_str).unwrap_or("?");
        lines.push(format!(
            "  {}. score {:.3}  page {}  {}",
            rank + 1,
            passage.score,
            page,
            excerpt(&passage.text)
        ));
    }
}

pub fn answers(answers: &[BackendAnswer]) -> String {
    let mut lines = Vec::new();
    if let Some(first) = answers.first() {
        lines.push(format!("Q: {}", first.query));
    }
    for answer in answers {
        answer_lines(answer, &mut lines);
    }
    lines.join("\n")
}

pub fn comparison(report: &ComparisonReport) -> String {
    let mut lines = Vec::new();
    // Entries hold one answer per backend for each query, in query order.
    let per_query = (report.entries.len() / report.queries.len().max(1)).max(1);
    for (i, (query, answers)) in
        report.queries.iter().zip(report.entries.chunks(per_query)).enumerate()
    {
        if i > 0 {
            lines.push(String::new());
        }
        lines.push(format!("Q{}: {}", i + 1, query));
        for answer in answers {
            answer_lines(answer, &mut lines);
        }
    }

    lines.push(String::new());
    lines.push(format!(
        "{:<12} {:>4} {:>6} {:>12} {:>12} {:>12}",
        "backend", "ok", "failed", "mean", "min", "max"
    ));
    for summary in report.summary() {
        lines.push(format!(
            "{:<12} {:>4} {:>6} {:>12} {:>12} {:>12}",
            summary.backend,
            summary.succeeded,
            summary.failed,
            millis(summary.mean_latency),
            millis(summary.min_latency),
            millis(summary.max_latency)
        ));
    }
    lines.join("\n")
}

pub fn cleanup(outcomes: &[CleanupOutcome]) -> String {
    outcomes
        .iter()
        .map(|outcome| match (&outcome.failure, outcome.deleted) {
            (Some(failure), _) => format!(
                "{}: FAILED to delete {} ({}): {}",
                outcome.backend, outcome.collection, failure.kind, failure.message
            ),
            (None, true) => format!("{}: deleted {}", outcome.backend, outcome.collection),
            (None, false) => format!("{}: {} did not exist", outcome.backend, outcome.collection),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use pdfqa_rag::{BackendFailure, ErrorKind, IngestOutcome, ScoredPassage};

    use super::*;

    fn failure(backend: &str, operation: &str, kind: ErrorKind) -> BackendFailure {
        BackendFailure {
            backend: backend.to_string(),
            operation: operation.to_string(),
            kind,
            message: "connection refused".to_string(),
            batch_offset: None,
        }
    }

    fn answer(backend: &str, query: &str, ms: u64, failed: bool) -> BackendAnswer {
        BackendAnswer {
            backend: backend.to_string(),
            query: query.to_string(),
            answer: (!failed).then(|| "Because of scattering.".to_string()),
            passages: if failed {
                Vec::new()
            } else {
                vec![ScoredPassage {
                    id: "a".to_string(),
                    text: "Light   scatters\nin the atmosphere.".to_string(),
                    score: 0.91234,
                    metadata: HashMap::from([("page".to_string(), "4".to_string())]),
                }]
            },
            retrieval_latency: Duration::from_millis(ms / 2),
            latency: Duration::from_millis(ms),
            failure: failed.then(|| failure(backend, "retrieve", ErrorKind::TransientNetwork)),
        }
    }

    #[test]
    fn excerpt_flattens_and_truncates() {
        assert_eq!(excerpt("a\n b\t c"), "a b c");
        let long = "x".repeat(500);
        let cut = excerpt(&long);
        assert_eq!(cut.chars().count(), EXCERPT_CHARS + 3);
        assert!(cut.ends_with("..."));
    }

    #[test]
    fn ingest_lists_every_backend() {
        let report = IngestReport {
            documents: 3,
            chunks: 12,
            backends: vec![
                IngestOutcome {
                    backend: "qdrant".to_string(),
                    records_written: 0,
                    latency: Duration::from_millis(40),
                    failure: Some(failure("qdrant", "upsert", ErrorKind::Authentication)),
                },
                IngestOutcome {
                    backend: "sqlite".to_string(),
                    records_written: 12,
                    latency: Duration::from_millis(5),
                    failure: None,
                },
            ],
        };
        let text = ingest(&report);
        assert!(text.starts_with("Ingested 3 page(s) as 12 chunk(s)"));
        assert!(text.contains("qdrant       FAILED during upsert (AuthenticationError)"));
        assert!(text.contains("sqlite"));
        assert!(text.contains("12 records  5.0 ms"));
    }

    #[test]
    fn answers_show_passages_with_pages() {
        let text = answers(&[answer("sqlite", "Why?", 12, false)]);
        assert!(text.starts_with("Q: Why?"));
        assert!(text.contains("[sqlite] 12.0 ms (retrieval 6.0 ms)"));
        assert!(text.contains("Answer: Because of scattering."));
        assert!(text.contains("1. score 0.912  page 4  Light scatters in the atmosphere."));
    }

    #[test]
    fn comparison_groups_by_query_and_summarizes() {
        let report = ComparisonReport {
            queries: vec!["one".to_string(), "two".to_string()],
            entries: vec![
                answer("qdrant", "one", 80, false),
                answer("sqlite", "one", 4, false),
                answer("qdrant", "two", 120, true),
                answer("sqlite", "two", 6, false),
            ],
        };
        let text = comparison(&report);
        let q1 = text.find("Q1: one").unwrap();
        let q2 = text.find("Q2: two").unwrap();
        assert!(q1 < q2);
        assert!(text.contains("[qdrant] FAILED during retrieve (TransientNetworkError) after 120.0 ms"));

        let table: Vec<&str> = text.lines().rev().take(2).collect();
        assert!(table[1].starts_with("qdrant") && table[1].contains("   1      1"));
        assert!(table[0].starts_with("sqlite") && table[0].contains("5.0 ms"));
    }

    #[test]
    fn repeated_queries_are_listed_once_each() {
        let report = ComparisonReport {
            queries: vec!["same".to_string(), "same".to_string()],
            entries: vec![
                answer("qdrant", "same", 80, false),
                answer("sqlite", "same", 4, false),
                answer("qdrant", "same", 90, false),
                answer("sqlite", "same", 6, false),
            ],
        };
        let text = comparison(&report);
        assert_eq!(text.matches("[qdrant]").count(), 2);
        assert_eq!(text.matches("[sqlite]").count(), 2);
        let q2 = text.find("Q2: same").unwrap();
        assert!(text[q2..].contains("[qdrant] 90.0 ms"));
        assert!(!text[q2..].contains("[qdrant] 80.0 ms"));
    }

    #[test]
    fn cleanup_distinguishes_missing_collections() {
        let outcomes = vec![
            CleanupOutcome {
                backend: "qdrant".to_string(),
                collection: "pdfqa".to_string(),
                deleted: false,
                failure: None,
            },
            CleanupOutcome {
                backend: "sqlite".to_string(),
                collection: "pdfqa".to_string(),
                deleted: true,
                failure: None,
            },
        ];
        assert_eq!(cleanup(&outcomes), "qdrant: pdfqa did not exist\nsqlite: deleted pdfqa");
    }

    #[test]
    fn json_uses_millisecond_fields() {
        let value: serde_json::Value =
            serde_json::from_str(&json(&[answer("sqlite", "q", 12, false)]).unwrap()).unwrap();
        assert_eq!(value[0]["latency_ms"], 12.0);
        assert_eq!(value[0]["retrieval_latency_ms"], 6.0);
        assert!(value[0].get("failure").is_none());
    }
}
