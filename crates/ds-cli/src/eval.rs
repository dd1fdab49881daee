//! Batch runs over a JSONL benchmark file.
//!
//! Each input line is `{"id", "prompt", "language"}`; each output line is
//! `{"id", "prompt", "article"}` in input order. A failed run is logged and
//! written with an empty article.

use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use ds_research::ResearchController;

#[derive(Debug, Clone, Deserialize)]
pub struct BenchmarkQuery {
    pub id: serde_json::Value,
    pub prompt: String,
    #[serde(default)]
    pub language: Option<String>,
}

#[derive(Debug, Serialize)]
struct BenchmarkArticle<'a> {
    id: &'a serde_json::Value,
    prompt: &'a str,
    article: &'a str,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct EvalSummary {
    pub succeeded: usize,
    pub failed: usize,
}

pub fn read_queries(path: &Path) -> Result<Vec<BenchmarkQuery>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open queries file: {}", path.display()))?;

    let mut queries = Vec::new();
    for (line_no, line) in BufReader::new(file).lines().enumerate() {
        let line = line.with_context(|| format!("Failed to read {}", path.display()))?;
        if line.trim().is_empty() {
            continue;
        }
        let query: BenchmarkQuery = serde_json::from_str(&line)
            .with_context(|| format!("Invalid query on line {} of {}", line_no + 1, path.display()))?;
        queries.push(query);
    }
    Ok(queries)
}

/// Keep queries in `language` (all when `None`), then the first `limit`.
pub fn select(queries: Vec<BenchmarkQuery>, language: Option<&str>, limit: Option<usize>) -> Vec<BenchmarkQuery> {
    queries
        .into_iter()
        .filter(|q| match language {
            Some(lang) => q.language.as_deref() == Some(lang),
            None => true,
        })
        .take(limit.unwrap_or(usize::MAX))
        .collect()
}

/// Run one independent session per query, appending results to `output`.
pub async fn run(
    controller: &ResearchController,
    queries: &[BenchmarkQuery],
    output: &Path,
) -> Result<EvalSummary> {
    if let Some(dir) = output.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create output directory: {}", dir.display()))?;
    }
    let file = std::fs::File::create(output)
        .with_context(|| format!("Failed to create output file: {}", output.display()))?;
    let mut writer = BufWriter::new(file);
    let mut summary = EvalSummary::default();

    for (i, query) in queries.iter().enumerate() {
        info!(id = %query.id, progress = %format!("{}/{}", i + 1, queries.len()), "Running benchmark query");

        let article = match controller.run(&query.prompt).await {
            Ok(report) => {
                summary.succeeded += 1;
                report.report
            }
            Err(e) => {
                warn!(id = %query.id, error = %e, transient = e.is_transient(), "Benchmark query failed");
                summary.failed += 1;
                String::new()
            }
        };

        let line = serde_json::to_string(&BenchmarkArticle {
            id: &query.id,
            prompt: &query.prompt,
            article: &article,
        })?;
        writeln!(writer, "{}", line)?;
        writer.flush()?;
    }

    info!(succeeded = summary.succeeded, failed = summary.failed, "Benchmark finished");
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use ds_core::testing::{CharTokenizer, MockProvider, MockSearch};
    use ds_research::{GenerationOptions, ResearchConfig};

    fn write_queries(dir: &Path) -> std::path::PathBuf {
        let path = dir.join("queries.jsonl");
        std::fs::write(
            &path,
            concat!(
                "{\"id\": 1, \"prompt\": \"first\", \"language\": \"en\"}\n",
                "\n",
                "{\"id\": 2, \"prompt\": \"zweite\", \"language\": \"de\"}\n",
                "{\"id\": 3, \"prompt\": \"third\", \"language\": \"en\"}\n",
            ),
        )
        .unwrap();
        path
    }

    #[test]
    fn test_read_and_select() {
        let dir = tempfile::tempdir().unwrap();
        let queries = read_queries(&write_queries(dir.path())).unwrap();
        assert_eq!(queries.len(), 3);

        let english = select(queries.clone(), Some("en"), None);
        let prompts: Vec<_> = english.iter().map(|q| q.prompt.as_str()).collect();
        assert_eq!(prompts, ["first", "third"]);

        assert_eq!(select(queries.clone(), None, Some(2)).len(), 2);
        assert_eq!(select(queries, Some("en"), Some(1))[0].id, 1);
    }

    #[test]
    fn test_read_reports_bad_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.jsonl");
        std::fs::write(&path, "{\"id\": 1, \"prompt\": \"ok\"}\nnot json\n").unwrap();

        let err = read_queries(&path).unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[tokio::test]
    async fn test_failed_run_writes_empty_article() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out").join("articles.jsonl");

        let provider = Arc::new(MockProvider::new());
        provider.queue_response("Article one.");
        provider.queue_error(ds_core::Error::network("down"));
        let controller = ResearchController::new(
            provider,
            Arc::new(MockSearch::new()),
            Arc::new(CharTokenizer),
            ResearchConfig {
                max_iterations: 1,
                token_limit: 1000,
                sources_token_budget: 1000,
                min_page_tokens: 10,
                pages_per_search: 3,
                evaluate_pages: false,
                min_quality_score: 3,
                generation: GenerationOptions::default(),
            },
        );

        let queries = select(read_queries(&write_queries(dir.path())).unwrap(), Some("en"), None);
        let summary = run(&controller, &queries, &output).await.unwrap();
        assert_eq!(summary, EvalSummary { succeeded: 1, failed: 1 });

        let lines: Vec<serde_json::Value> = std::fs::read_to_string(&output)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["id"], 1);
        assert_eq!(lines[0]["article"], "Article one.");
        assert_eq!(lines[1]["prompt"], "third");
        assert_eq!(lines[1]["article"], "");
    }
}
