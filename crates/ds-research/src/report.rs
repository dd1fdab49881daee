use serde::{Deserialize, Serialize};

use crate::curator::CurationStats;
use crate::session::ResearchSession;

/// A curated source as cited in the report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CitedSource {
    /// Citation number, starting at 1.
    pub index: usize,
    pub title: String,
    pub url: String,
    pub token_count: usize,
}

/// The exported result of a completed research run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchReport {
    pub user_query: String,
    pub report: String,
    pub sources: Vec<CitedSource>,
    pub executed_queries: Vec<String>,
    pub iterations: usize,
    pub accumulated_tokens: u64,
    pub curation: CurationStats,
}

impl ResearchReport {
    pub fn from_session(session: &ResearchSession) -> Self {
        let sources = session
            .curated_sources()
            .iter()
            .enumerate()
            .map(|(i, page)| CitedSource {
                index: i + 1,
                title: page.title.clone(),
                url: page.url.clone(),
                token_count: page.content_token_count,
            })
            .collect();

        Self {
            user_query: session.user_query().to_string(),
            report: session.final_report().to_string(),
            sources,
            executed_queries: session.executed_queries().to_vec(),
            iterations: session.iteration_count(),
            accumulated_tokens: session.accumulated_token_count(),
            curation: session.curation().clone(),
        }
    }

    /// The report followed by a numbered source list.
    pub fn to_markdown(&self) -> String {
        let mut out = self.report.trim_end().to_string();
        out.push_str("\n\n## Sources\n\n");
        if self.sources.is_empty() {
            out.push_str("No sources available.\n");
        }
        for source in &self.sources {
            let title = if source.title.is_empty() {
                source.url.as_str()
            } else {
                source.title.as_str()
            };
            out.push_str(&format!("[{}] {} - {}\n", source.index, title, source.url));
        }
        out
    }
}
