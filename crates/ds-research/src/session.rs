use ds_core::{Message, Page, SearchResult};

use crate::curator::CurationStats;

/// State of one research run.
///
/// Owned by a single [`ResearchController`](crate::ResearchController) run
/// and mutated only through the crate-private methods below, which keep the
/// counters monotonic.
#[derive(Debug, Clone)]
pub struct ResearchSession {
    user_query: String,
    next_search_query: String,
    executed_queries: Vec<String>,
    search_results: Vec<SearchResult>,
    accumulated_token_count: u64,
    iteration_count: usize,
    continue_search: bool,
    message_history: Vec<Message>,
    curated_sources: Vec<Page>,
    curation: CurationStats,
    final_report: String,
}

impl ResearchSession {
    pub fn new(user_query: impl Into<String>) -> Self {
        let user_query = user_query.into();
        Self {
            next_search_query: user_query.clone(),
            user_query,
            executed_queries: Vec::new(),
            search_results: Vec::new(),
            accumulated_token_count: 0,
            iteration_count: 0,
            continue_search: false,
            message_history: Vec::new(),
            curated_sources: Vec::new(),
            curation: CurationStats::default(),
            final_report: String::new(),
        }
    }

    pub fn user_query(&self) -> &str {
        &self.user_query
    }

    pub fn next_search_query(&self) -> &str {
        &self.next_search_query
    }

    pub fn executed_queries(&self) -> &[String] {
        &self.executed_queries
    }

    pub fn search_results(&self) -> &[SearchResult] {
        &self.search_results
    }

    pub fn accumulated_token_count(&self) -> u64 {
        self.accumulated_token_count
    }

    pub fn iteration_count(&self) -> usize {
        self.iteration_count
    }

    pub fn continue_search(&self) -> bool {
        self.continue_search
    }

    pub fn message_history(&self) -> &[Message] {
        &self.message_history
    }

    pub fn curated_sources(&self) -> &[Page] {
        &self.curated_sources
    }

    pub fn curation(&self) -> &CurationStats {
        &self.curation
    }

    pub fn final_report(&self) -> &str {
        &self.final_report
    }

    pub fn latest_result(&self) -> Option<&SearchResult> {
        self.search_results.last()
    }

    /// Record a completed search. The query is kept only when the search succeeded.
    pub(crate) fn record_search(&mut self, result: SearchResult) {
        if result.success {
            self.executed_queries.push(result.query.clone());
        }
        self.accumulated_token_count += result.provider_token_cost;
        self.iteration_count += 1;
        self.search_results.push(result);
    }

    /// Loop-breaker: keep searching only while both caps are unmet.
    pub(crate) fn decide(&mut self, max_iterations: usize, token_limit: u64) -> bool {
        self.continue_search =
            self.iteration_count < max_iterations && self.accumulated_token_count < token_limit;
        self.continue_search
    }

    pub(crate) fn push_message(&mut self, message: Message) {
        self.message_history.push(message);
    }

    /// Replace the turn at `index` in place.
    pub(crate) fn replace_message(&mut self, index: usize, message: Message) {
        if let Some(slot) = self.message_history.get_mut(index) {
            *slot = message;
        }
    }

    pub(crate) fn set_next_search_query(&mut self, query: impl Into<String>) {
        self.next_search_query = query.into();
    }

    pub(crate) fn set_curated(&mut self, sources: Vec<Page>, stats: CurationStats) {
        self.curated_sources = sources;
        self.curation = stats;
    }

    pub(crate) fn set_final_report(&mut self, report: impl Into<String>) {
        self.final_report = report.into();
    }
}
