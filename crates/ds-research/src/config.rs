use std::collections::HashMap;

use ds_core::CompletionRequest;

/// Thresholds and knobs for one research run.
///
/// Supplied fully populated by the caller; this crate reads but never
/// defaults any of them.
#[derive(Debug, Clone)]
pub struct ResearchConfig {
    /// Stop after this many searches.
    pub max_iterations: usize,
    /// Stop once the search provider has billed this many tokens.
    pub token_limit: u64,
    /// Token budget for the curated sources handed to synthesis.
    pub sources_token_budget: usize,
    /// Pages with fewer content tokens are discarded during curation.
    pub min_page_tokens: usize,
    /// Pages requested per search call.
    pub pages_per_search: usize,
    /// Score every page with the generation service after each search.
    pub evaluate_pages: bool,
    /// Evaluated pages with a depth or relevance score below this are discarded.
    pub min_quality_score: u8,
    /// Options applied to every generation request.
    pub generation: GenerationOptions,
}

/// Per-request generation options (model, sampling, provider passthrough).
#[derive(Debug, Clone, Default)]
pub struct GenerationOptions {
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub extra: HashMap<String, serde_json::Value>,
}

impl GenerationOptions {
    pub fn apply(&self, mut request: CompletionRequest) -> CompletionRequest {
        if let Some(model) = &self.model {
            request = request.with_model(model.as_str());
        }
        if let Some(temperature) = self.temperature {
            request = request.with_temperature(temperature);
        }
        if let Some(max_tokens) = self.max_tokens {
            request = request.with_max_tokens(max_tokens);
        }
        if !self.extra.is_empty() {
            request = request.with_extra(self.extra.clone());
        }
        request
    }
}
