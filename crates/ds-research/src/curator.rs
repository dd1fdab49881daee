//! Source curation: dedup, quality filtering and proportional trimming.
//!
//! Every accepted page loses the same fraction of its length when the
//! accepted total exceeds the budget, so breadth of sources is preserved
//! over keeping a few pages whole.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use ds_core::{Page, SearchResult, Tokenizer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscardReason {
    TooShort,
    Duplicate,
    LowQuality,
}

impl std::fmt::Display for DiscardReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DiscardReason::TooShort => write!(f, "too_short"),
            DiscardReason::Duplicate => write!(f, "duplicate"),
            DiscardReason::LowQuality => write!(f, "low_quality"),
        }
    }
}

/// Counters describing one curation pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CurationStats {
    pub candidates: usize,
    pub accepted: usize,
    pub too_short: usize,
    pub duplicate: usize,
    pub low_quality: usize,
    /// Token total of accepted pages before trimming.
    pub accepted_tokens: usize,
    /// Token total of accepted pages after trimming.
    pub retained_tokens: usize,
    pub overflow_ratio: f64,
}

impl CurationStats {
    fn discard(&mut self, reason: DiscardReason) {
        match reason {
            DiscardReason::TooShort => self.too_short += 1,
            DiscardReason::Duplicate => self.duplicate += 1,
            DiscardReason::LowQuality => self.low_quality += 1,
        }
    }

    pub fn discarded(&self) -> usize {
        self.too_short + self.duplicate + self.low_quality
    }
}

#[derive(Debug, Clone)]
pub struct CurationOutcome {
    pub sources: Vec<Page>,
    pub stats: CurationStats,
}

#[derive(Debug, Clone)]
pub struct SourceCurator {
    min_page_tokens: usize,
    token_budget: usize,
    min_quality_score: Option<u8>,
}

impl SourceCurator {
    pub fn new(min_page_tokens: usize, token_budget: usize) -> Self {
        Self {
            min_page_tokens,
            token_budget,
            min_quality_score: None,
        }
    }

    /// Also discard evaluated pages scoring below `min_score` on either axis.
    pub fn with_min_quality_score(mut self, min_score: u8) -> Self {
        self.min_quality_score = Some(min_score);
        self
    }

    /// Curate every page in discovery order: iteration outer, page inner.
    pub fn curate(&self, results: &[SearchResult], tokenizer: &dyn Tokenizer) -> CurationOutcome {
        let pages = results.iter().flat_map(|r| r.pages.iter().cloned()).collect();
        self.curate_pages(pages, tokenizer)
    }

    pub fn curate_pages(&self, pages: Vec<Page>, tokenizer: &dyn Tokenizer) -> CurationOutcome {
        let mut stats = CurationStats {
            candidates: pages.len(),
            ..Default::default()
        };
        let mut seen: HashSet<String> = HashSet::new();
        let mut sources = Vec::new();

        for page in pages {
            if let Some(reason) = self.classify(&page, &seen) {
                debug!(url = %page.url, tokens = page.content_token_count, reason = %reason, "Discarding page");
                stats.discard(reason);
                continue;
            }
            seen.insert(page.url.clone());
            stats.accepted_tokens += page.content_token_count;
            sources.push(page);
        }
        stats.accepted = sources.len();
        stats.overflow_ratio = overflow_ratio(stats.accepted_tokens, self.token_budget);

        if stats.overflow_ratio > 0.0 {
            let keep = 1.0 - stats.overflow_ratio;
            for page in &mut sources {
                let chars = (page.char_len() as f64 * keep).floor() as usize;
                page.truncate_chars(chars, tokenizer);
            }
        }
        stats.retained_tokens = sources.iter().map(|p| p.content_token_count).sum();

        debug!(
            candidates = stats.candidates,
            accepted = stats.accepted,
            too_short = stats.too_short,
            duplicate = stats.duplicate,
            low_quality = stats.low_quality,
            accepted_tokens = stats.accepted_tokens,
            retained_tokens = stats.retained_tokens,
            overflow_ratio = stats.overflow_ratio,
            "Curation finished"
        );

        CurationOutcome { sources, stats }
    }

    // Order matters: a short duplicate is too short, not a duplicate.
    // Length is judged on the untrimmed count so a curated set re-curates
    // unchanged.
    fn classify(&self, page: &Page, seen: &HashSet<String>) -> Option<DiscardReason> {
        if page.untrimmed_token_count() < self.min_page_tokens {
            return Some(DiscardReason::TooShort);
        }
        if seen.contains(&page.url) {
            return Some(DiscardReason::Duplicate);
        }
        match (self.min_quality_score, &page.evaluation) {
            (Some(min), Some(eval)) if eval.is_below(min) => Some(DiscardReason::LowQuality),
            _ => None,
        }
    }
}

fn overflow_ratio(accepted_tokens: usize, budget: usize) -> f64 {
    if accepted_tokens == 0 || accepted_tokens <= budget {
        return 0.0;
    }
    (accepted_tokens - budget) as f64 / accepted_tokens as f64
}
