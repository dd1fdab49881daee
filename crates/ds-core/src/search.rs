use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::tokenizer::Tokenizer;

/// LLM-assigned quality scores for a page, each on a 1..=5 scale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct PageEvaluation {
    /// One or two sentences characterizing the content type and quality.
    pub depth_summary: String,
    /// How substantive the content is (1 = shallow, 5 = expert-level).
    #[schemars(range(min = 1, max = 5))]
    pub depth_score: u8,
    /// What the page contributes to answering the search query.
    pub relevance_summary: String,
    /// How well the page addresses the search query (1 = not at all, 5 = fully).
    #[schemars(range(min = 1, max = 5))]
    pub relevance_score: u8,
}

impl PageEvaluation {
    pub const MIN_SCORE: u8 = 1;
    pub const MAX_SCORE: u8 = 5;

    /// Reject scores outside 1..=5.
    pub fn validate(&self) -> Result<(), Error> {
        for (field, score) in [
            ("depth_score", self.depth_score),
            ("relevance_score", self.relevance_score),
        ] {
            if !(Self::MIN_SCORE..=Self::MAX_SCORE).contains(&score) {
                return Err(Error::schema(
                    "page_evaluation",
                    format!("{} must be within 1..=5, got {}", field, score),
                ));
            }
        }
        Ok(())
    }

    /// True when either score falls below `min_score`.
    pub fn is_below(&self, min_score: u8) -> bool {
        self.depth_score < min_score || self.relevance_score < min_score
    }
}

/// A single retrieved web page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub url: String,
    pub title: String,
    pub description: String,
    pub content: String,
    /// Token count of `content`, as measured by the run's tokenizer.
    #[serde(default)]
    pub content_token_count: usize,
    /// `content_token_count` before the first truncation, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_token_count: Option<usize>,
    /// Tokens the search provider billed for this page.
    #[serde(default)]
    pub provider_tokens: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evaluation: Option<PageEvaluation>,
}

impl Page {
    pub fn new(
        url: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            description: description.into(),
            content: content.into(),
            content_token_count: 0,
            original_token_count: None,
            provider_tokens: 0,
            evaluation: None,
        }
    }

    pub fn with_provider_tokens(mut self, tokens: u64) -> Self {
        self.provider_tokens = tokens;
        self
    }

    /// Recompute `content_token_count` from the current content.
    pub fn count_tokens(&mut self, tokenizer: &dyn Tokenizer) -> usize {
        self.content_token_count = tokenizer.count(&self.content);
        self.content_token_count
    }

    /// Keep the first `chars` characters of the content and recount tokens.
    ///
    /// The count from before the first truncation is kept in
    /// `original_token_count`.
    pub fn truncate_chars(&mut self, chars: usize, tokenizer: &dyn Tokenizer) {
        self.original_token_count.get_or_insert(self.content_token_count);
        if let Some((byte_idx, _)) = self.content.char_indices().nth(chars) {
            self.content.truncate(byte_idx);
        }
        self.count_tokens(tokenizer);
    }

    /// Token count of the content as retrieved, before any trimming.
    pub fn untrimmed_token_count(&self) -> usize {
        self.original_token_count.unwrap_or(self.content_token_count)
    }

    pub fn char_len(&self) -> usize {
        self.content.chars().count()
    }
}

/// Outcome of one search call. Never removed once recorded in a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub query: String,
    pub success: bool,
    #[serde(default)]
    pub pages: Vec<Page>,
    #[serde(default)]
    pub provider_token_cost: u64,
}

impl SearchResult {
    pub fn succeeded(query: impl Into<String>, pages: Vec<Page>, provider_token_cost: u64) -> Self {
        Self {
            query: query.into(),
            success: true,
            pages,
            provider_token_cost,
        }
    }

    /// A failed search: no pages, no cost.
    pub fn failed(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            success: false,
            pages: Vec::new(),
            provider_token_cost: 0,
        }
    }

    /// Count content tokens for every page, returning the total.
    pub fn count_tokens(&mut self, tokenizer: &dyn Tokenizer) -> usize {
        self.pages
            .iter_mut()
            .map(|page| page.count_tokens(tokenizer))
            .sum()
    }
}

/// A web search backend.
///
/// Implementations must not fail: any transport or validation problem is
/// reported as [`SearchResult::failed`].
#[async_trait]
pub trait SearchProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn search(&self, query: &str, num_pages: usize) -> SearchResult;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::CharTokenizer;

    fn evaluation(depth: u8, relevance: u8) -> PageEvaluation {
        PageEvaluation {
            depth_summary: "d".into(),
            depth_score: depth,
            relevance_summary: "r".into(),
            relevance_score: relevance,
        }
    }

    #[test]
    fn test_evaluation_validate() {
        assert!(evaluation(1, 5).validate().is_ok());
        assert!(evaluation(0, 3).validate().is_err());
        assert!(evaluation(3, 6).validate().is_err());
    }

    #[test]
    fn test_evaluation_is_below() {
        assert!(evaluation(2, 5).is_below(3));
        assert!(evaluation(5, 2).is_below(3));
        assert!(!evaluation(3, 3).is_below(3));
    }

    #[test]
    fn test_truncate_chars_is_utf8_safe() {
        let mut page = Page::new("https://a", "A", "", "héllo wörld");
        page.truncate_chars(4, &CharTokenizer);
        assert_eq!(page.content, "héll");
        assert_eq!(page.content_token_count, 4);

        page.truncate_chars(100, &CharTokenizer);
        assert_eq!(page.content, "héll");
    }

    #[test]
    fn test_truncate_keeps_first_token_count() {
        let mut page = Page::new("https://a", "A", "", "abcdefghij");
        page.count_tokens(&CharTokenizer);
        assert_eq!(page.untrimmed_token_count(), 10);

        page.truncate_chars(6, &CharTokenizer);
        page.truncate_chars(3, &CharTokenizer);
        assert_eq!(page.content_token_count, 3);
        assert_eq!(page.original_token_count, Some(10));
        assert_eq!(page.untrimmed_token_count(), 10);
    }

    #[test]
    fn test_evaluation_schema_bounds_scores() {
        let schema = serde_json::to_value(schemars::schema_for!(PageEvaluation)).unwrap();
        for field in ["depth_score", "relevance_score"] {
            let property = &schema["properties"][field];
            assert_eq!(property["minimum"], 1, "{}", field);
            assert_eq!(property["maximum"], 5, "{}", field);
        }
    }

    #[test]
    fn test_failed_result_is_empty() {
        let result = SearchResult::failed("rust");
        assert!(!result.success);
        assert!(result.pages.is_empty());
        assert_eq!(result.provider_token_cost, 0);
    }

    #[test]
    fn test_count_tokens_sums_pages() {
        let mut result = SearchResult::succeeded(
            "q",
            vec![Page::new("u1", "", "", "abc"), Page::new("u2", "", "", "de")],
            10,
        );
        assert_eq!(result.count_tokens(&CharTokenizer), 5);
        assert_eq!(result.pages[1].content_token_count, 2);
    }
}
