use std::sync::Arc;

use minijinja::context;
use tracing::debug;

use ds_core::{parse_structured, CompletionRequest, Message, PageEvaluation, Provider, ResponseSchema, SearchResult};

use crate::config::GenerationOptions;
use crate::error::{ResearchError, Stage};
use crate::prompts::{self, EVAL_SYSTEM_PROMPT, EVAL_TEMPLATE};

const PAGE_EVALUATION_SCHEMA: &str = "page_evaluation";

/// Scores pages for depth and relevance against the query that found them.
pub struct PageEvaluator {
    provider: Arc<dyn Provider>,
    options: GenerationOptions,
    schema: ResponseSchema,
}

impl PageEvaluator {
    pub fn new(provider: Arc<dyn Provider>, options: GenerationOptions) -> Self {
        Self {
            provider,
            options,
            schema: ResponseSchema::for_type::<PageEvaluation>(PAGE_EVALUATION_SCHEMA),
        }
    }

    /// Evaluate every page with at least `min_page_tokens` content tokens.
    /// Returns the number of pages scored.
    pub async fn evaluate(
        &self,
        result: &mut SearchResult,
        min_page_tokens: usize,
    ) -> Result<usize, ResearchError> {
        let query = result.query.clone();
        let mut scored = 0;

        for page in result
            .pages
            .iter_mut()
            .filter(|p| p.content_token_count >= min_page_tokens)
        {
            let page_content = format!("Title: {}\nURL: {}\n\n{}", page.title, page.url, page.content);
            let prompt = prompts::render(
                "page_evaluation",
                EVAL_TEMPLATE,
                context! { search_query => &query, page_content => page_content },
            )?;
            let request = self
                .options
                .apply(CompletionRequest::new(vec![
                    Message::system(EVAL_SYSTEM_PROMPT),
                    Message::user(prompt),
                ]))
                .with_response_schema(self.schema.clone());

            let response = self
                .provider
                .complete(request)
                .await
                .map_err(|e| ResearchError::generation(Stage::Search, e))?;
            if !response.message.is_assistant() {
                return Err(ResearchError::precondition(
                    Stage::Search,
                    format!("expected an assistant turn, got {}", response.message.role),
                ));
            }

            let evaluation: PageEvaluation = parse_structured(&self.schema, &response.message.text)
                .map_err(|e| ResearchError::generation(Stage::Search, e))?;
            evaluation
                .validate()
                .map_err(|e| ResearchError::generation(Stage::Search, e))?;

            debug!(
                url = %page.url,
                depth = evaluation.depth_score,
                relevance = evaluation.relevance_score,
                "Page evaluated"
            );
            page.evaluation = Some(evaluation);
            scored += 1;
        }

        Ok(scored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ds_core::testing::{CharTokenizer, MockProvider};
    use ds_core::{Error, Page};

    fn eval_json(depth: u8, relevance: u8) -> String {
        serde_json::json!({
            "depth_summary": "reference documentation",
            "depth_score": depth,
            "relevance_summary": "directly answers the query",
            "relevance_score": relevance,
        })
        .to_string()
    }

    fn result() -> SearchResult {
        let mut result = SearchResult::succeeded(
            "tokio runtime",
            vec![
                Page::new("https://long", "Long", "", "x".repeat(50)),
                Page::new("https://short", "Short", "", "x".repeat(5)),
            ],
            10,
        );
        result.count_tokens(&CharTokenizer);
        result
    }

    #[tokio::test]
    async fn test_scores_only_long_enough_pages() {
        let provider = Arc::new(MockProvider::new());
        provider.queue_response(&eval_json(4, 5));
        let evaluator = PageEvaluator::new(provider.clone(), GenerationOptions::default());

        let mut result = result();
        let scored = evaluator.evaluate(&mut result, 10).await.unwrap();

        assert_eq!(scored, 1);
        assert_eq!(provider.request_count(), 1);
        let evaluation = result.pages[0].evaluation.as_ref().unwrap();
        assert_eq!(evaluation.depth_score, 4);
        assert!(result.pages[1].evaluation.is_none());

        let request = provider.last_request().unwrap();
        assert!(request.messages[1].text.contains("Search query: tokio runtime"));
        assert_eq!(request.response_schema.unwrap().name, PAGE_EVALUATION_SCHEMA);
    }

    #[tokio::test]
    async fn test_out_of_range_score_is_fatal() {
        let provider = Arc::new(MockProvider::new());
        provider.queue_response(&eval_json(0, 5));
        let evaluator = PageEvaluator::new(provider, GenerationOptions::default());

        let err = evaluator.evaluate(&mut result(), 10).await.unwrap_err();
        assert!(matches!(
            err,
            ResearchError::Generation { stage: Stage::Search, source: Error::Schema { .. } }
        ));
    }

    #[tokio::test]
    async fn test_provider_error_is_fatal() {
        let provider = Arc::new(MockProvider::new());
        provider.queue_error(Error::from_status(ds_core::Service::Generation, 429, "slow down"));
        let evaluator = PageEvaluator::new(provider, GenerationOptions::default());

        let err = evaluator.evaluate(&mut result(), 10).await.unwrap_err();
        assert_eq!(err.failed_stage(), Some(Stage::Search));
    }
}
