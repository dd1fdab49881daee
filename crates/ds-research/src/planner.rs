use std::sync::Arc;

use minijinja::context;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use ds_core::{parse_structured, CompletionRequest, Error, Message, Provider, ResponseSchema};

use crate::config::GenerationOptions;
use crate::error::{ResearchError, Stage};
use crate::prompts::{self, RESULTS_TEMPLATE};
use crate::render::render_pages;
use crate::session::ResearchSession;

pub const SEARCH_REASONING_SCHEMA: &str = "search_reasoning";

/// The planner's structured verdict on the latest search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct SearchReasoning {
    /// How well the latest results cover the research task and what is still missing.
    pub search_result_evaluation: String,
    /// The next web search query to run.
    pub next_search_query: String,
}

impl SearchReasoning {
    /// Compact form kept in the message history.
    pub fn render(&self) -> String {
        format!(
            "**Evaluation:** {}\n**Next Query:** {}",
            self.search_result_evaluation, self.next_search_query
        )
    }
}

/// Picks the next search query from the latest result.
///
/// Page content is shown to the model for exactly one call. Afterwards the
/// results turn is swapped for a content-free rendering so the retained
/// history does not grow with raw page text.
pub struct QueryPlanner {
    provider: Arc<dyn Provider>,
    options: GenerationOptions,
    schema: ResponseSchema,
}

impl QueryPlanner {
    pub fn new(provider: Arc<dyn Provider>, options: GenerationOptions) -> Self {
        Self {
            provider,
            options,
            schema: ResponseSchema::for_type::<SearchReasoning>(SEARCH_REASONING_SCHEMA),
        }
    }

    pub async fn plan(&self, session: &mut ResearchSession) -> Result<SearchReasoning, ResearchError> {
        let latest = session
            .latest_result()
            .ok_or_else(|| ResearchError::precondition(Stage::Plan, "no search result to plan from"))?;
        let with_content = render_pages(latest, true);
        let without_content = render_pages(latest, false);
        let executed = session.executed_queries().to_vec();

        session.push_message(Message::user(RESULTS_TEMPLATE));
        let placeholder = session.message_history().len() - 1;

        let mut messages = session.message_history().to_vec();
        messages[placeholder] = Message::user(prompts::render(
            "results",
            RESULTS_TEMPLATE,
            context! { search_result => with_content, executed_queries => &executed },
        )?);

        let request = self
            .options
            .apply(CompletionRequest::new(messages))
            .with_response_schema(self.schema.clone());
        debug!(messages = request.messages.len(), "Requesting search reasoning");

        let response = self
            .provider
            .complete(request)
            .await
            .map_err(|e| ResearchError::generation(Stage::Plan, e))?;
        if !response.message.is_assistant() {
            return Err(ResearchError::precondition(
                Stage::Plan,
                format!("expected an assistant turn, got {}", response.message.role),
            ));
        }

        let reasoning: SearchReasoning = parse_structured(&self.schema, &response.message.text)
            .map_err(|e| ResearchError::generation(Stage::Plan, e))?;
        let next_query = reasoning.next_search_query.trim().to_string();
        if next_query.is_empty() {
            return Err(ResearchError::generation(
                Stage::Plan,
                Error::schema(SEARCH_REASONING_SCHEMA, "next_search_query is empty"),
            ));
        }

        let summary = prompts::render(
            "results",
            RESULTS_TEMPLATE,
            context! { search_result => without_content, executed_queries => &executed },
        )?;
        session.replace_message(placeholder, Message::user(summary));
        session.push_message(Message::assistant_structured(reasoning.render(), SEARCH_REASONING_SCHEMA));
        session.set_next_search_query(next_query.as_str());

        info!(next_query = %next_query, "Planned next search");
        Ok(reasoning)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ds_core::testing::MockProvider;
    use ds_core::{Page, SearchResult};

    fn session_with_result() -> ResearchSession {
        let mut session = ResearchSession::new("rust web frameworks");
        session.push_message(Message::system("sys"));
        session.push_message(Message::user("task"));
        session.record_search(SearchResult::succeeded(
            "rust web frameworks",
            vec![Page::new("https://axum.rs", "Axum", "web framework", "SECRET PAGE BODY")],
            50,
        ));
        session
    }

    fn reasoning_json(query: &str) -> String {
        serde_json::json!({
            "search_result_evaluation": "covers axum only",
            "next_search_query": query,
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_plan_swaps_out_content() {
        let provider = Arc::new(MockProvider::new());
        provider.queue_response(&reasoning_json("actix vs axum benchmarks"));
        let planner = QueryPlanner::new(provider.clone(), GenerationOptions::default());
        let mut session = session_with_result();

        let reasoning = planner.plan(&mut session).await.unwrap();
        assert_eq!(reasoning.next_search_query, "actix vs axum benchmarks");
        assert_eq!(session.next_search_query(), "actix vs axum benchmarks");

        // The generation call saw the page body
        let request = provider.last_request().unwrap();
        assert!(request.messages[2].text.contains("SECRET PAGE BODY"));
        assert!(request.messages[2].text.contains("- rust web frameworks"));
        assert_eq!(request.response_schema.unwrap().name, SEARCH_REASONING_SCHEMA);

        // The retained history did not
        let history = session.message_history();
        assert_eq!(history.len(), 4);
        assert!(!history[2].text.contains("SECRET PAGE BODY"));
        assert!(history[2].text.contains("[1] URL Source: https://axum.rs"));
        assert!(history[3].is_assistant());
        assert_eq!(history[3].structured.as_deref(), Some(SEARCH_REASONING_SCHEMA));
        assert!(history[3].text.contains("**Next Query:** actix vs axum benchmarks"));
    }

    #[tokio::test]
    async fn test_plan_requires_a_search_result() {
        let provider = Arc::new(MockProvider::new());
        let planner = QueryPlanner::new(provider.clone(), GenerationOptions::default());
        let mut session = ResearchSession::new("q");

        let err = planner.plan(&mut session).await.unwrap_err();
        assert!(matches!(err, ResearchError::Precondition { stage: Stage::Plan, .. }));
        assert_eq!(provider.request_count(), 0);
    }

    #[tokio::test]
    async fn test_plan_rejects_non_assistant_turn() {
        let provider = Arc::new(MockProvider::new());
        provider.queue_message(Message::user(reasoning_json("x")));
        let planner = QueryPlanner::new(provider, GenerationOptions::default());

        let err = planner.plan(&mut session_with_result()).await.unwrap_err();
        assert!(matches!(err, ResearchError::Precondition { stage: Stage::Plan, .. }));
    }

    #[tokio::test]
    async fn test_plan_schema_failure_is_fatal() {
        let provider = Arc::new(MockProvider::new());
        provider.queue_response(r#"{"next_search_query": "missing evaluation"}"#);
        let planner = QueryPlanner::new(provider, GenerationOptions::default());

        let err = planner.plan(&mut session_with_result()).await.unwrap_err();
        assert!(matches!(
            err,
            ResearchError::Generation { stage: Stage::Plan, source: Error::Schema { .. } }
        ));
    }

    #[tokio::test]
    async fn test_plan_rejects_blank_query() {
        let provider = Arc::new(MockProvider::new());
        provider.queue_response(&reasoning_json("   "));
        let planner = QueryPlanner::new(provider, GenerationOptions::default());

        let err = planner.plan(&mut session_with_result()).await.unwrap_err();
        assert!(matches!(err, ResearchError::Generation { stage: Stage::Plan, .. }));
    }

    #[test]
    fn test_reasoning_schema_is_strict() {
        let schema = ResponseSchema::for_type::<SearchReasoning>(SEARCH_REASONING_SCHEMA);
        assert_eq!(schema.schema["additionalProperties"], false);
        assert_eq!(schema.schema["required"].as_array().unwrap().len(), 2);
    }
}
