use std::sync::Arc;

use minijinja::context;
use tracing::{debug, info};

use ds_core::{CompletionRequest, Message, Page, Provider};

use crate::config::GenerationOptions;
use crate::error::{ResearchError, Stage};
use crate::prompts::{self, REPORT_SYSTEM_PROMPT, REPORT_TEMPLATE};
use crate::render::render_sources;

/// Writes the final cited report from curated sources. No retries.
pub struct ReportSynthesizer {
    provider: Arc<dyn Provider>,
    options: GenerationOptions,
}

impl ReportSynthesizer {
    pub fn new(provider: Arc<dyn Provider>, options: GenerationOptions) -> Self {
        Self { provider, options }
    }

    pub async fn synthesize(&self, user_query: &str, sources: &[Page]) -> Result<String, ResearchError> {
        let prompt = prompts::render(
            "report",
            REPORT_TEMPLATE,
            context! { user_query => user_query, sources => render_sources(sources) },
        )?;
        let request = self.options.apply(CompletionRequest::new(vec![
            Message::system(REPORT_SYSTEM_PROMPT),
            Message::user(prompt),
        ]));
        debug!(sources = sources.len(), "Requesting report");

        let response = self
            .provider
            .complete(request)
            .await
            .map_err(|e| ResearchError::generation(Stage::Synthesize, e))?;
        if !response.message.is_assistant() {
            return Err(ResearchError::precondition(
                Stage::Synthesize,
                format!("expected an assistant turn, got {}", response.message.role),
            ));
        }

        let report = response.message.text;
        if report.trim().is_empty() {
            return Err(ResearchError::EmptyResponse {
                stage: Stage::Synthesize,
            });
        }

        info!(chars = report.len(), sources = sources.len(), "Report synthesized");
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ds_core::testing::MockProvider;

    #[tokio::test]
    async fn test_sources_are_numbered_in_order() {
        let provider = Arc::new(MockProvider::new());
        provider.queue_response("# Report\n\nAxum [1] and Actix [2].");
        let synthesizer = ReportSynthesizer::new(provider.clone(), GenerationOptions::default());
        let sources = vec![
            Page::new("https://axum.rs", "Axum", "", "axum body"),
            Page::new("https://actix.rs", "Actix", "", "actix body"),
        ];

        let report = synthesizer.synthesize("rust web", &sources).await.unwrap();
        assert!(report.contains("[2]"));

        let request = provider.last_request().unwrap();
        assert!(request.response_schema.is_none());
        let prompt = &request.messages[1].text;
        assert!(prompt.contains("[1] URL: https://axum.rs"));
        assert!(prompt.contains("[2] URL: https://actix.rs"));
    }

    #[tokio::test]
    async fn test_no_sources_still_synthesizes() {
        let provider = Arc::new(MockProvider::new());
        provider.queue_response("No sources were found.");
        let synthesizer = ReportSynthesizer::new(provider.clone(), GenerationOptions::default());

        synthesizer.synthesize("q", &[]).await.unwrap();
        let request = provider.last_request().unwrap();
        assert!(request.messages[1].text.contains("No sources available."));
    }

    #[tokio::test]
    async fn test_blank_report_is_an_error() {
        let provider = Arc::new(MockProvider::new());
        provider.queue_response("  \n ");
        let synthesizer = ReportSynthesizer::new(provider, GenerationOptions::default());

        let err = synthesizer.synthesize("q", &[]).await.unwrap_err();
        assert!(matches!(err, ResearchError::EmptyResponse { stage: Stage::Synthesize }));
    }

    #[tokio::test]
    async fn test_non_assistant_turn_is_rejected() {
        let provider = Arc::new(MockProvider::new());
        provider.queue_message(Message::tool_result("call-1", "report"));
        let synthesizer = ReportSynthesizer::new(provider, GenerationOptions::default());

        let err = synthesizer.synthesize("q", &[]).await.unwrap_err();
        assert!(matches!(err, ResearchError::Precondition { stage: Stage::Synthesize, .. }));
    }
}
