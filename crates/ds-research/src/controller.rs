//! The research state machine.
//!
//! `Init → Search → Decide → {Plan → Search | Curate → Synthesize → Done}`.
//! Every external call is awaited before the next state is chosen, so one
//! session is only ever touched by one stage at a time.

use std::sync::Arc;

use minijinja::context;
use tracing::{debug, info, warn};

use ds_core::{run_blocking, Message, Provider, SearchProvider, Tokenizer};

use crate::config::ResearchConfig;
use crate::curator::SourceCurator;
use crate::error::{ResearchError, Stage};
use crate::evaluator::PageEvaluator;
use crate::planner::QueryPlanner;
use crate::prompts::{self, SYSTEM_PROMPT, TASK_TEMPLATE};
use crate::report::ResearchReport;
use crate::session::ResearchSession;
use crate::synthesizer::ReportSynthesizer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Init,
    Search,
    Decide,
    Plan,
    Curate,
    Synthesize,
    Done,
}

/// Next state given the current one and the session after it ran.
///
/// `Done` is only reachable through `Curate` and `Synthesize`.
pub fn transition(state: State, session: &ResearchSession) -> State {
    match state {
        State::Init => State::Search,
        State::Search => State::Decide,
        State::Decide if session.continue_search() => State::Plan,
        State::Decide => State::Curate,
        State::Plan => State::Search,
        State::Curate => State::Synthesize,
        State::Synthesize | State::Done => State::Done,
    }
}

pub struct ResearchController {
    search: Arc<dyn SearchProvider>,
    tokenizer: Arc<dyn Tokenizer>,
    config: ResearchConfig,
    planner: QueryPlanner,
    evaluator: PageEvaluator,
    synthesizer: ReportSynthesizer,
    curator: SourceCurator,
}

impl ResearchController {
    pub fn new(
        provider: Arc<dyn Provider>,
        search: Arc<dyn SearchProvider>,
        tokenizer: Arc<dyn Tokenizer>,
        config: ResearchConfig,
    ) -> Self {
        let mut curator = SourceCurator::new(config.min_page_tokens, config.sources_token_budget);
        if config.evaluate_pages {
            curator = curator.with_min_quality_score(config.min_quality_score);
        }

        Self {
            planner: QueryPlanner::new(Arc::clone(&provider), config.generation.clone()),
            evaluator: PageEvaluator::new(Arc::clone(&provider), config.generation.clone()),
            synthesizer: ReportSynthesizer::new(provider, config.generation.clone()),
            curator,
            search,
            tokenizer,
            config,
        }
    }

    pub fn config(&self) -> &ResearchConfig {
        &self.config
    }

    /// Run one research session to completion and export its report.
    pub async fn run(&self, user_query: &str) -> Result<ResearchReport, ResearchError> {
        let session = self.run_session(user_query).await?;
        Ok(ResearchReport::from_session(&session))
    }

    /// Run one research session to completion, returning the full session.
    pub async fn run_session(&self, user_query: &str) -> Result<ResearchSession, ResearchError> {
        let mut session = ResearchSession::new(user_query);
        let mut state = State::Init;

        while state != State::Done {
            self.execute(state, &mut session).await?;
            let next = transition(state, &session);
            debug!(from = ?state, to = ?next, "State transition");
            state = next;
        }

        info!(
            iterations = session.iteration_count(),
            tokens = session.accumulated_token_count(),
            sources = session.curated_sources().len(),
            "Research finished"
        );
        Ok(session)
    }

    async fn execute(&self, state: State, session: &mut ResearchSession) -> Result<(), ResearchError> {
        match state {
            State::Init => self.init(session),
            State::Search => self.search(session).await,
            State::Decide => {
                let proceed = session.decide(self.config.max_iterations, self.config.token_limit);
                if !proceed {
                    info!(
                        iterations = session.iteration_count(),
                        tokens = session.accumulated_token_count(),
                        "Search loop finished"
                    );
                }
                Ok(())
            }
            State::Plan => self.planner.plan(session).await.map(|_| ()),
            State::Curate => self.curate(session).await,
            State::Synthesize => {
                let report = self
                    .synthesizer
                    .synthesize(session.user_query(), session.curated_sources())
                    .await?;
                session.set_final_report(report);
                Ok(())
            }
            State::Done => Ok(()),
        }
    }

    fn init(&self, session: &mut ResearchSession) -> Result<(), ResearchError> {
        if session.user_query().trim().is_empty() {
            return Err(ResearchError::precondition(Stage::Init, "research query is empty"));
        }
        let task = prompts::render(
            "task",
            TASK_TEMPLATE,
            context! { user_query => session.user_query() },
        )?;
        session.push_message(Message::system(SYSTEM_PROMPT));
        session.push_message(Message::user(task));
        info!(query = %session.user_query(), search = self.search.name(), "Research started");
        Ok(())
    }

    async fn search(&self, session: &mut ResearchSession) -> Result<(), ResearchError> {
        let query = session.next_search_query().to_string();
        info!(
            iteration = session.iteration_count() + 1,
            query = %query,
            "Searching"
        );

        let result = self.search.search(&query, self.config.pages_per_search).await;
        if !result.success {
            warn!(query = %query, "Search failed, continuing");
        }

        let tokenizer = Arc::clone(&self.tokenizer);
        let (mut result, content_tokens) = run_blocking(move || {
            let mut result = result;
            let total = result.count_tokens(tokenizer.as_ref());
            (result, total)
        })
        .await
        .map_err(|e| ResearchError::generation(Stage::Search, e))?;

        if self.config.evaluate_pages && result.success {
            let scored = self
                .evaluator
                .evaluate(&mut result, self.config.min_page_tokens)
                .await?;
            debug!(scored, "Pages evaluated");
        }

        info!(
            pages = result.pages.len(),
            content_tokens,
            tokens = result.provider_token_cost,
            "Search returned"
        );
        session.record_search(result);
        Ok(())
    }

    async fn curate(&self, session: &mut ResearchSession) -> Result<(), ResearchError> {
        let curator = self.curator.clone();
        let tokenizer = Arc::clone(&self.tokenizer);
        let results = session.search_results().to_vec();

        let outcome = run_blocking(move || curator.curate(&results, tokenizer.as_ref()))
            .await
            .map_err(|e| ResearchError::generation(Stage::Curate, e))?;

        info!(
            accepted = outcome.stats.accepted,
            discarded = outcome.stats.discarded(),
            tokens = outcome.stats.retained_tokens,
            overflow_ratio = outcome.stats.overflow_ratio,
            "Sources curated"
        );
        session.set_curated(outcome.sources, outcome.stats);
        Ok(())
    }
}
