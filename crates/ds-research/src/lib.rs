//! Iterative research loop for deepsearch.
//!
//! This crate provides:
//! - `ResearchController`: the search → decide → plan loop and its hand-off
//!   to curation and synthesis
//! - `SourceCurator`: dedup, quality filtering and proportional trimming of
//!   gathered pages under a token budget
//! - `QueryPlanner`: structured reasoning that picks the next search query
//! - `PageEvaluator`: optional per-page depth/relevance scoring
//! - `ReportSynthesizer`: the final cited report
//! - `ResearchReport`: the exported artifact

mod config;
mod controller;
mod curator;
mod error;
mod evaluator;
mod planner;
mod prompts;
mod render;
mod report;
mod session;
mod synthesizer;

pub use config::{GenerationOptions, ResearchConfig};
pub use controller::{transition, ResearchController, State};
pub use curator::{CurationOutcome, CurationStats, DiscardReason, SourceCurator};
pub use error::{ResearchError, Stage};
pub use evaluator::PageEvaluator;
pub use planner::{QueryPlanner, SearchReasoning, SEARCH_REASONING_SCHEMA};
pub use render::{render_pages, render_search_trace, render_sources};
pub use report::{CitedSource, ResearchReport};
pub use session::ResearchSession;
pub use synthesizer::ReportSynthesizer;
