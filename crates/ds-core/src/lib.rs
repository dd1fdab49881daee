//! ds-core: Core types and traits for deepsearch
//!
//! This crate provides the foundational types and capability traits shared by
//! the research loop, the generation providers, and the search clients.

pub mod blocking;
pub mod error;
pub mod message;
pub mod provider;
pub mod search;
pub mod structured;
pub mod tokenizer;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use blocking::run_blocking;
pub use error::{Error, Service};
pub use message::{Message, Role, Usage};
pub use provider::{CompletionRequest, CompletionResponse, FinishReason, Provider};
pub use search::{Page, PageEvaluation, SearchProvider, SearchResult};
pub use structured::{parse_structured, ResponseSchema};
pub use tokenizer::{TiktokenCounter, Tokenizer};

pub type Result<T> = std::result::Result<T, Error>;
