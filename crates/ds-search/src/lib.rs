//! ds-search: Web search providers for deepsearch
//!
//! This crate provides the search backends available to the research loop:
//! - Jina: search plus page scraping in one call
//! - Cache: file-backed memoization around any backend

pub mod cache;
pub mod jina;

pub use cache::CachedSearch;
pub use jina::{JinaConfig, JinaSearch};
