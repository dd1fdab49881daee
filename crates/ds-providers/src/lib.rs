//! ds-providers: Text generation providers for deepsearch
//!
//! This crate provides implementations of the Provider trait for LLM APIs.

pub mod openai;

pub use openai::OpenAIProvider;
