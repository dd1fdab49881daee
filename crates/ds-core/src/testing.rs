//! Test utilities shared across the workspace.
//! Only compiled when running tests or with the `testing` feature.

use async_trait::async_trait;
use std::sync::Mutex;

use crate::error::Error;
use crate::message::{Message, Usage};
use crate::provider::{CompletionRequest, CompletionResponse, FinishReason, Provider};
use crate::search::{SearchProvider, SearchResult};
use crate::tokenizer::Tokenizer;

/// A mock provider that returns pre-configured responses.
pub struct MockProvider {
    responses: Mutex<Vec<Result<CompletionResponse, Error>>>,
    /// Captured requests (for assertion).
    pub captured_requests: Mutex<Vec<CompletionRequest>>,
    pub name: String,
}

impl MockProvider {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(Vec::new()),
            captured_requests: Mutex::new(Vec::new()),
            name: "mock".to_string(),
        }
    }

    /// Queue an assistant response to be returned by the next complete() call.
    /// Responses are returned in FIFO order (first queued = first returned).
    pub fn queue_response(&self, content: &str) {
        self.queue_message(Message::assistant(content));
    }

    /// Queue a response carrying an arbitrary message (e.g. a non-assistant turn).
    pub fn queue_message(&self, message: Message) {
        let response = CompletionResponse {
            message,
            usage: Usage::new(0, 0),
            model: "mock-model".to_string(),
            finish_reason: FinishReason::Stop,
        };
        self.responses.lock().unwrap().insert(0, Ok(response));
    }

    /// Queue an error for the next complete() call.
    pub fn queue_error(&self, error: Error) {
        self.responses.lock().unwrap().insert(0, Err(error));
    }

    /// Get the number of captured requests.
    pub fn request_count(&self) -> usize {
        self.captured_requests.lock().unwrap().len()
    }

    /// Get the last captured request.
    pub fn last_request(&self) -> Option<CompletionRequest> {
        self.captured_requests.lock().unwrap().last().cloned()
    }

    /// Get a captured request by index.
    pub fn request(&self, index: usize) -> Option<CompletionRequest> {
        self.captured_requests.lock().unwrap().get(index).cloned()
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, Error> {
        self.captured_requests.lock().unwrap().push(request);
        match self.responses.lock().unwrap().pop() {
            Some(response) => response,
            None => Err(Error::Unknown("No mock response queued".to_string())),
        }
    }
}

/// A mock search backend that returns queued results.
///
/// When the queue is empty every search fails, matching the contract that
/// search never raises.
pub struct MockSearch {
    results: Mutex<Vec<SearchResult>>,
    /// Captured `(query, num_pages)` pairs.
    pub captured_queries: Mutex<Vec<(String, usize)>>,
}

impl MockSearch {
    pub fn new() -> Self {
        Self {
            results: Mutex::new(Vec::new()),
            captured_queries: Mutex::new(Vec::new()),
        }
    }

    /// Queue a result (FIFO). Its `query` is overwritten with the issued query.
    pub fn queue_result(&self, result: SearchResult) {
        self.results.lock().unwrap().insert(0, result);
    }

    pub fn queries(&self) -> Vec<String> {
        self.captured_queries
            .lock()
            .unwrap()
            .iter()
            .map(|(q, _)| q.clone())
            .collect()
    }

    pub fn call_count(&self) -> usize {
        self.captured_queries.lock().unwrap().len()
    }
}

impl Default for MockSearch {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SearchProvider for MockSearch {
    fn name(&self) -> &str {
        "mock-search"
    }

    async fn search(&self, query: &str, num_pages: usize) -> SearchResult {
        self.captured_queries
            .lock()
            .unwrap()
            .push((query.to_string(), num_pages));
        match self.results.lock().unwrap().pop() {
            Some(mut result) => {
                result.query = query.to_string();
                result
            }
            None => SearchResult::failed(query),
        }
    }
}

/// Counts one token per character. Makes budget arithmetic exact in tests.
pub struct CharTokenizer;

impl Tokenizer for CharTokenizer {
    fn count(&self, text: &str) -> usize {
        text.chars().count()
    }
}
