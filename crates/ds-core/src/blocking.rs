//! Blocking utilities for CPU-intensive operations.
//!
//! Tokenizing scraped pages is CPU-bound; this offloads it to Tokio's
//! blocking threadpool so the runtime is not starved.

use crate::Error;

/// Execute a CPU-intensive closure on Tokio's blocking threadpool.
///
/// # Example
///
/// ```ignore
/// let counted = run_blocking(move || {
///     let total = result.count_tokens(tokenizer.as_ref());
///     (result, total)
/// }).await?;
/// ```
pub async fn run_blocking<F, T>(f: F) -> Result<T, Error>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| Error::Unknown(format!("Blocking task failed: {}", e)))
}
