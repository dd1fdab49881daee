//! File-backed search cache.
//!
//! Results are keyed by `"{query}|{num_pages}"` and stored as one JSON object
//! on disk. Only successful searches are cached so transient failures are
//! retried on the next run.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use ds_core::{SearchProvider, SearchResult};

pub struct CachedSearch<S> {
    inner: S,
    path: PathBuf,
    entries: Mutex<HashMap<String, SearchResult>>,
}

impl<S: SearchProvider> CachedSearch<S> {
    /// Wrap `inner`, loading any existing cache at `path`.
    ///
    /// A missing or unreadable cache file starts an empty cache.
    pub fn open(inner: S, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = load_entries(&path);
        debug!(path = %path.display(), entries = entries.len(), "Search cache loaded");
        Self {
            inner,
            path,
            entries: Mutex::new(entries),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lookup(&self, key: &str) -> Option<SearchResult> {
        self.entries.lock().ok()?.get(key).cloned()
    }

    fn store(&self, key: String, result: &SearchResult) {
        let snapshot = match self.entries.lock() {
            Ok(mut entries) => {
                entries.insert(key, result.clone());
                serde_json::to_string_pretty(&*entries)
            }
            Err(_) => return,
        };

        let write = snapshot
            .map_err(|e| e.to_string())
            .and_then(|json| write_atomic(&self.path, &json).map_err(|e| e.to_string()));
        if let Err(e) = write {
            warn!(path = %self.path.display(), error = %e, "Failed to persist search cache");
        }
    }
}

fn cache_key(query: &str, num_pages: usize) -> String {
    format!("{}|{}", query, num_pages)
}

fn load_entries(path: &Path) -> HashMap<String, SearchResult> {
    if !path.exists() {
        return HashMap::new();
    }
    match std::fs::read_to_string(path) {
        Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
            warn!(path = %path.display(), error = %e, "Ignoring corrupt search cache");
            HashMap::new()
        }),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to read search cache");
            HashMap::new()
        }
    }
}

fn write_atomic(path: &Path, content: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, content)?;
    std::fs::rename(&tmp, path)
}

#[async_trait]
impl<S: SearchProvider> SearchProvider for CachedSearch<S> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn search(&self, query: &str, num_pages: usize) -> SearchResult {
        let key = cache_key(query, num_pages);

        if let Some(hit) = self.lookup(&key) {
            info!(query = %query, pages = hit.pages.len(), "Search cache hit");
            return hit;
        }

        debug!(query = %query, "Search cache miss");
        let result = self.inner.search(query, num_pages).await;
        if result.success {
            self.store(key, &result);
        }
        result
    }
}
