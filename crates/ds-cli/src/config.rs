use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Toml};
use figment::Figment;
use regex::Regex;
use serde::{Deserialize, Serialize};

use ds_research::{GenerationOptions, ResearchConfig};

pub const ENV_PREFIX: &str = "DEEPSEARCH_";

/// Effective configuration: defaults, then the TOML file, then
/// `DEEPSEARCH_*` environment variables. CLI flags are applied last by the
/// caller.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub generation: GenerationConfigEntry,

    #[serde(default)]
    pub search: SearchConfigEntry,

    #[serde(default)]
    pub research: ResearchConfigEntry,
}

/// OpenAI-compatible generation service settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfigEntry {
    /// Falls back to OPENAI_API_KEY
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Extra parameters to pass to the API (e.g., reasoning_effort)
    #[serde(default)]
    pub parameters: HashMap<String, serde_json::Value>,
}

impl Default for GenerationConfigEntry {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: None,
            model: default_model(),
            temperature: None,
            max_tokens: None,
            parameters: HashMap::new(),
        }
    }
}

/// Jina search settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfigEntry {
    /// Falls back to JINA_API_KEY
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_search_url")]
    pub base_url: String,

    #[serde(default = "default_pages_per_search")]
    pub pages_per_search: usize,

    #[serde(default = "default_search_timeout")]
    pub timeout_secs: u64,

    /// Search cache file (supports $HOME, ~)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_file: Option<String>,
}

impl Default for SearchConfigEntry {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_search_url(),
            pages_per_search: default_pages_per_search(),
            timeout_secs: default_search_timeout(),
            cache_file: None,
        }
    }
}

/// Research loop limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchConfigEntry {
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    /// Cap on search-provider tokens for the whole run
    #[serde(default = "default_token_limit")]
    pub token_limit: u64,

    /// Token budget for curated sources handed to the report writer
    #[serde(default = "default_sources_token_budget")]
    pub sources_token_budget: usize,

    #[serde(default = "default_min_page_tokens")]
    pub min_page_tokens: usize,

    #[serde(default)]
    pub evaluate_pages: bool,

    /// Evaluated pages scoring below this on depth or relevance are dropped
    #[serde(default = "default_min_quality_score")]
    pub min_quality_score: u8,
}

impl Default for ResearchConfigEntry {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            token_limit: default_token_limit(),
            sources_token_budget: default_sources_token_budget(),
            min_page_tokens: default_min_page_tokens(),
            evaluate_pages: false,
            min_quality_score: default_min_quality_score(),
        }
    }
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_search_url() -> String {
    ds_search::jina::DEFAULT_BASE_URL.to_string()
}

fn default_pages_per_search() -> usize {
    5
}

fn default_search_timeout() -> u64 {
    60
}

fn default_max_iterations() -> usize {
    5
}

fn default_token_limit() -> u64 {
    200_000
}

fn default_sources_token_budget() -> usize {
    60_000
}

fn default_min_page_tokens() -> usize {
    500
}

fn default_min_quality_score() -> u8 {
    3
}

/// Command-line overrides, applied after every other layer.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub max_iterations: Option<usize>,
    pub token_limit: Option<u64>,
    pub sources_token_budget: Option<usize>,
    pub pages_per_search: Option<usize>,
    pub evaluate_pages: bool,
}

static ENV_VAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{?([A-Za-z_][A-Za-z0-9_]*)\}?").expect("valid env var pattern"));

/// Expand environment variables in a path string
/// Supports: $VAR, ${VAR}, ~
pub fn expand_path(path: &str) -> PathBuf {
    let mut result = path.to_string();

    if result == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    } else if result.starts_with("~/") {
        if let Some(home) = dirs::home_dir() {
            result = format!("{}{}", home.display(), &result[1..]);
        }
    }

    let expanded = ENV_VAR.replace_all(&result, |caps: &regex::Captures| {
        std::env::var(&caps[1]).unwrap_or_else(|_| caps[0].to_string())
    });

    PathBuf::from(expanded.to_string())
}

/// Show the first few characters of a secret.
fn mask_secret(secret: &str) -> String {
    if secret.chars().count() <= 8 {
        return "****".to_string();
    }
    let head: String = secret.chars().take(4).collect();
    format!("{}****", head)
}

impl Config {
    pub fn config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
        Ok(config_dir.join("deepsearch"))
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Layered sources without API-key fallbacks. A missing file contributes nothing.
    pub fn figment(path: &Path) -> Figment {
        Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Load from `path`, or the default location when `None`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => {
                if !p.exists() {
                    anyhow::bail!("Config file not found: {}", p.display());
                }
                p.to_path_buf()
            }
            None => Self::config_path()?,
        };

        let mut config: Config = Self::figment(&path)
            .extract()
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
        config.fill_api_keys(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    fn fill_api_keys(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if self.generation.api_key.is_none() {
            self.generation.api_key = lookup("OPENAI_API_KEY");
        }
        if self.search.api_key.is_none() {
            self.search.api_key = lookup("JINA_API_KEY");
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.search.pages_per_search == 0 {
            anyhow::bail!("search.pages_per_search must be at least 1");
        }
        if !(1..=5).contains(&self.research.min_quality_score) {
            anyhow::bail!(
                "research.min_quality_score must be within 1..=5, got {}",
                self.research.min_quality_score
            );
        }
        Ok(())
    }

    pub fn apply_overrides(&mut self, overrides: &Overrides) {
        if let Some(model) = &overrides.model {
            self.generation.model = model.clone();
        }
        if let Some(base_url) = &overrides.base_url {
            self.generation.base_url = Some(base_url.clone());
        }
        if let Some(max_iterations) = overrides.max_iterations {
            self.research.max_iterations = max_iterations;
        }
        if let Some(token_limit) = overrides.token_limit {
            self.research.token_limit = token_limit;
        }
        if let Some(budget) = overrides.sources_token_budget {
            self.research.sources_token_budget = budget;
        }
        if let Some(pages) = overrides.pages_per_search {
            self.search.pages_per_search = pages;
        }
        if overrides.evaluate_pages {
            self.research.evaluate_pages = true;
        }
    }

    pub fn cache_path(&self) -> Option<PathBuf> {
        self.search.cache_file.as_deref().map(expand_path)
    }

    pub fn generation_options(&self) -> GenerationOptions {
        GenerationOptions {
            model: Some(self.generation.model.clone()),
            temperature: self.generation.temperature,
            max_tokens: self.generation.max_tokens,
            extra: self.generation.parameters.clone(),
        }
    }

    pub fn research_config(&self) -> ResearchConfig {
        ResearchConfig {
            max_iterations: self.research.max_iterations,
            token_limit: self.research.token_limit,
            sources_token_budget: self.research.sources_token_budget,
            min_page_tokens: self.research.min_page_tokens,
            pages_per_search: self.search.pages_per_search,
            evaluate_pages: self.research.evaluate_pages,
            min_quality_score: self.research.min_quality_score,
            generation: self.generation_options(),
        }
    }

    /// TOML rendering with API keys masked.
    pub fn to_masked_toml(&self) -> Result<String> {
        let mut masked = self.clone();
        masked.generation.api_key = masked.generation.api_key.as_deref().map(mask_secret);
        masked.search.api_key = masked.search.api_key.as_deref().map(mask_secret);
        toml::to_string_pretty(&masked).context("Failed to render configuration")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.research.max_iterations, 5);
        assert_eq!(config.research.min_page_tokens, 500);
        assert_eq!(config.search.pages_per_search, 5);
        assert_eq!(config.search.base_url, "https://s.jina.ai/");
        assert!(!config.research.evaluate_pages);
    }

    #[test]
    fn test_parse_partial_config() {
        let toml = r#"
            [generation]
            model = "gpt-4.1"

            [generation.parameters]
            reasoning_effort = "low"

            [research]
            max_iterations = 8
        "#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.generation.model, "gpt-4.1");
        assert_eq!(config.generation.parameters["reasoning_effort"], "low");
        assert_eq!(config.research.max_iterations, 8);
        assert_eq!(config.research.token_limit, 200_000);
        assert_eq!(config.search.timeout_secs, 60);
    }

    #[test]
    fn test_env_overrides_file() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "config.toml",
                r#"
                [research]
                max_iterations = 3
                token_limit = 1000
                "#,
            )?;
            jail.set_env("DEEPSEARCH_RESEARCH__MAX_ITERATIONS", "7");
            jail.set_env("DEEPSEARCH_SEARCH__CACHE_FILE", "cache.json");

            let config: Config = Config::figment(Path::new("config.toml")).extract()?;
            assert_eq!(config.research.max_iterations, 7);
            assert_eq!(config.research.token_limit, 1000);
            assert_eq!(config.search.cache_file.as_deref(), Some("cache.json"));
            Ok(())
        });
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        Jail::expect_with(|_| {
            let config: Config = Config::figment(Path::new("absent.toml")).extract()?;
            assert_eq!(config.research.sources_token_budget, 60_000);
            Ok(())
        });
    }

    #[test]
    fn test_api_key_fallback() {
        let mut config = Config::default();
        config.search.api_key = Some("jina-from-file".into());
        config.fill_api_keys(|name| Some(format!("{}-value", name)));

        assert_eq!(config.generation.api_key.as_deref(), Some("OPENAI_API_KEY-value"));
        assert_eq!(config.search.api_key.as_deref(), Some("jina-from-file"));
    }

    #[test]
    fn test_overrides() {
        let mut config = Config::default();
        config.apply_overrides(&Overrides {
            model: Some("o4-mini".into()),
            max_iterations: Some(2),
            evaluate_pages: true,
            ..Default::default()
        });

        let research = config.research_config();
        assert_eq!(research.max_iterations, 2);
        assert!(research.evaluate_pages);
        assert_eq!(research.generation.model.as_deref(), Some("o4-mini"));
        assert_eq!(research.pages_per_search, 5);
    }

    #[test]
    fn test_validate_rejects_bad_score() {
        let mut config = Config::default();
        config.research.min_quality_score = 9;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_masked_toml_hides_keys() {
        let mut config = Config::default();
        config.generation.api_key = Some("sk-1234567890abcdef".into());
        config.search.api_key = Some("short".into());

        let rendered = config.to_masked_toml().unwrap();
        assert!(rendered.contains("sk-1****"));
        assert!(!rendered.contains("567890abcdef"));
        assert!(!rendered.contains("short"));
        assert!(rendered.contains("max_iterations = 5"));
    }

    #[test]
    fn test_expand_path() {
        std::env::set_var("DS_TEST_CACHE_DIR", "/tmp/ds");
        assert_eq!(expand_path("$DS_TEST_CACHE_DIR/cache.json"), PathBuf::from("/tmp/ds/cache.json"));
        assert_eq!(expand_path("${DS_TEST_CACHE_DIR}/c.json"), PathBuf::from("/tmp/ds/c.json"));
        assert_eq!(expand_path("$DS_TEST_UNSET_VAR/x"), PathBuf::from("$DS_TEST_UNSET_VAR/x"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_path("~/cache.json"), home.join("cache.json"));
        }
    }
}
