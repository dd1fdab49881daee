use anyhow::{Context, Result};
use std::io::Write;
use std::path::Path;

use crate::config::Config;

const CONFIG_TEMPLATE: &str = r#"# deepsearch configuration
#
# API keys are read from environment variables by default:
#   OPENAI_API_KEY, JINA_API_KEY
# Any key below can also be set as DEEPSEARCH_<SECTION>__<KEY>,
# e.g. DEEPSEARCH_RESEARCH__MAX_ITERATIONS=8

[generation]
# api_key = "sk-..."              # or set OPENAI_API_KEY env var
# base_url = "https://api.openai.com/v1"
model = "gpt-4o-mini"
# temperature = 0.2
# max_tokens = 4096

# Extra request parameters passed through to the API
# [generation.parameters]
# reasoning_effort = "medium"

[search]
# api_key = "jina_..."            # or set JINA_API_KEY env var
pages_per_search = 5
timeout_secs = 60
# cache_file = "~/.cache/deepsearch/search.json"

[research]
max_iterations = 5
token_limit = 200000              # search tokens billed across the run
sources_token_budget = 60000      # tokens of source text given to the report
min_page_tokens = 500
evaluate_pages = false            # score each page for depth and relevance
min_quality_score = 3
"#;

pub fn run() -> Result<()> {
    let config_path = Config::config_path()?;

    if config_path.exists() {
        println!("Existing config file found:\n  {}", config_path.display());
        print!("\nOverwrite? (The existing file will be backed up) [y/N] ");
        std::io::stdout().flush()?;

        let mut input = String::new();
        std::io::stdin().read_line(&mut input)?;

        if !input.trim().eq_ignore_ascii_case("y") {
            println!("Setup cancelled.");
            return Ok(());
        }
        backup_file(&config_path)?;
    }

    write_template(&config_path)?;
    println!("Created {}", config_path.display());

    println!("\nNext steps:");
    println!("  1. Set your API keys:  export OPENAI_API_KEY=\"sk-...\" JINA_API_KEY=\"jina_...\"");
    println!("  2. Run a query:        deepsearch research \"history of the transistor\"");

    Ok(())
}

fn write_template(path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create config directory: {}", dir.display()))?;
    }
    std::fs::write(path, CONFIG_TEMPLATE)
        .with_context(|| format!("Failed to write {}", path.display()))
}

/// Back up a file to <name>.bak, appending a timestamp if .bak already exists.
fn backup_file(path: &Path) -> Result<()> {
    let mut backup = path.with_extension("toml.bak");

    if backup.exists() {
        let timestamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
        backup = path.with_extension(format!("toml.bak.{}", timestamp));
    }

    std::fs::rename(path, &backup)
        .with_context(|| format!("Failed to back up {} to {}", path.display(), backup.display()))?;
    println!("  Backed up to {}", backup.display());

    Ok(())
}
