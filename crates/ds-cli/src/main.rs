use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use ds_core::{SearchProvider, TiktokenCounter};
use ds_providers::OpenAIProvider;
use ds_research::{render_search_trace, ResearchController, ResearchReport};
use ds_search::{CachedSearch, JinaConfig, JinaSearch};

mod config;
mod eval;
mod setup;

use config::{Config, Overrides};

/// Log level for tracing output
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    /// Most verbose: everything including HTTP client internals
    Trace,
    /// Verbose: request sizes, state transitions, curation details
    Debug,
    /// Standard: searches issued, pages returned, loop totals
    Info,
    /// Quiet: failed searches and errors
    Warn,
    /// Minimal: only errors
    Error,
}

impl LogLevel {
    fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

#[derive(Parser)]
#[command(name = "deepsearch")]
#[command(author, version, about = "Deepsearch: iterative web research with cited reports", long_about = None)]
pub struct Cli {
    /// Config file (default: ~/.config/deepsearch/config.toml)
    #[arg(short, long, global = true, env = "DEEPSEARCH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Model to use (overrides config)
    #[arg(short, long, global = true)]
    pub model: Option<String>,

    /// Base URL for the generation API (overrides config)
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, value_enum, default_value = "info", global = true)]
    pub log_level: LogLevel,

    /// Enable debug logging (shorthand for --log-level debug)
    #[arg(short, long, global = true)]
    pub debug: bool,

    /// Write logs to file (JSON-lines format) instead of stderr
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Research a question and write a cited report
    Research {
        /// Research question (read from stdin when omitted)
        query: Option<String>,

        /// Write the report here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Write a Markdown trace of every search to this file
        #[arg(long)]
        trace: Option<PathBuf>,

        #[command(flatten)]
        limits: LimitArgs,
    },
    /// Run every query in a JSONL benchmark file
    Eval {
        /// Input JSONL with {id, prompt, language} records
        #[arg(long)]
        queries: PathBuf,

        /// Output JSONL with {id, prompt, article} records
        #[arg(short, long)]
        output: PathBuf,

        /// Run at most this many queries
        #[arg(long)]
        limit: Option<usize>,

        /// Only run queries in this language
        #[arg(long, default_value = "en")]
        language: String,

        #[command(flatten)]
        limits: LimitArgs,
    },
    /// Show current configuration
    Config,
    /// Initialize configuration file in ~/.config/deepsearch
    Setup,
}

#[derive(Args, Debug, Clone, Default)]
struct LimitArgs {
    /// Maximum number of searches
    #[arg(long)]
    max_iterations: Option<usize>,

    /// Stop searching after this many search-provider tokens
    #[arg(long)]
    token_limit: Option<u64>,

    /// Token budget for sources passed to the report
    #[arg(long)]
    sources_token_budget: Option<usize>,

    /// Pages requested per search
    #[arg(long)]
    pages: Option<usize>,

    /// Score each page for depth and relevance
    #[arg(long)]
    evaluate_pages: bool,

    /// Bypass the search cache
    #[arg(long)]
    no_cache: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Resolve log level: --debug overrides --log-level
    let log_level = if cli.debug {
        LogLevel::Debug
    } else {
        cli.log_level
    };
    init_logging(log_level, cli.log_file.as_deref())?;

    if let Commands::Setup = cli.command {
        return setup::run();
    }

    let mut config = Config::load(cli.config.as_deref())?;
    let limits = match &cli.command {
        Commands::Research { limits, .. } | Commands::Eval { limits, .. } => limits.clone(),
        _ => LimitArgs::default(),
    };
    config.apply_overrides(&Overrides {
        model: cli.model.clone(),
        base_url: cli.base_url.clone(),
        max_iterations: limits.max_iterations,
        token_limit: limits.token_limit,
        sources_token_budget: limits.sources_token_budget,
        pages_per_search: limits.pages,
        evaluate_pages: limits.evaluate_pages,
    });
    config.validate()?;

    match cli.command {
        Commands::Research {
            query,
            output,
            trace,
            limits,
        } => {
            let query = match query {
                Some(q) => q,
                None => read_stdin()?,
            };
            let controller = build_controller(&config, limits.no_cache)?;
            research(&controller, &query, output.as_deref(), trace.as_deref()).await
        }
        Commands::Eval {
            queries,
            output,
            limit,
            language,
            limits,
        } => {
            let selected = eval::select(eval::read_queries(&queries)?, Some(&language), limit);
            tracing::info!(queries = selected.len(), language = %language, "Loaded benchmark queries");
            let controller = build_controller(&config, limits.no_cache)?;
            let summary = eval::run(&controller, &selected, &output).await?;
            eprintln!(
                "{} succeeded, {} failed; results in {}",
                summary.succeeded,
                summary.failed,
                output.display()
            );
            Ok(())
        }
        Commands::Config => show_config(&config),
        Commands::Setup => unreachable!(),
    }
}

fn init_logging(level: LogLevel, log_file: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::new(level.as_filter());

    if let Some(log_path) = log_file {
        let file = std::fs::File::create(log_path)
            .with_context(|| format!("Failed to create log file: {:?}", log_path))?;
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .json()
                    .with_writer(std::sync::Mutex::new(file))
                    .with_target(true),
            )
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .init();
    }
    Ok(())
}

fn read_stdin() -> Result<String> {
    let mut query = String::new();
    std::io::stdin()
        .read_to_string(&mut query)
        .context("Failed to read query from stdin")?;
    let query = query.trim().to_string();
    if query.is_empty() {
        anyhow::bail!("No research query given: pass it as an argument or on stdin");
    }
    Ok(query)
}

fn build_controller(config: &Config, no_cache: bool) -> Result<ResearchController> {
    let generation_key = config
        .generation
        .api_key
        .clone()
        .context("No generation API key: set OPENAI_API_KEY or [generation].api_key")?;
    let search_key = config
        .search
        .api_key
        .clone()
        .context("No search API key: set JINA_API_KEY or [search].api_key")?;

    let mut provider =
        OpenAIProvider::new(generation_key).with_default_model(config.generation.model.as_str());
    if let Some(base_url) = &config.generation.base_url {
        provider = provider.with_base_url(base_url.as_str());
    }

    let jina = JinaSearch::new(
        JinaConfig::new(search_key)
            .with_base_url(config.search.base_url.as_str())
            .with_timeout_secs(config.search.timeout_secs),
    );
    let search: Arc<dyn SearchProvider> = match config.cache_path() {
        Some(path) if !no_cache => {
            tracing::debug!(path = %path.display(), "Using search cache");
            Arc::new(CachedSearch::open(jina, path))
        }
        _ => Arc::new(jina),
    };

    let tokenizer = TiktokenCounter::for_model(&config.generation.model)?;

    Ok(ResearchController::new(
        Arc::new(provider),
        search,
        Arc::new(tokenizer),
        config.research_config(),
    ))
}

async fn research(
    controller: &ResearchController,
    query: &str,
    output: Option<&Path>,
    trace: Option<&Path>,
) -> Result<()> {
    let started = std::time::Instant::now();
    let session = controller.run_session(query).await?;
    let report = ResearchReport::from_session(&session);

    if let Some(trace_path) = trace {
        write_file(trace_path, &render_search_trace(&session))?;
        tracing::info!(path = %trace_path.display(), "Search trace written");
    }

    let markdown = report.to_markdown();
    match output {
        Some(path) => {
            write_file(path, &markdown)?;
            eprintln!("Report written to {}", path.display());
        }
        None => println!("{}", markdown),
    }

    tracing::info!(
        iterations = report.iterations,
        tokens = report.accumulated_tokens,
        sources = report.sources.len(),
        elapsed_secs = started.elapsed().as_secs(),
        "Research complete"
    );
    Ok(())
}

fn write_file(path: &Path, content: &str) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
    }
    std::fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))
}

fn show_config(config: &Config) -> Result<()> {
    println!("Configuration file: {}", Config::config_path()?.display());
    println!("Environment prefix: {}<SECTION>__<KEY>\n", config::ENV_PREFIX);
    print!("{}", config.to_masked_toml()?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_research() {
        let cli = Cli::try_parse_from([
            "deepsearch",
            "--debug",
            "research",
            "what is rust",
            "--max-iterations",
            "3",
            "--evaluate-pages",
            "-o",
            "report.md",
        ])
        .unwrap();

        assert!(cli.debug);
        match cli.command {
            Commands::Research {
                query,
                output,
                limits,
                ..
            } => {
                assert_eq!(query.as_deref(), Some("what is rust"));
                assert_eq!(output, Some(PathBuf::from("report.md")));
                assert_eq!(limits.max_iterations, Some(3));
                assert!(limits.evaluate_pages);
                assert!(!limits.no_cache);
            }
            _ => panic!("expected research command"),
        }
    }

    #[test]
    fn test_cli_parses_eval_defaults() {
        let cli = Cli::try_parse_from([
            "deepsearch",
            "eval",
            "--queries",
            "q.jsonl",
            "--output",
            "out.jsonl",
        ])
        .unwrap();

        assert_eq!(cli.log_level, LogLevel::Info);
        match cli.command {
            Commands::Eval {
                language, limit, ..
            } => {
                assert_eq!(language, "en");
                assert!(limit.is_none());
            }
            _ => panic!("expected eval command"),
        }
    }

    #[test]
    fn test_log_level_filter() {
        assert_eq!(LogLevel::Warn.as_filter(), "warn");
        assert_eq!(LogLevel::Trace.as_filter(), "trace");
    }
}
