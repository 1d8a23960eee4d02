// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]

use anyhow::{Context, Result, anyhow};
use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{Shell, generate};
use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError, error, info, warn};
use std::io::Write;
use std::path::{Path, PathBuf};

use mtgate::app_config::{Config, LogLevel, ProviderSettings};
use mtgate::app_controller::{Controller, Overrides};
use mtgate::translation::JobOutcome;

/// CLI Wrapper for LogLevel to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for LogLevel {
    fn from(cli_level: CliLogLevel) -> Self {
        match cli_level {
            CliLogLevel::Error => LogLevel::Error,
            CliLogLevel::Warn => LogLevel::Warn,
            CliLogLevel::Info => LogLevel::Info,
            CliLogLevel::Debug => LogLevel::Debug,
            CliLogLevel::Trace => LogLevel::Trace,
        }
    }
}

/// Options shared by every command that builds a translator
#[derive(Args, Debug, Clone)]
struct TranslatorArgs {
    /// Translation provider to use
    #[arg(short, long)]
    provider: Option<String>,

    /// Candidate models, tried in order (e.g. "gpt-4o;gpt-4o-mini")
    #[arg(short, long)]
    model: Option<String>,

    /// Source language code (e.g., 'en', 'es', 'fr')
    #[arg(short, long)]
    source_language: Option<String>,

    /// Target language code (e.g., 'en', 'es', 'fr')
    #[arg(short, long)]
    target_language: Option<String>,

    /// Prompt template file (JSON list of role/content messages)
    #[arg(long, value_name = "FILE")]
    prompt: Option<PathBuf>,

    /// Glossary file (JSON object or source,target lines)
    #[arg(long, value_name = "FILE")]
    glossary: Option<PathBuf>,

    /// Provider setting, overriding environment and config (KEY=VALUE)
    #[arg(long = "set", value_name = "KEY=VALUE", value_parser = parse_setting)]
    settings: Vec<(String, String)>,

    /// Bypass the cache for both lookups and writes
    #[arg(long)]
    ignore_cache: bool,
}

impl TranslatorArgs {
    fn overrides(&self) -> Overrides {
        let mut settings = ProviderSettings::new();
        for (key, value) in &self.settings {
            settings.set(key.clone(), value.clone());
        }
        Overrides {
            provider: self.provider.clone(),
            models: self.model.clone(),
            source_language: self.source_language.clone(),
            target_language: self.target_language.clone(),
            prompt_path: self.prompt.clone(),
            glossary_path: self.glossary.clone(),
            settings,
        }
    }
}

fn parse_setting(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.trim().to_string(), v.to_string()))
        .filter(|(k, _)| !k.is_empty())
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", raw))
}

#[derive(Subcommand, Debug)]
enum CacheCommand {
    /// Show cache counters
    Stats,
    /// Remove every cached translation
    Clear,
    /// Remove durable entries older than the given age
    Prune {
        /// Age in days
        #[arg(long, default_value_t = 30)]
        older_than_days: u32,
    },
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Translate text fragments given on the command line
    Translate {
        #[command(flatten)]
        translator: TranslatorArgs,

        /// Text fragments to translate
        #[arg(value_name = "TEXT", required = true)]
        texts: Vec<String>,
    },

    /// Translate every non-empty line of a file concurrently
    Batch {
        /// File with one fragment per line
        #[arg(value_name = "FILE")]
        input: PathBuf,

        #[command(flatten)]
        translator: TranslatorArgs,

        /// Worker bound; defaults to config, then provider
        #[arg(long)]
        concurrency: Option<usize>,

        /// Repeat the whole batch this many times
        #[arg(long, default_value_t = 1)]
        rounds: usize,

        /// Print each translation to stdout
        #[arg(long)]
        print: bool,
    },

    /// List providers and their capabilities
    Providers,

    /// Check that the configured provider answers
    Check {
        #[command(flatten)]
        translator: TranslatorArgs,
    },

    /// Inspect or clear the translation cache
    Cache {
        #[command(subcommand)]
        command: CacheCommand,
    },

    /// Generate shell completions for mtgate
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// mtgate - provider-agnostic machine translation
///
/// Translates text through interchangeable backends with caching, failover,
/// placeholder protection and glossaries.
#[derive(Parser, Debug)]
#[command(name = "mtgate")]
#[command(version)]
#[command(about = "Provider-agnostic machine translation with caching and failover")]
#[command(long_about = "mtgate translates text fragments through interchangeable backends.

EXAMPLES:
    mtgate translate -p openai -t fr \"Hello world\"       # One fragment
    mtgate translate -p mock -t de a b c                  # Dry run without network
    mtgate translate -m \"gpt-4o;gpt-4o-mini\" \"Hi\"         # Failover chain
    mtgate batch lines.txt --concurrency 8 --rounds 2     # Throughput run
    mtgate providers                                      # Capability table
    mtgate cache stats                                    # Cache counters
    mtgate cache prune --older-than-days 7                # Drop stale entries
    mtgate completions bash > mtgate.bash                 # Shell completions

CONFIGURATION:
    Configuration is stored in conf.json by default. You can specify a different
    config file with --config. If the config file doesn't exist, a default one
    will be created automatically. Provider settings resolve from --set, then
    environment variables, then the config file, then built-in defaults.")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, default_value = "conf.json", global = true)]
    config: PathBuf,

    /// Set logging level
    #[arg(short, long, value_enum, global = true)]
    log_level: Option<CliLogLevel>,
}

// @struct: Custom logger implementation
struct CustomLogger {
    level: LevelFilter,
}

impl CustomLogger {
    // @creates: New logger with specified level
    fn new(level: LevelFilter) -> Self {
        CustomLogger { level }
    }

    // @initializes: Global logger
    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        let logger = Box::new(CustomLogger::new(level));
        log::set_boxed_logger(logger)?;
        log::set_max_level(level);
        Ok(())
    }

    // @returns: Emoji and ANSI colour for log level
    fn style_for_level(level: Level) -> (&'static str, &'static str) {
        match level {
            Level::Error => ("❌ ", "1;31"),
            Level::Warn => ("🚧 ", "1;33"),
            Level::Info => ("", "1;32"),
            Level::Debug => ("🔍 ", "1;36"),
            Level::Trace => ("📋 ", "1;35"),
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let now = chrono::Local::now().format("%H:%M:%S.%3f");
            let (emoji, colour) = Self::style_for_level(record.level());

            let mut stderr = std::io::stderr();
            let _ = writeln!(
                stderr,
                "\x1B[{}m{} {}{}\x1B[0m",
                colour,
                now,
                emoji,
                record.args()
            );
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // The logger accepts everything; the max level filters
    CustomLogger::init(LevelFilter::Trace)?;
    log::set_max_level(LevelFilter::Info);

    let cli = CommandLineOptions::parse();

    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = CommandLineOptions::command();
        generate(*shell, &mut cmd, "mtgate", &mut std::io::stdout());
        return Ok(());
    }

    if let Commands::Providers = &cli.command {
        print_providers();
        return Ok(());
    }

    let config = load_or_create_config(&cli.config)?;
    let level = cli
        .log_level
        .clone()
        .map(LogLevel::from)
        .unwrap_or(config.log_level);
    log::set_max_level(level.to_level_filter());

    let controller = Controller::with_config(config)?;

    match cli.command {
        Commands::Translate { translator, texts } => {
            let translations = controller
                .translate_texts(&texts, &translator.overrides(), translator.ignore_cache)
                .await?;
            for translation in translations {
                println!("{}", translation);
            }
        }
        Commands::Batch {
            input,
            translator,
            concurrency,
            rounds,
            print,
        } => {
            let results = controller
                .run_batch(
                    &input,
                    &translator.overrides(),
                    concurrency,
                    rounds,
                    translator.ignore_cache,
                )
                .await?;

            for (round, (reports, summary)) in results.iter().enumerate() {
                if print && round + 1 == results.len() {
                    for report in reports {
                        match &report.outcome {
                            JobOutcome::Translated(text) => println!("{}", text),
                            JobOutcome::Failed(_) | JobOutcome::Cancelled => println!(),
                        }
                    }
                }
                info!("Round {}: {}", round + 1, summary);
            }

            if results.iter().any(|(_, summary)| summary.failed > 0) {
                warn!("Some fragments could not be translated");
            }
        }
        Commands::Check { translator } => match controller.test_connection(&translator.overrides()).await {
            Ok(()) => info!("Provider is reachable"),
            Err(e) => {
                error!("{:#}", e);
                return Err(anyhow!("Connection check failed"));
            }
        },
        Commands::Cache { command } => match command {
            CacheCommand::Stats => {
                if let Some(table) = controller.cache_table_stats().await? {
                    println!("{}", table);
                } else if let Some(stats) = controller.cache_stats().await? {
                    println!(
                        "Entries: {}, Hits: {}, Misses: {}",
                        stats.entries, stats.hits, stats.misses
                    );
                } else {
                    println!("Cache is disabled");
                }
            }
            CacheCommand::Clear => {
                let removed = controller.cache_clear().await?;
                info!("Removed {} cached translations", removed);
            }
            CacheCommand::Prune { older_than_days } => {
                match controller.cache_prune(older_than_days).await? {
                    Some(removed) => info!(
                        "Removed {} translations older than {} days",
                        removed, older_than_days
                    ),
                    None => warn!("Pruning needs a durable cache; nothing to do"),
                }
            }
        },
        Commands::Providers | Commands::Completions { .. } => {}
    }

    Ok(())
}

// Load the configuration, writing a default one when the file is missing
fn load_or_create_config(path: &Path) -> Result<Config> {
    if path.exists() {
        return Config::load(path)
            .with_context(|| format!("Failed to load config file: {}", path.display()));
    }

    warn!(
        "Config file not found at '{}', creating default config.",
        path.display()
    );
    let config = Config::default();
    config
        .save(path)
        .with_context(|| format!("Failed to write default config to file: {}", path.display()))?;
    Ok(config)
}

fn print_providers() {
    println!(
        "{:<14} {:<8} {:<8} {:<15} {:<9} {}",
        "PROVIDER", "CLIENT", "PROMPT", "PLACEHOLDERS", "ON-REJECT", "SETTINGS"
    );
    for provider in Controller::list_providers() {
        let caps = &provider.capabilities;
        println!(
            "{:<14} {:<8} {:<8} {:<15} {:<9} {}{}",
            provider.name,
            if provider.builtin_backend { "yes" } else { "external" },
            if caps.custom_prompt { "custom" } else { "fixed" },
            format!("{:?}", caps.placeholder_style),
            format!("{:?}", caps.content_error_policy),
            provider.settings.join(", "),
            if caps.cache_exempt { " (uncached)" } else { "" }
        );
    }
}
