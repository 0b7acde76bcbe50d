// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]

use anyhow::{Context, Result};
use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, Shell};
use log::{info, Level, LevelFilter, Log, Metadata, Record, SetLoggerError};
use std::io::Write;
use std::path::PathBuf;

use yadtwai::app_config::{self, Config, TranslationProvider};
use yadtwai::app_controller::{Controller, InputFormat};

/// CLI Wrapper for TranslationProvider to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliTranslationProvider {
    Ollama,
    OpenAI,
    Anthropic,
    LMStudio,
}

impl From<CliTranslationProvider> for TranslationProvider {
    fn from(cli_provider: CliTranslationProvider) -> Self {
        match cli_provider {
            CliTranslationProvider::Ollama => TranslationProvider::Ollama,
            CliTranslationProvider::OpenAI => TranslationProvider::OpenAI,
            CliTranslationProvider::Anthropic => TranslationProvider::Anthropic,
            CliTranslationProvider::LMStudio => TranslationProvider::LMStudio,
        }
    }
}

/// CLI Wrapper for LogLevel to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for app_config::LogLevel {
    fn from(cli_level: CliLogLevel) -> Self {
        match cli_level {
            CliLogLevel::Error => app_config::LogLevel::Error,
            CliLogLevel::Warn => app_config::LogLevel::Warn,
            CliLogLevel::Info => app_config::LogLevel::Info,
            CliLogLevel::Debug => app_config::LogLevel::Debug,
            CliLogLevel::Trace => app_config::LogLevel::Trace,
        }
    }
}

/// CLI Wrapper for InputFormat to implement ValueEnum
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliInputFormat {
    Json,
    Text,
}

impl From<CliInputFormat> for InputFormat {
    fn from(format: CliInputFormat) -> Self {
        match format {
            CliInputFormat::Json => InputFormat::Json,
            CliInputFormat::Text => InputFormat::Text,
        }
    }
}

/// Options shared by every document command
#[derive(Args, Debug, Clone)]
struct CommonArgs {
    /// Configuration file path
    #[arg(short, long, default_value = "conf.json")]
    config_path: String,

    /// Set logging level
    #[arg(short, long, value_enum)]
    log_level: Option<CliLogLevel>,

    /// Base directory for per-document project folders
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Source language code (e.g., 'en', 'es', 'fr')
    #[arg(short, long)]
    source_language: Option<String>,

    /// Target language code (e.g., 'en', 'es', 'fr')
    #[arg(short, long)]
    target_language: Option<String>,
}

/// Input document selection
#[derive(Args, Debug, Clone)]
struct DocumentArgs {
    /// Content unit file (JSON), plain text file, or a directory of them
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// Outline file (JSON tree or page,title,level CSV)
    #[arg(long)]
    outline: Option<PathBuf>,

    /// Input format, guessed from the extension when omitted
    #[arg(long, value_enum)]
    format: Option<CliInputFormat>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Translate a document, resuming any previous run
    Translate {
        #[command(flatten)]
        document: DocumentArgs,

        #[command(flatten)]
        common: CommonArgs,

        /// Translation provider to use
        #[arg(short, long, value_enum)]
        provider: Option<CliTranslationProvider>,

        /// Model name to use for translation
        #[arg(short, long)]
        model: Option<String>,
    },

    /// Segment a document and print a summary without translating
    Segment {
        #[command(flatten)]
        document: DocumentArgs,

        #[command(flatten)]
        common: CommonArgs,
    },

    /// Show translation progress of a document
    Status {
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        #[command(flatten)]
        common: CommonArgs,

        /// Print the statistics as JSON
        #[arg(long)]
        json: bool,
    },

    /// Clear the translation progress of a document
    Reset {
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        #[command(flatten)]
        common: CommonArgs,
    },

    /// Generate shell completions for yadtwai
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// YADTwAI - Yet Another Document Translator with AI
///
/// Translates long documents segment by segment with an LLM backend,
/// keeping chapter structure and resuming interrupted runs.
#[derive(Parser, Debug)]
#[command(name = "yadtwai")]
#[command(version)]
#[command(about = "AI-powered resumable document translation tool")]
#[command(long_about = "YADTwAI segments documents into chapter-aware chunks and translates them with AI providers.
Progress is checkpointed after every batch, so an interrupted run picks up where it stopped.

EXAMPLES:
    yadtwai translate book.json --outline toc.json     # Translate an extracted document
    yadtwai translate notes.txt -p openai -m gpt-4o     # Use specific provider and model
    yadtwai translate book.json -s en -t de             # Translate from English to German
    yadtwai segment book.json --outline toc.csv         # Inspect the segmentation only
    yadtwai status book.json                            # Show progress
    yadtwai reset book.json                             # Start over
    yadtwai completions bash > yadtwai.bash             # Generate bash completions

CONFIGURATION:
    Configuration is stored in conf.json by default. You can specify a different
    config file with --config-path. If the config file doesn't exist, a default one
    will be created automatically.

SUPPORTED PROVIDERS:
    ollama    - Local Ollama server
    openai    - OpenAI API (requires API key)
    anthropic - Anthropic Claude API (requires API key)
    lmstudio  - LM Studio local server (OpenAI-compatible on http://localhost:1234/v1)")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Commands,
}

// @struct: Custom logger implementation
struct CustomLogger {
    level: LevelFilter,
}

impl CustomLogger {
    fn new(level: LevelFilter) -> Self {
        CustomLogger { level }
    }

    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        let logger = Box::new(CustomLogger::new(level));
        log::set_boxed_logger(logger)?;
        log::set_max_level(level);
        Ok(())
    }

    // @returns: ANSI colour and marker for a log level
    fn style_for_level(level: Level) -> (&'static str, &'static str) {
        match level {
            Level::Error => ("\x1B[1;31m", "❌ "),
            Level::Warn => ("\x1B[1;33m", "🚧 "),
            Level::Info => ("\x1B[1;32m", " "),
            Level::Debug => ("\x1B[1;36m", "🔍 "),
            Level::Trace => ("\x1B[1;35m", "📋 "),
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
            let (colour, marker) = Self::style_for_level(record.level());
            let mut stderr = std::io::stderr();
            let _ = writeln!(stderr, "{}{} {} {}\x1B[0m", colour, now, marker, record.args());
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Trace level lets set_max_level raise verbosity later
    CustomLogger::init(LevelFilter::Trace)?;
    log::set_max_level(LevelFilter::Info);

    let cli = CommandLineOptions::parse();

    match cli.command {
        Commands::Completions { shell } => {
            let mut cmd = CommandLineOptions::command();
            generate(shell, &mut cmd, "yadtwai", &mut std::io::stdout());
            Ok(())
        }
        Commands::Translate {
            document,
            common,
            provider,
            model,
        } => {
            let mut config = load_config(&common)?;
            if let Some(provider) = provider {
                config.translation.provider = provider.into();
            }
            if let Some(model) = model {
                config.translation.active_provider_config_mut().model = model;
            }
            let controller = Controller::with_config(config)?;
            let format = document.format.map(Into::into);
            if document.input.is_dir() {
                let reports = controller.run_folder(&document.input, format).await?;
                info!("Finished processing {} documents", reports.len());
                return Ok(());
            }
            let report = controller
                .run(&document.input, document.outline.as_deref(), format)
                .await?;
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("Failed to serialize run report")?
            );
            Ok(())
        }
        Commands::Segment { document, common } => {
            let controller = Controller::new_unchecked(load_config(&common)?);
            let loaded = controller.load_or_segment(
                &document.input,
                document.outline.as_deref(),
                document.format.map(Into::into),
            )?;
            let chapters = loaded.segments.iter().filter(|s| s.is_new_chapter).count();
            let images = loaded.segments.iter().filter(|s| s.is_image()).count();
            info!(
                "{} segments ({} images) in {} chapters, stored in {}",
                loaded.segments.len(),
                images,
                chapters,
                loaded.project_dir.display()
            );
            for segment in loaded.segments.iter().filter(|s| s.is_new_chapter) {
                println!("{:>6}  {}", segment.segment_id, segment.chapter_title);
            }
            Ok(())
        }
        Commands::Status { input, common, json } => {
            let controller = Controller::new_unchecked(load_config(&common)?);
            let stats = controller.status(&input)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                println!(
                    "{}/{} segments translated ({:.1}%), {} failed, {} pending",
                    stats.completed,
                    stats.total,
                    stats.completion_percentage(),
                    stats.failed,
                    stats.pending
                );
            }
            Ok(())
        }
        Commands::Reset { input, common } => {
            let controller = Controller::new_unchecked(load_config(&common)?);
            controller.reset(&input)
        }
    }
}

/// Load or create the configuration and apply command line overrides
fn load_config(options: &CommonArgs) -> Result<Config> {
    // Apply the command line level early so config loading is logged with it
    if let Some(cmd_log_level) = &options.log_level {
        let level: app_config::LogLevel = cmd_log_level.clone().into();
        log::set_max_level(level.to_level_filter());
    }

    let mut config = Config::load_or_create(&options.config_path)?;

    if let Some(source_lang) = &options.source_language {
        config.source_language = source_lang.clone();
    }
    if let Some(target_lang) = &options.target_language {
        config.target_language = target_lang.clone();
    }
    if let Some(output_dir) = &options.output_dir {
        config.output_dir = output_dir.clone();
    }
    match &options.log_level {
        Some(log_level) => config.log_level = log_level.clone().into(),
        None => log::set_max_level(config.log_level.to_level_filter()),
    }

    Ok(config)
}
