// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]

use anyhow::{Context, Result, anyhow};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{Shell, generate};
use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError, error, info};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use fragtrans::app_config::{self, Config};
use fragtrans::translation::RawItem;
use fragtrans::{Controller, TranslateRequest};

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

#[derive(Subcommand, Debug)]
enum Commands {
    /// Translate one request and print the response JSON
    Translate(TranslateArgs),

    /// Probe the external tool and print the health JSON
    Health {
        /// Ignore the cached snapshot
        #[arg(short, long)]
        force: bool,
    },

    /// Read newline-delimited JSON envelopes on stdin, answer on stdout
    Serve,

    /// Generate shell completions for fragtrans
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Parser, Debug)]
struct TranslateArgs {
    /// Request JSON file, or '-' for stdin
    #[arg(short, long, value_name = "FILE", default_value = "-")]
    request: String,

    /// Translate these texts instead of reading a request
    #[arg(value_name = "TEXT", conflicts_with = "request")]
    texts: Vec<String>,

    /// Target language code (e.g., 'fr', 'zh-CN')
    #[arg(short, long)]
    target_language: Option<String>,

    /// Source language code, or 'auto'
    #[arg(short, long)]
    source_language: Option<String>,

    /// Model name passed to the tool
    #[arg(short, long)]
    model: Option<String>,
}

/// fragtrans - batch translation of text fragments
///
/// Translates batches of short text fragments by driving an authenticated
/// LLM command-line tool.
#[derive(Parser, Debug)]
#[command(name = "fragtrans")]
#[command(version)]
#[command(about = "Batch translation of text fragments through an LLM CLI")]
#[command(long_about = "fragtrans translates batches of short text fragments by driving an authenticated LLM command-line tool.

EXAMPLES:
    fragtrans translate -t fr 'Hello world'       # Translate a single text
    fragtrans translate --request req.json        # Translate a request file
    cat req.json | fragtrans translate            # Translate a request from stdin
    fragtrans health --force                      # Re-probe the tool
    fragtrans serve < envelopes.ndjson            # Serve NDJSON envelopes
    fragtrans completions bash > fragtrans.bash   # Generate bash completions

CONFIGURATION:
    Configuration is stored in conf.json by default. You can specify a different
    config file with --config. If the config file doesn't exist, a default one
    will be created automatically.")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, global = true, default_value = "conf.json")]
    config: PathBuf,

    /// Set logging level
    #[arg(short, long, global = true, value_enum)]
    log_level: Option<CliLogLevel>,
}

// @struct: Custom logger implementation
struct CustomLogger {
    level: LevelFilter,
}

impl CustomLogger {
    // @initializes: Global logger
    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        log::set_boxed_logger(Box::new(CustomLogger { level: LevelFilter::Trace }))?;
        log::set_max_level(level);
        Ok(())
    }

    // @returns: ANSI color for log level
    fn color_for_level(level: Level) -> &'static str {
        match level {
            Level::Error => "\x1B[1;31m",
            Level::Warn => "\x1B[1;33m",
            Level::Info => "\x1B[1;32m",
            Level::Debug => "\x1B[1;36m",
            Level::Trace => "\x1B[1;35m",
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
            // stdout carries the JSON output; logs go to stderr
            let _ = writeln!(
                std::io::stderr(),
                "{}{} {:<5} {}\x1B[0m",
                Self::color_for_level(record.level()),
                now,
                record.level(),
                record.args()
            );
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(e) = CustomLogger::init(LevelFilter::Info) {
        eprintln!("Failed to initialize logger: {}", e);
        return ExitCode::FAILURE;
    }

    let cli = CommandLineOptions::parse();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: CommandLineOptions) -> Result<ExitCode> {
    if let Commands::Completions { shell } = cli.command {
        let mut cmd = CommandLineOptions::command();
        generate(shell, &mut cmd, "fragtrans", &mut std::io::stdout());
        return Ok(ExitCode::SUCCESS);
    }

    let mut config = Config::load_or_create(&cli.config)?;
    if let Some(level) = cli.log_level {
        config.log_level = level.into();
    }
    log::set_max_level(config.log_level.to_level_filter());

    let controller = Controller::with_config(config)?;

    match cli.command {
        Commands::Translate(args) => run_translate(&controller, args).await,
        Commands::Health { force } => {
            let snapshot = controller.health(force).await;
            print_json(&snapshot)?;
            Ok(if snapshot.ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
        }
        Commands::Serve => {
            info!("Serving newline-delimited JSON on stdin/stdout");
            let reader = tokio::io::BufReader::new(tokio::io::stdin());
            controller.serve(reader, tokio::io::stdout()).await?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Completions { .. } => Ok(ExitCode::SUCCESS),
    }
}

async fn run_translate(controller: &Controller, args: TranslateArgs) -> Result<ExitCode> {
    let mut request = if args.texts.is_empty() {
        read_request(&args.request)?
    } else {
        TranslateRequest {
            items: args.texts.iter().map(|text| RawItem::new(None, text)).collect(),
            ..TranslateRequest::default()
        }
    };

    if args.target_language.is_some() {
        request.target_lang = args.target_language;
    }
    if args.source_language.is_some() {
        request.source_lang = args.source_language;
    }
    if args.model.is_some() {
        request.model = args.model;
    }

    match controller.translate(request).await {
        Ok(response) => {
            for warning in &response.warnings {
                log::warn!("{}", warning);
            }
            print_json(&response)?;
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            print_json(&e.to_body())?;
            Ok(ExitCode::FAILURE)
        }
    }
}

fn read_request(source: &str) -> Result<TranslateRequest> {
    let raw = if source == "-" {
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read request from stdin")?;
        buffer
    } else {
        let path = Path::new(source);
        if !path.exists() {
            return Err(anyhow!("Request file does not exist: {:?}", path));
        }
        std::fs::read_to_string(path).with_context(|| format!("Failed to read request file: {}", source))?
    };

    serde_json::from_str(&raw).context("Failed to parse request JSON")
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    let mut stdout = std::io::stdout();
    writeln!(stdout, "{}", json)?;
    stdout.flush()?;
    Ok(())
}
