//! eda-assist: natural-language command pipeline for schematic and board editors
//!
//! Runs the pipeline against a JSON design document, and exposes the miner,
//! parser and model list for inspection.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, Level};
use tracing_subscriber::EnvFilter;

use eda_assist::command::{mine, parse};
use eda_assist::config::{self, Config};
use eda_assist::context::CollectOptions;
use eda_assist::generator::{choose_model, Generator, GeneratorClient, DEFAULT_MODEL};
use eda_assist::host::MemoryHost;
use eda_assist::prompt::PromptBuilder;
use eda_assist::{Executor, Pipeline};

/// Natural-language command pipeline for schematic and board editors.
#[derive(Parser, Debug)]
#[command(name = "eda-assist")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "CONFIG_FILE")]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Decrease logging verbosity (only show errors)
    #[arg(short, long)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a prompt against a design document
    Run {
        /// Design document (JSON)
        #[arg(short, long, value_name = "FILE")]
        design: PathBuf,

        /// Write the edited design here
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Parse the prompt as a command without asking the generator
        #[arg(long)]
        offline: bool,

        /// Wait for the whole reply instead of streaming it
        #[arg(long)]
        no_stream: bool,

        /// The request
        prompt: String,
    },

    /// Print the command lines mined from a generator reply
    Mine {
        /// Reply text (stdin if omitted)
        file: Option<PathBuf>,
    },

    /// Parse one command line
    Parse {
        /// The command
        line: String,
    },

    /// List the generator's models
    Models,
}

/// Determines the log level from CLI arguments.
#[allow(clippy::match_same_arms)] // Explicit "warn" arm for clarity
fn get_log_level(verbose: u8, quiet: bool, config_level: &str) -> Level {
    if quiet {
        return Level::ERROR;
    }

    match verbose {
        0 => match config_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::WARN,
        },
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// Initialises the tracing subscriber for logging.
fn init_tracing(level: Level) {
    let filter = EnvFilter::from_default_env().add_directive(level.into());

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn run_prompt(
    cfg: &Config,
    design: &Path,
    output: Option<&Path>,
    offline: bool,
    stream: bool,
    prompt: &str,
) -> ExitCode {
    let mut host = match MemoryHost::load(design) {
        Ok(host) => host,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let mut pipeline = Pipeline::new(Executor::from_config(&cfg.executor)).with_collect_options(
        CollectOptions {
            include_file_paths: cfg.context.include_file_paths,
        },
    );
    if !offline {
        let builder = PromptBuilder::new(cfg.context.cap_components);
        match GeneratorClient::connect(&cfg.generator, builder).await {
            Ok(client) => {
                info!(model = client.model(), url = client.base_url(), "Generator configured");
                pipeline = pipeline.with_generator(client);
            }
            Err(e) => error!(error = %e, "Generator client unavailable, running offline"),
        }
    }

    let cancel = CancellationToken::new();
    let watcher = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Interrupted, cancelling request");
                cancel.cancel();
            }
        })
    };

    let mut echo = |chunk: &str| {
        eprint!("{chunk}");
        let _ = std::io::stderr().flush();
    };
    let on_chunk: Option<&mut (dyn FnMut(&str) + Send)> = if stream {
        Some(&mut echo)
    } else {
        None
    };

    let mut handle = host.handle();
    let result = pipeline.run(prompt, &mut handle, on_chunk, &cancel).await;
    watcher.abort();
    if stream {
        eprintln!();
    }

    if result.success {
        println!("{}", result.message);
    } else {
        if !result.message.is_empty() {
            println!("{}", result.message);
        }
        if let Some(error) = &result.error {
            eprintln!("Error: {error}");
        }
    }

    if let Some(path) = output {
        if let Err(e) = host.save(path) {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
        info!(path = %path.display(), "Design written");
    }

    if result.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

async fn mine_reply(file: Option<&Path>) -> ExitCode {
    let text = match file {
        Some(path) => tokio::fs::read_to_string(path).await,
        None => {
            let mut text = String::new();
            tokio::io::stdin()
                .read_to_string(&mut text)
                .await
                .map(|_| text)
        }
    };

    match text {
        Ok(text) => {
            for line in mine(&text) {
                println!("{line}");
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Failed to read reply: {e}");
            ExitCode::FAILURE
        }
    }
}

fn parse_line(line: &str) -> ExitCode {
    match parse(line) {
        Ok(action) => {
            println!("{action}");
            match serde_json::to_string_pretty(&action) {
                Ok(json) => println!("{json}"),
                Err(e) => error!(error = %e, "Failed to serialise action"),
            }
            ExitCode::SUCCESS
        }
        Err(diagnostic) => {
            eprintln!("{diagnostic}");
            ExitCode::FAILURE
        }
    }
}

async fn list_models(cfg: &Config) -> ExitCode {
    let timeout = std::time::Duration::from_secs(cfg.generator.timeout_s);
    let client = match GeneratorClient::new(&cfg.generator.base_url, timeout) {
        Ok(client) => client,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    match client.list_models().await {
        Ok(models) => {
            let preferred = cfg.generator.model.as_deref().unwrap_or(DEFAULT_MODEL);
            let selected = choose_model(preferred, &models);
            for model in &models {
                let marker = if selected.as_ref() == Some(model) { "*" } else { " " };
                println!("{marker} {model}");
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}

/// Entry point for the eda-assist CLI.
fn main() -> ExitCode {
    let args = Args::parse();

    let config_path = args.config.as_deref();
    let cfg = match config::load_config(config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            if config_path.is_none() {
                if let Some(default_path) = config::default_config_path() {
                    eprintln!("\nConfig read from: {}", default_path.display());
                }
            }
            return ExitCode::FAILURE;
        }
    };

    let log_level = get_log_level(args.verbose, args.quiet, &cfg.logging.level);
    init_tracing(log_level);

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Failed to create Tokio runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    runtime.block_on(async {
        match &args.command {
            Command::Run {
                design,
                output,
                offline,
                no_stream,
                prompt,
            } => {
                run_prompt(
                    &cfg,
                    design,
                    output.as_deref(),
                    *offline,
                    !*no_stream,
                    prompt,
                )
                .await
            }
            Command::Mine { file } => mine_reply(file.as_deref()).await,
            Command::Parse { line } => parse_line(line),
            Command::Models => list_models(&cfg).await,
        }
    })
}
