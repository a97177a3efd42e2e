mod commands;
mod config;
mod render;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand, ValueEnum};

use crate::config::OnyxConfig;

/// Environment variable holding the log filter.
const LOG_ENV: &str = "ONYX_LOG";

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// Inspect and exercise optimistic-mutation stores.
#[derive(Parser)]
#[command(name = "onyx", version, about = "Optimistic mutation store toolkit")]
struct Cli {
    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    /// Path to the config file (default: ./onyx.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log queue and store activity to stderr
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print entries of a persisted store file
    Inspect {
        /// Store file (default: [store] path from the config)
        store: Option<PathBuf>,
        /// Only print this key
        #[arg(long, conflicts_with = "collection")]
        key: Option<String>,
        /// Only print members of this collection prefix
        #[arg(long)]
        collection: Option<String>,
    },

    /// Run the mutations of a scenario file against scripted server replies
    Simulate {
        /// Scenario JSON file
        scenario: PathBuf,
        /// Persist the resulting store to this file
        #[arg(long)]
        store: Option<PathBuf>,
    },

    /// Resend the persisted request queue of a store file to a server
    Replay {
        /// Store file (default: [store] path from the config)
        store: Option<PathBuf>,
        /// API endpoint (default: [queue] endpoint from the config)
        #[arg(long)]
        endpoint: Option<String>,
    },

    /// Print the effective configuration
    Config,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = match config::load_config(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            report_error(&format!("config error: {}", e), cli.output, cli.quiet);
            process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Inspect {
            store,
            key,
            collection,
        } => store_path(store, &config).and_then(|path| {
            commands::inspect::cmd_inspect(
                &path,
                key.as_deref(),
                collection.as_deref(),
                cli.output,
            )
        }),
        Commands::Simulate { scenario, store } => {
            commands::simulate::cmd_simulate(&scenario, store.as_deref(), cli.output, cli.quiet)
        }
        Commands::Replay { store, endpoint } => store_path(store, &config).and_then(|path| {
            commands::replay::cmd_replay(&path, endpoint, &config, cli.output, cli.quiet)
        }),
        Commands::Config => commands::config::cmd_config(&config, cli.output),
    };

    if let Err(msg) = result {
        report_error(&msg, cli.output, cli.quiet);
        process::exit(1);
    }
}

/// Flag value, else `[store] path`.
fn store_path(flag: Option<PathBuf>, config: &OnyxConfig) -> Result<PathBuf, String> {
    flag.or_else(|| config.store.path.clone())
        .ok_or_else(|| "no store file given and no [store] path configured".to_string())
}

/// Install the stderr subscriber. `ONYX_LOG` wins over `--verbose`.
fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("onyx_cli=debug,onyx_store=debug,onyx_dispatch=debug,info")
        } else {
            EnvFilter::new("warn")
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(verbose)
        .init();
}

pub(crate) fn report_error(msg: &str, output: OutputFormat, quiet: bool) {
    if quiet && output == OutputFormat::Text {
        return;
    }
    match output {
        OutputFormat::Text => eprintln!("error: {}", msg),
        OutputFormat::Json => {
            eprintln!("{}", serde_json::json!({ "error": msg }));
        }
    }
}
