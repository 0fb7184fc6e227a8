mod commands;
mod config;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use crate::config::Config;

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// Metadata-driven document runtime tools.
#[derive(Parser)]
#[command(name = "webdoc", version, about = "Metadata-driven document runtime tools")]
struct Cli {
    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    quiet: bool,

    /// Path to a TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a document descriptor and summarize its fields
    Check {
        /// Path to the descriptor JSON file
        descriptor: PathBuf,
    },

    /// Load a document, apply value changes and print the resulting change set
    Apply {
        /// Path to the descriptor JSON file
        descriptor: PathBuf,
        /// Path to the loaded field values (JSON object)
        #[arg(long)]
        document: Option<PathBuf>,
        /// Path to the changes to apply (JSON object or list of {field, value})
        #[arg(long)]
        changes: PathBuf,
        /// Document id
        #[arg(long, default_value = "1")]
        id: String,
    },

    /// List lookup candidates for a field
    Lookup {
        /// Path to the descriptor JSON file
        descriptor: PathBuf,
        /// Path to the loaded field values (JSON object)
        #[arg(long)]
        document: Option<PathBuf>,
        /// Lookup field name
        #[arg(long)]
        field: String,
        /// Filter text matched against keys and display names
        #[arg(long)]
        query: Option<String>,
        /// Maximum number of candidates (defaults to the configured page length)
        #[arg(long)]
        page_length: Option<usize>,
    },
}

fn main() {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => match config::read_config(path) {
            Ok(c) => c,
            Err(msg) => {
                report_error(&msg, cli.output, cli.quiet);
                process::exit(1);
            }
        },
        None => Config::default(),
    };
    init_tracing(&config.log_level);

    match cli.command {
        Commands::Check { descriptor } => {
            commands::check::cmd_check(&descriptor, cli.output, cli.quiet);
        }
        Commands::Apply {
            descriptor,
            document,
            changes,
            id,
        } => {
            commands::apply::cmd_apply(commands::apply::ApplyOptions {
                descriptor: &descriptor,
                document: document.as_deref(),
                changes: &changes,
                document_id: &id,
                config: &config,
                output: cli.output,
                quiet: cli.quiet,
            });
        }
        Commands::Lookup {
            descriptor,
            document,
            field,
            query,
            page_length,
        } => {
            commands::lookup::cmd_lookup(commands::lookup::LookupOptions {
                descriptor: &descriptor,
                document: document.as_deref(),
                field: &field,
                query: query.as_deref(),
                page_length: page_length.unwrap_or(config.lookup_page_length),
                output: cli.output,
                quiet: cli.quiet,
            });
        }
    }
}

/// Log to stderr. `RUST_LOG` wins over the configured level.
fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

pub(crate) fn report_error(msg: &str, output: OutputFormat, quiet: bool) {
    if quiet {
        return;
    }
    match output {
        OutputFormat::Text => eprintln!("{}", msg),
        OutputFormat::Json => eprintln!("{}", serde_json::json!({ "error": msg })),
    }
}
