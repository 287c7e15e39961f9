//! csv-query: entry point.

use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use csv_query::Request;
use csv_query_cli::config::{Config, Overrides};
use csv_query_cli::{logging, repl, session};

#[derive(Parser)]
#[command(
    name = "csv-query",
    about = "SQL-like queries over CSV files",
    version
)]
struct Cli {
    /// Path to the YAML config file.
    /// Also reads from CSV_QUERY_CONFIG env var.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Field separator, overriding csv_separator.
    #[arg(short, long)]
    separator: Option<String>,

    /// Request timeout in seconds, overriding request_timeout.
    #[arg(short, long)]
    timeout: Option<u64>,

    /// Log folder, overriding log_folder.
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Log level for stderr (trace, debug, info, warn, error).
    #[arg(long, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Launch interactive REPL mode (default).
    Repl,

    /// Run one request and print the result table.
    ///
    /// Example:
    ///   csv-query query "SELECT location,date FROM covid.csv WHERE new_cases>500"
    Query {
        /// Request text. Multiple arguments are joined with spaces.
        #[arg(required = true, num_args = 1..)]
        request: Vec<String>,
    },

    /// Compile a request and print it as JSON without running it.
    Check {
        #[arg(required = true, num_args = 1..)]
        request: Vec<String>,
    },

    /// Print the effective configuration as JSON.
    Info,

    /// Generate shell completion scripts.
    ///
    /// Examples:
    ///   csv-query completions bash > ~/.local/share/bash-completion/completions/csv-query
    ///   csv-query completions zsh > ~/.zfunc/_csv-query
    Completions {
        /// Shell type (bash, zsh, fish, powershell, elvish).
        shell: Shell,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Some(Commands::Completions { shell }) = &cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(*shell, &mut cmd, "csv-query", &mut std::io::stdout());
        return Ok(());
    }

    let config = Config::load(cli.config.as_deref())?.with_overrides(Overrides {
        separator: cli.separator,
        timeout: cli.timeout,
        log_folder: cli.log_dir,
    })?;
    let _log_guard = logging::init(&config.log_folder, &cli.log_level)?;

    match cli.command.unwrap_or(Commands::Repl) {
        Commands::Repl => {
            let handle = tokio::runtime::Handle::current();
            tokio::task::spawn_blocking(move || repl::run(&config, &handle)).await??;
        }

        Commands::Query { request } => {
            let text = request.join(" ");
            match session::run_interruptible(&text, &config).await {
                Ok(report) => {
                    print!("{}", report.table);
                    eprintln!("request done in {:?}", report.elapsed);
                    if let Some(message) = report.error_message() {
                        eprintln!("{message}");
                        std::process::exit(1);
                    }
                }
                Err(e) => {
                    eprintln!("error: {e}");
                    std::process::exit(1);
                }
            }
        }

        Commands::Check { request } => {
            let text = request.join(" ");
            match Request::compile(&text, config.separator) {
                Ok(compiled) => println!("{}", compiled.to_json_pretty()?),
                Err(e) => {
                    eprintln!("error: {e}");
                    std::process::exit(1);
                }
            }
        }

        Commands::Info => {
            let info = serde_json::json!({
                "name": "csv-query",
                "version": env!("CARGO_PKG_VERSION"),
                "config": config.to_file(),
            });
            println!("{}", serde_json::to_string_pretty(&info)?);
        }

        // generated before config load
        Commands::Completions { .. } => {}
    }

    Ok(())
}
