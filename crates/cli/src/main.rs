//! migcheck - verify that a data migration preserved the data.

mod commands;
mod connections;
mod exit_codes;
mod logging;
mod output;
mod sqlite;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use migcheck_recon::Category;

use exit_codes::*;

#[derive(Parser)]
#[command(name = "migcheck")]
#[command(author, about = "Reconcile a migrated database against its source")]
#[command(version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("MIGCHECK_COMMIT"), ")"))]
#[command(after_help = "\
Exit codes:
  0  every validation passed
  1  at least one validation failed
  2  usage error
  3  invalid rules or connections config
  4  runtime failure (sources unreachable, report not written)
  5  passed, but some rules could not run")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every configured validation and report the outcome
    #[command(after_help = "\
Examples:
  migcheck run --connections conn.toml --rules rules.toml
  migcheck run --connections conn.toml --rules rules.toml --only contracts --only aggregates
  migcheck run --connections conn.toml --rules rules.toml --json > report.json")]
    Run {
        /// Connection config (TOML): [left], [right], [logging], [output]
        #[arg(long, short = 'c', env = "MIGCHECK_CONNECTIONS")]
        connections: PathBuf,

        /// Validation rules (TOML)
        #[arg(long, short = 'r')]
        rules: PathBuf,

        /// Restrict to a category (repeatable): structural, data, contracts,
        /// customers, aggregates, custom
        #[arg(long = "only", value_name = "CATEGORY", value_parser = parse_category)]
        only: Vec<Category>,

        /// Print the JSON report to stdout
        #[arg(long)]
        json: bool,

        /// Write the JSON report to this file
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,

        /// Debug logging
        #[arg(long, short = 'v')]
        verbose: bool,
    },

    /// Check a rules file without touching any database
    Validate {
        /// Validation rules (TOML)
        rules: PathBuf,
    },

    /// Test both connections
    Ping {
        /// Connection config (TOML)
        #[arg(long, short = 'c', env = "MIGCHECK_CONNECTIONS")]
        connections: PathBuf,

        /// Debug logging
        #[arg(long, short = 'v')]
        verbose: bool,
    },
}

fn parse_category(s: &str) -> Result<Category, String> {
    s.parse()
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run { connections, rules, only, json, output, verbose } => {
            commands::cmd_run(connections, rules, only, json, output, verbose)
        }
        Commands::Validate { rules } => commands::cmd_validate(rules),
        Commands::Ping { connections, verbose } => commands::cmd_ping(connections, verbose),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn usage(msg: impl Into<String>) -> Self {
        Self { code: EXIT_USAGE, message: msg.into(), hint: None }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self { code: EXIT_INVALID_CONFIG, message: msg.into(), hint: None }
    }

    pub fn runtime(msg: impl Into<String>) -> Self {
        Self { code: EXIT_RUNTIME, message: msg.into(), hint: None }
    }

    pub fn failed(msg: impl Into<String>) -> Self {
        Self { code: EXIT_VALIDATION_FAILED, message: msg.into(), hint: None }
    }

    pub fn rule_errors(msg: impl Into<String>) -> Self {
        Self { code: EXIT_RULE_ERRORS, message: msg.into(), hint: None }
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}
