//! `run`, `validate` and `ping` command handlers.

use std::path::{Path, PathBuf};

use migcheck_recon::{
    Category, DataSource, Engine, ReconConfig, ReconError, RunContext, ValidationStatus,
};

use crate::connections::{ConnectionsConfig, LoadError};
use crate::sqlite::SqliteSource;
use crate::{logging, output, CliError};

fn load_connections(path: &Path) -> Result<ConnectionsConfig, CliError> {
    ConnectionsConfig::load(path).map_err(|e| match e {
        LoadError::Read(msg) => CliError::usage(msg),
        LoadError::Invalid(msg) => CliError::config(format!("invalid connections config: {msg}")),
    })
}

fn load_rules(path: &Path) -> Result<ReconConfig, CliError> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| CliError::usage(format!("cannot read {}: {e}", path.display())))?;
    ReconConfig::from_toml(&text).map_err(|e| CliError::config(format!("{}: {e}", path.display())))
}

fn open_sources(conn: &ConnectionsConfig) -> (SqliteSource, SqliteSource) {
    (
        SqliteSource::open(conn.left.label_or("left"), &conn.left.path),
        SqliteSource::open(conn.right.label_or("right"), &conn.right.path),
    )
}

pub fn cmd_run(
    connections_path: PathBuf,
    rules_path: PathBuf,
    only: Vec<Category>,
    json_stdout: bool,
    output_file: Option<PathBuf>,
    verbose: bool,
) -> Result<(), CliError> {
    let conn = load_connections(&connections_path)?;
    logging::init(&logging::effective_level(verbose, &conn.logging.level));

    let config = load_rules(&rules_path)?;
    let (mut left, mut right) = open_sources(&conn);

    let ctx = RunContext::new(config.name.as_str());
    let outcome = Engine::new(&config, &left, &right, &ctx).with_categories(only).run();
    left.close();
    right.close();

    let report = outcome.map_err(|e| match e {
        ReconError::Config(e) => CliError::config(e.to_string()),
        ReconError::SourcesUnreachable { .. } => CliError::runtime(e.to_string())
            .with_hint(format!("try: migcheck ping --connections {}", connections_path.display())),
    })?;

    let json = output::to_json(&report).map_err(CliError::runtime)?;

    if let Some(path) = output::report_path(
        output_file,
        conn.output.directory.as_deref(),
        conn.output.json,
        &report.name,
    ) {
        output::write_report(&path, &json).map_err(CliError::runtime)?;
        eprintln!("wrote {}", path.display());
    }

    if json_stdout {
        println!("{json}");
    }

    if conn.output.console {
        output::print_summary(&report);
    }

    let s = &report.summary;
    if s.validation_status == ValidationStatus::Failed {
        return Err(CliError::failed(format!(
            "{} of {} validations failed",
            s.total_validations - s.passed_validations,
            s.total_validations
        )));
    }
    if report.has_errors() {
        return Err(CliError::rule_errors(format!("{} rules could not run", s.error_validations))
            .with_hint("rerun with --verbose to see the failing queries"));
    }
    Ok(())
}

pub fn cmd_validate(rules_path: PathBuf) -> Result<(), CliError> {
    let config = load_rules(&rules_path)?;

    let mut parts = Vec::new();
    if config.structural.is_some() {
        parts.push("structural".to_string());
    }
    if let Some(data) = &config.data_validation {
        parts.push(format!("data_validation ({} tables)", data.tables.len()));
    }
    if config.contract_validation.is_some() {
        parts.push("contract_validation".to_string());
    }
    if config.customer_validation.is_some() {
        parts.push("customer_validation".to_string());
    }
    if !config.aggregate_validation.is_empty() {
        parts.push(format!("aggregate_validation ({} rules)", config.aggregate_validation.len()));
    }
    if !config.custom_rules.is_empty() {
        parts.push(format!("custom_rules ({} rules)", config.custom_rules.len()));
    }

    if parts.is_empty() {
        eprintln!("{}: valid, but no validations are configured", config.name);
    } else {
        eprintln!("{}: valid: {}", config.name, parts.join(", "));
    }
    Ok(())
}

pub fn cmd_ping(connections_path: PathBuf, verbose: bool) -> Result<(), CliError> {
    let conn = load_connections(&connections_path)?;
    logging::init(&logging::effective_level(verbose, &conn.logging.level));

    let (mut left, mut right) = open_sources(&conn);
    let mut down = Vec::new();
    for source in [&left, &right] {
        let ok = source.test_connection();
        println!(
            "{:<12} {} {}",
            source.label(),
            if ok { "ok" } else { "unreachable" },
            source.path().display()
        );
        if !ok {
            down.push(source.label().to_string());
        }
    }
    left.close();
    right.close();

    if down.is_empty() {
        Ok(())
    } else {
        Err(CliError::runtime(format!("unreachable: {}", down.join(", "))))
    }
}
