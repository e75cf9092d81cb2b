//! Report sinks: JSON file, JSON on stdout, human summary on stderr.

use std::path::{Path, PathBuf};

use migcheck_recon::report::RuleStatus;
use migcheck_recon::ValidationReport;

pub fn to_json(report: &ValidationReport) -> Result<String, String> {
    serde_json::to_string_pretty(report).map_err(|e| format!("JSON serialization error: {e}"))
}

/// `<name>_<YYYYmmdd_HHMMSS>.json`, with anything outside `[A-Za-z0-9_-]`
/// in the name replaced by `_`.
pub fn report_file_name(name: &str, now: chrono::DateTime<chrono::Local>) -> String {
    let stem: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    let stem = if stem.is_empty() { "validation".to_string() } else { stem };
    format!("{stem}_{}.json", now.format("%Y%m%d_%H%M%S"))
}

pub fn write_report(path: &Path, json: &str) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .map_err(|e| format!("cannot create {}: {e}", parent.display()))?;
        }
    }
    std::fs::write(path, json).map_err(|e| format!("cannot write {}: {e}", path.display()))
}

/// Where the report file goes: explicit `--output`, else the configured
/// directory (when JSON files are enabled), else nowhere.
pub fn report_path(
    explicit: Option<PathBuf>,
    directory: Option<&Path>,
    json_files: bool,
    report_name: &str,
) -> Option<PathBuf> {
    explicit.or_else(|| {
        directory
            .filter(|_| json_files)
            .map(|dir| dir.join(report_file_name(report_name, chrono::Local::now())))
    })
}

/// Lines of the human summary, one per category plus errors and failures.
pub fn summary_lines(report: &ValidationReport) -> Vec<String> {
    let mut lines = Vec::new();
    lines.push(format!("validation: {}", report.name));

    for (category, cat) in &report.categories {
        let s = &cat.summary;
        let mut line = format!(
            "  {:<22} {}/{} passed ({:.1}%)",
            category.as_str(),
            s.passed,
            s.total,
            s.success_rate
        );
        if s.errors > 0 {
            line.push_str(&format!(", {} errors", s.errors));
        }
        lines.push(line);

        for rule in &cat.rules {
            match rule.status {
                RuleStatus::Passed => {}
                RuleStatus::Failed => lines.push(format!("    FAIL  {}", rule.name)),
                RuleStatus::Error => lines.push(format!(
                    "    ERROR {}: {}",
                    rule.name,
                    rule.error.as_deref().unwrap_or("unknown error")
                )),
            }
        }
    }

    if !report.warnings.is_empty() {
        lines.push(format!("  {} warnings", report.warnings.len()));
    }
    if report.cancelled {
        lines.push("  run was cancelled; remaining rules were skipped".to_string());
    }

    let s = &report.summary;
    lines.push(format!(
        "overall: {}/{} passed ({:.1}%), {} errors: {}",
        s.passed_validations,
        s.total_validations,
        s.overall_success_rate,
        s.error_validations,
        s.validation_status
    ));
    lines
}

pub fn print_summary(report: &ValidationReport) {
    for line in summary_lines(report) {
        eprintln!("{line}");
    }
}
