use std::collections::BTreeMap;

use crate::reconcile::SetReconciliation;
use crate::report::{
    Category, CategoryReport, CategorySummary, ReportSummary, RuleResult, SetSummary, ValidationStatus,
};

/// Round a percentage to one decimal.
fn round1(pct: f64) -> f64 {
    (pct * 10.0).round() / 10.0
}

fn percentage(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

/// Per-category tally. Error results are counted apart and never scored.
pub fn compute_category_summary(rules: &[RuleResult]) -> CategorySummary {
    let errors = rules.iter().filter(|r| r.is_error()).count();
    let total = rules.len() - errors;
    let passed = rules.iter().filter(|r| r.passed()).count();
    CategorySummary { total, passed, errors, success_rate: round1(percentage(passed, total)) }
}

/// Fold every category into the overall verdict.
///
/// The status is strict: PASSED only when every scored rule passed. The
/// percentage is reported next to it for diagnostics.
pub fn compute_summary(categories: &BTreeMap<Category, CategoryReport>) -> ReportSummary {
    let mut total = 0;
    let mut passed = 0;
    let mut errors = 0;
    for report in categories.values() {
        total += report.summary.total;
        passed += report.summary.passed;
        errors += report.summary.errors;
    }

    ReportSummary {
        total_validations: total,
        passed_validations: passed,
        error_validations: errors,
        overall_success_rate: round1(percentage(passed, total)),
        validation_status: if passed == total {
            ValidationStatus::Passed
        } else {
            ValidationStatus::Failed
        },
    }
}

/// Entity-level statistics for one business reconciliation.
pub fn compute_set_summary(recon: &SetReconciliation, total_left: usize, total_right: usize) -> SetSummary {
    let total_compared = recon.total_compared();
    let perfect_matches = recon.perfect_matches();
    SetSummary {
        total_left,
        total_right,
        total_compared,
        perfect_matches,
        entities_with_issues: total_compared - perfect_matches,
        success_rate: round1(percentage(perfect_matches, total_compared)),
        migration_completeness: round1(percentage(total_right, total_left)),
    }
}

/// A business rule passes when the perfect-match ratio reaches `threshold`.
/// With nothing in common it passes only if both sides are empty.
pub fn set_passes(summary: &SetSummary, threshold: f64) -> bool {
    if summary.total_compared == 0 {
        return summary.total_left == 0 && summary.total_right == 0;
    }
    summary.perfect_matches as f64 / summary.total_compared as f64 >= threshold
}
