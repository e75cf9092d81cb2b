use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::aggregate::{AggregateComparison, ChecksumComparison};
use crate::context::Warning;
use crate::reconcile::SetReconciliation;
use crate::structural::{ColumnDiff, KeyColumnsDiff, TableDiff};

// ---------------------------------------------------------------------------
// Categories
// ---------------------------------------------------------------------------

/// Rule categories, in the order the engine runs them. Table data checks
/// run in the aggregate stage, after the business reconciliations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Structural,
    ContractValidation,
    CustomerValidation,
    DataValidation,
    AggregateValidation,
    CustomRules,
}

impl Category {

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Structural => "structural",
            Self::ContractValidation => "contract_validation",
            Self::CustomerValidation => "customer_validation",
            Self::DataValidation => "data_validation",
            Self::AggregateValidation => "aggregate_validation",
            Self::CustomRules => "custom_rules",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    /// Accepts the report key or the short CLI name (`contracts`, `data`, ...).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "structural" | "schema" => Ok(Self::Structural),
            "data" | "data_validation" => Ok(Self::DataValidation),
            "contracts" | "contract_validation" => Ok(Self::ContractValidation),
            "customers" | "customer_validation" => Ok(Self::CustomerValidation),
            "aggregates" | "aggregate_validation" => Ok(Self::AggregateValidation),
            "custom" | "custom_rules" => Ok(Self::CustomRules),
            other => Err(format!(
                "unknown category '{other}' (expected structural, data, contracts, customers, aggregates or custom)"
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// Rule results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    TableDiff,
    ColumnDiff,
    IndexDiff,
    SetReconciliation,
    AggregateTolerance,
    Checksum,
    RowCount,
    CountMatch,
    SumMatch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleStatus {
    Passed,
    Failed,
    /// The rule could not produce a verdict. Excluded from scoring.
    Error,
}

impl RuleStatus {
    pub fn from_pass(passed: bool) -> Self {
        if passed {
            Self::Passed
        } else {
            Self::Failed
        }
    }
}

/// Row-count style comparison.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CountComparison {
    pub left: u64,
    pub right: u64,
    pub difference: u64,
    pub exact_match: bool,
}

impl CountComparison {
    pub fn new(left: u64, right: u64) -> Self {
        Self { left, right, difference: left.abs_diff(right), exact_match: left == right }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SetSummary {
    pub total_left: usize,
    pub total_right: usize,
    pub total_compared: usize,
    pub perfect_matches: usize,
    pub entities_with_issues: usize,
    /// Percentage of compared entities that matched perfectly.
    pub success_rate: f64,
    /// Right-side keys as a percentage of left-side keys.
    pub migration_completeness: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SetDetail {
    pub summary: SetSummary,
    #[serde(flatten)]
    pub reconciliation: SetReconciliation,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum RuleDetail {
    Tables(TableDiff),
    Columns(ColumnDiff),
    KeyColumns(KeyColumnsDiff),
    Set(Box<SetDetail>),
    Aggregate(AggregateComparison),
    Checksum(ChecksumComparison),
    Count(CountComparison),
}

#[derive(Debug, Clone, Serialize)]
pub struct RuleResult {
    pub name: String,
    pub kind: RuleKind,
    pub status: RuleStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<RuleDetail>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RuleResult {
    pub fn scored(name: &str, kind: RuleKind, passed: bool, detail: RuleDetail) -> Self {
        Self {
            name: name.to_string(),
            kind,
            status: RuleStatus::from_pass(passed),
            detail: Some(detail),
            error: None,
        }
    }

    pub fn errored(name: &str, kind: RuleKind, error: impl fmt::Display) -> Self {
        Self {
            name: name.to_string(),
            kind,
            status: RuleStatus::Error,
            detail: None,
            error: Some(error.to_string()),
        }
    }

    pub fn is_error(&self) -> bool {
        self.status == RuleStatus::Error
    }

    pub fn passed(&self) -> bool {
        self.status == RuleStatus::Passed
    }
}

// ---------------------------------------------------------------------------
// Report tree
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CategorySummary {
    pub total: usize,
    pub passed: usize,
    pub errors: usize,
    pub success_rate: f64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CategoryReport {
    pub rules: Vec<RuleResult>,
    pub summary: CategorySummary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationStatus {
    Passed,
    Failed,
}

impl fmt::Display for ValidationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Passed => write!(f, "PASSED"),
            Self::Failed => write!(f, "FAILED"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportSummary {
    pub total_validations: usize,
    pub passed_validations: usize,
    pub error_validations: usize,
    /// Percentage with one decimal.
    pub overall_success_rate: f64,
    pub validation_status: ValidationStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    pub name: String,
    pub timestamp: String,
    pub engine_version: String,
    #[serde(flatten)]
    pub categories: BTreeMap<Category, CategoryReport>,
    pub summary: ReportSummary,
    pub warnings: Vec<Warning>,
    pub cancelled: bool,
}

impl ValidationReport {
    pub fn category(&self, category: Category) -> Option<&CategoryReport> {
        self.categories.get(&category)
    }

    /// Every rule result, in pipeline order.
    pub fn rules(&self) -> impl Iterator<Item = &RuleResult> {
        self.categories.values().flat_map(|c| c.rules.iter())
    }

    pub fn rule(&self, name: &str) -> Option<&RuleResult> {
        self.rules().find(|r| r.name == name)
    }

    pub fn has_errors(&self) -> bool {
        self.summary.error_validations > 0
    }
}
