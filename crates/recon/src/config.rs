use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer};

use crate::error::ConfigError;
use crate::index::{DuplicatePolicy, KeySpec};
use crate::model::SemanticType;
use crate::reconcile::{FieldComparator, DEFAULT_TOLERANCE};
use crate::source::Params;

pub const DEFAULT_SUCCESS_THRESHOLD: f64 = 0.95;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct ReconConfig {
    pub name: String,
    /// Minimum `perfect_matches / total_compared` for a business rule to pass.
    #[serde(default = "default_threshold")]
    pub success_threshold: f64,
    /// Run-level query parameters. Rule-level `params` win on conflict.
    #[serde(default)]
    pub params: BTreeMap<String, toml::Value>,
    #[serde(default)]
    pub structural: Option<StructuralConfig>,
    #[serde(default)]
    pub data_validation: Option<DataValidationConfig>,
    #[serde(default)]
    pub contract_validation: Option<BusinessRuleConfig>,
    #[serde(default)]
    pub customer_validation: Option<BusinessRuleConfig>,
    #[serde(default)]
    pub aggregate_validation: BTreeMap<String, AggregateRuleConfig>,
    #[serde(default)]
    pub custom_rules: BTreeMap<String, CustomRuleConfig>,
}

fn default_threshold() -> f64 {
    DEFAULT_SUCCESS_THRESHOLD
}

fn default_tolerance() -> f64 {
    DEFAULT_TOLERANCE
}

// ---------------------------------------------------------------------------
// Structural
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct StructuralConfig {
    pub left_tables_query: String,
    pub right_tables_query: String,
    #[serde(default = "default_table_field")]
    pub table_field: String,

    /// Per-table column listing; `{table}` is substituted.
    #[serde(default)]
    pub left_columns_query: Option<String>,
    #[serde(default)]
    pub right_columns_query: Option<String>,
    #[serde(default = "default_column_field")]
    pub column_field: String,
    #[serde(default = "default_type_field")]
    pub type_field: String,

    /// Per-table key column listing; `{table}` is substituted.
    #[serde(default)]
    pub left_primary_key_query: Option<String>,
    #[serde(default)]
    pub right_primary_key_query: Option<String>,

    /// Extra `DECLARED = "canonical"` type aliases.
    #[serde(default)]
    pub type_aliases: BTreeMap<String, String>,
}

fn default_table_field() -> String {
    "table_name".into()
}

fn default_column_field() -> String {
    "column_name".into()
}

fn default_type_field() -> String {
    "data_type".into()
}

// ---------------------------------------------------------------------------
// Table data
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct DataValidationConfig {
    pub tables: Vec<String>,
    #[serde(default = "default_count_query")]
    pub left_count_query: String,
    #[serde(default = "default_count_query")]
    pub right_count_query: String,
    /// Row dumps for checksum rules. Both or neither.
    #[serde(default)]
    pub left_rows_query: Option<String>,
    #[serde(default)]
    pub right_rows_query: Option<String>,
}

fn default_count_query() -> String {
    "SELECT COUNT(*) AS row_count FROM {table}".into()
}

// ---------------------------------------------------------------------------
// Business set reconciliation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct BusinessRuleConfig {
    pub left_query: String,
    pub right_query: String,
    #[serde(deserialize_with = "one_or_many")]
    pub left_key: Vec<String>,
    #[serde(deserialize_with = "one_or_many")]
    pub right_key: Vec<String>,
    #[serde(default = "default_key_type")]
    pub key_type: SemanticType,
    #[serde(default)]
    pub duplicate_policy: DuplicatePolicy,
    #[serde(default)]
    pub fields: Vec<FieldComparator>,
    #[serde(default)]
    pub params: BTreeMap<String, toml::Value>,
}

fn default_key_type() -> SemanticType {
    SemanticType::String
}

impl BusinessRuleConfig {
    pub fn left_key_spec(&self) -> KeySpec {
        KeySpec::new(self.left_key.clone(), self.key_type)
    }

    pub fn right_key_spec(&self) -> KeySpec {
        KeySpec::new(self.right_key.clone(), self.key_type)
    }
}

/// Accept `key = "id"` as well as `key = ["branch", "id"]`.
fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(s) => vec![s],
        OneOrMany::Many(v) => v,
    })
}

// ---------------------------------------------------------------------------
// Aggregates + custom rules
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct AggregateRuleConfig {
    pub left_query: String,
    pub right_query: String,
    /// Result column; the first column when omitted.
    #[serde(default)]
    pub left_field: Option<String>,
    #[serde(default)]
    pub right_field: Option<String>,
    /// How both scalars are normalized. Non-numeric aggregates (hashes,
    /// min/max strings, dates) pass on exact match only.
    #[serde(rename = "type", default = "default_aggregate_type")]
    pub value_type: SemanticType,
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
    #[serde(default)]
    pub params: BTreeMap<String, toml::Value>,
}

fn default_aggregate_type() -> SemanticType {
    SemanticType::Decimal
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CustomRuleKind {
    #[default]
    CountMatch,
    SumMatch,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CustomRuleConfig {
    #[serde(rename = "type", default)]
    pub kind: CustomRuleKind,
    pub left_query: String,
    pub right_query: String,
    /// Summed column, `sum_match` only.
    #[serde(default)]
    pub left_field: Option<String>,
    #[serde(default)]
    pub right_field: Option<String>,
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
    #[serde(default)]
    pub params: BTreeMap<String, toml::Value>,
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl ReconConfig {
    pub fn from_toml(input: &str) -> Result<Self, ConfigError> {
        let config: ReconConfig =
            toml::from_str(input).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.success_threshold) {
            return Err(ConfigError::Validation(format!(
                "success_threshold must be between 0 and 1, got {}",
                self.success_threshold
            )));
        }

        if let Some(s) = &self.structural {
            both_or_neither("structural", "columns_query", &s.left_columns_query, &s.right_columns_query)?;
            both_or_neither(
                "structural",
                "primary_key_query",
                &s.left_primary_key_query,
                &s.right_primary_key_query,
            )?;
        }

        if let Some(d) = &self.data_validation {
            if d.tables.is_empty() {
                return Err(ConfigError::Validation("data_validation: tables must not be empty".into()));
            }
            both_or_neither("data_validation", "rows_query", &d.left_rows_query, &d.right_rows_query)?;
        }

        for (name, rule) in [
            ("contract_validation", &self.contract_validation),
            ("customer_validation", &self.customer_validation),
        ] {
            if let Some(rule) = rule {
                validate_business(name, rule)?;
            }
        }

        for (name, rule) in &self.aggregate_validation {
            check_tolerance(name, rule.tolerance)?;
        }
        for (name, rule) in &self.custom_rules {
            check_tolerance(name, rule.tolerance)?;
        }

        Ok(())
    }

    /// Run-level params overlaid with a rule's own params.
    pub fn params_for(&self, rule_params: &BTreeMap<String, toml::Value>) -> Params {
        let mut out = render_params(&self.params);
        out.extend(render_params(rule_params));
        out
    }
}

fn validate_business(name: &str, rule: &BusinessRuleConfig) -> Result<(), ConfigError> {
    if rule.left_key.is_empty() || rule.right_key.is_empty() {
        return Err(ConfigError::Validation(format!("{name}: key field list must not be empty")));
    }
    if rule.left_key.len() != rule.right_key.len() {
        return Err(ConfigError::Validation(format!(
            "{name}: left_key has {} fields but right_key has {}",
            rule.left_key.len(),
            rule.right_key.len()
        )));
    }
    for field in &rule.fields {
        if let Some(t) = field.tolerance {
            check_tolerance(&format!("{name}.{}", field.name), t)?;
        }
    }
    Ok(())
}

fn check_tolerance(rule: &str, tolerance: f64) -> Result<(), ConfigError> {
    if !tolerance.is_finite() || tolerance < 0.0 {
        return Err(ConfigError::Validation(format!(
            "{rule}: tolerance must be a non-negative number, got {tolerance}"
        )));
    }
    Ok(())
}

fn both_or_neither(
    section: &str,
    key: &str,
    left: &Option<String>,
    right: &Option<String>,
) -> Result<(), ConfigError> {
    if left.is_some() != right.is_some() {
        return Err(ConfigError::Validation(format!(
            "{section}: left_{key} and right_{key} must be set together"
        )));
    }
    Ok(())
}

fn render_params(params: &BTreeMap<String, toml::Value>) -> Params {
    params
        .iter()
        .map(|(k, v)| {
            let text = match v {
                toml::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (k.clone(), text)
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
