use thiserror::Error;

use crate::model::{BusinessKey, SemanticType, Side};

/// A raw value could not be converted to its declared numeric type.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("cannot normalize {value:?} as {target}")]
pub struct NormalizationError {
    pub value: String,
    pub target: SemanticType,
}

/// Failures while building a keyed collection from records.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum IndexError {
    #[error("{side} side: duplicate business key '{key}'")]
    DuplicateKey { side: Side, key: BusinessKey },
    #[error("{side} side: record {row} has no key field '{field}'")]
    MissingKeyField { side: Side, row: usize, field: String },
    #[error("{side} side: key field '{field}' in record {row}: {source}")]
    KeyNormalization {
        side: Side,
        row: usize,
        field: String,
        source: NormalizationError,
    },
}

/// Failures at the data-source boundary.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SourceError {
    #[error("connection error ({source_label}): {message}")]
    Connection { source_label: String, message: String },
    #[error("query error ({source_label}): {message}")]
    Query { source_label: String, message: String },
}

/// Rule configuration problems.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// TOML parse / deserialization error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Structurally invalid configuration, caught before running.
    #[error("config validation error: {0}")]
    Validation(String),
    /// A rule is missing a key it needs at run time.
    #[error("rule '{rule}': missing configuration '{key}'")]
    Missing { rule: String, key: String },
}

/// Everything that can stop a single rule. The engine converts these into
/// error-tagged rule results; they never abort a run.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuleError {
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Index(#[from] IndexError),
    #[error(transparent)]
    Normalization(#[from] NormalizationError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("{0}")]
    Data(String),
}

/// Run-level failures. Only raised when no rule can possibly execute.
#[derive(Debug, Error)]
pub enum ReconError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("both data sources are unreachable ({left}, {right})")]
    SourcesUnreachable { left: String, right: String },
}
