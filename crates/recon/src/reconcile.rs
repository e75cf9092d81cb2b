// Set reconciliation: partition two keyed collections and compare the
// entities they share, field by field.
// Pure functions over immutable collections; no IO.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::aggregate::within_tolerance;
use crate::index::KeyedCollection;
use crate::model::{BusinessKey, RawValue, SemanticType, Side, Value};
use crate::normalize::Normalizer;

pub const DEFAULT_TOLERANCE: f64 = 0.01;

// ---------------------------------------------------------------------------
// Comparators
// ---------------------------------------------------------------------------

/// How one business field maps between the two sources.
#[derive(Debug, Clone, Deserialize)]
pub struct FieldComparator {
    pub name: String,
    pub left: String,
    pub right: String,
    #[serde(rename = "type", default = "default_field_type")]
    pub field_type: SemanticType,
    /// Numeric fields only. Defaults to [`DEFAULT_TOLERANCE`].
    #[serde(default)]
    pub tolerance: Option<f64>,
}

fn default_field_type() -> SemanticType {
    SemanticType::String
}

impl FieldComparator {
    pub fn new(name: &str, left: &str, right: &str, field_type: SemanticType) -> Self {
        Self {
            name: name.into(),
            left: left.into(),
            right: right.into(),
            field_type,
            tolerance: None,
        }
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = Some(tolerance);
        self
    }

    pub fn effective_tolerance(&self) -> f64 {
        self.tolerance.unwrap_or(DEFAULT_TOLERANCE)
    }
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// Values differ (beyond tolerance for numeric fields).
    Mismatch,
    /// A numeric field is null on exactly one side.
    NullMismatch,
    /// The field could not be normalized on at least one side.
    Error,
}

/// One finding on one field of one entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldIssue {
    pub field: String,
    pub kind: IssueKind,
    pub left: Option<Value>,
    pub right: Option<Value>,
    /// Signed `left - right`, numeric mismatches only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub difference: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Comparison outcome for one business key.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    Match,
    /// Every differing field is reported separately.
    Mismatch { issues: Vec<FieldIssue> },
    Missing { present_on: Side },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityOutcome {
    pub key: BusinessKey,
    #[serde(flatten)]
    pub outcome: Outcome,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SetReconciliation {
    pub left_only: BTreeSet<BusinessKey>,
    pub right_only: BTreeSet<BusinessKey>,
    pub common: BTreeSet<BusinessKey>,
    /// Left keys in first-seen order, then right-only keys in first-seen order.
    pub per_entity: Vec<EntityOutcome>,
}

impl SetReconciliation {
    pub fn total_compared(&self) -> usize {
        self.common.len()
    }

    pub fn perfect_matches(&self) -> usize {
        self.per_entity
            .iter()
            .filter(|e| e.outcome == Outcome::Match)
            .count()
    }

    /// Entities present on both sides with at least one field issue.
    pub fn mismatches(&self) -> impl Iterator<Item = (&BusinessKey, &[FieldIssue])> {
        self.per_entity.iter().filter_map(|e| match &e.outcome {
            Outcome::Mismatch { issues } => Some((&e.key, issues.as_slice())),
            _ => None,
        })
    }
}

// ---------------------------------------------------------------------------
// Core reconciliation
// ---------------------------------------------------------------------------

pub fn reconcile(
    left: &KeyedCollection,
    right: &KeyedCollection,
    comparators: &[FieldComparator],
    normalizer: &Normalizer<'_>,
) -> SetReconciliation {
    let mut out = SetReconciliation::default();

    for entity in left.iter() {
        match right.get(&entity.key) {
            Some(other) => {
                out.common.insert(entity.key.clone());
                let issues: Vec<FieldIssue> = comparators
                    .iter()
                    .filter_map(|c| {
                        compare_field(
                            c,
                            entity.record.get(&c.left),
                            other.record.get(&c.right),
                            normalizer,
                        )
                    })
                    .collect();
                let outcome = if issues.is_empty() {
                    Outcome::Match
                } else {
                    Outcome::Mismatch { issues }
                };
                out.per_entity.push(EntityOutcome { key: entity.key.clone(), outcome });
            }
            None => {
                out.left_only.insert(entity.key.clone());
                out.per_entity.push(EntityOutcome {
                    key: entity.key.clone(),
                    outcome: Outcome::Missing { present_on: Side::Left },
                });
            }
        }
    }

    for key in right.keys() {
        if !left.contains_key(key) {
            out.right_only.insert(key.clone());
            out.per_entity.push(EntityOutcome {
                key: key.clone(),
                outcome: Outcome::Missing { present_on: Side::Right },
            });
        }
    }

    out
}

/// Compare one field. `None` means the field matches. A column the query
/// did not return is an `Error` issue, never a null.
pub fn compare_field(
    comparator: &FieldComparator,
    left: Option<&RawValue>,
    right: Option<&RawValue>,
    normalizer: &Normalizer<'_>,
) -> Option<FieldIssue> {
    let (left, right) = match (left, right) {
        (Some(l), Some(r)) => (l, r),
        _ => {
            let missing = [
                (Side::Left, &comparator.left, left),
                (Side::Right, &comparator.right, right),
            ]
            .into_iter()
            .filter(|(_, _, v)| v.is_none())
            .map(|(side, column, _)| format!("{side} side: result has no column '{column}'"))
            .collect::<Vec<_>>()
            .join("; ");
            return Some(FieldIssue {
                field: comparator.name.clone(),
                kind: IssueKind::Error,
                left: None,
                right: None,
                difference: None,
                message: Some(missing),
            });
        }
    };

    let ty = Some(comparator.field_type);
    let left_val = normalizer.normalize(left, ty);
    let right_val = normalizer.normalize(right, ty);

    let (l, r) = match (left_val, right_val) {
        (Ok(l), Ok(r)) => (l, r),
        (l, r) => {
            let message = [l.as_ref().err(), r.as_ref().err()]
                .into_iter()
                .flatten()
                .map(|e| e.to_string())
                .collect::<Vec<_>>()
                .join("; ");
            return Some(FieldIssue {
                field: comparator.name.clone(),
                kind: IssueKind::Error,
                left: l.ok(),
                right: r.ok(),
                difference: None,
                message: Some(message),
            });
        }
    };

    if comparator.field_type.is_numeric() {
        match (l.as_f64(), r.as_f64()) {
            (None, None) if l.is_null() && r.is_null() => None,
            (Some(lf), Some(rf)) => {
                let tolerance = comparator.effective_tolerance();
                if within_tolerance((lf - rf).abs(), lf, rf, tolerance) {
                    None
                } else {
                    Some(issue(comparator, IssueKind::Mismatch, l, r, Some(lf - rf)))
                }
            }
            _ if l.is_null() != r.is_null() => {
                Some(issue(comparator, IssueKind::NullMismatch, l, r, None))
            }
            _ => Some(issue(comparator, IssueKind::Mismatch, l, r, None)),
        }
    } else if l != r {
        Some(issue(comparator, IssueKind::Mismatch, l, r, None))
    } else {
        None
    }
}

fn issue(
    comparator: &FieldComparator,
    kind: IssueKind,
    left: Value,
    right: Value,
    difference: Option<f64>,
) -> FieldIssue {
    FieldIssue {
        field: comparator.name.clone(),
        kind,
        left: Some(left),
        right: Some(right),
        difference,
        message: None,
    }
}
