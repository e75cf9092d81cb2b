//! Structural comparison: tables, columns and key columns.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::Serialize;

/// Built-in canonical names for engine-specific column types.
const DEFAULT_TYPE_ALIASES: &[(&str, &str)] = &[
    ("INTEGER", "integer"),
    ("INT", "integer"),
    ("BIGINT", "bigint"),
    ("SMALLINT", "smallint"),
    ("DECIMAL", "numeric"),
    ("NUMERIC", "numeric"),
    ("DOUBLE", "double precision"),
    ("REAL", "real"),
    ("VARCHAR", "character varying"),
    ("CHARACTER", "character"),
    ("CHAR", "character"),
    ("CLOB", "text"),
    ("DATE", "date"),
    ("TIME", "time without time zone"),
    ("TIMESTAMP", "timestamp without time zone"),
];

/// Maps declared column types onto a shared vocabulary.
#[derive(Debug, Clone)]
pub struct TypeCanon {
    aliases: HashMap<String, String>,
}

impl Default for TypeCanon {
    fn default() -> Self {
        Self {
            aliases: DEFAULT_TYPE_ALIASES
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }
}

impl TypeCanon {
    /// Built-in aliases extended (or overridden) by `extra`.
    pub fn with_aliases(extra: &BTreeMap<String, String>) -> Self {
        let mut canon = Self::default();
        for (k, v) in extra {
            canon.aliases.insert(k.trim().to_uppercase(), v.trim().to_lowercase());
        }
        canon
    }

    /// `VARCHAR(40)` and `varchar` both canonicalize to `character varying`.
    pub fn canonical(&self, data_type: &str) -> String {
        let base = match data_type.find('(') {
            Some(i) => &data_type[..i],
            None => data_type,
        };
        let base = base.trim();
        self.aliases
            .get(&base.to_uppercase())
            .cloned()
            .unwrap_or_else(|| base.to_lowercase())
    }
}

// ---------------------------------------------------------------------------
// Tables
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize)]
pub struct TableDiff {
    pub left_only: BTreeSet<String>,
    pub right_only: BTreeSet<String>,
    pub common: BTreeSet<String>,
    pub left_total: usize,
    pub right_total: usize,
}

impl TableDiff {
    pub fn passed(&self) -> bool {
        self.left_only.is_empty() && self.right_only.is_empty()
    }
}

/// Table names are compared case-insensitively.
pub fn diff_tables(left: &[String], right: &[String]) -> TableDiff {
    let l: BTreeSet<String> = left.iter().map(|t| t.trim().to_lowercase()).collect();
    let r: BTreeSet<String> = right.iter().map(|t| t.trim().to_lowercase()).collect();
    TableDiff {
        left_only: l.difference(&r).cloned().collect(),
        right_only: r.difference(&l).cloned().collect(),
        common: l.intersection(&r).cloned().collect(),
        left_total: l.len(),
        right_total: r.len(),
    }
}

// ---------------------------------------------------------------------------
// Columns
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
}

impl ColumnInfo {
    pub fn new(name: &str, data_type: &str) -> Self {
        Self { name: name.into(), data_type: data_type.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ColumnDifference {
    MissingOnRight { column: String, left_type: String },
    MissingOnLeft { column: String, right_type: String },
    TypeMismatch { column: String, left_type: String, right_type: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct ColumnDiff {
    pub table: String,
    pub differences: Vec<ColumnDifference>,
    pub left_columns: usize,
    pub right_columns: usize,
}

impl ColumnDiff {
    pub fn passed(&self) -> bool {
        self.differences.is_empty()
    }
}

/// Differences are reported in column-name order.
pub fn diff_columns(
    table: &str,
    left: &[ColumnInfo],
    right: &[ColumnInfo],
    canon: &TypeCanon,
) -> ColumnDiff {
    let l: BTreeMap<String, &ColumnInfo> =
        left.iter().map(|c| (c.name.trim().to_lowercase(), c)).collect();
    let r: BTreeMap<String, &ColumnInfo> =
        right.iter().map(|c| (c.name.trim().to_lowercase(), c)).collect();

    let mut differences = Vec::new();
    for (name, lc) in &l {
        match r.get(name) {
            None => differences.push(ColumnDifference::MissingOnRight {
                column: name.clone(),
                left_type: lc.data_type.clone(),
            }),
            Some(rc) => {
                if canon.canonical(&lc.data_type) != canon.canonical(&rc.data_type) {
                    differences.push(ColumnDifference::TypeMismatch {
                        column: name.clone(),
                        left_type: lc.data_type.clone(),
                        right_type: rc.data_type.clone(),
                    });
                }
            }
        }
    }
    for (name, rc) in &r {
        if !l.contains_key(name) {
            differences.push(ColumnDifference::MissingOnLeft {
                column: name.clone(),
                right_type: rc.data_type.clone(),
            });
        }
    }

    ColumnDiff {
        table: table.to_string(),
        differences,
        left_columns: left.len(),
        right_columns: right.len(),
    }
}

// ---------------------------------------------------------------------------
// Key columns
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct KeyColumnsDiff {
    pub table: String,
    pub left: BTreeSet<String>,
    pub right: BTreeSet<String>,
}

impl KeyColumnsDiff {
    pub fn passed(&self) -> bool {
        self.left == self.right
    }
}

pub fn diff_key_columns(table: &str, left: &[String], right: &[String]) -> KeyColumnsDiff {
    KeyColumnsDiff {
        table: table.to_string(),
        left: left.iter().map(|c| c.trim().to_lowercase()).collect(),
        right: right.iter().map(|c| c.trim().to_lowercase()).collect(),
    }
}
