use std::collections::HashMap;

use serde::Deserialize;

use crate::error::IndexError;
use crate::model::{BusinessKey, Record, SemanticType, Side};
use crate::normalize::Normalizer;

/// What to do when two records normalize to the same business key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Fail the whole index build.
    #[default]
    Reject,
    /// Keep the later record. Each overwrite is reported as a warning.
    LastWriteWins,
}

/// Which fields form the business key and how they are typed.
#[derive(Debug, Clone)]
pub struct KeySpec {
    pub fields: Vec<String>,
    pub key_type: SemanticType,
}

impl KeySpec {
    pub fn new(fields: Vec<String>, key_type: SemanticType) -> Self {
        Self { fields, key_type }
    }

    pub fn single(field: &str, key_type: SemanticType) -> Self {
        Self::new(vec![field.to_string()], key_type)
    }
}

/// One record plus the key it was indexed under.
#[derive(Debug, Clone)]
pub struct KeyedEntity {
    pub key: BusinessKey,
    pub record: Record,
}

/// Records keyed by business key. Iteration follows first-seen order.
#[derive(Debug, Default)]
pub struct KeyedCollection {
    order: Vec<BusinessKey>,
    entries: HashMap<BusinessKey, KeyedEntity>,
}

impl KeyedCollection {
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn get(&self, key: &BusinessKey) -> Option<&KeyedEntity> {
        self.entries.get(key)
    }

    pub fn contains_key(&self, key: &BusinessKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &BusinessKey> {
        self.order.iter()
    }

    pub fn iter(&self) -> impl Iterator<Item = &KeyedEntity> {
        self.order.iter().filter_map(|k| self.entries.get(k))
    }
}

/// Build a keyed collection from one side's records.
pub fn index(
    records: &[Record],
    key: &KeySpec,
    policy: DuplicatePolicy,
    side: Side,
    normalizer: &Normalizer<'_>,
) -> Result<KeyedCollection, IndexError> {
    let mut out = KeyedCollection::default();

    for (row, record) in records.iter().enumerate() {
        let mut parts = Vec::with_capacity(key.fields.len());
        for field in &key.fields {
            let raw = record.get(field).ok_or_else(|| IndexError::MissingKeyField {
                side,
                row,
                field: field.clone(),
            })?;
            let value = normalizer.normalize(raw, Some(key.key_type)).map_err(|source| {
                IndexError::KeyNormalization { side, row, field: field.clone(), source }
            })?;
            parts.push(value);
        }
        let business_key = BusinessKey(parts);

        if out.entries.contains_key(&business_key) {
            match policy {
                DuplicatePolicy::Reject => {
                    return Err(IndexError::DuplicateKey { side, key: business_key });
                }
                DuplicatePolicy::LastWriteWins => {
                    normalizer.context().warn(
                        "index",
                        format!("{side} side: duplicate key '{business_key}' at record {row} overwrote an earlier record"),
                    );
                }
            }
        } else {
            out.order.push(business_key.clone());
        }

        out.entries.insert(
            business_key.clone(),
            KeyedEntity { key: business_key, record: record.clone() },
        );
    }

    Ok(out)
}
