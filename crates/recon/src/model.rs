use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Raw input
// ---------------------------------------------------------------------------

/// A value as produced by a data source, before normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Null,
    Int(i64),
    Float(f64),
    /// Arbitrary-precision decimal kept in its textual form (e.g. `"1234.5600"`).
    Decimal(String),
    Text(String),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

impl RawValue {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl From<i64> for RawValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for RawValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for RawValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for RawValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<NaiveDate> for RawValue {
    fn from(v: NaiveDate) -> Self {
        Self::Date(v)
    }
}

impl<T: Into<RawValue>> From<Option<T>> for RawValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Self::Null)
    }
}

/// One row from a data source.
///
/// Field order is preserved. Names are lower-cased on construction so that
/// engines which upper-case identifiers and engines which lower-case them
/// produce interchangeable records.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: Vec<(String, RawValue)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        K: AsRef<str>,
        V: Into<RawValue>,
        I: IntoIterator<Item = (K, V)>,
    {
        let mut record = Self::new();
        for (k, v) in pairs {
            record.insert(k.as_ref(), v.into());
        }
        record
    }

    /// Insert or replace a field. Replacing keeps the original position.
    pub fn insert(&mut self, name: &str, value: RawValue) {
        let name = name.to_lowercase();
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((name, value)),
        }
    }

    /// Case-insensitive lookup. `None` means the field is absent, which is
    /// distinct from a present field holding `RawValue::Null`.
    pub fn get(&self, name: &str) -> Option<&RawValue> {
        let name = name.to_lowercase();
        self.fields.iter().find(|(n, _)| *n == name).map(|(_, v)| v)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &RawValue)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Normalized values
// ---------------------------------------------------------------------------

/// Declared semantic type of a field, as written in rule configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SemanticType {
    Integer,
    Decimal,
    String,
    Date,
}

impl SemanticType {
    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Integer | Self::Decimal)
    }
}

impl fmt::Display for SemanticType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer => write!(f, "integer"),
            Self::Decimal => write!(f, "decimal"),
            Self::String => write!(f, "string"),
            Self::Date => write!(f, "date"),
        }
    }
}

/// A comparison-safe value. Equality is exact, including the variant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Value {
    Null,
    Integer(i64),
    Decimal(OrderedFloat<f64>),
    Text(String),
    Date(NaiveDate),
}

impl Value {
    pub fn decimal(v: f64) -> Self {
        Self::Decimal(OrderedFloat(v))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Numeric view of the value, if it has one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(i) => Some(*i as f64),
            Self::Decimal(d) => Some(d.0),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Decimal(d) => write!(f, "{}", d.0),
            Self::Text(s) => write!(f, "{s}"),
            Self::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_none(),
            Self::Integer(i) => serializer.serialize_i64(*i),
            Self::Decimal(d) => serializer.serialize_f64(d.0),
            Self::Text(s) => serializer.serialize_str(s),
            Self::Date(d) => serializer.serialize_str(&d.format("%Y-%m-%d").to_string()),
        }
    }
}

impl From<Value> for RawValue {
    fn from(v: Value) -> Self {
        match v {
            Value::Null => RawValue::Null,
            Value::Integer(i) => RawValue::Int(i),
            Value::Decimal(d) => RawValue::Float(d.0),
            Value::Text(s) => RawValue::Text(s),
            Value::Date(d) => RawValue::Date(d),
        }
    }
}

// ---------------------------------------------------------------------------
// Business keys
// ---------------------------------------------------------------------------

/// Normalized key used to match one entity across both sources.
/// Single-field keys hold one part; composite keys keep field order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BusinessKey(pub Vec<Value>);

impl BusinessKey {
    pub fn single(value: Value) -> Self {
        Self(vec![value])
    }

    pub fn parts(&self) -> &[Value] {
        &self.0
    }
}

impl fmt::Display for BusinessKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, part) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, "|")?;
            }
            write!(f, "{part}")?;
        }
        Ok(())
    }
}

impl Serialize for BusinessKey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl From<&str> for BusinessKey {
    fn from(v: &str) -> Self {
        Self::single(Value::Text(v.to_string()))
    }
}

/// Which of the two sources a finding refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Left => "left",
            Side::Right => "right",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_lookup_is_case_insensitive() {
        let rec = Record::from_pairs([("CONTRACT_NO", RawValue::from("C1")), ("Balance", RawValue::Float(10.5))]);
        assert_eq!(rec.get("contract_no"), Some(&RawValue::Text("C1".into())));
        assert_eq!(rec.get("BALANCE"), Some(&RawValue::Float(10.5)));
        assert!(rec.get("status").is_none());
    }

    #[test]
    fn record_preserves_order_and_replaces_in_place() {
        let mut rec = Record::from_pairs([("a", 1i64), ("b", 2), ("c", 3)]);
        rec.insert("B", RawValue::Int(20));
        let names: Vec<&str> = rec.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert_eq!(rec.get("b"), Some(&RawValue::Int(20)));
    }

    #[test]
    fn null_field_is_present() {
        let rec = Record::from_pairs([("status", RawValue::Null)]);
        assert!(rec.contains("status"));
        assert!(rec.get("status").unwrap().is_null());
    }

    #[test]
    fn composite_key_display() {
        let key = BusinessKey(vec![Value::Text("C1".into()), Value::Integer(7)]);
        assert_eq!(key.to_string(), "C1|7");
    }

    #[test]
    fn decimal_display_drops_trailing_zero() {
        assert_eq!(Value::decimal(100.0).to_string(), "100");
        assert_eq!(Value::decimal(100.25).to_string(), "100.25");
    }
}
