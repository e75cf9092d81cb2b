//! Canonicalization of raw source values into comparison-safe [`Value`]s.
//!
//! Decimals are widened to binary floats. Comparisons that care about money
//! go through a tolerance, which absorbs the representation error.

use chrono::NaiveDate;

use crate::context::RunContext;
use crate::error::NormalizationError;
use crate::model::{RawValue, SemanticType, Value};

const COMPONENT: &str = "normalize";

pub struct Normalizer<'a> {
    ctx: &'a RunContext,
}

impl<'a> Normalizer<'a> {
    pub fn new(ctx: &'a RunContext) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &'a RunContext {
        self.ctx
    }

    /// Normalize one value. With no declared type the raw value's own type
    /// decides. Null is null regardless of the declared type.
    pub fn normalize(
        &self,
        raw: &RawValue,
        declared: Option<SemanticType>,
    ) -> Result<Value, NormalizationError> {
        if raw.is_null() {
            return Ok(Value::Null);
        }
        match declared {
            None => infer(raw),
            Some(SemanticType::Integer) => to_integer(raw),
            Some(SemanticType::Decimal) => to_decimal(raw),
            Some(SemanticType::String) => Ok(Value::Text(to_text(raw))),
            Some(SemanticType::Date) => Ok(self.to_date(raw)),
        }
    }

    /// Date conversion never fails: unparseable input comes back unchanged
    /// and a warning is recorded on the run context.
    fn to_date(&self, raw: &RawValue) -> Value {
        match raw {
            RawValue::Date(d) => Value::Date(*d),
            RawValue::DateTime(dt) => Value::Date(dt.date()),
            RawValue::Text(s) | RawValue::Decimal(s) => match parse_iso_date_prefix(s) {
                Some(d) => Value::Date(d),
                None => {
                    self.ctx
                        .warn(COMPONENT, format!("cannot parse {s:?} as a date; kept as text"));
                    Value::Text(s.clone())
                }
            },
            RawValue::Int(_) | RawValue::Float(_) => {
                self.ctx
                    .warn(COMPONENT, format!("numeric value {raw:?} declared as date; kept as is"));
                // Int and Float always infer successfully.
                infer(raw).unwrap_or(Value::Null)
            }
            RawValue::Null => Value::Null,
        }
    }
}

fn infer(raw: &RawValue) -> Result<Value, NormalizationError> {
    Ok(match raw {
        RawValue::Null => Value::Null,
        RawValue::Int(i) => Value::Integer(*i),
        RawValue::Float(f) => Value::decimal(*f),
        RawValue::Decimal(s) => Value::decimal(parse_float(s, SemanticType::Decimal)?),
        RawValue::Text(s) => Value::Text(s.trim().to_string()),
        RawValue::Date(d) => Value::Date(*d),
        RawValue::DateTime(dt) => Value::Date(dt.date()),
    })
}

fn to_integer(raw: &RawValue) -> Result<Value, NormalizationError> {
    match raw {
        RawValue::Null => Ok(Value::Null),
        RawValue::Int(i) => Ok(Value::Integer(*i)),
        RawValue::Float(f) => truncate(*f, raw).map(Value::Integer),
        RawValue::Decimal(s) | RawValue::Text(s) => {
            let trimmed = s.trim();
            if let Ok(i) = trimmed.parse::<i64>() {
                return Ok(Value::Integer(i));
            }
            let f = parse_float(trimmed, SemanticType::Integer)?;
            truncate(f, raw).map(Value::Integer)
        }
        RawValue::Date(_) | RawValue::DateTime(_) => Err(err(raw, SemanticType::Integer)),
    }
}

fn to_decimal(raw: &RawValue) -> Result<Value, NormalizationError> {
    match raw {
        RawValue::Null => Ok(Value::Null),
        RawValue::Int(i) => Ok(Value::decimal(*i as f64)),
        RawValue::Float(f) if f.is_finite() => Ok(Value::decimal(*f)),
        RawValue::Float(_) => Err(err(raw, SemanticType::Decimal)),
        RawValue::Decimal(s) | RawValue::Text(s) => {
            parse_float(s, SemanticType::Decimal).map(Value::decimal)
        }
        RawValue::Date(_) | RawValue::DateTime(_) => Err(err(raw, SemanticType::Decimal)),
    }
}

fn to_text(raw: &RawValue) -> String {
    match raw {
        RawValue::Null => String::new(),
        RawValue::Int(i) => i.to_string(),
        RawValue::Float(f) => f.to_string(),
        RawValue::Decimal(s) | RawValue::Text(s) => s.trim().to_string(),
        RawValue::Date(d) => d.format("%Y-%m-%d").to_string(),
        RawValue::DateTime(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
    }
}

/// Truncate toward zero into i64. Non-finite or out-of-range input is an error.
fn truncate(f: f64, raw: &RawValue) -> Result<i64, NormalizationError> {
    let t = f.trunc();
    if !t.is_finite() || t < i64::MIN as f64 || t >= i64::MAX as f64 {
        return Err(err(raw, SemanticType::Integer));
    }
    Ok(t as i64)
}

fn parse_float(s: &str, target: SemanticType) -> Result<f64, NormalizationError> {
    match s.trim().parse::<f64>() {
        Ok(f) if f.is_finite() => Ok(f),
        _ => Err(NormalizationError { value: s.to_string(), target }),
    }
}

/// Parse the leading `YYYY-MM-DD` of a date or timestamp string.
pub fn parse_iso_date_prefix(s: &str) -> Option<NaiveDate> {
    let prefix: String = s.trim().chars().take(10).collect();
    NaiveDate::parse_from_str(&prefix, "%Y-%m-%d").ok()
}

fn err(raw: &RawValue, target: SemanticType) -> NormalizationError {
    let value = match raw {
        RawValue::Text(s) | RawValue::Decimal(s) => s.clone(),
        other => format!("{other:?}"),
    };
    NormalizationError { value, target }
}
