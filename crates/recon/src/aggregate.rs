use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::NormalizationError;
use crate::model::{Record, Value};
use crate::normalize::Normalizer;

/// Epsilon-inclusive tolerance check. Keeps human decimal boundaries
/// (100.00 vs 100.01 at tolerance 0.01) on the passing side despite
/// binary float representation. The allowance is two ulps of the larger
/// operand, so differences a float can resolve are never absorbed.
pub fn within_tolerance(delta: f64, left: f64, right: f64, tolerance: f64) -> bool {
    let scale = 1.0_f64.max(left.abs()).max(right.abs());
    let eps = f64::EPSILON * 2.0 * scale;
    delta <= tolerance + eps
}

// ---------------------------------------------------------------------------
// Scalar comparison
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateComparison {
    pub left: Value,
    pub right: Value,
    /// `|left - right|`; absent unless both sides are non-null numbers.
    pub difference: Option<f64>,
    pub tolerance: f64,
    pub within_tolerance: bool,
    pub exact_match: bool,
}

impl AggregateComparison {
    pub fn passed(&self) -> bool {
        self.within_tolerance || self.exact_match
    }
}

/// Compare two already-normalized scalars. A null on either side is never an
/// exact match.
pub fn compare(left: &Value, right: &Value, tolerance: f64) -> AggregateComparison {
    let difference = match (left.as_f64(), right.as_f64()) {
        (Some(l), Some(r)) => Some((l - r).abs()),
        _ => None,
    };
    let within = match (difference, left.as_f64(), right.as_f64()) {
        (Some(d), Some(l), Some(r)) => within_tolerance(d, l, r, tolerance),
        _ => false,
    };
    let exact_match = !left.is_null() && !right.is_null() && left == right;

    AggregateComparison {
        left: left.clone(),
        right: right.clone(),
        difference,
        tolerance,
        within_tolerance: within,
        exact_match,
    }
}

// ---------------------------------------------------------------------------
// Checksums
// ---------------------------------------------------------------------------

/// Order-independent content hash of a row set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Checksum {
    /// Hex SHA-256, or empty for an empty row set.
    pub digest: String,
    pub rows: usize,
}

impl Checksum {
    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }
}

/// Append one normalized value in a self-delimiting form: a class tag, then
/// a length-prefixed payload. Integers and decimals share the numeric tag so
/// `100` and `100.00` encode alike.
fn encode_value(out: &mut Vec<u8>, value: &Value) {
    let (tag, payload) = match value {
        Value::Null => (b'z', String::new()),
        Value::Integer(i) => (b'n', i.to_string()),
        Value::Decimal(d) => (b'n', d.0.to_string()),
        Value::Text(s) => (b's', s.clone()),
        Value::Date(d) => (b'd', d.format("%Y-%m-%d").to_string()),
    };
    out.push(tag);
    out.extend_from_slice(&(payload.len() as u64).to_be_bytes());
    out.extend_from_slice(payload.as_bytes());
}

/// Hash a row set so that row order never matters.
///
/// Each row is normalized by inference and encoded as its values in field
/// order (names are ignored, so differently-named columns hash alike). The
/// encoded rows are sorted before hashing.
pub fn checksum(records: &[Record], normalizer: &Normalizer<'_>) -> Result<Checksum, NormalizationError> {
    if records.is_empty() {
        return Ok(Checksum { digest: String::new(), rows: 0 });
    }

    let mut rows = Vec::with_capacity(records.len());
    for record in records {
        let mut row = Vec::new();
        row.extend_from_slice(&(record.len() as u64).to_be_bytes());
        for (_, raw) in record.iter() {
            encode_value(&mut row, &normalizer.normalize(raw, None)?);
        }
        rows.push(row);
    }
    rows.sort_unstable();

    let mut hasher = Sha256::new();
    for row in &rows {
        hasher.update((row.len() as u64).to_be_bytes());
        hasher.update(row);
    }

    Ok(Checksum {
        digest: format!("{:x}", hasher.finalize()),
        rows: records.len(),
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChecksumComparison {
    pub left: Checksum,
    pub right: Checksum,
    pub exact_match: bool,
}

/// Two empty sets match; one empty side never matches a non-empty one.
pub fn compare_checksums(left: Checksum, right: Checksum) -> ChecksumComparison {
    let exact_match = left.is_empty() == right.is_empty() && left.digest == right.digest;
    ChecksumComparison { left, right, exact_match }
}
