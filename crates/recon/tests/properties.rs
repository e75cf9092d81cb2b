// Property-based tests for normalization and reconciliation.
// CI: 256 cases (default). Soak: PROPTEST_CASES=10000 cargo test --release

use proptest::prelude::*;
use migcheck_recon::aggregate::{checksum, compare, within_tolerance};
use migcheck_recon::index::{index, DuplicatePolicy, KeySpec};
use migcheck_recon::model::{RawValue, Record, SemanticType, Side, Value};
use migcheck_recon::normalize::Normalizer;
use migcheck_recon::reconcile::{compare_field, reconcile, FieldComparator, IssueKind};
use migcheck_recon::RunContext;

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

fn config_256() -> ProptestConfig {
    ProptestConfig {
        cases: std::env::var("PROPTEST_CASES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(256),
        failure_persistence: None,
        ..ProptestConfig::default()
    }
}

// ---------------------------------------------------------------------------
// Generators
// ---------------------------------------------------------------------------

fn arb_raw() -> impl Strategy<Value = RawValue> {
    prop_oneof![
        1 => Just(RawValue::Null),
        2 => any::<i64>().prop_map(RawValue::Int),
        2 => (-1e9f64..1e9).prop_map(RawValue::Float),
        2 => r"-?[0-9]{1,9}\.[0-9]{1,4}".prop_map(RawValue::Decimal),
        2 => r" ?[a-zA-Z0-9 ]{0,12} ?".prop_map(RawValue::Text),
        1 => r"20[0-9]{2}-0[1-9]-[0-2][1-8]( 12:00:00)?".prop_map(RawValue::Text),
        1 => (2000i32..2030, 1u32..13, 1u32..29)
            .prop_map(|(y, m, d)| RawValue::Date(chrono::NaiveDate::from_ymd_opt(y, m, d).unwrap())),
    ]
}

fn arb_type() -> impl Strategy<Value = Option<SemanticType>> {
    prop_oneof![
        Just(None),
        Just(Some(SemanticType::Integer)),
        Just(Some(SemanticType::Decimal)),
        Just(Some(SemanticType::String)),
        Just(Some(SemanticType::Date)),
    ]
}

/// Distinct keys drawn from a small alphabet so the two sides overlap.
fn arb_keys() -> impl Strategy<Value = Vec<String>> {
    proptest::collection::btree_set("[A-F][0-9]", 0..20).prop_map(|s| s.into_iter().collect())
}

fn records(keys: &[String]) -> Vec<Record> {
    keys.iter()
        .map(|k| Record::from_pairs([("id", RawValue::from(k.as_str())), ("amount", RawValue::Float(1.0))]))
        .collect()
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(config_256())]

    #[test]
    fn normalize_is_idempotent(raw in arb_raw(), ty in arb_type()) {
        let ctx = RunContext::new("prop");
        let n = Normalizer::new(&ctx);
        if let Ok(once) = n.normalize(&raw, ty) {
            let twice = n.normalize(&RawValue::from(once.clone()), ty).unwrap();
            prop_assert_eq!(once, twice);
        }
    }

    #[test]
    fn null_is_null_under_any_type(ty in arb_type()) {
        let ctx = RunContext::new("prop");
        prop_assert_eq!(Normalizer::new(&ctx).normalize(&RawValue::Null, ty).unwrap(), Value::Null);
    }

    #[test]
    fn partition_is_symmetric(a in arb_keys(), b in arb_keys()) {
        let ctx = RunContext::new("prop");
        let n = Normalizer::new(&ctx);
        let spec = KeySpec::single("id", SemanticType::String);
        let left = index(&records(&a), &spec, DuplicatePolicy::Reject, Side::Left, &n).unwrap();
        let right = index(&records(&b), &spec, DuplicatePolicy::Reject, Side::Right, &n).unwrap();

        let ab = reconcile(&left, &right, &[], &n);
        let ba = reconcile(&right, &left, &[], &n);
        prop_assert_eq!(&ab.left_only, &ba.right_only);
        prop_assert_eq!(&ab.right_only, &ba.left_only);
        prop_assert_eq!(&ab.common, &ba.common);
        prop_assert_eq!(ab.left_only.len() + ab.common.len(), a.len());
        prop_assert_eq!(ab.right_only.len() + ab.common.len(), b.len());
        prop_assert_eq!(ab.per_entity.len(), ab.left_only.len() + ab.right_only.len() + ab.common.len());
    }

    #[test]
    fn difference_at_tolerance_is_within(
        base in -1e12f64..1e12,
        tol_cents in 0u32..100_000,
    ) {
        let tolerance = tol_cents as f64 / 100.0;
        let other = base + tolerance;
        prop_assert!(within_tolerance((base - other).abs(), base, other, tolerance));
        let cmp = compare(&Value::decimal(base), &Value::decimal(other), tolerance);
        prop_assert!(cmp.within_tolerance);
    }

    #[test]
    fn difference_beyond_tolerance_is_not_within(
        base in -1e12f64..1e12,
        tol_cents in 0u32..100_000,
        ulps in 8u32..64,
    ) {
        let tolerance = tol_cents as f64 / 100.0;
        // A few ulps of the larger operand past the tolerance.
        let scale = (base.abs() + tolerance).max(1.0);
        let excess = ulps as f64 * f64::EPSILON * scale;
        let other = base + tolerance + excess;
        prop_assert!(!within_tolerance((base - other).abs(), base, other, tolerance));
        let cmp = compare(&Value::decimal(base), &Value::decimal(other), tolerance);
        prop_assert!(!cmp.within_tolerance);
    }

    #[test]
    fn one_sided_null_is_always_reported(v in -1e9f64..1e9, tolerance in 0.0f64..1e12) {
        let ctx = RunContext::new("prop");
        let n = Normalizer::new(&ctx);
        let c = FieldComparator::new("amount", "a", "a", SemanticType::Decimal).with_tolerance(tolerance);
        let l = compare_field(&c, Some(&RawValue::Float(v)), Some(&RawValue::Null), &n).unwrap();
        let r = compare_field(&c, Some(&RawValue::Null), Some(&RawValue::Float(v)), &n).unwrap();
        prop_assert_eq!(l.kind, IssueKind::NullMismatch);
        prop_assert_eq!(r.kind, IssueKind::NullMismatch);
    }

    #[test]
    fn checksum_ignores_row_order(
        rows in proptest::collection::vec((any::<i32>(), "[a-z]{0,6}"), 0..30),
        seed in any::<u64>(),
    ) {
        let ctx = RunContext::new("prop");
        let n = Normalizer::new(&ctx);
        let build = |rows: &[(i32, String)]| -> Vec<Record> {
            rows.iter()
                .map(|(id, s)| Record::from_pairs([("id", RawValue::Int(*id as i64)), ("s", RawValue::from(s.as_str()))]))
                .collect()
        };

        let mut shuffled = rows.clone();
        // Deterministic rotation + reversal driven by the seed.
        if !shuffled.is_empty() {
            let k = (seed as usize) % shuffled.len();
            shuffled.rotate_left(k);
            if seed % 2 == 1 {
                shuffled.reverse();
            }
        }

        prop_assert_eq!(checksum(&build(&rows), &n).unwrap(), checksum(&build(&shuffled), &n).unwrap());
    }
}
