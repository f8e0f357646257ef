//! Property-based tests for runfolio
//!
//! - Fingerprints ignore mapping key order
//! - Canonical JSON parses back to the value it was rendered from
//! - Experiment ids depend on monitored keys only
//! - Best-row selection keeps exactly the minimal rows
//! - Run ids have minute resolution
//!
//! Run with ProptestConfig::with_cases(100)

use chrono::{TimeZone, Utc};
use proptest::prelude::*;
use runfolio::experiment::{
    canonical_json, extract_best, hash8, Configuration, ExperimentId, RunId,
};
use serde_json::{Map, Value};

// ============================================================================
// Property Test Generators (Strategies)
// ============================================================================

/// Generate arbitrary JSON values (nested up to 3 levels)
fn arb_json() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::from),
        (-1e20f64..1e20).prop_map(Value::from),
        (-1e-3f64..1e-3).prop_map(Value::from),
        "[a-zA-Z0-9 _\"\\\\é→]{0,8}".prop_map(Value::String),
    ];
    leaf.prop_recursive(3, 32, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::vec(("[a-z]{1,6}", inner), 0..4)
                .prop_map(|entries| Value::Object(entries.into_iter().collect())),
        ]
    })
}

/// Same value with every object's insertion order reversed
fn reverse_keys(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let entries: Vec<(&String, &Value)> = map.iter().collect();
            Value::Object(
                entries
                    .into_iter()
                    .rev()
                    .map(|(k, v)| (k.clone(), reverse_keys(v)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.iter().map(reverse_keys).collect()),
        other => other.clone(),
    }
}

fn configuration(model: Value, training: Value, extra: Value) -> Configuration {
    let mut config = Map::new();
    config.insert("model".to_string(), model);
    config.insert("training".to_string(), training);
    config.insert("extra".to_string(), extra);
    config.insert("debug".to_string(), Value::Bool(false));
    config
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property: fingerprints are 8 decimal digits
    #[test]
    fn prop_hash8_shape(value in arb_json()) {
        let tag = hash8(&value).unwrap();
        prop_assert_eq!(tag.len(), 8);
        prop_assert!(tag.chars().all(|c| c.is_ascii_digit()));
    }

    /// Property: reordering mapping keys never changes the fingerprint
    #[test]
    fn prop_hash8_key_order_independent(value in arb_json()) {
        let reversed = reverse_keys(&value);
        prop_assert_eq!(canonical_json(&value).unwrap(), canonical_json(&reversed).unwrap());
        prop_assert_eq!(hash8(&value).unwrap(), hash8(&reversed).unwrap());
    }

    /// Property: canonical text is ASCII and parses back to the same value
    #[test]
    fn prop_canonical_json_roundtrip(value in arb_json()) {
        let text = canonical_json(&value).unwrap();
        prop_assert!(text.is_ascii());
        let parsed: Value = serde_json::from_str(&text).unwrap();
        prop_assert_eq!(parsed, value);
    }

    /// Property: only monitored keys feed the experiment id
    #[test]
    fn prop_experiment_id_ignores_unmonitored(
        model in arb_json(),
        training in arb_json(),
        extra_a in arb_json(),
        extra_b in arb_json(),
    ) {
        let keys = ["model", "training"];
        let a = configuration(model.clone(), training.clone(), extra_a);
        let b = configuration(reverse_keys(&model), reverse_keys(&training), extra_b);
        prop_assert_eq!(
            ExperimentId::from_config(&a, &keys).unwrap(),
            ExperimentId::from_config(&b, &keys).unwrap()
        );
    }

    /// Property: distinct integer hyperparameters give distinct experiment ids
    #[test]
    fn prop_experiment_id_separates_values(a in 0u32..1_000_000, b in 0u32..1_000_000) {
        prop_assume!(a != b);
        let keys = ["model", "training"];
        let left = configuration(Value::from(a), Value::Null, Value::Null);
        let right = configuration(Value::from(b), Value::Null, Value::Null);
        prop_assert_ne!(
            ExperimentId::from_config(&left, &keys).unwrap(),
            ExperimentId::from_config(&right, &keys).unwrap()
        );
    }

    /// Property: extract_best keeps exactly the rows at the column minimum
    #[test]
    fn prop_extract_best_keeps_all_minimal_rows(
        losses in prop::collection::vec(prop::sample::select(vec![0.1, 0.25, 0.5, 0.75, 1.0]), 1..30),
        elapsed in 0.0f64..1e4,
    ) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("training-logs.csv");
        let mut csv = String::from("epoch,loss\n");
        for (epoch, loss) in losses.iter().enumerate() {
            csv.push_str(&format!("{epoch},{loss}\n"));
        }
        std::fs::write(&path, csv).unwrap();

        let lowest = losses.iter().copied().fold(f64::INFINITY, f64::min);
        let expected: Vec<usize> = losses
            .iter()
            .enumerate()
            .filter(|(_, &loss)| loss == lowest)
            .map(|(epoch, _)| epoch)
            .collect();

        let best = extract_best(&path, "loss", elapsed).unwrap();
        let epochs: Vec<usize> = best
            .rows()
            .iter()
            .map(|row| usize::try_from(row["epoch"].as_u64().unwrap()).unwrap())
            .collect();
        prop_assert_eq!(epochs, expected);
        for row in best.rows() {
            prop_assert_eq!(row["loss"].as_f64().unwrap(), lowest);
            prop_assert_eq!(row["elapsed"].as_f64().unwrap(), elapsed);
        }
    }

    /// Property: run ids only change with the minute
    #[test]
    fn prop_run_id_minute_resolution(
        minute_start in 0i64..4_000_000_000,
        offset_a in 0i64..60,
        offset_b in 0i64..60,
    ) {
        let start = minute_start - minute_start % 60;
        let a = Utc.timestamp_opt(start + offset_a, 0).unwrap();
        let b = Utc.timestamp_opt(start + offset_b, 0).unwrap();
        prop_assert_eq!(RunId::at(&a), RunId::at(&b));

        let next = Utc.timestamp_opt(start + 60, 0).unwrap();
        prop_assert_ne!(RunId::at(&a), RunId::at(&next));
    }
}
