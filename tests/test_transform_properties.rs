//! Integration test: properties of the fitted feature transform

use autisense::preprocessing::{normalize_category, FieldSchema, FieldValue, RawRecord, TransformFitter};
use autisense::utils::{split_indices, train_test_split, Dataset, SplitConfig};
use autisense::AutisenseError;
use ndarray::{Array1, Axis};
use proptest::prelude::*;

const SEXES: [&str; 3] = ["m", "F", " f "];
const ROLES: [&str; 3] = ["Self", "family member", "Others"];

fn schema() -> FieldSchema {
    FieldSchema::new(["item", "age", "constant"], ["sex", "role"])
}

fn record(item: f64, age: f64, sex: usize, role: usize) -> RawRecord {
    RawRecord::new()
        .with_number("item", item)
        .with_number("age", age)
        .with_number("constant", 7.0)
        .with_text("sex", SEXES[sex])
        .with_text("role", ROLES[role])
}

fn records_strategy(min: usize) -> impl Strategy<Value = Vec<RawRecord>> {
    prop::collection::vec((0u8..=1, 12.0f64..48.0, 0usize..3, 0usize..3), min..40).prop_map(|rows| {
        rows.into_iter()
            .map(|(item, age, sex, role)| record(f64::from(item), age, sex, role))
            .collect()
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn prop_fit_is_deterministic(records in records_strategy(1)) {
        let first = TransformFitter::new(schema()).fit(&records).unwrap();
        let second = TransformFitter::new(schema()).fit(&records).unwrap();
        prop_assert_eq!(&first, &second);
        prop_assert_eq!(first.apply_batch(&records).unwrap(), second.apply_batch(&records).unwrap());
    }

    #[test]
    fn prop_categorical_codes_round_trip(records in records_strategy(1)) {
        let transform = TransformFitter::new(schema()).fit(&records).unwrap();
        let encoded = transform.apply_batch(&records).unwrap();

        for (record, row) in records.iter().zip(encoded.axis_iter(Axis(0))) {
            let decoded = transform.decode_categorical(row).unwrap();
            for field in ["sex", "role"] {
                let original = match record.get(field) {
                    Some(FieldValue::Text(s)) => normalize_category(s),
                    other => panic!("unexpected value {:?}", other),
                };
                prop_assert_eq!(&decoded[field], &original);
            }
        }
    }

    #[test]
    fn prop_scaled_columns_are_standardized(records in records_strategy(2)) {
        let transform = TransformFitter::new(schema()).fit(&records).unwrap();
        let encoded = transform.apply_batch(&records).unwrap();

        for (j, stats) in transform.numeric_stats().iter().enumerate() {
            let column = encoded.column(j);
            let mean = column.mean().unwrap();
            if stats.scaling().floored {
                prop_assert!(column.iter().all(|v| v.abs() < 1e-9));
                continue;
            }
            let std = column.std(0.0);
            prop_assert!(mean.abs() < 1e-6, "mean of {} is {}", stats.field(), mean);
            prop_assert!((std - 1.0).abs() < 1e-6, "std of {} is {}", stats.field(), std);
        }
    }

    #[test]
    fn prop_constant_field_applies_to_any_value(
        records in records_strategy(1),
        probe in -1e6f64..1e6,
    ) {
        let transform = TransformFitter::new(schema()).fit(&records).unwrap();
        let constant = &transform.numeric_stats()[2];
        prop_assert!(constant.scaling().floored);
        prop_assert_eq!(constant.scaling().std, 1.0);

        let mut probe_record = record(1.0, 24.0, 0, 0);
        probe_record.insert("constant", FieldValue::Number(probe));
        let row = transform.apply(&probe_record).unwrap();
        prop_assert!(row.iter().all(|v| v.is_finite()));
        prop_assert!((row[2] - (probe - 7.0)).abs() < 1e-6);
    }

    #[test]
    fn prop_unknown_category_is_rejected(records in records_strategy(1), value in "[a-z]{12}") {
        let transform = TransformFitter::new(schema()).fit(&records).unwrap();
        let mut probe = record(0.0, 30.0, 0, 0);
        probe.insert("role", FieldValue::Text(value.clone()));

        match transform.apply(&probe) {
            Err(AutisenseError::UnknownCategory { field, value: got }) => {
                prop_assert_eq!(field, "role");
                prop_assert_eq!(got, value);
            }
            other => prop_assert!(false, "expected UnknownCategory, got {:?}", other),
        }
    }

    #[test]
    fn prop_test_split_does_not_leak(
        rows in prop::collection::vec((0u8..=1, 12.0f64..48.0, 0usize..3, 0usize..3), 20..40),
        perturb in prop::collection::vec((12.0f64..48.0, 0usize..3), 40),
    ) {
        let mut records: Vec<RawRecord> = Vec::new();
        let mut labels: Vec<f64> = Vec::new();
        for (i, (item, age, sex, role)) in rows.into_iter().enumerate() {
            records.push(record(f64::from(item), age, sex, role));
            labels.push((i % 2) as f64);
        }
        let dataset = Dataset::new(records.clone(), Array1::from_vec(labels.clone())).unwrap();
        let split = SplitConfig::default();
        let indices = split_indices(&labels, &split).unwrap();

        let mut perturbed = records;
        for (k, &idx) in indices.test.iter().enumerate() {
            let (age, role) = perturb[k % perturb.len()];
            perturbed[idx].insert("age", FieldValue::Number(age));
            perturbed[idx].insert("role", FieldValue::Text(ROLES[role].to_string()));
        }
        let perturbed = Dataset::new(perturbed, Array1::from_vec(labels)).unwrap();

        let (train_a, _) = train_test_split(&dataset, &split).unwrap();
        let (train_b, _) = train_test_split(&perturbed, &split).unwrap();
        let fit_a = TransformFitter::new(schema()).fit(train_a.records());
        let fit_b = TransformFitter::new(schema()).fit(train_b.records());

        match (fit_a, fit_b) {
            (Ok(a), Ok(b)) => {
                prop_assert_eq!(&a, &b);
                prop_assert_eq!(a.apply_batch(train_a.records()).unwrap(), b.apply_batch(train_b.records()).unwrap());
            }
            (a, b) => prop_assert_eq!(a.is_err(), b.is_err()),
        }
    }
}

#[test]
fn test_vocabulary_is_sorted() {
    let records: Vec<RawRecord> = (0..6).map(|i| record(0.0, 20.0, i % 3, (i + 1) % 3)).collect();
    let transform = TransformFitter::new(schema()).fit(&records).unwrap();
    assert_eq!(transform.vocabulary("sex").unwrap().values(), &["f".to_string(), "m".to_string()]);
    assert_eq!(
        transform.vocabulary("role").unwrap().values(),
        &["family member".to_string(), "others".to_string(), "self".to_string()]
    );
    assert_eq!(transform.code_of("role", " SELF").unwrap(), 2);
}

#[test]
fn test_missing_field_is_schema_mismatch() {
    let records: Vec<RawRecord> = (0..3).map(|i| record(1.0, 20.0 + i as f64, i, i)).collect();
    let transform = TransformFitter::new(schema()).fit(&records).unwrap();
    let mut partial = record(1.0, 20.0, 0, 0);
    partial.remove("age");

    match transform.apply(&partial) {
        Err(AutisenseError::SchemaMismatch { missing, unexpected }) => {
            assert_eq!(missing, vec!["age".to_string()]);
            assert!(unexpected.is_empty());
        }
        other => panic!("expected SchemaMismatch, got {:?}", other),
    }
}
