//! Key-based reconciliation of two row-sets
//!
//! The comparison is a pure function of its inputs: index both sides by
//! composite key, partition into only-in-source / only-in-target / common,
//! then walk the common keys in chunks comparing the resolved columns
//! field by field. Numeric pairs compare under an absolute tolerance,
//! everything else compares exactly.

use chrono::Utc;
use datarecon_core::{Difference, Key, ReconciliationResult, Row, RowDifference, Value};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use thiserror::Error;

/// Default number of common keys processed per batch
pub const DEFAULT_CHUNK_SIZE: usize = 10_000;

/// Maximum absolute difference under which two numeric values are equal
pub const NUMERIC_TOLERANCE: f64 = 1e-10;

/// Which side of the comparison a row came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Source,
    Target,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Source => write!(f, "source"),
            Self::Target => write!(f, "target"),
        }
    }
}

/// All possible comparison-time errors
///
/// Any of these aborts the run; no partial result is ever returned.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CompareError {
    #[error("key columns must not be empty")]
    EmptyKeyColumns,

    #[error("chunk size must be positive")]
    ZeroChunkSize,

    #[error("key column '{column}' missing from {side} row {index}")]
    MissingKeyColumn {
        side: Side,
        column: String,
        index: usize,
    },
}

/// Options for one comparison run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompareOptions {
    /// Columns whose concatenated values identify a row (non-empty)
    pub key_columns: Vec<String>,

    /// Explicit compare columns; `None` derives the intersection of both
    /// sides' columns minus the key columns
    pub compare_columns: Option<Vec<String>>,

    /// Batch size for the common-key walk; purely a working-set control,
    /// never changes the result
    pub chunk_size: usize,
}

impl CompareOptions {
    /// Create options with the default chunk size and derived compare columns
    pub fn new<I, S>(key_columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            key_columns: key_columns.into_iter().map(Into::into).collect(),
            compare_columns: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Set an explicit compare-column list
    pub fn with_compare_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.compare_columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    /// Set the chunk size
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }
}

/// Reconcile two row-sets into a structured result
///
/// Both row-sets must already be fully materialized. Key uniqueness within
/// a side is the adapter's responsibility; duplicates resolve last-wins and
/// are surfaced through the collision counters on the result.
pub fn compare(
    source: &[Row],
    target: &[Row],
    options: &CompareOptions,
) -> Result<ReconciliationResult, CompareError> {
    if options.key_columns.is_empty() {
        return Err(CompareError::EmptyKeyColumns);
    }
    if options.chunk_size == 0 {
        return Err(CompareError::ZeroChunkSize);
    }

    let (source_index, source_key_collisions) =
        build_index(source, &options.key_columns, Side::Source)?;
    let (target_index, target_key_collisions) =
        build_index(target, &options.key_columns, Side::Target)?;

    let columns_compared = resolve_columns(source, target, options);

    let only_in_source = rows_only_in(&source_index, &target_index);
    let only_in_target = rows_only_in(&target_index, &source_index);

    let mut common: Vec<&Key> = source_index
        .keys()
        .filter(|key| target_index.contains_key(*key))
        .collect();
    common.sort();

    let mut value_differences = Vec::new();
    for chunk in common.chunks(options.chunk_size) {
        for key in chunk {
            let source_row = &source_index[*key];
            let target_row = &target_index[*key];

            let mut differences = BTreeMap::new();
            for column in &columns_compared {
                let source_value = source_row.get(column);
                let target_value = target_row.get(column);
                if !values_match(source_value, target_value) {
                    differences.insert(
                        column.clone(),
                        Difference {
                            source_value: source_value.clone(),
                            target_value: target_value.clone(),
                        },
                    );
                }
            }

            // Fully matching rows carry no reporting value
            if !differences.is_empty() {
                value_differences.push(RowDifference {
                    key: key.labeled(&options.key_columns),
                    differences,
                });
            }
        }
    }

    Ok(ReconciliationResult {
        timestamp: Utc::now().to_rfc3339(),
        source_row_count: source.len(),
        target_row_count: target.len(),
        columns_compared,
        only_in_source,
        only_in_target,
        value_differences,
        source_key_collisions,
        target_key_collisions,
    })
}

/// Numeric pairs compare under the tolerance; everything else exactly
///
/// Integer pairs compare as `i64` directly: going through `f64` would
/// collapse distinct values beyond 2^53, and the tolerance is irrelevant
/// for integers since distinct ones differ by at least 1. Null vs
/// non-null is always a mismatch; mixed non-numeric types never match.
fn values_match(a: &Value, b: &Value) -> bool {
    if let (Value::Int(x), Value::Int(y)) = (a, b) {
        return x == y;
    }
    match (a.as_numeric(), b.as_numeric()) {
        (Some(x), Some(y)) => (x - y).abs() <= NUMERIC_TOLERANCE,
        _ => a == b,
    }
}

/// Build the key → row index for one side
///
/// O(n); a repeated key silently replaces the earlier entry (last wins)
/// and bumps the collision count.
fn build_index<'a>(
    rows: &'a [Row],
    key_columns: &[String],
    side: Side,
) -> Result<(HashMap<Key, &'a Row>, usize), CompareError> {
    let mut index = HashMap::with_capacity(rows.len());
    let mut collisions = 0;

    for (row_index, row) in rows.iter().enumerate() {
        for column in key_columns {
            if !row.contains_column(column) {
                return Err(CompareError::MissingKeyColumn {
                    side,
                    column: column.clone(),
                    index: row_index,
                });
            }
        }

        let key = Key::from_row(row, key_columns);
        if index.insert(key, row).is_some() {
            collisions += 1;
        }
    }

    Ok((index, collisions))
}

/// Resolve the compare-column list
///
/// Explicit lists pass through untouched; the derived list is the sorted
/// intersection of both sides' column names minus the key columns. An
/// empty intersection is a valid (empty) compare set, not an error.
fn resolve_columns(source: &[Row], target: &[Row], options: &CompareOptions) -> Vec<String> {
    if let Some(columns) = &options.compare_columns {
        return columns.clone();
    }

    let source_columns: BTreeSet<&str> = source
        .first()
        .map(|row| row.column_names().collect())
        .unwrap_or_default();
    let target_columns: BTreeSet<&str> = target
        .first()
        .map(|row| row.column_names().collect())
        .unwrap_or_default();

    source_columns
        .intersection(&target_columns)
        .filter(|column| !options.key_columns.iter().any(|k| k == *column))
        .map(|column| column.to_string())
        .collect()
}

/// Full row content for keys present in `index` but absent from `other`,
/// ordered by key
fn rows_only_in(index: &HashMap<Key, &Row>, other: &HashMap<Key, &Row>) -> Vec<Row> {
    let mut entries: Vec<(&Key, &&Row)> = index
        .iter()
        .filter(|(key, _)| !other.contains_key(*key))
        .collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));
    entries.into_iter().map(|(_, row)| (*row).clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn row(pairs: &[(&str, Value)]) -> Row {
        Row::from_pairs(pairs.iter().map(|(k, v)| (*k, v.clone())))
    }

    fn by_id() -> CompareOptions {
        CompareOptions::new(["id"])
    }

    #[test]
    fn disjoint_and_matching_rows_partition_cleanly() {
        // Scenario: {1, 2} on the source, {1, 3} on the target, row 1 equal
        let source = vec![
            row(&[("id", Value::Int(1)), ("v", Value::Int(10))]),
            row(&[("id", Value::Int(2)), ("v", Value::Int(20))]),
        ];
        let target = vec![
            row(&[("id", Value::Int(1)), ("v", Value::Int(10))]),
            row(&[("id", Value::Int(3)), ("v", Value::Int(30))]),
        ];

        let result = compare(&source, &target, &by_id()).unwrap();

        assert_eq!(result.source_row_count, 2);
        assert_eq!(result.target_row_count, 2);
        assert_eq!(result.columns_compared, vec!["v"]);
        assert_eq!(result.only_in_source, vec![source[1].clone()]);
        assert_eq!(result.only_in_target, vec![target[1].clone()]);
        assert!(result.value_differences.is_empty());
    }

    #[test]
    fn numeric_difference_within_tolerance_is_not_reported() {
        let source = vec![row(&[("id", Value::Int(1)), ("v", Value::Float(10.0 + 5e-11))])];
        let target = vec![row(&[("id", Value::Int(1)), ("v", Value::Float(10.0))])];

        let result = compare(&source, &target, &by_id()).unwrap();
        assert!(result.value_differences.is_empty());
    }

    #[test]
    fn numeric_difference_beyond_tolerance_is_reported_with_both_values() {
        let source = vec![row(&[("id", Value::Int(1)), ("v", Value::Float(10.01))])];
        let target = vec![row(&[("id", Value::Int(1)), ("v", Value::Float(10.0))])];

        let result = compare(&source, &target, &by_id()).unwrap();

        assert_eq!(result.value_differences.len(), 1);
        let diff = &result.value_differences[0];
        assert_eq!(diff.key.get("id"), Some(&Value::Int(1)));
        assert_eq!(
            diff.differences.get("v"),
            Some(&Difference {
                source_value: Value::Float(10.01),
                target_value: Value::Float(10.0),
            })
        );
    }

    #[test]
    fn tolerance_boundary_is_inclusive() {
        assert!(values_match(&Value::Float(0.0), &Value::Float(1e-10)));
        assert!(!values_match(&Value::Float(0.0), &Value::Float(2e-10)));
    }

    #[test]
    fn tolerance_is_symmetric() {
        let pairs = [
            (Value::Float(10.0), Value::Float(10.0 + 5e-11)),
            (Value::Float(10.0), Value::Float(10.01)),
            (Value::Int(3), Value::Float(3.0)),
            (Value::Null, Value::Int(0)),
        ];
        for (a, b) in &pairs {
            assert_eq!(values_match(a, b), values_match(b, a), "{a} vs {b}");
        }
    }

    #[test]
    fn integer_and_float_compare_numerically() {
        assert!(values_match(&Value::Int(10), &Value::Float(10.0)));
        assert!(!values_match(&Value::Int(10), &Value::Float(10.5)));
    }

    #[test]
    fn large_integers_compare_exactly() {
        // An f64 cast would collapse these: both round to the same float
        assert!(!values_match(
            &Value::Int(i64::MAX),
            &Value::Int(i64::MAX - 1)
        ));
        assert!(values_match(&Value::Int(i64::MAX), &Value::Int(i64::MAX)));
        assert!(!values_match(&Value::Int(i64::MIN), &Value::Int(i64::MIN + 1)));
    }

    #[test]
    fn non_numeric_mismatches_are_exact() {
        assert!(values_match(&Value::Text("x".into()), &Value::Text("x".into())));
        assert!(!values_match(&Value::Text("x".into()), &Value::Text("y".into())));
        assert!(!values_match(&Value::Int(10), &Value::Text("10".into())));
        assert!(!values_match(&Value::Bool(true), &Value::Int(1)));
        assert!(values_match(&Value::Null, &Value::Null));
    }

    #[test]
    fn null_versus_non_null_is_always_a_difference() {
        let source = vec![row(&[("id", Value::Int(1)), ("name", Value::Null)])];
        let target = vec![row(&[("id", Value::Int(1)), ("name", Value::Text("x".into()))])];

        let result = compare(&source, &target, &by_id()).unwrap();

        assert_eq!(result.value_differences.len(), 1);
        assert_eq!(
            result.value_differences[0].differences.get("name"),
            Some(&Difference {
                source_value: Value::Null,
                target_value: Value::Text("x".into()),
            })
        );
    }

    #[test]
    fn absent_column_participates_as_null() {
        // "name" exists only on the target side rows; explicit compare
        // columns force it into the comparison
        let source = vec![row(&[("id", Value::Int(1))])];
        let target = vec![row(&[("id", Value::Int(1)), ("name", Value::Text("x".into()))])];
        let options = by_id().with_compare_columns(["name"]);

        let result = compare(&source, &target, &options).unwrap();

        assert_eq!(result.value_differences.len(), 1);
        assert_eq!(
            result.value_differences[0].differences.get("name"),
            Some(&Difference {
                source_value: Value::Null,
                target_value: Value::Text("x".into()),
            })
        );
    }

    #[test]
    fn empty_inputs_produce_an_empty_result() {
        let result = compare(&[], &[], &by_id()).unwrap();

        assert_eq!(result.source_row_count, 0);
        assert_eq!(result.target_row_count, 0);
        assert!(result.columns_compared.is_empty());
        assert!(result.only_in_source.is_empty());
        assert!(result.only_in_target.is_empty());
        assert!(result.value_differences.is_empty());
        assert!(!result.has_discrepancies());
    }

    #[test]
    fn no_overlapping_columns_is_a_valid_empty_compare_set() {
        let source = vec![row(&[("id", Value::Int(1)), ("a", Value::Int(1))])];
        let target = vec![row(&[("id", Value::Int(1)), ("b", Value::Int(2))])];

        let result = compare(&source, &target, &by_id()).unwrap();

        assert!(result.columns_compared.is_empty());
        assert!(result.value_differences.is_empty());
    }

    #[test]
    fn derived_columns_exclude_keys_and_one_sided_columns() {
        let source = vec![row(&[
            ("id", Value::Int(1)),
            ("v", Value::Int(10)),
            ("source_only", Value::Int(1)),
        ])];
        let target = vec![row(&[
            ("id", Value::Int(1)),
            ("v", Value::Int(10)),
            ("target_only", Value::Int(1)),
        ])];

        let result = compare(&source, &target, &by_id()).unwrap();
        assert_eq!(result.columns_compared, vec!["v"]);
    }

    #[test]
    fn explicit_compare_columns_pass_through_in_order() {
        let source = vec![row(&[
            ("id", Value::Int(1)),
            ("a", Value::Int(1)),
            ("b", Value::Int(2)),
        ])];
        let target = source.clone();
        let options = by_id().with_compare_columns(["b", "a"]);

        let result = compare(&source, &target, &options).unwrap();
        assert_eq!(result.columns_compared, vec!["b", "a"]);
    }

    #[test]
    fn composite_keys_match_on_the_full_tuple() {
        let source = vec![
            row(&[
                ("region", Value::Text("eu".into())),
                ("id", Value::Int(1)),
                ("v", Value::Int(10)),
            ]),
            row(&[
                ("region", Value::Text("us".into())),
                ("id", Value::Int(1)),
                ("v", Value::Int(20)),
            ]),
        ];
        let target = vec![row(&[
            ("region", Value::Text("eu".into())),
            ("id", Value::Int(1)),
            ("v", Value::Int(11)),
        ])];
        let options = CompareOptions::new(["region", "id"]);

        let result = compare(&source, &target, &options).unwrap();

        // (us, 1) has no partner; (eu, 1) differs on v
        assert_eq!(result.only_in_source.len(), 1);
        assert_eq!(
            result.only_in_source[0].get("region"),
            &Value::Text("us".into())
        );
        assert_eq!(result.value_differences.len(), 1);
        let key = &result.value_differences[0].key;
        assert_eq!(key.get("region"), Some(&Value::Text("eu".into())));
        assert_eq!(key.get("id"), Some(&Value::Int(1)));
    }

    #[test]
    fn matching_rows_are_dropped_from_differences() {
        let source = vec![
            row(&[("id", Value::Int(1)), ("v", Value::Int(10))]),
            row(&[("id", Value::Int(2)), ("v", Value::Int(20))]),
        ];
        let mut target = source.clone();
        target[1].insert("v", Value::Int(21));

        let result = compare(&source, &target, &by_id()).unwrap();

        assert_eq!(result.value_differences.len(), 1);
        assert_eq!(
            result.value_differences[0].key.get("id"),
            Some(&Value::Int(2))
        );
    }

    #[test]
    fn partition_reconstructs_both_key_sets() {
        let source: Vec<Row> = (0..20)
            .map(|i| row(&[("id", Value::Int(i)), ("v", Value::Int(i * 10))]))
            .collect();
        let target: Vec<Row> = (10..30)
            .map(|i| row(&[("id", Value::Int(i)), ("v", Value::Int(i * 10))]))
            .collect();

        let result = compare(&source, &target, &by_id()).unwrap();

        let only_source: Vec<&Value> =
            result.only_in_source.iter().map(|r| r.get("id")).collect();
        let only_target: Vec<&Value> =
            result.only_in_target.iter().map(|r| r.get("id")).collect();

        // 0..10 only on the source, 20..30 only on the target, 10..20 common
        assert_eq!(only_source.len(), 10);
        assert_eq!(only_target.len(), 10);
        assert!(only_source.iter().all(|v| matches!(v, Value::Int(i) if *i < 10)));
        assert!(only_target.iter().all(|v| matches!(v, Value::Int(i) if *i >= 20)));

        // only-in-source plus the common keys reconstruct the source key
        // set exactly, and symmetrically for the target
        let target_ids: std::collections::BTreeSet<i64> = (10..30).collect();
        let mut reconstructed: std::collections::BTreeSet<i64> = only_source
            .iter()
            .filter_map(|v| match v {
                Value::Int(i) => Some(*i),
                _ => None,
            })
            .collect();
        reconstructed.extend((0..20).filter(|i| target_ids.contains(i)));
        assert_eq!(reconstructed, (0..20).collect::<std::collections::BTreeSet<i64>>());
        assert!(result.value_differences.is_empty());
    }

    #[test]
    fn chunk_size_never_changes_the_result() {
        let source: Vec<Row> = (0..25)
            .map(|i| row(&[("id", Value::Int(i)), ("v", Value::Int(i))]))
            .collect();
        let target: Vec<Row> = (0..25)
            .map(|i| {
                let v = if i % 3 == 0 { i + 1 } else { i };
                row(&[("id", Value::Int(i)), ("v", Value::Int(v))])
            })
            .collect();

        let baseline = compare(&source, &target, &by_id()).unwrap();
        assert_eq!(baseline.value_differences.len(), 9);

        for chunk_size in [1, 7, 10_000, source.len() + 100] {
            let result =
                compare(&source, &target, &by_id().with_chunk_size(chunk_size)).unwrap();
            assert_eq!(
                result.value_differences, baseline.value_differences,
                "chunk_size {chunk_size}"
            );
            assert_eq!(result.only_in_source, baseline.only_in_source);
            assert_eq!(result.only_in_target, baseline.only_in_target);
        }
    }

    #[test]
    fn repeated_runs_are_identical_modulo_timestamp() {
        let source = vec![
            row(&[("id", Value::Int(1)), ("v", Value::Float(1.5))]),
            row(&[("id", Value::Int(2)), ("v", Value::Null)]),
        ];
        let target = vec![
            row(&[("id", Value::Int(1)), ("v", Value::Float(2.5))]),
            row(&[("id", Value::Int(3)), ("v", Value::Int(3))]),
        ];

        let mut first = compare(&source, &target, &by_id()).unwrap();
        let mut second = compare(&source, &target, &by_id()).unwrap();
        first.timestamp = String::new();
        second.timestamp = String::new();
        assert_eq!(first, second);
    }

    #[test]
    fn differences_are_ordered_by_key() {
        let source = vec![
            row(&[("id", Value::Int(3)), ("v", Value::Int(0))]),
            row(&[("id", Value::Int(1)), ("v", Value::Int(0))]),
            row(&[("id", Value::Int(2)), ("v", Value::Int(0))]),
        ];
        let target = vec![
            row(&[("id", Value::Int(2)), ("v", Value::Int(9))]),
            row(&[("id", Value::Int(3)), ("v", Value::Int(9))]),
            row(&[("id", Value::Int(1)), ("v", Value::Int(9))]),
        ];

        let result = compare(&source, &target, &by_id()).unwrap();
        let ids: Vec<&Value> = result
            .value_differences
            .iter()
            .map(|d| d.key.get("id").unwrap())
            .collect();
        assert_eq!(ids, vec![&Value::Int(1), &Value::Int(2), &Value::Int(3)]);
    }

    #[test]
    fn duplicate_keys_resolve_last_wins_and_are_counted() {
        let source = vec![
            row(&[("id", Value::Int(1)), ("v", Value::Int(10))]),
            row(&[("id", Value::Int(1)), ("v", Value::Int(11))]),
        ];
        let target = vec![row(&[("id", Value::Int(1)), ("v", Value::Int(11))])];

        let result = compare(&source, &target, &by_id()).unwrap();

        assert_eq!(result.source_key_collisions, 1);
        assert_eq!(result.target_key_collisions, 0);
        // Last source row won the index slot, so values agree
        assert!(result.value_differences.is_empty());
        assert_eq!(result.source_row_count, 2);
    }

    #[test]
    fn empty_key_columns_are_rejected() {
        let options = CompareOptions::new(Vec::<String>::new());
        let err = compare(&[], &[], &options).unwrap_err();
        assert_eq!(err, CompareError::EmptyKeyColumns);
    }

    #[test]
    fn zero_chunk_size_is_rejected() {
        let err = compare(&[], &[], &by_id().with_chunk_size(0)).unwrap_err();
        assert_eq!(err, CompareError::ZeroChunkSize);
    }

    #[test]
    fn missing_key_column_is_a_schema_error() {
        let source = vec![
            row(&[("id", Value::Int(1)), ("v", Value::Int(10))]),
            row(&[("v", Value::Int(20))]),
        ];
        let target = vec![row(&[("id", Value::Int(1)), ("v", Value::Int(10))])];

        let err = compare(&source, &target, &by_id()).unwrap_err();
        assert_eq!(
            err,
            CompareError::MissingKeyColumn {
                side: Side::Source,
                column: "id".to_string(),
                index: 1,
            }
        );
        assert_eq!(
            err.to_string(),
            "key column 'id' missing from source row 1"
        );
    }

    #[test]
    fn null_key_values_are_allowed_when_the_column_exists() {
        let source = vec![row(&[("id", Value::Null), ("v", Value::Int(1))])];
        let target = vec![row(&[("id", Value::Null), ("v", Value::Int(2))])];

        let result = compare(&source, &target, &by_id()).unwrap();
        assert_eq!(result.value_differences.len(), 1);
    }

    #[test]
    fn timestamps_compare_exactly() {
        use chrono::TimeZone;
        let t1 = chrono::Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let t2 = chrono::Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 1).unwrap();

        let source = vec![row(&[("id", Value::Int(1)), ("at", Value::Timestamp(t1))])];
        let target = vec![row(&[("id", Value::Int(1)), ("at", Value::Timestamp(t2))])];

        let result = compare(&source, &target, &by_id()).unwrap();
        assert_eq!(result.value_differences.len(), 1);

        let same = compare(&source, &source.clone(), &by_id()).unwrap();
        assert!(same.value_differences.is_empty());
    }
}
