//! Reconciliation report format (stable v1)
//!
//! This is the stable output format consumed by downstream tooling.
//! Fields are only ever added, never renamed or removed.

use crate::value::{Row, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One divergent (key, column) observation: both raw values
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Difference {
    /// Value observed on the source side
    pub source_value: Value,

    /// Value observed on the target side
    pub target_value: Value,
}

/// All field-level differences for one common key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowDifference {
    /// Key-column name mapped to key value
    pub key: BTreeMap<String, Value>,

    /// Column name mapped to the divergent value pair
    pub differences: BTreeMap<String, Difference>,
}

/// The full result of one reconciliation run
///
/// Constructed once per `compare` invocation and never mutated after
/// return; safe to serialize directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationResult {
    /// When the comparison ran (RFC 3339)
    pub timestamp: String,

    /// Rows fetched from the source side
    pub source_row_count: usize,

    /// Rows fetched from the target side
    pub target_row_count: usize,

    /// The resolved compare-column list
    pub columns_compared: Vec<String>,

    /// Full content of rows present only on the source side
    pub only_in_source: Vec<Row>,

    /// Full content of rows present only on the target side
    pub only_in_target: Vec<Row>,

    /// Per-key field differences, ordered by key
    pub value_differences: Vec<RowDifference>,

    /// Duplicate keys seen while indexing the source side (last row wins)
    pub source_key_collisions: usize,

    /// Duplicate keys seen while indexing the target side (last row wins)
    pub target_key_collisions: usize,
}

impl ReconciliationResult {
    /// Check whether any discrepancy was found
    pub fn has_discrepancies(&self) -> bool {
        !self.only_in_source.is_empty()
            || !self.only_in_target.is_empty()
            || !self.value_differences.is_empty()
    }

    /// Total number of divergent (key, column) pairs
    pub fn difference_count(&self) -> usize {
        self.value_differences
            .iter()
            .map(|d| d.differences.len())
            .sum()
    }

    /// Serialize to pretty JSON
    pub fn to_json(&self) -> Result<String, ReportError> {
        serde_json::to_string_pretty(self).map_err(|e| ReportError::Serialize(e.to_string()))
    }

    /// Write the report to a file
    ///
    /// Failure here does not invalidate the in-memory result; callers may
    /// still print or re-save it.
    pub fn save_to_file(&self, path: &std::path::Path) -> Result<(), ReportError> {
        let json = self.to_json()?;
        std::fs::write(path, json).map_err(|e| ReportError::Io(e.to_string()))
    }
}

/// Report emission failures
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("failed to serialize report: {0}")]
    Serialize(String),

    #[error("failed to write report: {0}")]
    Io(String),
}
