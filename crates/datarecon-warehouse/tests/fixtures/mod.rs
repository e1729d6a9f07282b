//! Shared row fixtures for adapter integration tests

use datarecon_core::{Row, Value};

/// A small "orders" snapshot: (id, amount, status)
pub fn orders(rows: &[(i64, f64, &str)]) -> Vec<Row> {
    rows.iter()
        .map(|(id, amount, status)| {
            Row::from_pairs([
                ("id", Value::Int(*id)),
                ("amount", Value::Float(*amount)),
                ("status", Value::Text(status.to_string())),
            ])
        })
        .collect()
}
