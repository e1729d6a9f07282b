//! DataRecon Core
//!
//! Core domain model with stable, versioned types: the scalar value model,
//! row and key types, the reconciliation report format, and configuration.
//! The report JSON shape is part of the public API - downstream consumers
//! parse it, so fields are only ever added, never renamed.

pub mod config;
pub mod report;
pub mod value;

pub use config::{ComparisonConfig, Config, ConfigError, ConnectionConfig};
pub use report::{Difference, ReconciliationResult, ReportError, RowDifference};
pub use value::{Key, Row, Value};
