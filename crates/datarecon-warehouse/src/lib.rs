//! Warehouse row-source adapters
//!
//! This crate provides adapters that execute a query against a backend and
//! hand back a fully materialized row-set in the core value model. The
//! engine never talks to a backend directly; it only ever sees the output
//! of these adapters.
//!
//! ## Features
//!
//! Enable backend support via Cargo features:
//! - `postgres` - PostgreSQL/Redshift support
//! - `snowflake` - Snowflake support
//! - `all-warehouses` - All backends
//!
//! The [`MockSource`] is always available and needs no credentials.
//!
//! ## Example
//!
//! ```rust,ignore
//! use datarecon_warehouse::{PostgresSource, RowSource};
//!
//! let source = PostgresSource::connect("localhost", 5432, "ops", "recon", "secret").await?;
//! let rows = source.fetch_rows("SELECT * FROM snapshot").await?;
//! ```

pub mod adapter;
pub mod mock;
pub mod postgres;
pub mod snowflake;

pub use adapter::{FetchError, RowSource};
pub use mock::MockSource;
pub use postgres::PostgresSource;
pub use snowflake::{SnowflakeSource, SnowflakeSourceBuilder};
