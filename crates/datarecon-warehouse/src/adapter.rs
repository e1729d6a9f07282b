//! Row-source trait shared by all warehouse backends

use datarecon_core::Row;

/// Errors that can occur when fetching a row-set
///
/// Any of these is fatal to the whole comparison: the engine never works
/// with partial row-sets, and nothing is retried internally.
#[derive(Debug, Clone, thiserror::Error)]
pub enum FetchError {
    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    #[error("Query failed: {0}")]
    QueryError(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Trait for adapters that can fetch row-sets from one side of a comparison
///
/// Implementations are plain caller-owned values: open one per run, pass it
/// in explicitly, and call [`close`](RowSource::close) when the run ends.
/// There is no shared connection state anywhere.
#[async_trait::async_trait]
pub trait RowSource: Send + Sync {
    /// Get the adapter name (e.g., "PostgreSQL", "Snowflake")
    fn name(&self) -> &'static str;

    /// Execute a query and return the full, materialized row-set
    ///
    /// Every returned row carries the same column set; a SQL NULL (or a
    /// column the backend omitted for a row) comes back as `Value::Null`,
    /// never as a missing key.
    async fn fetch_rows(&self, query: &str) -> Result<Vec<Row>, FetchError>;

    /// Test the connection before attempting a fetch
    async fn test_connection(&self) -> Result<(), FetchError>;

    /// Release the underlying connection
    ///
    /// Backends whose connections end on drop may keep the default no-op.
    async fn close(&mut self) -> Result<(), FetchError> {
        Ok(())
    }
}
