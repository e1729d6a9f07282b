//! Mock row source for testing
//!
//! Returns scripted row-sets without connecting to any warehouse. Useful
//! for unit testing the comparison pipeline, CI runs without credentials,
//! and simulating error conditions.

use crate::adapter::{FetchError, RowSource};
use datarecon_core::Row;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Mock row source
///
/// Row-sets are registered per query string and handed back verbatim on
/// fetch. Connection failures, per-query errors, and latency can all be
/// simulated.
pub struct MockSource {
    /// Scripted row-sets by query string
    row_sets: Arc<RwLock<HashMap<String, Vec<Row>>>>,

    /// Errors to return for specific queries
    errors: Arc<RwLock<HashMap<String, FetchError>>>,

    /// Simulate connection failure
    fail_connection: bool,

    /// Simulate query latency (milliseconds)
    latency_ms: u64,

    /// Name to return from name()
    source_name: &'static str,

    /// Whether close() has been called
    closed: bool,
}

impl MockSource {
    /// Create a new mock source with no scripted row-sets
    pub fn new() -> Self {
        Self {
            row_sets: Arc::new(RwLock::new(HashMap::new())),
            errors: Arc::new(RwLock::new(HashMap::new())),
            fail_connection: false,
            latency_ms: 0,
            source_name: "Mock",
            closed: false,
        }
    }

    /// Make test_connection and fetch_rows fail with a network error
    pub fn with_connection_failure(mut self) -> Self {
        self.fail_connection = true;
        self
    }

    /// Add simulated latency to every call
    pub fn with_latency(mut self, latency_ms: u64) -> Self {
        self.latency_ms = latency_ms;
        self
    }

    /// Override the adapter name
    pub fn with_name(mut self, name: &'static str) -> Self {
        self.source_name = name;
        self
    }

    /// Script the row-set returned for a query
    pub async fn add_rows(&self, query: impl Into<String>, rows: Vec<Row>) {
        self.row_sets.write().await.insert(query.into(), rows);
    }

    /// Script an error for a specific query
    pub async fn add_error(&self, query: impl Into<String>, error: FetchError) {
        self.errors.write().await.insert(query.into(), error);
    }

    /// Whether close() has been called
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    async fn simulate_latency(&self) {
        if self.latency_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(self.latency_ms)).await;
        }
    }
}

impl Default for MockSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl RowSource for MockSource {
    fn name(&self) -> &'static str {
        self.source_name
    }

    async fn fetch_rows(&self, query: &str) -> Result<Vec<Row>, FetchError> {
        self.simulate_latency().await;

        if self.fail_connection {
            return Err(FetchError::NetworkError(
                "simulated connection failure".to_string(),
            ));
        }

        if let Some(error) = self.errors.read().await.get(query) {
            return Err(error.clone());
        }

        self.row_sets
            .read()
            .await
            .get(query)
            .cloned()
            .ok_or_else(|| FetchError::QueryError(format!("no rows scripted for query: {query}")))
    }

    async fn test_connection(&self) -> Result<(), FetchError> {
        self.simulate_latency().await;

        if self.fail_connection {
            return Err(FetchError::NetworkError(
                "simulated connection failure".to_string(),
            ));
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<(), FetchError> {
        self.closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use datarecon_core::Value;

    #[tokio::test]
    async fn scripted_rows_come_back_verbatim() {
        let source = MockSource::new();
        let rows = vec![Row::from_pairs([("id", Value::Int(1))])];
        source.add_rows("SELECT * FROM t", rows.clone()).await;

        let fetched = source.fetch_rows("SELECT * FROM t").await.unwrap();
        assert_eq!(fetched, rows);
    }

    #[tokio::test]
    async fn unscripted_query_is_a_query_error() {
        let source = MockSource::new();
        let err = source.fetch_rows("SELECT 1").await.unwrap_err();
        assert!(matches!(err, FetchError::QueryError(_)));
    }

    #[tokio::test]
    async fn scripted_error_takes_precedence() {
        let source = MockSource::new();
        source.add_rows("q", vec![]).await;
        source
            .add_error("q", FetchError::AuthenticationError("expired".to_string()))
            .await;

        let err = source.fetch_rows("q").await.unwrap_err();
        assert!(matches!(err, FetchError::AuthenticationError(_)));
    }

    #[tokio::test]
    async fn connection_failure_simulation() {
        let source = MockSource::new().with_connection_failure();
        assert!(matches!(
            source.test_connection().await,
            Err(FetchError::NetworkError(_))
        ));
        assert!(matches!(
            source.fetch_rows("q").await,
            Err(FetchError::NetworkError(_))
        ));
    }

    #[tokio::test]
    async fn close_marks_the_source_closed() {
        let mut source = MockSource::new();
        assert!(!source.is_closed());
        source.close().await.unwrap();
        assert!(source.is_closed());
    }
}
