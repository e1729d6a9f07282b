//! PostgreSQL row source
//!
//! Executes the configured query over `tokio-postgres` and converts the
//! result set into the scalar value model. Works with PostgreSQL 9.4+,
//! Amazon Redshift, CockroachDB, and other PostgreSQL-compatible
//! databases.
//!
//! ## Authentication
//!
//! 1. Direct password authentication
//! 2. TLS/SSL connections via native-tls
//!
//! ## Usage
//!
//! ```rust,ignore
//! let source = PostgresSource::connect(
//!     "localhost", 5432, "mydb", "username", "password"
//! ).await?;
//! let rows = source.fetch_rows("SELECT * FROM snapshot").await?;
//! ```
//!
//! Only a fixed set of column types is supported (bool, the integer
//! widths, float4/8, text/varchar, timestamp, timestamptz, date). Any
//! other column type fails the fetch rather than guessing a conversion.

use crate::adapter::{FetchError, RowSource};
use datarecon_core::Row;

#[cfg(feature = "postgres")]
use datarecon_core::Value;

#[cfg(feature = "postgres")]
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};

#[cfg(feature = "postgres")]
use tokio_postgres::{types::Type, Client, NoTls};

#[cfg(feature = "postgres")]
use postgres_native_tls::MakeTlsConnector;

#[cfg(feature = "postgres")]
use native_tls::TlsConnector;

/// PostgreSQL row source
pub struct PostgresSource {
    /// PostgreSQL client (only available with postgres feature)
    #[cfg(feature = "postgres")]
    client: Client,

    /// Connection host, kept for error messages
    host: String,

    /// Connection port
    port: u16,

    /// Placeholder for when feature is disabled
    #[cfg(not(feature = "postgres"))]
    _phantom: std::marker::PhantomData<()>,
}

impl PostgresSource {
    /// Connect with direct credentials over a plain connection
    ///
    /// For TLS connections, use [`connect_with_tls`](Self::connect_with_tls).
    #[cfg(feature = "postgres")]
    pub async fn connect(
        host: impl Into<String>,
        port: u16,
        database: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Self, FetchError> {
        let host = host.into();
        let config = format!(
            "host={} port={} dbname={} user={} password={}",
            host,
            port,
            database.into(),
            user.into(),
            password.into()
        );

        let (client, connection) = tokio_postgres::connect(&config, NoTls)
            .await
            .map_err(|e| {
                FetchError::AuthenticationError(format!(
                    "Failed to connect to PostgreSQL at {}:{}: {}",
                    host, port, e
                ))
            })?;

        // Connection task runs until the client is dropped
        let host_clone = host.clone();
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                eprintln!("PostgreSQL connection error ({}:{}): {}", host_clone, port, e);
            }
        });

        Ok(Self { client, host, port })
    }

    /// Create source without postgres feature (returns error)
    #[cfg(not(feature = "postgres"))]
    pub async fn connect(
        _host: impl Into<String>,
        _port: u16,
        _database: impl Into<String>,
        _user: impl Into<String>,
        _password: impl Into<String>,
    ) -> Result<Self, FetchError> {
        Err(FetchError::ConfigError(
            "PostgreSQL support not compiled. Rebuild with: cargo build --features postgres"
                .to_string(),
        ))
    }

    /// Connect with direct credentials over TLS
    #[cfg(feature = "postgres")]
    pub async fn connect_with_tls(
        host: impl Into<String>,
        port: u16,
        database: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Self, FetchError> {
        let host = host.into();
        let config = format!(
            "host={} port={} dbname={} user={} password={}",
            host,
            port,
            database.into(),
            user.into(),
            password.into()
        );

        let connector = TlsConnector::builder().build().map_err(|e| {
            FetchError::ConfigError(format!("Failed to create TLS connector: {}", e))
        })?;
        let tls = MakeTlsConnector::new(connector);

        let (client, connection) = tokio_postgres::connect(&config, tls).await.map_err(|e| {
            FetchError::AuthenticationError(format!(
                "Failed to connect to PostgreSQL at {}:{} with TLS: {}",
                host, port, e
            ))
        })?;

        let host_clone = host.clone();
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                eprintln!(
                    "PostgreSQL TLS connection error ({}:{}): {}",
                    host_clone, port, e
                );
            }
        });

        Ok(Self { client, host, port })
    }

    /// Create source without postgres feature (returns error)
    #[cfg(not(feature = "postgres"))]
    pub async fn connect_with_tls(
        _host: impl Into<String>,
        _port: u16,
        _database: impl Into<String>,
        _user: impl Into<String>,
        _password: impl Into<String>,
    ) -> Result<Self, FetchError> {
        Err(FetchError::ConfigError(
            "PostgreSQL support not compiled. Rebuild with: cargo build --features postgres"
                .to_string(),
        ))
    }
}

/// Convert one result row into the scalar value model
///
/// SQL NULL maps to `Value::Null` for every supported type, so "column
/// absent" and "column null" look identical downstream.
#[cfg(feature = "postgres")]
fn convert_row(pg_row: &tokio_postgres::Row) -> Result<Row, FetchError> {
    let mut row = Row::new();

    for (idx, column) in pg_row.columns().iter().enumerate() {
        let ty = column.type_();

        let fetched: Result<Value, tokio_postgres::Error> = if *ty == Type::BOOL {
            pg_row
                .try_get::<_, Option<bool>>(idx)
                .map(|v| v.map(Value::Bool).unwrap_or(Value::Null))
        } else if *ty == Type::INT2 {
            pg_row
                .try_get::<_, Option<i16>>(idx)
                .map(|v| v.map(|v| Value::Int(v as i64)).unwrap_or(Value::Null))
        } else if *ty == Type::INT4 {
            pg_row
                .try_get::<_, Option<i32>>(idx)
                .map(|v| v.map(|v| Value::Int(v as i64)).unwrap_or(Value::Null))
        } else if *ty == Type::INT8 {
            pg_row
                .try_get::<_, Option<i64>>(idx)
                .map(|v| v.map(Value::Int).unwrap_or(Value::Null))
        } else if *ty == Type::FLOAT4 {
            pg_row
                .try_get::<_, Option<f32>>(idx)
                .map(|v| v.map(|v| Value::Float(v as f64)).unwrap_or(Value::Null))
        } else if *ty == Type::FLOAT8 {
            pg_row
                .try_get::<_, Option<f64>>(idx)
                .map(|v| v.map(Value::Float).unwrap_or(Value::Null))
        } else if *ty == Type::TEXT || *ty == Type::VARCHAR || *ty == Type::BPCHAR || *ty == Type::NAME {
            pg_row
                .try_get::<_, Option<String>>(idx)
                .map(|v| v.map(Value::Text).unwrap_or(Value::Null))
        } else if *ty == Type::TIMESTAMP {
            pg_row.try_get::<_, Option<NaiveDateTime>>(idx).map(|v| {
                v.map(|v| Value::Timestamp(v.and_utc()))
                    .unwrap_or(Value::Null)
            })
        } else if *ty == Type::TIMESTAMPTZ {
            pg_row
                .try_get::<_, Option<DateTime<Utc>>>(idx)
                .map(|v| v.map(Value::Timestamp).unwrap_or(Value::Null))
        } else if *ty == Type::DATE {
            pg_row.try_get::<_, Option<NaiveDate>>(idx).map(|v| {
                v.map(|v| Value::Timestamp(date_midnight_utc(v)))
                    .unwrap_or(Value::Null)
            })
        } else {
            return Err(FetchError::InvalidResponse(format!(
                "unsupported column type {} for column '{}'",
                ty,
                column.name()
            )));
        };

        let value = fetched.map_err(|e| {
            FetchError::InvalidResponse(format!("column '{}': {}", column.name(), e))
        })?;
        row.insert(column.name(), value);
    }

    Ok(row)
}

/// DATE values carry no time component; represent them at midnight UTC
#[cfg(feature = "postgres")]
fn date_midnight_utc(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

#[async_trait::async_trait]
impl RowSource for PostgresSource {
    fn name(&self) -> &'static str {
        "PostgreSQL"
    }

    #[cfg(feature = "postgres")]
    async fn fetch_rows(&self, query: &str) -> Result<Vec<Row>, FetchError> {
        let pg_rows = self.client.query(query, &[]).await.map_err(|e| {
            FetchError::QueryError(format!(
                "query against {}:{} failed: {}",
                self.host, self.port, e
            ))
        })?;

        pg_rows.iter().map(convert_row).collect()
    }

    #[cfg(not(feature = "postgres"))]
    async fn fetch_rows(&self, _query: &str) -> Result<Vec<Row>, FetchError> {
        Err(FetchError::ConfigError(
            "PostgreSQL support not compiled. Rebuild with: cargo build --features postgres"
                .to_string(),
        ))
    }

    #[cfg(feature = "postgres")]
    async fn test_connection(&self) -> Result<(), FetchError> {
        self.client
            .batch_execute("SELECT 1")
            .await
            .map_err(|e| FetchError::QueryError(format!("Connection test failed: {}", e)))
    }

    #[cfg(not(feature = "postgres"))]
    async fn test_connection(&self) -> Result<(), FetchError> {
        Err(FetchError::ConfigError(
            "PostgreSQL support not compiled. Rebuild with: cargo build --features postgres"
                .to_string(),
        ))
    }

    // The connection task ends when the client drops; the default no-op
    // close is enough.
}
