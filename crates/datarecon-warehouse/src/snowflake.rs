//! Snowflake row source
//!
//! Executes the configured query through `snowflake-api` and converts the
//! Arrow result batches into the scalar value model.
//!
//! ## Authentication Methods
//!
//! 1. Password authentication (username/password)
//! 2. Key-pair authentication (private key PEM)
//!
//! ## Usage
//!
//! ```rust,ignore
//! let source = SnowflakeSource::with_password(
//!     "xy12345.us-east-1",
//!     "username",
//!     "password"
//! )
//! .with_warehouse("COMPUTE_WH")
//! .with_role("ANALYST")
//! .build()?;
//! let rows = source.fetch_rows("SELECT * FROM OPS_PUB.SNAPSHOT.CV_201").await?;
//! ```

use crate::adapter::{FetchError, RowSource};
use datarecon_core::Row;

#[cfg(feature = "snowflake")]
use datarecon_core::Value;

#[cfg(feature = "snowflake")]
use snowflake_api::SnowflakeApi;

#[cfg(feature = "snowflake")]
use arrow_array::{
    cast::AsArray,
    types::{
        Date32Type, Decimal128Type, Float32Type, Float64Type, Int16Type, Int32Type, Int64Type,
        Int8Type, TimestampMicrosecondType, TimestampMillisecondType, TimestampNanosecondType,
        TimestampSecondType,
    },
    Array,
};

#[cfg(feature = "snowflake")]
use arrow_schema::{DataType, TimeUnit};

#[cfg(feature = "snowflake")]
use chrono::DateTime;

/// Snowflake authentication credentials
#[derive(Clone)]
pub enum SnowflakeCredentials {
    /// Password-based authentication
    Password(String),
    /// Key-pair authentication (PEM format private key)
    PrivateKey(String),
}

/// Builder for SnowflakeSource
pub struct SnowflakeSourceBuilder {
    account: String,
    username: String,
    credentials: SnowflakeCredentials,
    warehouse: Option<String>,
    role: Option<String>,
    database: Option<String>,
}

impl SnowflakeSourceBuilder {
    /// Set the warehouse to use
    pub fn with_warehouse(mut self, warehouse: impl Into<String>) -> Self {
        self.warehouse = Some(warehouse.into());
        self
    }

    /// Set the role to use
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    /// Set the default database
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    /// Build the source
    #[cfg(feature = "snowflake")]
    pub fn build(self) -> Result<SnowflakeSource, FetchError> {
        let api = match &self.credentials {
            SnowflakeCredentials::Password(password) => SnowflakeApi::with_password_auth(
                &self.account,
                self.warehouse.as_deref(),
                self.database.as_deref(),
                None, // schema
                &self.username,
                self.role.as_deref(),
                password,
            )
            .map_err(|e| {
                FetchError::AuthenticationError(format!(
                    "Failed to authenticate with Snowflake: {}",
                    e
                ))
            })?,
            SnowflakeCredentials::PrivateKey(private_key_pem) => {
                SnowflakeApi::with_certificate_auth(
                    &self.account,
                    self.warehouse.as_deref(),
                    self.database.as_deref(),
                    None, // schema
                    &self.username,
                    self.role.as_deref(),
                    private_key_pem,
                )
                .map_err(|e| {
                    FetchError::AuthenticationError(format!(
                        "Failed to authenticate with key-pair: {}",
                        e
                    ))
                })?
            }
        };

        Ok(SnowflakeSource {
            api,
            account: self.account,
        })
    }

    /// Build without snowflake feature
    #[cfg(not(feature = "snowflake"))]
    pub fn build(self) -> Result<SnowflakeSource, FetchError> {
        Err(FetchError::ConfigError(
            "Snowflake support not compiled. Rebuild with: cargo build --features snowflake"
                .to_string(),
        ))
    }
}

/// Snowflake row source
pub struct SnowflakeSource {
    #[cfg(feature = "snowflake")]
    api: SnowflakeApi,

    /// Account identifier, kept for error messages
    #[cfg(feature = "snowflake")]
    account: String,

    #[cfg(not(feature = "snowflake"))]
    _phantom: std::marker::PhantomData<()>,
}

impl SnowflakeSource {
    /// Start a builder with password authentication
    pub fn with_password(
        account: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> SnowflakeSourceBuilder {
        SnowflakeSourceBuilder {
            account: account.into(),
            username: username.into(),
            credentials: SnowflakeCredentials::Password(password.into()),
            warehouse: None,
            role: None,
            database: None,
        }
    }

    /// Start a builder with key-pair authentication
    pub fn with_key_pair(
        account: impl Into<String>,
        username: impl Into<String>,
        private_key_pem: impl Into<String>,
    ) -> SnowflakeSourceBuilder {
        SnowflakeSourceBuilder {
            account: account.into(),
            username: username.into(),
            credentials: SnowflakeCredentials::PrivateKey(private_key_pem.into()),
            warehouse: None,
            role: None,
            database: None,
        }
    }
}

/// Convert one Arrow cell into the scalar value model
#[cfg(feature = "snowflake")]
fn arrow_value(array: &dyn Array, row: usize) -> Result<Value, FetchError> {
    if array.is_null(row) {
        return Ok(Value::Null);
    }

    match array.data_type() {
        DataType::Boolean => Ok(Value::Bool(array.as_boolean().value(row))),
        DataType::Int8 => Ok(Value::Int(array.as_primitive::<Int8Type>().value(row) as i64)),
        DataType::Int16 => Ok(Value::Int(
            array.as_primitive::<Int16Type>().value(row) as i64
        )),
        DataType::Int32 => Ok(Value::Int(
            array.as_primitive::<Int32Type>().value(row) as i64
        )),
        DataType::Int64 => Ok(Value::Int(array.as_primitive::<Int64Type>().value(row))),
        DataType::Float32 => Ok(Value::Float(
            array.as_primitive::<Float32Type>().value(row) as f64,
        )),
        DataType::Float64 => Ok(Value::Float(array.as_primitive::<Float64Type>().value(row))),
        DataType::Utf8 => Ok(Value::Text(array.as_string::<i32>().value(row).to_string())),
        DataType::LargeUtf8 => Ok(Value::Text(array.as_string::<i64>().value(row).to_string())),
        DataType::Timestamp(unit, _) => {
            let timestamp = match unit {
                TimeUnit::Second => {
                    let v = array.as_primitive::<TimestampSecondType>().value(row);
                    DateTime::from_timestamp(v, 0)
                }
                TimeUnit::Millisecond => {
                    let v = array.as_primitive::<TimestampMillisecondType>().value(row);
                    DateTime::from_timestamp_millis(v)
                }
                TimeUnit::Microsecond => {
                    let v = array.as_primitive::<TimestampMicrosecondType>().value(row);
                    DateTime::from_timestamp_micros(v)
                }
                TimeUnit::Nanosecond => {
                    let v = array.as_primitive::<TimestampNanosecondType>().value(row);
                    Some(DateTime::from_timestamp_nanos(v))
                }
            };
            timestamp.map(Value::Timestamp).ok_or_else(|| {
                FetchError::InvalidResponse("timestamp out of representable range".to_string())
            })
        }
        DataType::Date32 => {
            let days = array.as_primitive::<Date32Type>().value(row);
            DateTime::from_timestamp(i64::from(days) * 86_400, 0)
                .map(Value::Timestamp)
                .ok_or_else(|| {
                    FetchError::InvalidResponse("date out of representable range".to_string())
                })
        }
        DataType::Decimal128(_, scale) => {
            let raw = array.as_primitive::<Decimal128Type>().value(row);
            Ok(Value::Float(decimal_to_float(raw, *scale)))
        }
        other => Err(FetchError::InvalidResponse(format!(
            "unsupported Arrow type {other} in result set"
        ))),
    }
}

/// Scale a raw Decimal128 mantissa down to a float
#[cfg(feature = "snowflake")]
fn decimal_to_float(raw: i128, scale: i8) -> f64 {
    (raw as f64) / 10f64.powi(i32::from(scale))
}

#[async_trait::async_trait]
impl RowSource for SnowflakeSource {
    fn name(&self) -> &'static str {
        "Snowflake"
    }

    #[cfg(feature = "snowflake")]
    async fn fetch_rows(&self, query: &str) -> Result<Vec<Row>, FetchError> {
        use snowflake_api::QueryResult;

        let result = self.api.exec(query).await.map_err(|e| {
            let err_str = e.to_string();
            if err_str.contains("Insufficient privileges") || err_str.contains("Permission") {
                FetchError::AuthenticationError(format!(
                    "Cannot query account {}: {}",
                    self.account, err_str
                ))
            } else {
                FetchError::QueryError(err_str)
            }
        })?;

        let mut rows = Vec::new();

        match result {
            QueryResult::Arrow(batches) => {
                for batch in batches {
                    let schema = batch.schema();
                    for row_idx in 0..batch.num_rows() {
                        let mut row = Row::new();
                        for (col_idx, field) in schema.fields().iter().enumerate() {
                            let value = arrow_value(batch.column(col_idx).as_ref(), row_idx)?;
                            row.insert(field.name().as_str(), value);
                        }
                        rows.push(row);
                    }
                }
            }
            QueryResult::Json(_) => {
                return Err(FetchError::InvalidResponse(
                    "Unexpected JSON result format".to_string(),
                ));
            }
            QueryResult::Empty => {}
        }

        Ok(rows)
    }

    #[cfg(not(feature = "snowflake"))]
    async fn fetch_rows(&self, _query: &str) -> Result<Vec<Row>, FetchError> {
        Err(FetchError::ConfigError(
            "Snowflake support not compiled. Rebuild with: cargo build --features snowflake"
                .to_string(),
        ))
    }

    #[cfg(feature = "snowflake")]
    async fn test_connection(&self) -> Result<(), FetchError> {
        self.api
            .exec("SELECT 1")
            .await
            .map_err(|e| FetchError::QueryError(format!("Connection test failed: {}", e)))?;
        Ok(())
    }

    #[cfg(not(feature = "snowflake"))]
    async fn test_connection(&self) -> Result<(), FetchError> {
        Err(FetchError::ConfigError(
            "Snowflake support not compiled. Rebuild with: cargo build --features snowflake"
                .to_string(),
        ))
    }

    #[cfg(feature = "snowflake")]
    async fn close(&mut self) -> Result<(), FetchError> {
        self.api.close_session().await.map_err(|e| {
            FetchError::NetworkError(format!("Failed to close Snowflake session: {}", e))
        })
    }
}
