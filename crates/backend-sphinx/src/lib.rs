//! Sphinx/Manticore connection backend.
//!
//! Provides the `SearchConnection` trait and its HTTP implementation.
//! The trait is the seam the query executor runs against, so alternative
//! transports (native mysql41 protocol, test doubles) can be swapped in
//! without touching the query layer.

use std::future::Future;

use searchql_model::{Row, Value};
use thiserror::Error;

/// Errors from connection operations.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Statement execution failed: {0}")]
    QueryFailed(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Engine not available")]
    Unavailable,
}

/// Outcome of one successfully executed statement.
#[derive(Debug, Clone, Default)]
pub struct StatementResult {
    /// Fetched rows, keyed by column name.
    pub rows: Vec<Row>,
    /// Engine-reported affected/matched row count.
    pub affected: u64,
}

/// Trait for engine connections.
///
/// A connection prepares and executes one statement of dialect text at a
/// time and reports rows plus the affected-row count. Failures surface as
/// errors here; the query layer decides what to absorb.
pub trait SearchConnection {
    /// Execute a single statement.
    fn execute(
        &self,
        sql: &str,
    ) -> impl Future<Output = Result<StatementResult, ConnectionError>> + Send;

    /// Get the connection name for logging.
    fn name(&self) -> &'static str;
}

/// HTTP connection configuration.
#[derive(Debug, Clone)]
pub struct SphinxConfig {
    /// Base URL for the engine's HTTP SQL endpoint
    pub base_url: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for SphinxConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:9308".to_string(),
            timeout_secs: 30,
        }
    }
}

/// Connection over the engine's `/sql` HTTP endpoint.
pub struct HttpConnection {
    config: SphinxConfig,
    client: reqwest::Client,
}

impl HttpConnection {
    /// Create a new HTTP connection.
    pub fn new(config: SphinxConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self { config, client }
    }

    /// Check whether the engine answers at all.
    pub async fn health_check(&self) -> Result<(), ConnectionError> {
        let response = self
            .client
            .post(format!("{}/cli", self.config.base_url))
            .body("SHOW STATUS")
            .send()
            .await
            .map_err(|e| ConnectionError::Connection(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(ConnectionError::Unavailable)
        }
    }

    /// Parse a raw-mode `/sql` response into rows.
    ///
    /// Raw mode answers with an array of result objects, one per statement:
    /// `[{"columns": [...], "data": [{...}], "total": N, "error": "", ...}]`.
    fn parse_response(
        &self,
        response: serde_json::Value,
    ) -> Result<StatementResult, ConnectionError> {
        let result = response
            .as_array()
            .and_then(|results| results.first())
            .ok_or_else(|| ConnectionError::ParseError("Empty response".to_string()))?;

        if let Some(error) = result.get("error").and_then(|e| e.as_str()) {
            if !error.is_empty() {
                return Err(ConnectionError::QueryFailed(error.to_string()));
            }
        }

        let data = result
            .get("data")
            .and_then(|d| d.as_array())
            .ok_or_else(|| ConnectionError::ParseError("Missing data array".to_string()))?;

        let mut rows = Vec::with_capacity(data.len());
        for entry in data {
            let object = entry
                .as_object()
                .ok_or_else(|| ConnectionError::ParseError("Row is not an object".to_string()))?;

            let row: Row = object
                .iter()
                .map(|(column, cell)| (column.clone(), Value::from_json(cell)))
                .collect();
            rows.push(row);
        }

        let affected = result
            .get("total")
            .and_then(|t| t.as_u64())
            .unwrap_or(rows.len() as u64);

        Ok(StatementResult { rows, affected })
    }
}

impl SearchConnection for HttpConnection {
    async fn execute(&self, sql: &str) -> Result<StatementResult, ConnectionError> {
        tracing::trace!(sql = %sql, "sending statement");

        let response = self
            .client
            .post(format!("{}/sql", self.config.base_url))
            .query(&[("mode", "raw")])
            .body(format!("query={}", sql))
            .send()
            .await
            .map_err(|e| ConnectionError::Connection(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ConnectionError::QueryFailed(format!(
                "HTTP {}: {}",
                status, body
            )));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ConnectionError::ParseError(e.to_string()))?;

        self.parse_response(json)
    }

    fn name(&self) -> &'static str {
        "sphinx-http"
    }
}
