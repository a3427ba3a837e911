//! Analytics sinks.
//!
//! A sink is the push function the connector calls with
//! `(encoded_refinements, state, results)`. Any closure of the right shape
//! works; this module adds the error type and two ready-made sinks.

use crate::core::{ReportBuilder, StateSnapshot};
use std::io::Write;
use std::sync::{Arc, Mutex, PoisonError};

/// The callback a connector reports through.
pub type PushFunction =
    Box<dyn FnMut(&str, &StateSnapshot, &serde_json::Value) -> Result<(), SinkError> + Send>;

/// Errors a sink can return.
#[derive(Debug)]
pub enum SinkError {
    /// Writing the report failed
    Io(String),
    /// The report could not be serialized
    Serialization(String),
    /// The sink could not be set up
    Config(String),
    /// The analytics system rejected the report
    Rejected(String),
}

impl std::fmt::Display for SinkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SinkError::Io(msg) => write!(f, "Sink IO error: {msg}"),
            SinkError::Serialization(msg) => write!(f, "Sink serialization error: {msg}"),
            SinkError::Config(msg) => write!(f, "Sink config error: {msg}"),
            SinkError::Rejected(msg) => write!(f, "Report rejected: {msg}"),
        }
    }
}

impl std::error::Error for SinkError {}

/// Writes each report as one JSON line.
pub struct JsonLinesSink<W: Write + Send> {
    writer: Arc<Mutex<W>>,
    builder: ReportBuilder,
}

impl<W: Write + Send + 'static> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Arc::new(Mutex::new(writer)),
            builder: ReportBuilder::new(),
        }
    }

    /// Write one report line and flush.
    pub fn push(
        &self,
        encoded_refinements: &str,
        state: &StateSnapshot,
        results: &serde_json::Value,
    ) -> Result<(), SinkError> {
        let envelope = self.builder.build(encoded_refinements, state, results);
        let line =
            serde_json::to_string(&envelope).map_err(|e| SinkError::Serialization(e.to_string()))?;

        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        writeln!(writer, "{line}").map_err(|e| SinkError::Io(e.to_string()))?;
        writer.flush().map_err(|e| SinkError::Io(e.to_string()))?;
        Ok(())
    }

    /// Shared handle to the underlying writer.
    pub fn writer(&self) -> Arc<Mutex<W>> {
        Arc::clone(&self.writer)
    }

    /// Turn the sink into a connector push function.
    pub fn into_push_function(self) -> PushFunction {
        Box::new(move |encoded, state, results| self.push(encoded, state, results))
    }
}

/// HTTP endpoint configuration.
#[cfg(feature = "http-sink")]
#[derive(Debug, Clone)]
pub struct HttpSinkConfig {
    /// Endpoint receiving report envelopes via POST
    pub endpoint: String,
    /// Optional bearer authentication token
    pub token: Option<String>,
}

#[cfg(feature = "http-sink")]
impl HttpSinkConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            token: None,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }
}

/// Posts report envelopes to an analytics endpoint.
///
/// Delivery runs on the given runtime so the push function returns
/// immediately; delivery failures are logged, not returned.
#[cfg(feature = "http-sink")]
pub struct HttpSink {
    config: HttpSinkConfig,
    client: reqwest::Client,
    builder: ReportBuilder,
    runtime: tokio::runtime::Handle,
}

#[cfg(feature = "http-sink")]
impl HttpSink {
    pub fn new(
        config: HttpSinkConfig,
        runtime: tokio::runtime::Handle,
    ) -> Result<Self, SinkError> {
        if config.endpoint.trim().is_empty() {
            return Err(SinkError::Config("endpoint must not be empty".to_string()));
        }

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .map_err(|e| SinkError::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            config,
            client,
            builder: ReportBuilder::new(),
            runtime,
        })
    }

    /// Serialize the report and schedule its delivery.
    pub fn push(
        &self,
        encoded_refinements: &str,
        state: &StateSnapshot,
        results: &serde_json::Value,
    ) -> Result<(), SinkError> {
        let envelope = self.builder.build(encoded_refinements, state, results);
        let body =
            serde_json::to_vec(&envelope).map_err(|e| SinkError::Serialization(e.to_string()))?;

        let mut request = self
            .client
            .post(&self.config.endpoint)
            .header("Content-Type", "application/json")
            .body(body);
        if let Some(ref token) = self.config.token {
            request = request.header("Authorization", format!("Bearer {token}"));
        }

        let report_id = envelope.report_id;
        self.runtime.spawn(async move {
            match request.send().await {
                Ok(response) if response.status().is_success() => {
                    tracing::debug!(%report_id, "Report delivered");
                }
                Ok(response) => {
                    let status = response.status();
                    let message = response
                        .text()
                        .await
                        .unwrap_or_else(|_| "Unknown error".to_string());
                    tracing::warn!(%report_id, "Analytics endpoint returned {status}: {message}");
                }
                Err(e) => {
                    tracing::warn!(%report_id, "Report delivery failed: {e}");
                }
            }
        });

        Ok(())
    }

    /// Turn the sink into a connector push function.
    pub fn into_push_function(self) -> PushFunction {
        Box::new(move |encoded, state, results| self.push(encoded, state, results))
    }
}
