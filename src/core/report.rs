//! Report payloads handed to analytics sinks.
//!
//! [`Report`] is the in-memory result of encoding one snapshot. Sinks that
//! ship reports somewhere else wrap it in a [`ReportEnvelope`] built by
//! [`ReportBuilder`], which stamps producer and timing metadata.

use crate::core::change::comparison_key;
use crate::core::serializer::encode_state;
use crate::core::state::{SearchSnapshot, StateSnapshot};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The name of this producer.
pub const PRODUCER_NAME: &str = "search-analytics-connector";

/// A snapshot after encoding.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub encoded_refinements: String,
    pub query: String,
    pub raw_state: StateSnapshot,
    pub results: serde_json::Value,
}

impl Report {
    /// Encode a snapshot into a report.
    pub fn from_snapshot(snapshot: &SearchSnapshot) -> Self {
        Self {
            encoded_refinements: encode_state(&snapshot.state),
            query: snapshot.state.query.clone(),
            raw_state: snapshot.state.clone(),
            results: snapshot.results.clone(),
        }
    }

    /// Key used for duplicate suppression.
    pub fn comparison_key(&self) -> String {
        comparison_key(&self.query, &self.encoded_refinements)
    }
}

/// Producer metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportProducer {
    /// Name of the producing software
    pub name: String,
    /// Version of the producing software
    pub version: String,
    /// Unique instance identifier (UUID)
    pub instance_id: String,
}

/// Serialized form of a report as delivered to external systems.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportEnvelope {
    /// Unique report identifier
    pub report_id: String,
    pub producer: ReportProducer,
    /// Host the connector runs on
    pub device_id: String,
    /// When the sink was invoked (RFC3339)
    pub reported_at: String,
    pub query: String,
    pub encoded_refinements: String,
    pub state: StateSnapshot,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub results: serde_json::Value,
}

/// Builds envelopes with a stable per-process instance ID.
pub struct ReportBuilder {
    instance_id: String,
    device_id: String,
}

impl ReportBuilder {
    pub fn new() -> Self {
        let hostname = hostname::get()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        Self {
            instance_id: Uuid::new_v4().to_string(),
            device_id: format!("connector-{hostname}"),
        }
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Wrap the arguments a sink receives into an envelope.
    pub fn build(
        &self,
        encoded_refinements: &str,
        state: &StateSnapshot,
        results: &serde_json::Value,
    ) -> ReportEnvelope {
        ReportEnvelope {
            report_id: Uuid::new_v4().to_string(),
            producer: ReportProducer {
                name: PRODUCER_NAME.to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                instance_id: self.instance_id.clone(),
            },
            device_id: self.device_id.clone(),
            reported_at: Utc::now().to_rfc3339(),
            query: state.query.clone(),
            encoded_refinements: encoded_refinements.to_string(),
            state: state.clone(),
            results: results.clone(),
        }
    }
}

impl Default for ReportBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::state::NumericFilter;
    use serde_json::json;

    #[test]
    fn test_report_from_snapshot() {
        let mut state = StateSnapshot::new("lamp");
        state.numeric_refinements.insert("price", NumericFilter::AtMost(40.0));
        let snapshot = SearchSnapshot::new(state.clone(), json!({"nbHits": 12}));

        let report = Report::from_snapshot(&snapshot);
        assert_eq!(report.encoded_refinements, "price=price_to40");
        assert_eq!(report.query, "lamp");
        assert_eq!(report.raw_state, state);
        assert_eq!(report.comparison_key(), "Query: lamp, price=price_to40");
    }

    #[test]
    fn test_envelope_metadata() {
        let builder = ReportBuilder::new();
        let state = StateSnapshot::new("lamp");
        let envelope = builder.build("", &state, &json!({"nbHits": 3}));

        assert_eq!(envelope.producer.name, PRODUCER_NAME);
        assert_eq!(envelope.producer.instance_id, builder.instance_id());
        assert!(envelope.device_id.starts_with("connector-"));
        assert!(chrono::DateTime::parse_from_rfc3339(&envelope.reported_at).is_ok());

        let other = builder.build("", &state, &serde_json::Value::Null);
        assert_ne!(envelope.report_id, other.report_id);
    }

    #[test]
    fn test_envelope_serialization() {
        let builder = ReportBuilder::new();
        let mut state = StateSnapshot::new("lamp");
        state
            .facet_refinements
            .insert("color", vec!["red".to_string()]);

        let envelope = builder.build("color=color_red", &state, &serde_json::Value::Null);
        let value = serde_json::to_value(&envelope).unwrap();

        assert_eq!(value["encoded_refinements"], "color=color_red");
        assert_eq!(value["state"]["facetRefinements"]["color"][0], "red");
        assert!(value.get("results").is_none());
    }
}
