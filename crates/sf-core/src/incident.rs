//! Normalized incident and hunting event models.
//!
//! Incidents are cross-source value objects: the normalizer maps each
//! vendor-shaped record into one [`Incident`] and keeps the unmodified
//! original payload in `raw_data` for traceability. Events are the
//! ephemeral per-hunt representation of raw telemetry.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// The telemetry platform a record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Endpoint,
    Identity,
    Email,
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Endpoint => f.write_str("endpoint"),
            Source::Identity => f.write_str("identity"),
            Source::Email => f.write_str("email"),
        }
    }
}

/// A normalized security incident.
///
/// `(id, source)` uniquely identify an incident. `severity` stays free-text
/// because vendors disagree on casing and vocabulary; bucketing happens at
/// prioritization time. `raw_data` is always the unmodified source record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Incident {
    pub id: String,
    pub title: String,
    pub description: String,
    pub severity: String,
    pub source: Source,
    /// Vendor timestamp, ISO 8601, kept as-is.
    pub timestamp: Option<String>,
    pub raw_data: Value,
}

impl Incident {
    /// True when severity falls in the high bucket (Critical/High, any case
    /// the vendors actually emit).
    pub fn is_high_severity(&self) -> bool {
        matches!(self.severity.as_str(), "Critical" | "High" | "critical" | "high")
    }

    /// True when severity falls in the medium bucket.
    pub fn is_medium_severity(&self) -> bool {
        matches!(self.severity.as_str(), "Medium" | "medium")
    }
}

/// Categorization of raw hunt telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Detection,
    SignIn,
    Alert,
    Other,
}

/// One raw telemetry event, built per hunt and not persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Vendor timestamp, ISO 8601, kept as-is.
    pub timestamp: Option<String>,
    pub source: Source,
    pub event_type: EventType,
    pub data: Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_severity_buckets() {
        let mut incident = Incident {
            id: "d1".to_string(),
            title: "t".to_string(),
            description: String::new(),
            severity: "Critical".to_string(),
            source: Source::Endpoint,
            timestamp: None,
            raw_data: json!({}),
        };
        assert!(incident.is_high_severity());

        incident.severity = "medium".to_string();
        assert!(incident.is_medium_severity());
        assert!(!incident.is_high_severity());

        incident.severity = "informational".to_string();
        assert!(!incident.is_high_severity());
        assert!(!incident.is_medium_severity());
    }

    #[test]
    fn test_source_serializes_snake_case() {
        assert_eq!(serde_json::to_string(&Source::Endpoint).unwrap(), "\"endpoint\"");
        assert_eq!(Source::Email.to_string(), "email");
    }

    #[test]
    fn test_event_round_trip() {
        let event = Event {
            timestamp: Some("2026-08-28T10:00:00Z".to_string()),
            source: Source::Identity,
            event_type: EventType::SignIn,
            data: json!({"user_principal_name": "alice@example.com"}),
        };
        let text = serde_json::to_string(&event).unwrap();
        assert!(text.contains("\"sign_in\""));
        let back: Event = serde_json::from_str(&text).unwrap();
        assert_eq!(back.event_type, EventType::SignIn);
    }
}
