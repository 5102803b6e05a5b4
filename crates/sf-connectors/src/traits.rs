//! Source trait definitions for Sentinel Fuse.
//!
//! Defines the interfaces every telemetry source implements, plus the
//! envelope types those interfaces carry. Records inside an envelope stay
//! loosely typed (`serde_json::Value`) because vendor payload shapes vary
//! and the normalizer owns the field-level mapping.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Errors that can occur in source adapters.
#[derive(Error, Debug, Clone)]
pub enum SourceError {
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Rate limited: retry after {0} seconds")]
    RateLimited(u64),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Timeout: {0}")]
    Timeout(String),
}

/// Result type for source operations.
pub type SourceResult<T> = Result<T, SourceError>;

/// Health status of a source.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SourceHealth {
    /// Source is reachable and serving data.
    Healthy,
    /// Source is reachable but impaired.
    Degraded(String),
    /// Source is not operational.
    Unhealthy(String),
    /// Health has not been established.
    Unknown,
}

/// Query parameters shared by detection, incident, alert, and sign-in
/// lookups.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceQuery {
    /// ISO 8601 timestamp lower bound, if any.
    pub start_time: Option<String>,
    /// Vendor severity filter, if any.
    pub severity: Option<String>,
    /// Maximum number of records to return.
    pub limit: usize,
}

impl Default for SourceQuery {
    fn default() -> Self {
        Self {
            start_time: None,
            severity: None,
            limit: 100,
        }
    }
}

impl SourceQuery {
    pub fn with_start_time(mut self, start_time: impl Into<String>) -> Self {
        self.start_time = Some(start_time.into());
        self
    }

    pub fn with_severity(mut self, severity: impl Into<String>) -> Self {
        self.severity = Some(severity.into());
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }
}

/// A UTC time window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    /// The window covering the last `hours` hours, ending now.
    pub fn last_hours(hours: i64) -> Self {
        let end = Utc::now();
        Self {
            start: end - Duration::hours(hours),
            end,
        }
    }

    /// The window covering the last `days` days, ending now.
    pub fn last_days(days: i64) -> Self {
        let end = Utc::now();
        Self {
            start: end - Duration::days(days),
            end,
        }
    }

    /// The window start as an ISO 8601 string, for vendor query filters.
    pub fn start_iso8601(&self) -> String {
        self.start.to_rfc3339()
    }
}

/// Envelope for EDR detections: records plus a count, or an error marker
/// with no records.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DetectionBatch {
    #[serde(default)]
    pub detections: Vec<Value>,
    #[serde(default)]
    pub count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DetectionBatch {
    pub fn from_records(detections: Vec<Value>) -> Self {
        let count = detections.len();
        Self {
            detections,
            count,
            error: None,
        }
    }

    pub fn from_error(error: impl Into<String>) -> Self {
        Self {
            detections: Vec::new(),
            count: 0,
            error: Some(error.into()),
        }
    }
}

/// Envelope for EDR incidents.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IncidentBatch {
    #[serde(default)]
    pub incidents: Vec<Value>,
    #[serde(default)]
    pub count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl IncidentBatch {
    pub fn from_records(incidents: Vec<Value>) -> Self {
        let count = incidents.len();
        Self {
            incidents,
            count,
            error: None,
        }
    }

    pub fn from_error(error: impl Into<String>) -> Self {
        Self {
            incidents: Vec::new(),
            count: 0,
            error: Some(error.into()),
        }
    }
}

/// Envelope for identity-provider security alerts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AlertBatch {
    #[serde(default)]
    pub alerts: Vec<Value>,
    #[serde(default)]
    pub count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AlertBatch {
    pub fn from_records(alerts: Vec<Value>) -> Self {
        let count = alerts.len();
        Self {
            alerts,
            count,
            error: None,
        }
    }

    pub fn from_error(error: impl Into<String>) -> Self {
        Self {
            alerts: Vec::new(),
            count: 0,
            error: Some(error.into()),
        }
    }
}

/// Envelope for identity sign-in logs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SignInBatch {
    #[serde(default)]
    pub sign_ins: Vec<Value>,
    #[serde(default)]
    pub count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SignInBatch {
    pub fn from_records(sign_ins: Vec<Value>) -> Self {
        let count = sign_ins.len();
        Self {
            sign_ins,
            count,
            error: None,
        }
    }

    pub fn from_error(error: impl Into<String>) -> Self {
        Self {
            sign_ins: Vec::new(),
            count: 0,
            error: Some(error.into()),
        }
    }
}

/// Envelope for risky-user reports.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RiskyUserBatch {
    #[serde(default)]
    pub risky_users: Vec<Value>,
    #[serde(default)]
    pub count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RiskyUserBatch {
    pub fn from_records(risky_users: Vec<Value>) -> Self {
        let count = risky_users.len();
        Self {
            risky_users,
            count,
            error: None,
        }
    }

    pub fn from_error(error: impl Into<String>) -> Self {
        Self {
            risky_users: Vec::new(),
            count: 0,
            error: Some(error.into()),
        }
    }
}

/// Envelope for email-gateway SIEM events, partitioned by disposition.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SiemEventBatch {
    #[serde(default)]
    pub messages_blocked: Vec<Value>,
    #[serde(default)]
    pub messages_delivered: Vec<Value>,
    #[serde(default)]
    pub clicks_blocked: Vec<Value>,
    #[serde(default)]
    pub clicks_permitted: Vec<Value>,
    #[serde(default)]
    pub total_events: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SiemEventBatch {
    pub fn from_error(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::default()
        }
    }

    /// Recomputes `total_events` from the four partitions.
    pub fn with_totals(mut self) -> Self {
        self.total_events = self.messages_blocked.len()
            + self.messages_delivered.len()
            + self.clicks_blocked.len()
            + self.clicks_permitted.len();
        self
    }
}

/// Envelope for the most frequent malicious-URL clickers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TopClickerBatch {
    #[serde(default)]
    pub top_clickers: Vec<Value>,
    #[serde(default)]
    pub count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TopClickerBatch {
    pub fn from_records(top_clickers: Vec<Value>) -> Self {
        let count = top_clickers.len();
        Self {
            top_clickers,
            count,
            error: None,
        }
    }

    pub fn from_error(error: impl Into<String>) -> Self {
        Self {
            top_clickers: Vec::new(),
            count: 0,
            error: Some(error.into()),
        }
    }
}

/// Envelope for the very-attacked-people report.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VapBatch {
    #[serde(default)]
    pub very_attacked_people: Vec<Value>,
    #[serde(default)]
    pub count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl VapBatch {
    pub fn from_records(very_attacked_people: Vec<Value>) -> Self {
        let count = very_attacked_people.len();
        Self {
            very_attacked_people,
            count,
            error: None,
        }
    }

    pub fn from_error(error: impl Into<String>) -> Self {
        Self {
            very_attacked_people: Vec::new(),
            count: 0,
            error: Some(error.into()),
        }
    }
}

/// Endpoint detection and response source.
#[async_trait]
pub trait EndpointSource: Send + Sync {
    /// Returns the source name, for logging and error attribution.
    fn name(&self) -> &str;

    /// Fetches EDR detections matching `query`.
    async fn get_detections(&self, query: SourceQuery) -> SourceResult<DetectionBatch>;

    /// Fetches EDR incidents matching `query`.
    async fn get_incidents(&self, query: SourceQuery) -> SourceResult<IncidentBatch>;

    /// Checks source health.
    async fn health_check(&self) -> SourceResult<SourceHealth>;
}

/// Identity-provider source.
#[async_trait]
pub trait IdentitySource: Send + Sync {
    /// Returns the source name, for logging and error attribution.
    fn name(&self) -> &str;

    /// Fetches sign-in logs matching `query`.
    async fn get_sign_in_logs(&self, query: SourceQuery) -> SourceResult<SignInBatch>;

    /// Fetches identity-protection security alerts matching `query`.
    async fn get_defender_alerts(&self, query: SourceQuery) -> SourceResult<AlertBatch>;

    /// Fetches users currently flagged as risky.
    async fn get_risky_users(&self) -> SourceResult<RiskyUserBatch>;

    /// Checks source health.
    async fn health_check(&self) -> SourceResult<SourceHealth>;
}

/// Email security gateway source.
#[async_trait]
pub trait EmailSource: Send + Sync {
    /// Returns the source name, for logging and error attribution.
    fn name(&self) -> &str;

    /// Fetches SIEM events for an ISO 8601 duration window such as `PT1H`.
    /// `threat_type` filters to url / attachment / messageText;
    /// `threat_status` filters to active / cleared / falsePositive.
    async fn get_siem_events(
        &self,
        interval: &str,
        threat_type: Option<&str>,
        threat_status: Option<&str>,
    ) -> SourceResult<SiemEventBatch>;

    /// Fetches the users who clicked malicious URLs most often over the
    /// trailing window.
    async fn get_top_clickers(&self, window_days: u32) -> SourceResult<TopClickerBatch>;

    /// Fetches the most-targeted users over the trailing window.
    async fn get_vap_report(&self, window_days: u32) -> SourceResult<VapBatch>;

    /// Checks source health.
    async fn health_check(&self) -> SourceResult<SourceHealth>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_source_query_defaults() {
        let query = SourceQuery::default();
        assert!(query.start_time.is_none());
        assert!(query.severity.is_none());
        assert_eq!(query.limit, 100);
    }

    #[test]
    fn test_source_query_builders() {
        let query = SourceQuery::default()
            .with_start_time("2026-08-01T00:00:00Z")
            .with_severity("High")
            .with_limit(25);
        assert_eq!(query.start_time.as_deref(), Some("2026-08-01T00:00:00Z"));
        assert_eq!(query.severity.as_deref(), Some("High"));
        assert_eq!(query.limit, 25);
    }

    #[test]
    fn test_time_range_last_hours() {
        let range = TimeRange::last_hours(24);
        let span = range.end - range.start;
        assert_eq!(span.num_hours(), 24);
    }

    #[test]
    fn test_detection_batch_from_records_sets_count() {
        let batch = DetectionBatch::from_records(vec![json!({"detection_id": "d1"})]);
        assert_eq!(batch.count, 1);
        assert!(batch.error.is_none());
    }

    #[test]
    fn test_error_batch_is_empty() {
        let batch = DetectionBatch::from_error("connection refused");
        assert_eq!(batch.count, 0);
        assert!(batch.detections.is_empty());
        assert_eq!(batch.error.as_deref(), Some("connection refused"));
    }

    #[test]
    fn test_siem_batch_totals() {
        let batch = SiemEventBatch {
            messages_blocked: vec![json!({}), json!({})],
            clicks_blocked: vec![json!({})],
            ..Default::default()
        }
        .with_totals();
        assert_eq!(batch.total_events, 3);
    }

    #[test]
    fn test_envelope_serde_round_trip() {
        let batch = AlertBatch::from_records(vec![json!({"id": "a1"})]);
        let text = serde_json::to_string(&batch).unwrap();
        assert!(!text.contains("error"));
        let back: AlertBatch = serde_json::from_str(&text).unwrap();
        assert_eq!(back.count, 1);
    }
}
