//! Mock endpoint source for testing.
//!
//! Serves configurable vendor-shaped detection and incident records, with
//! failure injection and call recording for test verification.

use crate::traits::{
    DetectionBatch, EndpointSource, IncidentBatch, SourceError, SourceHealth, SourceQuery,
    SourceResult,
};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Behavior configuration for failure injection.
#[derive(Debug, Clone, Default)]
pub enum MockBehavior {
    /// Normal operation.
    #[default]
    Normal,
    /// Fail after N calls.
    FailAfter { calls: u64, error: SourceError },
    /// Always fail.
    AlwaysFail(SourceError),
    /// Report unhealthy from health checks.
    Unhealthy(String),
}

/// Mock endpoint source for testing.
pub struct MockEndpointSource {
    name: String,
    detections: Arc<RwLock<Vec<Value>>>,
    incidents: Arc<RwLock<Vec<Value>>>,
    behavior: Arc<RwLock<MockBehavior>>,
    call_count: AtomicU64,
}

impl MockEndpointSource {
    /// Creates an empty mock endpoint source.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            detections: Arc::new(RwLock::new(Vec::new())),
            incidents: Arc::new(RwLock::new(Vec::new())),
            behavior: Arc::new(RwLock::new(MockBehavior::Normal)),
            call_count: AtomicU64::new(0),
        }
    }

    /// Creates a mock endpoint source pre-loaded with sample data.
    pub fn with_sample_data(name: &str) -> Self {
        let now = Utc::now();
        Self {
            name: name.to_string(),
            detections: Arc::new(RwLock::new(Self::sample_detections(now))),
            incidents: Arc::new(RwLock::new(Self::sample_incidents(now))),
            behavior: Arc::new(RwLock::new(MockBehavior::Normal)),
            call_count: AtomicU64::new(0),
        }
    }

    /// Replaces the detection records this mock serves.
    pub async fn set_detections(&self, records: Vec<Value>) {
        *self.detections.write().await = records;
    }

    /// Replaces the incident records this mock serves.
    pub async fn set_incidents(&self, records: Vec<Value>) {
        *self.incidents.write().await = records;
    }

    /// Sets the behavior for failure injection.
    pub async fn set_behavior(&self, behavior: MockBehavior) {
        *self.behavior.write().await = behavior;
    }

    /// Returns the number of API calls made to this mock.
    pub fn call_count(&self) -> u64 {
        self.call_count.load(Ordering::SeqCst)
    }

    async fn check_behavior(&self) -> SourceResult<()> {
        let count = self.call_count.fetch_add(1, Ordering::SeqCst) + 1;
        let behavior = self.behavior.read().await;
        match &*behavior {
            MockBehavior::Normal | MockBehavior::Unhealthy(_) => Ok(()),
            MockBehavior::AlwaysFail(error) => Err(error.clone()),
            MockBehavior::FailAfter { calls, error } => {
                if count > *calls {
                    Err(error.clone())
                } else {
                    Ok(())
                }
            }
        }
    }

    fn apply_query(records: &[Value], query: &SourceQuery, severity_field: &str) -> Vec<Value> {
        records
            .iter()
            .filter(|record| match &query.severity {
                Some(severity) => record
                    .get(severity_field)
                    .and_then(Value::as_str)
                    .is_some_and(|s| s.eq_ignore_ascii_case(severity)),
                None => true,
            })
            .take(query.limit)
            .cloned()
            .collect()
    }

    fn sample_detections(now: DateTime<Utc>) -> Vec<Value> {
        vec![
            json!({
                "detection_id": "ldt:abc123:456",
                "behaviors": [{
                    "scenario": "suspicious_activity",
                    "description": "PowerShell executed an encoded command with network callbacks"
                }],
                "max_severity_displayname": "High",
                "first_behavior": (now - Duration::minutes(12)).to_rfc3339(),
                "device": {"hostname": "workstation-001"}
            }),
            json!({
                "detection_id": "ldt:def456:789",
                "behaviors": [{
                    "scenario": "known_malware",
                    "description": "Process matched a known malware hash"
                }],
                "max_severity_displayname": "Critical",
                "first_behavior": (now - Duration::minutes(4)).to_rfc3339(),
                "device": {"hostname": "server-001"}
            }),
        ]
    }

    fn sample_incidents(now: DateTime<Utc>) -> Vec<Value> {
        vec![json!({
            "incident_id": "inc:abc123:1001",
            "name": "Lateral movement from workstation-001",
            "description": "Multiple hosts contacted over SMB within five minutes",
            "state": "open",
            "start": (now - Duration::hours(1)).to_rfc3339()
        })]
    }
}

#[async_trait]
impl EndpointSource for MockEndpointSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get_detections(&self, query: SourceQuery) -> SourceResult<DetectionBatch> {
        self.check_behavior().await?;
        let records = self.detections.read().await;
        let matched = Self::apply_query(&records, &query, "max_severity_displayname");
        Ok(DetectionBatch::from_records(matched))
    }

    async fn get_incidents(&self, query: SourceQuery) -> SourceResult<IncidentBatch> {
        self.check_behavior().await?;
        let records = self.incidents.read().await;
        let matched: Vec<Value> = records.iter().take(query.limit).cloned().collect();
        Ok(IncidentBatch::from_records(matched))
    }

    async fn health_check(&self) -> SourceResult<SourceHealth> {
        let behavior = self.behavior.read().await;
        match &*behavior {
            MockBehavior::Unhealthy(reason) => Ok(SourceHealth::Unhealthy(reason.clone())),
            MockBehavior::AlwaysFail(error) => Err(error.clone()),
            _ => Ok(SourceHealth::Healthy),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sample_data_served() {
        let source = MockEndpointSource::with_sample_data("edr");
        let batch = source.get_detections(SourceQuery::default()).await.unwrap();
        assert_eq!(batch.count, 2);
        assert!(batch.error.is_none());
    }

    #[tokio::test]
    async fn test_severity_filter() {
        let source = MockEndpointSource::with_sample_data("edr");
        let query = SourceQuery::default().with_severity("Critical");
        let batch = source.get_detections(query).await.unwrap();
        assert_eq!(batch.count, 1);
        assert_eq!(
            batch.detections[0]["max_severity_displayname"],
            "Critical"
        );
    }

    #[tokio::test]
    async fn test_limit_applied() {
        let source = MockEndpointSource::with_sample_data("edr");
        let batch = source
            .get_detections(SourceQuery::default().with_limit(1))
            .await
            .unwrap();
        assert_eq!(batch.count, 1);
    }

    #[tokio::test]
    async fn test_fail_after() {
        let source = MockEndpointSource::with_sample_data("edr");
        source
            .set_behavior(MockBehavior::FailAfter {
                calls: 1,
                error: SourceError::ConnectionFailed("gone".to_string()),
            })
            .await;

        assert!(source.get_detections(SourceQuery::default()).await.is_ok());
        assert!(source.get_incidents(SourceQuery::default()).await.is_err());
        assert_eq!(source.call_count(), 2);
    }

    #[tokio::test]
    async fn test_unhealthy_behavior() {
        let source = MockEndpointSource::new("edr");
        source
            .set_behavior(MockBehavior::Unhealthy("maintenance".to_string()))
            .await;
        let health = source.health_check().await.unwrap();
        assert_eq!(health, SourceHealth::Unhealthy("maintenance".to_string()));
    }
}
