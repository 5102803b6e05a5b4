//! Mock email gateway source for testing.

use crate::traits::{
    EmailSource, SiemEventBatch, SourceError, SourceHealth, SourceResult, TopClickerBatch,
    VapBatch,
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
    #[default]
    Normal,
    FailAfter { calls: u64, error: SourceError },
    AlwaysFail(SourceError),
    Unhealthy(String),
}

/// Mock email gateway source for testing.
pub struct MockEmailSource {
    name: String,
    siem_events: Arc<RwLock<SiemEventBatch>>,
    top_clickers: Arc<RwLock<Vec<Value>>>,
    very_attacked_people: Arc<RwLock<Vec<Value>>>,
    behavior: Arc<RwLock<MockBehavior>>,
    call_count: AtomicU64,
}

impl MockEmailSource {
    /// Creates an empty mock email source.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            siem_events: Arc::new(RwLock::new(SiemEventBatch::default())),
            top_clickers: Arc::new(RwLock::new(Vec::new())),
            very_attacked_people: Arc::new(RwLock::new(Vec::new())),
            behavior: Arc::new(RwLock::new(MockBehavior::Normal)),
            call_count: AtomicU64::new(0),
        }
    }

    /// Creates a mock email source pre-loaded with sample data.
    pub fn with_sample_data(name: &str) -> Self {
        let now = Utc::now();
        Self {
            name: name.to_string(),
            siem_events: Arc::new(RwLock::new(Self::sample_siem_events(now))),
            top_clickers: Arc::new(RwLock::new(Self::sample_top_clickers())),
            very_attacked_people: Arc::new(RwLock::new(Self::sample_vap())),
            behavior: Arc::new(RwLock::new(MockBehavior::Normal)),
            call_count: AtomicU64::new(0),
        }
    }

    /// Replaces the SIEM event partitions this mock serves.
    pub async fn set_siem_events(&self, batch: SiemEventBatch) {
        *self.siem_events.write().await = batch.with_totals();
    }

    /// Replaces the top-clicker records this mock serves.
    pub async fn set_top_clickers(&self, records: Vec<Value>) {
        *self.top_clickers.write().await = records;
    }

    /// Replaces the very-attacked-people records this mock serves.
    pub async fn set_vap(&self, records: Vec<Value>) {
        *self.very_attacked_people.write().await = records;
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

    fn matches_threat_type(record: &Value, threat_type: Option<&str>) -> bool {
        match threat_type {
            Some(wanted) => record
                .get("threatType")
                .and_then(Value::as_str)
                .is_some_and(|t| t.eq_ignore_ascii_case(wanted)),
            None => true,
        }
    }

    fn matches_threat_status(record: &Value, threat_status: Option<&str>) -> bool {
        match threat_status {
            Some(wanted) => record
                .get("threatStatus")
                .and_then(Value::as_str)
                .is_some_and(|t| t.eq_ignore_ascii_case(wanted)),
            None => true,
        }
    }

    fn sample_siem_events(now: DateTime<Utc>) -> SiemEventBatch {
        SiemEventBatch {
            messages_blocked: vec![
                json!({
                    "GUID": "msg-guid-0001",
                    "threatType": "url",
                    "threatStatus": "active",
                    "subject": "Your invoice is attached",
                    "sender": "billing@phish.example",
                    "recipient": ["alice@example.com"],
                    "messageTime": (now - Duration::minutes(45)).to_rfc3339()
                }),
                json!({
                    "GUID": "msg-guid-0002",
                    "threatType": "attachment",
                    "threatStatus": "active",
                    "subject": "Updated payroll report",
                    "sender": "hr@phish.example",
                    "recipient": ["bob@example.com"],
                    "messageTime": (now - Duration::minutes(25)).to_rfc3339()
                }),
            ],
            messages_delivered: vec![json!({
                "GUID": "msg-guid-0003",
                "threatType": "messageText",
                "threatStatus": "cleared",
                "subject": "Quarterly survey",
                "messageTime": (now - Duration::minutes(90)).to_rfc3339()
            })],
            clicks_blocked: vec![json!({
                "GUID": "click-guid-0001",
                "url": "https://phish.example/login",
                "clickTime": (now - Duration::minutes(40)).to_rfc3339(),
                "recipient": "alice@example.com"
            })],
            clicks_permitted: vec![],
            ..Default::default()
        }
        .with_totals()
    }

    fn sample_top_clickers() -> Vec<Value> {
        vec![
            json!({
                "identity": {"emails": ["alice@example.com"]},
                "click_statistics": {"click_count": 7}
            }),
            json!({
                "identity": {"emails": ["bob@example.com"]},
                "click_statistics": {"click_count": 3}
            }),
        ]
    }

    fn sample_vap() -> Vec<Value> {
        vec![json!({
            "identity": {"emails": ["cfo@example.com"]},
            "threat_statistics": {"attack_index": 912}
        })]
    }
}

#[async_trait]
impl EmailSource for MockEmailSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get_siem_events(
        &self,
        _interval: &str,
        threat_type: Option<&str>,
        threat_status: Option<&str>,
    ) -> SourceResult<SiemEventBatch> {
        self.check_behavior().await?;
        let events = self.siem_events.read().await;

        let filter = |records: &[Value]| -> Vec<Value> {
            records
                .iter()
                .filter(|r| {
                    Self::matches_threat_type(r, threat_type)
                        && Self::matches_threat_status(r, threat_status)
                })
                .cloned()
                .collect()
        };

        Ok(SiemEventBatch {
            messages_blocked: filter(&events.messages_blocked),
            messages_delivered: filter(&events.messages_delivered),
            clicks_blocked: filter(&events.clicks_blocked),
            clicks_permitted: filter(&events.clicks_permitted),
            ..Default::default()
        }
        .with_totals())
    }

    async fn get_top_clickers(&self, _window_days: u32) -> SourceResult<TopClickerBatch> {
        self.check_behavior().await?;
        let records = self.top_clickers.read().await;
        Ok(TopClickerBatch::from_records(records.clone()))
    }

    async fn get_vap_report(&self, _window_days: u32) -> SourceResult<VapBatch> {
        self.check_behavior().await?;
        let records = self.very_attacked_people.read().await;
        Ok(VapBatch::from_records(records.clone()))
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
        let source = MockEmailSource::with_sample_data("gateway");
        let batch = source.get_siem_events("PT1H", None, None).await.unwrap();
        assert_eq!(batch.messages_blocked.len(), 2);
        assert_eq!(batch.messages_delivered.len(), 1);
        assert_eq!(batch.total_events, 4);
    }

    #[tokio::test]
    async fn test_threat_type_filter() {
        let source = MockEmailSource::with_sample_data("gateway");
        let batch = source
            .get_siem_events("PT1H", Some("attachment"), None)
            .await
            .unwrap();
        assert_eq!(batch.messages_blocked.len(), 1);
        assert_eq!(batch.messages_blocked[0]["threatType"], "attachment");
        assert!(batch.messages_delivered.is_empty());
    }

    #[tokio::test]
    async fn test_threat_status_filter() {
        let source = MockEmailSource::with_sample_data("gateway");
        let batch = source
            .get_siem_events("PT1H", None, Some("cleared"))
            .await
            .unwrap();
        assert!(batch.messages_blocked.is_empty());
        assert_eq!(batch.messages_delivered.len(), 1);
    }

    #[tokio::test]
    async fn test_top_clickers_and_vap() {
        let source = MockEmailSource::with_sample_data("gateway");
        let clickers = source.get_top_clickers(30).await.unwrap();
        assert_eq!(clickers.count, 2);
        let vap = source.get_vap_report(30).await.unwrap();
        assert_eq!(vap.count, 1);
    }

    #[tokio::test]
    async fn test_always_fail() {
        let source = MockEmailSource::with_sample_data("gateway");
        source
            .set_behavior(MockBehavior::AlwaysFail(SourceError::Timeout(
                "deadline exceeded".to_string(),
            )))
            .await;
        assert!(source.get_siem_events("PT1H", None, None).await.is_err());
    }
}
