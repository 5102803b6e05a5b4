//! Mock identity source for testing.

use crate::traits::{
    AlertBatch, IdentitySource, RiskyUserBatch, SignInBatch, SourceError, SourceHealth,
    SourceQuery, SourceResult,
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

/// Mock identity source for testing.
pub struct MockIdentitySource {
    name: String,
    sign_ins: Arc<RwLock<Vec<Value>>>,
    alerts: Arc<RwLock<Vec<Value>>>,
    risky_users: Arc<RwLock<Vec<Value>>>,
    behavior: Arc<RwLock<MockBehavior>>,
    call_count: AtomicU64,
}

impl MockIdentitySource {
    /// Creates an empty mock identity source.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            sign_ins: Arc::new(RwLock::new(Vec::new())),
            alerts: Arc::new(RwLock::new(Vec::new())),
            risky_users: Arc::new(RwLock::new(Vec::new())),
            behavior: Arc::new(RwLock::new(MockBehavior::Normal)),
            call_count: AtomicU64::new(0),
        }
    }

    /// Creates a mock identity source pre-loaded with sample data.
    pub fn with_sample_data(name: &str) -> Self {
        let now = Utc::now();
        Self {
            name: name.to_string(),
            sign_ins: Arc::new(RwLock::new(Self::sample_sign_ins(now))),
            alerts: Arc::new(RwLock::new(Self::sample_alerts(now))),
            risky_users: Arc::new(RwLock::new(Self::sample_risky_users(now))),
            behavior: Arc::new(RwLock::new(MockBehavior::Normal)),
            call_count: AtomicU64::new(0),
        }
    }

    /// Replaces the sign-in records this mock serves.
    pub async fn set_sign_ins(&self, records: Vec<Value>) {
        *self.sign_ins.write().await = records;
    }

    /// Replaces the alert records this mock serves.
    pub async fn set_alerts(&self, records: Vec<Value>) {
        *self.alerts.write().await = records;
    }

    /// Replaces the risky-user records this mock serves.
    pub async fn set_risky_users(&self, records: Vec<Value>) {
        *self.risky_users.write().await = records;
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

    fn sample_sign_ins(now: DateTime<Utc>) -> Vec<Value> {
        vec![
            json!({
                "user_principal_name": "alice@example.com",
                "created_datetime": (now - Duration::minutes(30)).to_rfc3339(),
                "ip_address": "198.51.100.7",
                "location": {"country": "US"},
                "app_display_name": "Office 365",
                "status": {"error_code": 0}
            }),
            json!({
                "user_principal_name": "alice@example.com",
                "created_datetime": (now - Duration::minutes(20)).to_rfc3339(),
                "ip_address": "203.0.113.50",
                "location": {"country": "RO"},
                "app_display_name": "Azure Portal",
                "status": {"error_code": 50126}
            }),
            json!({
                "user_principal_name": "bob@example.com",
                "created_datetime": (now - Duration::minutes(10)).to_rfc3339(),
                "ip_address": "198.51.100.22",
                "location": {"country": "US"},
                "app_display_name": "Office 365",
                "status": {"error_code": 0}
            }),
        ]
    }

    fn sample_alerts(now: DateTime<Utc>) -> Vec<Value> {
        vec![json!({
            "id": "alert-2001",
            "title": "Impossible travel activity",
            "description": "Sign-ins from geographically distant locations within minutes",
            "severity": "medium",
            "created_datetime": (now - Duration::minutes(15)).to_rfc3339(),
            "user_principal_name": "alice@example.com"
        })]
    }

    fn sample_risky_users(now: DateTime<Utc>) -> Vec<Value> {
        vec![json!({
            "user_principal_name": "alice@example.com",
            "risk_level": "high",
            "risk_state": "atRisk",
            "risk_last_updated_datetime": (now - Duration::minutes(14)).to_rfc3339()
        })]
    }
}

#[async_trait]
impl IdentitySource for MockIdentitySource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get_sign_in_logs(&self, query: SourceQuery) -> SourceResult<SignInBatch> {
        self.check_behavior().await?;
        let records = self.sign_ins.read().await;
        let matched: Vec<Value> = records.iter().take(query.limit).cloned().collect();
        Ok(SignInBatch::from_records(matched))
    }

    async fn get_defender_alerts(&self, query: SourceQuery) -> SourceResult<AlertBatch> {
        self.check_behavior().await?;
        let records = self.alerts.read().await;
        let matched: Vec<Value> = records
            .iter()
            .filter(|record| match &query.severity {
                Some(severity) => record
                    .get("severity")
                    .and_then(Value::as_str)
                    .is_some_and(|s| s.eq_ignore_ascii_case(severity)),
                None => true,
            })
            .take(query.limit)
            .cloned()
            .collect();
        Ok(AlertBatch::from_records(matched))
    }

    async fn get_risky_users(&self) -> SourceResult<RiskyUserBatch> {
        self.check_behavior().await?;
        let records = self.risky_users.read().await;
        Ok(RiskyUserBatch::from_records(records.clone()))
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
