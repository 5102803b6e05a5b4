//! End-to-end pipeline tests: collect from mock sources, aggregate, and
//! prioritize with and without a working model.

use serde_json::json;
use sf_connectors::email::MockEmailSource;
use sf_connectors::endpoint::{mock::MockBehavior, MockEndpointSource};
use sf_connectors::identity::MockIdentitySource;
use sf_connectors::{SiemEventBatch, SourceError, SourceQuery};
use sf_core::{Aggregator, Prioritizer, Source};
use sf_model::mock::MockModel;
use sf_model::ModelError;
use std::sync::Arc;

async fn seeded_sources() -> (MockEndpointSource, MockIdentitySource, MockEmailSource) {
    let endpoint = MockEndpointSource::new("edr");
    endpoint
        .set_detections(vec![json!({
            "detection_id": "ldt:42",
            "behaviors": [{"scenario": "credential_theft", "description": "lsass access"}],
            "max_severity_displayname": "High",
            "first_behavior": "2026-08-28T08:00:00Z"
        })])
        .await;

    let identity = MockIdentitySource::new("idp");
    identity
        .set_alerts(vec![json!({
            "id": "alert-7",
            "title": "Impossible travel",
            "description": "distant sign-ins",
            "severity": "medium",
            "created_datetime": "2026-08-28T08:30:00Z"
        })])
        .await;

    let email = MockEmailSource::new("gateway");
    email
        .set_siem_events(SiemEventBatch {
            messages_blocked: vec![json!({
                "GUID": "msg-9",
                "threatType": "attachment",
                "subject": "payroll update",
                "messageTime": "2026-08-28T08:45:00Z"
            })],
            ..Default::default()
        })
        .await;

    (endpoint, identity, email)
}

#[tokio::test]
async fn test_collect_aggregate_prioritize_with_model_down() {
    let (endpoint, identity, email) = seeded_sources().await;

    let aggregate =
        Aggregator::collect(&endpoint, &identity, &email, SourceQuery::default(), "PT1H").await;

    assert_eq!(aggregate.incidents.len(), 3);
    assert!(aggregate.source_errors().is_empty());
    // source ordering: detection, alert, email
    assert_eq!(aggregate.incidents[0].source, Source::Endpoint);
    assert_eq!(aggregate.incidents[1].source, Source::Identity);
    assert_eq!(aggregate.incidents[2].source, Source::Email);
    // email record forced to High
    assert_eq!(aggregate.incidents[2].severity, "High");

    let model = Arc::new(MockModel::failing(ModelError::Connection(
        "unreachable".to_string(),
    )));
    let prioritizer = Prioritizer::new(model);
    let analysis = prioritizer.analyze(&aggregate.incidents).await;

    assert!(analysis.fallback);
    assert!(analysis.campaigns.is_empty());

    // high bucket: the High detection and the forced-High email
    let high_ids: Vec<&str> = analysis
        .high_priority
        .iter()
        .filter_map(|v| v["id"].as_str())
        .collect();
    assert_eq!(high_ids, vec!["ldt:42", "msg-9"]);

    // medium bucket: exactly the identity alert
    let medium_ids: Vec<&str> = analysis
        .medium_priority
        .iter()
        .filter_map(|v| v["id"].as_str())
        .collect();
    assert_eq!(medium_ids, vec!["alert-7"]);

    assert!(analysis.low_priority.is_empty());
    assert_eq!(analysis.total(), aggregate.incidents.len());
}

#[tokio::test]
async fn test_failed_source_surfaces_error_without_aborting() {
    let (endpoint, identity, email) = seeded_sources().await;
    endpoint
        .set_behavior(MockBehavior::AlwaysFail(SourceError::AuthenticationFailed(
            "expired token".to_string(),
        )))
        .await;

    let aggregate =
        Aggregator::collect(&endpoint, &identity, &email, SourceQuery::default(), "PT1H").await;

    // identity and email still contribute
    assert_eq!(aggregate.incidents.len(), 2);
    // both endpoint calls failed, each with a visible error
    assert_eq!(aggregate.source_errors().len(), 2);
    assert!(aggregate
        .detections
        .error
        .as_deref()
        .unwrap()
        .contains("expired token"));
}

#[tokio::test]
async fn test_model_path_preserves_analysis_shape() {
    let (endpoint, identity, email) = seeded_sources().await;
    let aggregate =
        Aggregator::collect(&endpoint, &identity, &email, SourceQuery::default(), "PT1H").await;

    let model = Arc::new(MockModel::with_response(
        r#"{
            "high_priority": [
                {"id": "ldt:42", "ai_risk_score": 92,
                 "recommended_actions": ["isolate host"], "ai_reasoning": "credential theft"}
            ],
            "medium_priority": [{"id": "alert-7"}],
            "low_priority": [{"id": "msg-9"}],
            "campaigns": [
                {"name": "Credential harvest", "related_incidents": ["ldt:42", "alert-7"],
                 "description": "linked by user"}
            ]
        }"#,
    ));
    let prioritizer = Prioritizer::new(model);
    let analysis = prioritizer.analyze(&aggregate.incidents).await;

    assert!(!analysis.fallback);
    assert_eq!(analysis.total(), 3);
    assert_eq!(analysis.high_priority[0]["ai_risk_score"], 92);
    assert_eq!(analysis.campaigns[0].related_incidents.len(), 2);
}
