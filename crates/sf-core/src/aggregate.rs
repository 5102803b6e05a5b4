//! Cross-source incident aggregation.
//!
//! Fuses one result payload per source into a single ordered incident
//! sequence: endpoint detections, endpoint incidents, identity alerts,
//! email events. No cross-source deduplication. A failed source
//! contributes zero incidents and a visible per-source error string; the
//! aggregate itself never fails.

use crate::incident::Incident;
use crate::normalize;
use metrics::counter;
use serde::{Deserialize, Serialize};
use sf_connectors::{
    AlertBatch, DetectionBatch, EmailSource, EndpointSource, IdentitySource, IncidentBatch,
    SiemEventBatch, SourceQuery, SourceResult,
};
use sf_observability::metrics::{INCIDENTS_AGGREGATED, SOURCE_ERRORS};
use tracing::{debug, instrument, warn};

/// Per-source contribution to an aggregate.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceSlice {
    /// Number of incidents this source contributed.
    pub included: usize,
    /// Error string when the source failed; the slice is then empty.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SourceSlice {
    fn ok(included: usize) -> Self {
        Self {
            included,
            error: None,
        }
    }

    fn failed(error: String) -> Self {
        Self {
            included: 0,
            error: Some(error),
        }
    }
}

/// The fused incident sequence plus per-source accounting.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AggregateResult {
    pub incidents: Vec<Incident>,
    pub detections: SourceSlice,
    pub endpoint_incidents: SourceSlice,
    pub identity_alerts: SourceSlice,
    pub email_events: SourceSlice,
}

impl AggregateResult {
    /// Error strings from every failed source, in source order.
    pub fn source_errors(&self) -> Vec<&str> {
        [
            &self.detections,
            &self.endpoint_incidents,
            &self.identity_alerts,
            &self.email_events,
        ]
        .into_iter()
        .filter_map(|slice| slice.error.as_deref())
        .collect()
    }
}

/// Fuses per-source payloads into normalized incidents.
pub struct Aggregator;

impl Aggregator {
    /// Aggregates one payload per source.
    ///
    /// Each argument is either a transport failure (`Err`) or an envelope
    /// that may itself carry an `error` marker; both count as a failed
    /// slice. Ordering and filtering follow the normalizer rules.
    #[instrument(skip_all)]
    pub fn aggregate(
        detections: SourceResult<DetectionBatch>,
        endpoint_incidents: SourceResult<IncidentBatch>,
        identity_alerts: SourceResult<AlertBatch>,
        email_events: SourceResult<SiemEventBatch>,
    ) -> AggregateResult {
        let mut result = AggregateResult::default();

        result.detections = match detections {
            Ok(batch) => match batch.error {
                Some(error) => Self::failed_slice("endpoint_detections", error),
                None => {
                    let before = result.incidents.len();
                    result
                        .incidents
                        .extend(batch.detections.iter().map(normalize::endpoint_detection));
                    SourceSlice::ok(result.incidents.len() - before)
                }
            },
            Err(err) => Self::failed_slice("endpoint_detections", err.to_string()),
        };

        result.endpoint_incidents = match endpoint_incidents {
            Ok(batch) => match batch.error {
                Some(error) => Self::failed_slice("endpoint_incidents", error),
                None => {
                    let before = result.incidents.len();
                    result
                        .incidents
                        .extend(batch.incidents.iter().map(normalize::endpoint_incident));
                    SourceSlice::ok(result.incidents.len() - before)
                }
            },
            Err(err) => Self::failed_slice("endpoint_incidents", err.to_string()),
        };

        result.identity_alerts = match identity_alerts {
            Ok(batch) => match batch.error {
                Some(error) => Self::failed_slice("identity_alerts", error),
                None => {
                    let before = result.incidents.len();
                    result
                        .incidents
                        .extend(batch.alerts.iter().map(normalize::identity_alert));
                    SourceSlice::ok(result.incidents.len() - before)
                }
            },
            Err(err) => Self::failed_slice("identity_alerts", err.to_string()),
        };

        result.email_events = match email_events {
            Ok(batch) => match batch.error {
                Some(error) => Self::failed_slice("email_events", error),
                None => {
                    let before = result.incidents.len();
                    result.incidents.extend(
                        batch
                            .messages_blocked
                            .iter()
                            .filter_map(normalize::email_blocked_message),
                    );
                    SourceSlice::ok(result.incidents.len() - before)
                }
            },
            Err(err) => Self::failed_slice("email_events", err.to_string()),
        };

        counter!(INCIDENTS_AGGREGATED).increment(result.incidents.len() as u64);
        debug!(
            total = result.incidents.len(),
            errors = result.source_errors().len(),
            "aggregated incidents"
        );
        result
    }

    /// Pulls fresh payloads from the three sources concurrently and
    /// aggregates them. `interval` is the email SIEM window (ISO 8601
    /// duration).
    pub async fn collect(
        endpoint: &dyn EndpointSource,
        identity: &dyn IdentitySource,
        email: &dyn EmailSource,
        query: SourceQuery,
        interval: &str,
    ) -> AggregateResult {
        let (detections, incidents, alerts, siem) = tokio::join!(
            endpoint.get_detections(query.clone()),
            endpoint.get_incidents(query.clone()),
            identity.get_defender_alerts(query),
            email.get_siem_events(interval, None, None),
        );
        Self::aggregate(detections, incidents, alerts, siem)
    }

    fn failed_slice(source: &'static str, error: String) -> SourceSlice {
        warn!(source, error = %error, "source contributed no incidents");
        counter!(SOURCE_ERRORS, "source" => source).increment(1);
        SourceSlice::failed(error)
    }
}
