//! Vendor record normalization.
//!
//! One function per record shape, each an explicit field map from the
//! vendor payload to [`Incident`]. Missing optional fields resolve to the
//! defaults listed on each function; a missing id resolves to "" and still
//! produces an incident. `raw_data` always carries the unmodified input.

use crate::incident::{Incident, Source};
use serde_json::Value;

fn str_or<'a>(value: &'a Value, key: &str, default: &'a str) -> &'a str {
    value.get(key).and_then(Value::as_str).unwrap_or(default)
}

fn opt_str(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_string)
}

/// Normalizes an endpoint detection.
///
/// Field map: id `detection_id`, title `behaviors[0].scenario` → "Unknown",
/// description `behaviors[0].description` → "", severity
/// `max_severity_displayname` → "Unknown", timestamp `first_behavior`.
pub fn endpoint_detection(record: &Value) -> Incident {
    let behavior = record
        .get("behaviors")
        .and_then(|b| b.get(0))
        .cloned()
        .unwrap_or(Value::Null);

    Incident {
        id: str_or(record, "detection_id", "").to_string(),
        title: str_or(&behavior, "scenario", "Unknown").to_string(),
        description: str_or(&behavior, "description", "").to_string(),
        severity: str_or(record, "max_severity_displayname", "Unknown").to_string(),
        source: Source::Endpoint,
        timestamp: opt_str(record, "first_behavior"),
        raw_data: record.clone(),
    }
}

/// Normalizes an endpoint incident.
///
/// Field map: id `incident_id`, title `name` → "Unnamed Incident",
/// description `description` → "", severity `state` → "Unknown",
/// timestamp `start`.
pub fn endpoint_incident(record: &Value) -> Incident {
    Incident {
        id: str_or(record, "incident_id", "").to_string(),
        title: str_or(record, "name", "Unnamed Incident").to_string(),
        description: str_or(record, "description", "").to_string(),
        severity: str_or(record, "state", "Unknown").to_string(),
        source: Source::Endpoint,
        timestamp: opt_str(record, "start"),
        raw_data: record.clone(),
    }
}

/// Normalizes an identity-provider alert.
///
/// Field map: id `id`, title `title` → "Unknown Alert", description
/// `description` → "", severity `severity` → "Unknown", timestamp
/// `created_datetime`.
pub fn identity_alert(record: &Value) -> Incident {
    Incident {
        id: str_or(record, "id", "").to_string(),
        title: str_or(record, "title", "Unknown Alert").to_string(),
        description: str_or(record, "description", "").to_string(),
        severity: str_or(record, "severity", "Unknown").to_string(),
        source: Source::Identity,
        timestamp: opt_str(record, "created_datetime"),
        raw_data: record.clone(),
    }
}

/// Normalizes a blocked email message, or drops it.
///
/// Only `threatType` url / attachment records are converted; everything
/// else returns `None` (filtering, not failure). Field map: id `GUID`,
/// title "Malicious Email Blocked: {threatType}", description `subject` →
/// "", severity hardcoded "High" (the vendor payload carries no comparable
/// severity), timestamp `messageTime`.
pub fn email_blocked_message(record: &Value) -> Option<Incident> {
    let threat_type = record.get("threatType").and_then(Value::as_str)?;
    if !matches!(threat_type, "url" | "attachment") {
        return None;
    }

    Some(Incident {
        id: str_or(record, "GUID", "").to_string(),
        title: format!("Malicious Email Blocked: {threat_type}"),
        description: str_or(record, "subject", "").to_string(),
        severity: "High".to_string(),
        source: Source::Email,
        timestamp: opt_str(record, "messageTime"),
        raw_data: record.clone(),
    })
}
