//! Sign-in feature preparation.
//!
//! Aggregates raw sign-in events into per-user tabular features consumed
//! by detectors and hypothesis prompts.

use crate::incident::{Event, EventType};
use chrono::{DateTime, Timelike};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::collections::BTreeSet;

/// Mean login hour used when no event carries a parsable timestamp.
const DEFAULT_LOGIN_HOUR: f64 = 12.0;

/// Per-user sign-in behavior features.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignInFeatures {
    pub user_principal_name: String,
    pub mean_login_hour: f64,
    pub country_count: usize,
    pub ip_count: usize,
    pub app_count: usize,
    pub failed_count: usize,
    pub successful_count: usize,
}

#[derive(Default)]
struct UserSession {
    login_hours: Vec<u32>,
    countries: BTreeSet<String>,
    ips: BTreeSet<String>,
    apps: BTreeSet<String>,
    failed: usize,
    successful: usize,
}

/// Aggregates `sign_in` events into per-user features.
///
/// Non-sign-in events are ignored. Users are keyed by
/// `user_principal_name` ("unknown" when absent); output is sorted by
/// user.
pub fn prepare_signin_features(events: &[Event]) -> Vec<SignInFeatures> {
    let mut sessions: BTreeMap<String, UserSession> = BTreeMap::new();

    for event in events {
        if event.event_type != EventType::SignIn {
            continue;
        }
        let data = &event.data;
        let user = data
            .get("user_principal_name")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string();
        let session = sessions.entry(user).or_default();

        if let Some(hour) = event
            .timestamp
            .as_deref()
            .and_then(|ts| DateTime::parse_from_rfc3339(ts).ok())
            .map(|ts| ts.hour())
        {
            session.login_hours.push(hour);
        }

        if let Some(country) = data
            .get("location")
            .and_then(|l| l.get("country"))
            .and_then(Value::as_str)
        {
            session.countries.insert(country.to_string());
        }
        if let Some(ip) = data.get("ip_address").and_then(Value::as_str) {
            session.ips.insert(ip.to_string());
        }
        if let Some(app) = data.get("app_display_name").and_then(Value::as_str) {
            session.apps.insert(app.to_string());
        }

        let failed = data
            .get("status")
            .and_then(|s| s.get("error_code"))
            .and_then(Value::as_i64)
            .is_some_and(|code| code != 0);
        if failed {
            session.failed += 1;
        } else {
            session.successful += 1;
        }
    }

    sessions
        .into_iter()
        .map(|(user, session)| {
            let mean_login_hour = if session.login_hours.is_empty() {
                DEFAULT_LOGIN_HOUR
            } else {
                session.login_hours.iter().map(|h| *h as f64).sum::<f64>()
                    / session.login_hours.len() as f64
            };
            SignInFeatures {
                user_principal_name: user,
                mean_login_hour,
                country_count: session.countries.len(),
                ip_count: session.ips.len(),
                app_count: session.apps.len(),
                failed_count: session.failed,
                successful_count: session.successful,
            }
        })
        .collect()
}
