//! Network-behavior detectors.
//!
//! Each detector takes tabular network records plus explicit thresholds and
//! returns findings. Detectors are pure and synchronous; callers own data
//! collection and threshold configuration.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use uuid::Uuid;

/// One observed network connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkRecord {
    pub timestamp: DateTime<Utc>,
    pub source_host: String,
    pub destination_host: String,
    pub bytes_sent: u64,
}

/// One detector finding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    pub id: Uuid,
    pub title: String,
    pub detector: String,
    pub severity: String,
    /// MITRE ATT&CK tactic this finding maps under.
    pub tactic: String,
    pub hosts: Vec<String>,
    pub description: String,
    pub details: Value,
}

/// Per-edge statistics in the communication graph.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EdgeStats {
    pub connections: usize,
    pub bytes_sent: u64,
}

/// Host-to-host communication graph.
#[derive(Debug, Clone, Default)]
pub struct NetworkGraph {
    edges: HashMap<(String, String), EdgeStats>,
}

impl NetworkGraph {
    pub fn edge(&self, source: &str, destination: &str) -> Option<&EdgeStats> {
        self.edges
            .get(&(source.to_string(), destination.to_string()))
    }

    /// Distinct destinations contacted by `source`.
    pub fn destinations(&self, source: &str) -> BTreeSet<&str> {
        self.edges
            .keys()
            .filter(|(src, _)| src == source)
            .map(|(_, dst)| dst.as_str())
            .collect()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }
}

/// Builds the communication graph from raw records.
pub fn build_network_graph(records: &[NetworkRecord]) -> NetworkGraph {
    let mut graph = NetworkGraph::default();
    for record in records {
        let stats = graph
            .edges
            .entry((record.source_host.clone(), record.destination_host.clone()))
            .or_default();
        stats.connections += 1;
        stats.bytes_sent += record.bytes_sent;
    }
    graph
}

/// Detects command-and-control beaconing.
///
/// Per (source, destination) pair: at least `count_threshold` events with
/// every inter-event gap at most `time_threshold_secs` is flagged. A gap
/// spread (max minus min) within `jitter_secs` marks the cadence as regular
/// and raises the severity; irregular cadence is still flagged.
pub fn detect_beaconing(
    records: &[NetworkRecord],
    time_threshold_secs: i64,
    count_threshold: usize,
    jitter_secs: i64,
) -> Vec<Finding> {
    let mut by_pair: BTreeMap<(String, String), Vec<DateTime<Utc>>> = BTreeMap::new();
    for record in records {
        by_pair
            .entry((record.source_host.clone(), record.destination_host.clone()))
            .or_default()
            .push(record.timestamp);
    }

    let mut findings = Vec::new();
    for ((source, destination), mut timestamps) in by_pair {
        if timestamps.len() < count_threshold {
            continue;
        }
        timestamps.sort();
        let gaps: Vec<i64> = timestamps
            .windows(2)
            .map(|pair| (pair[1] - pair[0]).num_seconds())
            .collect();
        let max_gap = gaps.iter().copied().max().unwrap_or(0);
        let min_gap = gaps.iter().copied().min().unwrap_or(0);
        if max_gap > time_threshold_secs {
            continue;
        }
        let regular = max_gap - min_gap <= jitter_secs;

        findings.push(Finding {
            id: Uuid::new_v4(),
            title: format!("Beaconing from {source} to {destination}"),
            detector: "beaconing".to_string(),
            severity: if regular { "High" } else { "Medium" }.to_string(),
            tactic: "Command and Control".to_string(),
            hosts: vec![source.clone(), destination.clone()],
            description: format!(
                "{} connections at {} intervals ({}-{}s apart)",
                timestamps.len(),
                if regular { "regular" } else { "irregular" },
                min_gap,
                max_gap
            ),
            details: json!({
                "source_host": source,
                "destination_host": destination,
                "event_count": timestamps.len(),
                "min_gap_secs": min_gap,
                "max_gap_secs": max_gap,
                "regular_intervals": regular,
            }),
        });
    }
    findings
}

/// Detects potential data exfiltration.
///
/// Sums outbound bytes per source host; hosts exceeding `byte_threshold`
/// are flagged with a per-destination breakdown.
pub fn detect_data_exfiltration(records: &[NetworkRecord], byte_threshold: u64) -> Vec<Finding> {
    let mut per_host: BTreeMap<String, BTreeMap<String, u64>> = BTreeMap::new();
    for record in records {
        *per_host
            .entry(record.source_host.clone())
            .or_default()
            .entry(record.destination_host.clone())
            .or_default() += record.bytes_sent;
    }

    let mut findings = Vec::new();
    for (host, destinations) in per_host {
        let total: u64 = destinations.values().sum();
        if total <= byte_threshold {
            continue;
        }
        findings.push(Finding {
            id: Uuid::new_v4(),
            title: format!("Large outbound transfer from {host}"),
            detector: "data_exfiltration".to_string(),
            severity: "High".to_string(),
            tactic: "Exfiltration".to_string(),
            hosts: vec![host.clone()],
            description: format!("{total} bytes sent outbound, above the {byte_threshold} byte threshold"),
            details: json!({
                "source_host": host,
                "total_bytes": total,
                "byte_threshold": byte_threshold,
                "destinations": destinations,
            }),
        });
    }
    findings
}

/// Detects lateral movement.
///
/// Slides a `window_hours` window over each source host's connections;
/// hosts contacting at least `min_connections` distinct destinations
/// inside one window are flagged.
pub fn detect_lateral_movement(
    records: &[NetworkRecord],
    min_connections: usize,
    window_hours: i64,
) -> Vec<Finding> {
    let mut by_source: BTreeMap<String, Vec<&NetworkRecord>> = BTreeMap::new();
    for record in records {
        by_source
            .entry(record.source_host.clone())
            .or_default()
            .push(record);
    }

    let window = Duration::hours(window_hours);
    let mut findings = Vec::new();

    for (source, mut events) in by_source {
        events.sort_by_key(|record| record.timestamp);

        let mut flagged: Option<BTreeSet<String>> = None;
        let mut start = 0;
        for end in 0..events.len() {
            while events[end].timestamp - events[start].timestamp > window {
                start += 1;
            }
            let destinations: BTreeSet<String> = events[start..=end]
                .iter()
                .map(|record| record.destination_host.clone())
                .collect();
            if destinations.len() >= min_connections {
                flagged = Some(destinations);
                break;
            }
        }

        if let Some(destinations) = flagged {
            findings.push(Finding {
                id: Uuid::new_v4(),
                title: format!("Lateral movement from {source}"),
                detector: "lateral_movement".to_string(),
                severity: "High".to_string(),
                tactic: "Lateral Movement".to_string(),
                hosts: std::iter::once(source.clone())
                    .chain(destinations.iter().cloned())
                    .collect(),
                description: format!(
                    "{} distinct hosts contacted within {} hour(s)",
                    destinations.len(),
                    window_hours
                ),
                details: json!({
                    "source_host": source,
                    "destinations": destinations,
                    "window_hours": window_hours,
                }),
            });
        }
    }
    findings
}
