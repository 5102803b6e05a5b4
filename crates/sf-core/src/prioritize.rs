//! Model-assisted incident prioritization.
//!
//! One model call per analysis, no retries. The completion is expected to
//! carry a JSON object bucketing incidents into high/medium/low priority
//! with campaign groupings; anything that fails to parse degrades to the
//! deterministic severity-bucket fallback.

use crate::incident::Incident;
use crate::parse;
use metrics::counter;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sf_model::CompletionModel;
use sf_observability::metrics::MODEL_FALLBACKS;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Prioritizer tuning knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrioritizerConfig {
    /// Incidents included in the model prompt, oldest-first as given.
    pub max_incidents: usize,
    /// Description characters kept per incident in the prompt.
    pub max_description_chars: usize,
    /// Output budget for the model call.
    pub max_output_tokens: u32,
}

impl Default for PrioritizerConfig {
    fn default() -> Self {
        Self {
            max_incidents: 50,
            max_description_chars: 200,
            max_output_tokens: 4000,
        }
    }
}

impl PrioritizerConfig {
    pub fn with_max_incidents(mut self, max_incidents: usize) -> Self {
        self.max_incidents = max_incidents;
        self
    }

    pub fn with_max_description_chars(mut self, max_description_chars: usize) -> Self {
        self.max_description_chars = max_description_chars;
        self
    }

    pub fn with_max_output_tokens(mut self, max_output_tokens: u32) -> Self {
        self.max_output_tokens = max_output_tokens;
        self
    }
}

/// A suspected attack campaign linking related incidents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Campaign {
    pub name: String,
    #[serde(default)]
    pub related_incidents: Vec<String>,
    #[serde(default)]
    pub description: String,
}

/// Prioritization output.
///
/// Bucket entries stay loosely typed: on the model path they are incident
/// records enriched with `ai_risk_score` and `recommended_actions`; on the
/// fallback path they are the original incidents verbatim.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Analysis {
    #[serde(default)]
    pub high_priority: Vec<Value>,
    #[serde(default)]
    pub medium_priority: Vec<Value>,
    #[serde(default)]
    pub low_priority: Vec<Value>,
    #[serde(default)]
    pub campaigns: Vec<Campaign>,
    /// True when the deterministic fallback produced this analysis.
    #[serde(default)]
    pub fallback: bool,
}

impl Analysis {
    /// Total incidents across all three buckets.
    pub fn total(&self) -> usize {
        self.high_priority.len() + self.medium_priority.len() + self.low_priority.len()
    }
}

/// Model-assisted incident prioritizer.
pub struct Prioritizer {
    model: Arc<dyn CompletionModel>,
    config: PrioritizerConfig,
}

impl Prioritizer {
    pub fn new(model: Arc<dyn CompletionModel>) -> Self {
        Self::with_config(model, PrioritizerConfig::default())
    }

    pub fn with_config(model: Arc<dyn CompletionModel>, config: PrioritizerConfig) -> Self {
        Self { model, config }
    }

    /// Analyzes and prioritizes `incidents`.
    ///
    /// Never fails: on any model or parse failure the result is the
    /// deterministic severity-bucket fallback with `fallback` set.
    #[instrument(skip_all, fields(incidents = incidents.len()))]
    pub async fn analyze(&self, incidents: &[Incident]) -> Analysis {
        let summary = self.incident_summary(incidents);
        let prompt = self.build_prompt(&summary);

        match self.model.complete(&prompt, self.config.max_output_tokens).await {
            Ok(text) => match parse::extract_json_object(&text)
                .and_then(|value| serde_json::from_value::<Analysis>(value).ok())
            {
                Some(analysis) => {
                    debug!(
                        high = analysis.high_priority.len(),
                        medium = analysis.medium_priority.len(),
                        low = analysis.low_priority.len(),
                        campaigns = analysis.campaigns.len(),
                        "model prioritization accepted"
                    );
                    analysis
                }
                None => {
                    warn!("model completion did not contain a parsable analysis object");
                    self.fallback(incidents)
                }
            },
            Err(err) => {
                warn!(error = %err, "model prioritization failed");
                self.fallback(incidents)
            }
        }
    }

    /// Deterministic severity-bucket prioritization.
    ///
    /// Critical/High (any case) → high, Medium → medium, everything else →
    /// low. Incidents are carried verbatim; campaigns are always empty.
    pub fn basic_prioritization(&self, incidents: &[Incident]) -> Analysis {
        let mut analysis = Analysis {
            fallback: true,
            ..Default::default()
        };

        for incident in incidents {
            let value = serde_json::to_value(incident).unwrap_or(Value::Null);
            if incident.is_high_severity() {
                analysis.high_priority.push(value);
            } else if incident.is_medium_severity() {
                analysis.medium_priority.push(value);
            } else {
                analysis.low_priority.push(value);
            }
        }
        analysis
    }

    fn fallback(&self, incidents: &[Incident]) -> Analysis {
        counter!(MODEL_FALLBACKS, "component" => "prioritizer").increment(1);
        self.basic_prioritization(incidents)
    }

    fn incident_summary(&self, incidents: &[Incident]) -> Vec<Value> {
        incidents
            .iter()
            .take(self.config.max_incidents)
            .map(|incident| {
                let description: String = incident
                    .description
                    .chars()
                    .take(self.config.max_description_chars)
                    .collect();
                json!({
                    "id": incident.id,
                    "title": incident.title,
                    "description": description,
                    "severity": incident.severity,
                    "source": incident.source,
                    "timestamp": incident.timestamp,
                })
            })
            .collect()
    }

    fn build_prompt(&self, summary: &[Value]) -> String {
        let incidents_json =
            serde_json::to_string_pretty(summary).unwrap_or_else(|_| "[]".to_string());
        format!(
            r#"You are a security analyst reviewing recent security incidents. Analyze the following incidents and:

1. Prioritize them as High, Medium, or Low based on severity, potential impact, and risk
2. Identify potential attack campaigns or related incidents
3. Provide risk scores (0-100) for each high-priority incident
4. Recommend specific actions for each high-priority incident
5. Explain your reasoning

Incidents to analyze:
{incidents_json}

Provide your analysis in JSON format with the following structure:
{{
    "high_priority": [
        {{
            "id": "incident_id",
            "title": "incident_title",
            "source": "source_platform",
            "severity": "severity",
            "ai_risk_score": 85,
            "recommended_actions": ["action1", "action2"],
            "ai_reasoning": "explanation"
        }}
    ],
    "medium_priority": [...],
    "low_priority": [...],
    "campaigns": [
        {{
            "name": "Campaign name",
            "related_incidents": ["id1", "id2"],
            "description": "Campaign description"
        }}
    ]
}}"#
        )
    }
}
