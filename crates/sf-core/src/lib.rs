//! # sf-core
//!
//! Core engines for Sentinel Fuse: fusing security telemetry from endpoint,
//! identity, and email sources into normalized incidents, prioritizing them
//! with model assistance, investigating individual incidents, and running
//! proactive threat hunts.
//!
//! Every model-assisted operation carries a deterministic local fallback.
//! Source failures degrade to empty slices with a visible error string;
//! model failures degrade to documented fallback output; neither is ever
//! surfaced as `Err` from a public operation. Only missing required input
//! ([`ValidationError`]) fails outright.

pub mod aggregate;
pub mod error;
pub mod hunting;
pub mod incident;
pub mod investigate;
pub mod normalize;
pub mod parse;
pub mod prioritize;

pub use aggregate::{AggregateResult, Aggregator, SourceSlice};
pub use error::ValidationError;
pub use hunting::detectors::{
    build_network_graph, detect_beaconing, detect_data_exfiltration, detect_lateral_movement,
    Finding, NetworkGraph, NetworkRecord,
};
pub use hunting::engine::{
    map_to_mitre_attack, HuntOutcome, HuntReport, HuntingEngine, Hypothesis, Priority,
    MITRE_TACTICS,
};
pub use hunting::features::{prepare_signin_features, SignInFeatures};
pub use hunting::HuntingConfig;
pub use incident::{Event, EventType, Incident, Source};
pub use investigate::{
    ActionResult, AffectedAssets, CachedIntelSource, IntelLookupError, Investigation,
    Investigator, NullIntelSource, NullRelatedEventSource, RelatedEventSource, ResponseAction,
    ResponsePlan, ThreatIntel, ThreatIntelSource, TimelineEntry,
};
pub use prioritize::{Analysis, Campaign, Prioritizer, PrioritizerConfig};
