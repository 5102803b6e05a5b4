//! # sf-connectors
//!
//! Vendor telemetry source boundary for Sentinel Fuse.
//!
//! Three source families feed the core: endpoint (EDR detections and
//! incidents), identity (sign-in logs, alerts, risky users), and email
//! (SIEM events, top clickers, very-attacked-people reports). Each is an
//! async trait over envelope types that mirror the vendor wire shapes:
//! a list of loosely-typed records plus a count, or an `error` marker in
//! place of data.
//!
//! Adapters never raise vendor failures to the caller. A failed call
//! becomes an envelope with an `error` string and an empty record list,
//! and the aggregation layer surfaces that string in its output.
//!
//! The `secrets` module provides credential resolution with zeroized
//! in-memory storage; adapters fall back to placeholder test credentials
//! when resolution fails rather than abort.

pub mod email;
pub mod endpoint;
pub mod identity;
pub mod secrets;
pub mod traits;

pub use secrets::{CredentialBundle, SecretsError, SecretsProvider, SecureString};
pub use traits::{
    AlertBatch, DetectionBatch, EmailSource, EndpointSource, IdentitySource, IncidentBatch,
    RiskyUserBatch, SiemEventBatch, SignInBatch, SourceError, SourceHealth, SourceQuery,
    SourceResult, TimeRange, TopClickerBatch, VapBatch,
};
