//! Identity-provider sources.
//!
//! Implementations of [`crate::IdentitySource`]. The mock serves sign-in
//! logs, security alerts, and risky-user records for tests and local runs.

pub mod mock;

pub use mock::MockIdentitySource;
