//! Endpoint detection and response sources.
//!
//! Implementations of [`crate::EndpointSource`]. The mock serves
//! vendor-shaped detection and incident records for tests and local runs.

pub mod mock;

pub use mock::MockEndpointSource;
