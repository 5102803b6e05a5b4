//! Email security gateway sources.
//!
//! Implementations of [`crate::EmailSource`]. The mock serves SIEM event
//! partitions, top-clicker lists, and very-attacked-people reports.

pub mod mock;

pub use mock::MockEmailSource;
