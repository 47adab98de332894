//! Aggregation engine and snapshot store for mission billing.
//!
//! Reads time entries, missions and payments from a [`store::SnapshotSource`],
//! rolls entries into calendar buckets with revenue estimates, and reconciles
//! monthly estimates against recorded payments.

pub mod aggregator;
pub mod reconciler;
pub mod reports;
pub mod rollup;
pub mod store;

pub use billing_core as core;
