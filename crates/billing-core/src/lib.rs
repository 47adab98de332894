//! Core types and pure arithmetic for mission billing.
//!
//! Holds the entity snapshots, the period calendar, the revenue estimator,
//! output formatting, and CLI settings. Nothing here performs I/O except
//! the settings persistence.

pub mod calendar;
pub mod error;
pub mod formatting;
pub mod models;
pub mod revenue;
pub mod settings;

pub use error::{BillingError, Result};
