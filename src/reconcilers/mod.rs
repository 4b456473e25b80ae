//! Reconciliation logic for Executor resources

pub mod aggregate;
pub mod executor;
pub mod matcher;

pub use executor::{Outcome, ReconcileSettings, Reconciler};
