//! Prometheus metrics for the Executor Operator
//!
//! Counters for passes and container executions, plus the HTTP endpoint that
//! serves them alongside health probes.

pub mod prometheus;

pub use self::prometheus::*;
