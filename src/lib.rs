#[path = "core/error.rs"]
pub mod error;

#[path = "core/prng.rs"]
pub mod prng;

#[path = "core/history.rs"]
pub mod history;

#[path = "core/topology.rs"]
pub mod topology;

#[path = "core/ensemble.rs"]
pub mod ensemble;

#[path = "core/field.rs"]
pub mod field;

#[path = "core/metrics.rs"]
pub mod metrics;
