//! Error taxonomy for the simulation core.
//!
//! The engines validate before mutating: a failed call leaves the engine in
//! its previous state. There is no I/O in this crate, so every error is a
//! local validation failure, fatal to the call that raised it.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    /// Rejected configuration (zero oscillator count, non-positive dt, ...).
    #[error("invalid configuration: {0}")]
    Config(String),

    /// An adjacency matrix whose dimension does not match the engine size.
    #[error("topology size {got} does not match oscillator count {expected}")]
    TopologyMismatch { expected: usize, got: usize },
}
