// src/core/errors.rs

//! Defines the primary error type for the entire tool.

use std::sync::Arc;
use thiserror::Error;

/// The main error enum, representing all possible failures within a sync run.
/// Using `thiserror` allows for clean error definitions and automatic `From` trait implementations.
#[derive(Error, Debug)]
pub enum AclSyncError {
    /// Malformed or missing required configuration. Always fatal, raised
    /// before or during desired-state resolution.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A detected inconsistency between current and desired state that the
    /// engine refuses to auto-resolve. Always fatal.
    #[error("Sync error: {0}")]
    Sync(String),

    /// A statement referenced a catalog object that is not visible yet.
    /// Retried a bounded number of times before escalating to `Sync`.
    #[error("Transient execution failure: {0}")]
    TransientExecution(String),

    /// Any other statement execution failure. Propagates immediately.
    #[error("Execution error: {0}")]
    Execution(String),

    #[error("Policy error: {0}")]
    Policy(String),

    #[error("IO Error: {0}")]
    Io(Arc<std::io::Error>),
}

// --- From trait implementations for easy error conversion ---

impl From<std::io::Error> for AclSyncError {
    fn from(e: std::io::Error) -> Self {
        AclSyncError::Io(Arc::new(e))
    }
}

impl From<serde_json::Error> for AclSyncError {
    fn from(e: serde_json::Error) -> Self {
        AclSyncError::Policy(format!("JSON deserialization error: {e}"))
    }
}
