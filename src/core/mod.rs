// src/core/mod.rs

//! The central module containing the reconciliation engine.

pub mod catalog;
pub mod diff;
pub mod errors;
pub mod executor;
pub mod grants;
pub mod policy;
pub mod privilege;
pub mod resolver;
pub mod statements;
pub mod sync;

pub use errors::AclSyncError;
pub use grants::{AclMap, GrantMap};
pub use privilege::Scope;
