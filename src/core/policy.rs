// src/core/policy.rs

//! The declarative policy document: the desired access-control state of the
//! cluster, loaded from a JSON file.

use crate::core::errors::AclSyncError;
use crate::core::privilege::Scope;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// The root of the policy tree.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicyDocument {
    #[serde(default)]
    pub users: IndexMap<String, UserPolicy>,
    #[serde(default)]
    pub groups: IndexMap<String, GroupPolicy>,
}

/// Desired state of one user.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserPolicy {
    /// Plaintext password to create the account with. Generated when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// Role flags applied directly to the user (e.g. `createdb`).
    #[serde(default)]
    pub roles: Vec<String>,
    /// Groups the user is a member of.
    #[serde(default)]
    pub groups: Vec<String>,
    #[serde(default)]
    pub permissions: Vec<PermissionEntry>,
}

/// Desired state of one group. Role flags declared here are inherited by
/// every member user.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GroupPolicy {
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub permissions: Vec<PermissionEntry>,
}

/// One requested grant: a scope, object identifiers (possibly wildcarded),
/// and the privilege names to hold on them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionEntry {
    #[serde(rename = "type")]
    pub scope: Scope,
    pub identifiers: Vec<String>,
    pub privileges: Vec<String>,
}

impl PolicyDocument {
    /// Loads and parses the policy document from a JSON file.
    pub fn from_file(path: &str) -> Result<Self, AclSyncError> {
        if path.is_empty() {
            return Err(AclSyncError::Config(
                "no path to policy file provided".to_string(),
            ));
        }
        if !Path::new(path).exists() {
            return Err(AclSyncError::Config(format!(
                "policy file not found at: {path}"
            )));
        }
        let contents = fs::read_to_string(path)?;
        serde_json::from_str(&contents)
            .map_err(|e| AclSyncError::Policy(format!("policy file {path} could not be parsed: {e}")))
    }
}
