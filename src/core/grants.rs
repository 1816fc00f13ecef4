// src/core/grants.rs

//! Parsing of raw catalog ACL strings into grantee-to-privilege mappings.
//!
//! A typical ACL array, once joined into a single string, looks like:
//!
//! ```text
//!     admin=arwdDxt/admin,someone=r/admin,"group selfservice=r/admin"
//! ```
//!
//! where `=xxxx` with an empty grantee denotes privileges granted to PUBLIC,
//! and `/yyyy` names the role that granted the privilege.

use crate::core::privilege::{self, Scope};
use indexmap::IndexMap;

/// Object identifier to privilege names, for one grantee and scope.
pub type GrantMap = IndexMap<String, Vec<String>>;

/// Grantee to [`GrantMap`]. Grantees that are groups carry a `"group "` prefix.
pub type AclMap = IndexMap<String, GrantMap>;

/// Parses one raw ACL entry string into a mapping from grantee to privilege
/// names.
///
/// The master user is skipped unconditionally (the superuser implicitly
/// holds every privilege); an empty grantee denotes a PUBLIC grant and is
/// recorded under the empty key so callers can decide whether to surface it;
/// a grantee seen twice keeps its first parse.
pub fn parse_acl_entries(scope: Scope, raw: &str, master_username: &str) -> GrantMap {
    let mut parsed = GrantMap::new();
    for entry in raw.split(',') {
        let entry = entry.replace('"', "");
        let Some((grantee, remainder)) = entry.split_once('=') else {
            continue;
        };
        let flags = remainder.split('/').next().unwrap_or("");
        if grantee == master_username {
            continue;
        }
        if !parsed.contains_key(grantee) {
            parsed.insert(
                grantee.to_string(),
                privilege::parse_privileges(scope, flags),
            );
        }
    }
    parsed
}
