// src/core/privilege.rs

//! The privilege codec: the mapping between the one-character flags found in
//! `pg_catalog` ACL arrays and named privileges, per object scope.
//!
//! Flag meanings (see the PostgreSQL GRANT documentation):
//!
//! ```text
//!        r -- SELECT ("read")
//!        w -- UPDATE ("write")
//!        a -- INSERT ("append")
//!        d -- DELETE
//!        D -- TRUNCATE
//!        x -- REFERENCES
//!        t -- TRIGGER
//!        X -- EXECUTE
//!        U -- USAGE
//!        C -- CREATE
//!        c -- CONNECT
//!        T -- TEMPORARY
//!  arwdDxt -- ALL PRIVILEGES (for tables, varies for other objects)
//!    /yyyy -- role that granted this privilege
//! ```

use crate::core::errors::AclSyncError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The object level a grant applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Database,
    Schema,
    Table,
}

impl Scope {
    /// The acronym table for this scope. The `all` shorthand comes first so
    /// it wins during left-to-right flag parsing.
    pub fn privilege_table(self) -> &'static [(&'static str, &'static str)] {
        match self {
            Scope::Database => DATABASE_PRIVILEGES,
            Scope::Schema => SCHEMA_PRIVILEGES,
            Scope::Table => TABLE_PRIVILEGES,
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Scope::Database => "database",
            Scope::Schema => "schema",
            Scope::Table => "table",
        };
        f.write_str(name)
    }
}

impl FromStr for Scope {
    type Err = AclSyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "database" => Ok(Scope::Database),
            "schema" => Ok(Scope::Schema),
            "table" => Ok(Scope::Table),
            other => Err(AclSyncError::Config(format!(
                "unsupported privilege scope '{other}'"
            ))),
        }
    }
}

const TABLE_PRIVILEGES: &[(&str, &str)] = &[
    ("arwdDxt", "all"),
    ("r", "select"),
    ("w", "update"),
    ("a", "insert"),
    ("d", "delete"),
    ("D", "truncate"),
    ("x", "references"),
    ("t", "trigger"),
    ("X", "execute"),
];

const SCHEMA_PRIVILEGES: &[(&str, &str)] = &[("UC", "all"), ("U", "usage"), ("C", "create")];

const DATABASE_PRIVILEGES: &[(&str, &str)] = &[
    ("CTc", "all"),
    ("C", "create"),
    ("c", "connect"),
    ("T", "temporary"),
];

/// Looks up the privilege name for one acronym within a scope.
pub fn name_for_acronym(scope: Scope, acronym: &str) -> Option<&'static str> {
    scope
        .privilege_table()
        .iter()
        .find(|(a, _)| *a == acronym)
        .map(|(_, name)| *name)
}

/// Parses a raw flag string into privilege names.
///
/// The table is walked in declared order, removing the first occurrence of
/// each acronym from the working string; parsing stops early once the string
/// is exhausted. Unrecognized residue is ignored.
pub fn parse_privileges(scope: Scope, flags: &str) -> Vec<String> {
    let mut remaining = flags.to_string();
    let mut privileges = Vec::new();
    for (acronym, name) in scope.privilege_table() {
        if remaining.is_empty() {
            break;
        }
        if let Some(position) = remaining.find(acronym) {
            remaining.replace_range(position..position + acronym.len(), "");
            privileges.push((*name).to_string());
        }
    }
    privileges
}

/// Encodes a set of privilege names back into a flag string. `all` maps to
/// the scope's full acronym and absorbs everything else; otherwise flags are
/// emitted in table order, so the result is independent of input order.
pub fn encode_privileges<S: AsRef<str>>(scope: Scope, names: &[S]) -> String {
    let table = scope.privilege_table();
    if names.iter().any(|n| n.as_ref() == "all") {
        return table[0].0.to_string();
    }
    table
        .iter()
        .skip(1)
        .filter(|(_, name)| names.iter().any(|n| n.as_ref() == *name))
        .map(|(acronym, _)| *acronym)
        .collect()
}
