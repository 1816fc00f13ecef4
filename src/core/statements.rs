// src/core/statements.rs

//! Builders for every corrective statement the reconciler can issue.
//!
//! The statement shapes are fixed for compatibility with both PostgreSQL and
//! Redshift. Identifiers are interpolated into them, so anything that does
//! not look like a plain identifier is refused outright instead of being
//! escaped into a different shape.

use crate::core::errors::AclSyncError;
use crate::core::privilege::Scope;
use once_cell::sync::Lazy;
use regex::Regex;

static PASSWORD_LITERAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(password\s+')[^']*(')").expect("static regex"));

static IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_$.]*$").expect("static regex"));

/// Strips the password literal out of a statement before it is logged.
pub fn redact(statement: &str) -> String {
    PASSWORD_LITERAL.replace(statement, "$1$2").into_owned()
}

fn check_identifier(identifier: &str) -> Result<&str, AclSyncError> {
    if IDENTIFIER.is_match(identifier) {
        Ok(identifier)
    } else {
        Err(AclSyncError::Config(format!(
            "refusing to interpolate identifier '{identifier}' into a statement"
        )))
    }
}

/// A grantee is either a plain user name or `group <name>`.
fn check_grantee(grantee: &str) -> Result<&str, AclSyncError> {
    check_identifier(grantee.strip_prefix("group ").unwrap_or(grantee))?;
    Ok(grantee)
}

pub fn create_user(user: &str, password: &str, roles: &[String]) -> Result<String, AclSyncError> {
    check_identifier(user)?;
    if password.contains('\'') {
        return Err(AclSyncError::Config(format!(
            "password for user '{user}' must not contain a quote character"
        )));
    }
    let mut statement = format!("create user {user} with password '{password}'");
    for role in roles {
        check_identifier(role)?;
        statement.push(' ');
        statement.push_str(role);
    }
    statement.push(';');
    Ok(statement)
}

pub fn set_search_path(user: &str, schemas: &[String]) -> Result<String, AclSyncError> {
    check_identifier(user)?;
    for schema in schemas {
        check_identifier(schema)?;
    }
    Ok(format!(
        "alter user {user} set search_path to {};",
        schemas.join(",")
    ))
}

pub fn drop_user(user: &str) -> Result<String, AclSyncError> {
    Ok(format!("drop user {};", check_identifier(user)?))
}

pub fn create_group(group: &str) -> Result<String, AclSyncError> {
    Ok(format!("create group {};", check_identifier(group)?))
}

pub fn drop_group(group: &str) -> Result<String, AclSyncError> {
    Ok(format!("drop group {};", check_identifier(group)?))
}

pub fn add_user_to_group(user: &str, group: &str) -> Result<String, AclSyncError> {
    Ok(format!(
        "alter group {} add user {};",
        check_identifier(group)?,
        check_identifier(user)?
    ))
}

pub fn remove_user_from_group(user: &str, group: &str) -> Result<String, AclSyncError> {
    Ok(format!(
        "alter group {} drop user {};",
        check_identifier(group)?,
        check_identifier(user)?
    ))
}

pub fn enable_role(user: &str, role: &str) -> Result<String, AclSyncError> {
    Ok(format!(
        "alter user {} {};",
        check_identifier(user)?,
        check_identifier(role)?
    ))
}

pub fn disable_role(user: &str, role: &str) -> Result<String, AclSyncError> {
    Ok(format!(
        "alter user {} no{};",
        check_identifier(user)?,
        check_identifier(role)?
    ))
}

pub fn grant(
    grantee: &str,
    scope: Scope,
    identifier: &str,
    privileges: &[String],
) -> Result<String, AclSyncError> {
    for privilege in privileges {
        check_identifier(privilege)?;
    }
    Ok(format!(
        "grant {} on {scope} {} to {};",
        privileges.join(","),
        check_identifier(identifier)?,
        check_grantee(grantee)?
    ))
}

pub fn revoke(
    grantee: &str,
    scope: Scope,
    identifier: &str,
    privileges: &[String],
) -> Result<String, AclSyncError> {
    for privilege in privileges {
        check_identifier(privilege)?;
    }
    Ok(format!(
        "revoke {} on {scope} {} from {};",
        privileges.join(","),
        check_identifier(identifier)?,
        check_grantee(grantee)?
    ))
}

pub fn alter_table_owner(table: &str, owner: &str) -> Result<String, AclSyncError> {
    Ok(format!(
        "alter table {} owner to {};",
        check_identifier(table)?,
        check_identifier(owner)?
    ))
}

pub fn alter_schema_owner(schema: &str, owner: &str) -> Result<String, AclSyncError> {
    Ok(format!(
        "alter schema {} owner to {};",
        check_identifier(schema)?,
        check_identifier(owner)?
    ))
}

pub fn drop_table(table: &str) -> Result<String, AclSyncError> {
    Ok(format!("drop table {};", check_identifier(table)?))
}

pub fn drop_schema_cascade(schema: &str) -> Result<String, AclSyncError> {
    Ok(format!("drop schema {} cascade;", check_identifier(schema)?))
}
