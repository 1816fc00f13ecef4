// src/core/resolver.rs

//! The desired-state resolver: expands the policy tree into concrete
//! `(grantee, identifier) -> privilege set` mappings per scope, resolving
//! wildcards against the live catalog.

use crate::core::catalog::CurrentStateReader;
use crate::core::errors::AclSyncError;
use crate::core::grants::{AclMap, GrantMap};
use crate::core::policy::{PermissionEntry, PolicyDocument};
use crate::core::privilege::Scope;

pub struct DesiredStateResolver<'a> {
    policy: &'a PolicyDocument,
    production_schemas: &'a [String],
    reader: &'a CurrentStateReader<'a>,
}

impl<'a> DesiredStateResolver<'a> {
    pub fn new(
        policy: &'a PolicyDocument,
        production_schemas: &'a [String],
        reader: &'a CurrentStateReader<'a>,
    ) -> Self {
        Self {
            policy,
            production_schemas,
            reader,
        }
    }

    /// The full desired ACL at one scope: groups first under their
    /// `"group <name>"` alias, then users. Grantees with no grants at this
    /// scope are omitted.
    pub async fn desired_acl(&self, scope: Scope) -> Result<AclMap, AclSyncError> {
        let mut acl = AclMap::new();
        for (name, group) in &self.policy.groups {
            let grants = self.resolve_permissions(scope, &group.permissions).await?;
            if !grants.is_empty() {
                acl.insert(format!("group {name}"), grants);
            }
        }
        for (name, user) in &self.policy.users {
            let grants = self.resolve_permissions(scope, &user.permissions).await?;
            if !grants.is_empty() {
                acl.insert(name.clone(), grants);
            }
        }
        Ok(acl)
    }

    async fn resolve_permissions(
        &self,
        scope: Scope,
        permissions: &[PermissionEntry],
    ) -> Result<GrantMap, AclSyncError> {
        let mut grants = GrantMap::new();

        // Usage is implicitly granted on every schema touched by a
        // table-scope permission.
        if scope == Scope::Schema {
            for permission in permissions.iter().filter(|p| p.scope == Scope::Table) {
                for identifier in &permission.identifiers {
                    let schema = identifier.split('.').next().unwrap_or(identifier);
                    let targets: Vec<String> = if schema == "*" {
                        self.production_schemas.to_vec()
                    } else {
                        vec![schema.to_string()]
                    };
                    for schema in targets {
                        grants.entry(schema).or_default().push("usage".to_string());
                    }
                }
            }
        }

        for permission in permissions.iter().filter(|p| p.scope == scope) {
            for identifier in &permission.identifiers {
                if identifier.contains('*') {
                    self.resolve_wildcard(scope, identifier, &permission.privileges, &mut grants)
                        .await?;
                } else {
                    grants
                        .entry(identifier.clone())
                        .or_default()
                        .extend(permission.privileges.iter().cloned());
                }
            }
        }

        // Deduplicate; `all` absorbs every enumerated privilege.
        for privileges in grants.values_mut() {
            if privileges.iter().any(|p| p == "all") {
                *privileges = vec!["all".to_string()];
            } else {
                let mut seen: Vec<String> = Vec::new();
                privileges.retain(|p| {
                    if seen.contains(p) {
                        false
                    } else {
                        seen.push(p.clone());
                        true
                    }
                });
            }
        }

        Ok(grants)
    }

    async fn resolve_wildcard(
        &self,
        scope: Scope,
        identifier: &str,
        privileges: &[String],
        grants: &mut GrantMap,
    ) -> Result<(), AclSyncError> {
        match scope {
            Scope::Database => Err(AclSyncError::Config(
                "cannot resolve database identifiers with a wildcard".to_string(),
            )),
            Scope::Schema => {
                for schema in self.production_schemas {
                    grants
                        .entry(schema.clone())
                        .or_default()
                        .extend(privileges.iter().cloned());
                }
                Ok(())
            }
            Scope::Table => {
                let (schema, table) = identifier.split_once('.').unwrap_or((identifier, ""));
                if schema == "*" && table != "*" {
                    return Err(AclSyncError::Config(
                        "cannot resolve a wildcard schema for specific table names".to_string(),
                    ));
                }

                let mut tables = Vec::new();
                if schema == "*" {
                    for schema in self.production_schemas {
                        tables.extend(self.reader.tables_in_schema(schema).await?);
                    }
                } else {
                    tables = self.reader.tables_in_schema(schema).await?;
                }

                let mut seen: Vec<String> = Vec::new();
                for table in tables {
                    if seen.contains(&table) {
                        continue;
                    }
                    grants
                        .entry(table.clone())
                        .or_default()
                        .extend(privileges.iter().cloned());
                    seen.push(table);
                }
                Ok(())
            }
        }
    }
}
