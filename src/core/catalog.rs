// src/core/catalog.rs

//! The current-state reader: a thin query layer over the executor that
//! reads users, groups, role flags, ownership, and raw ACLs out of the
//! system catalogs.

use crate::core::errors::AclSyncError;
use crate::core::executor::Executor;
use crate::core::grants::{self, AclMap};
use crate::core::privilege::Scope;
use indexmap::IndexMap;
use std::collections::HashMap;
use tracing::debug;

const CURRENT_USERS_QUERY: &str = "\
select distinct usename as name, usesysid as id from pg_user;";

const CURRENT_GROUPS_QUERY: &str = "\
select distinct groname as name, array_to_string(grolist, ',') as user_list from pg_group;";

const CURRENT_USER_ROLES_QUERY: &str = "\
select usename as name, \
case when usecreatedb is true then 'createdb' else '' end \
|| ',' || \
case when usesuper is true then 'createuser' else '' end as user_roles \
from pg_user order by usename;";

const DATABASE_ACL_QUERY: &str = "\
select datname as name, array_to_string(datacl, ',') as acls \
from pg_database \
where datacl is not null and datdba != 1;";

const SCHEMA_ACL_QUERY: &str = "\
select nspname as name, array_to_string(nspacl, ',') as acls \
from pg_namespace \
where nspacl is not null and nspowner != 1;";

const TABLE_ACL_QUERY: &str = "\
select pg_namespace.nspname || '.' || pg_class.relname as name, \
array_to_string(pg_class.relacl, ',') as acls \
from pg_class \
left join pg_namespace on pg_class.relnamespace = pg_namespace.oid \
where pg_class.relacl is not null \
and pg_namespace.nspname not in ('pg_catalog', 'pg_toast', 'information_schema') \
order by pg_namespace.nspname || '.' || pg_class.relname;";

/// Escapes a value for interpolation into a single-quoted SQL literal.
fn quote_literal(value: &str) -> String {
    value.replace('\'', "''")
}

pub struct CurrentStateReader<'a> {
    executor: &'a dyn Executor,
    master_username: String,
}

impl<'a> CurrentStateReader<'a> {
    pub fn new(executor: &'a dyn Executor, master_username: String) -> Self {
        Self {
            executor,
            master_username,
        }
    }

    /// Current user name to system id.
    pub async fn current_users(&self) -> Result<IndexMap<String, i64>, AclSyncError> {
        let rows = self.executor.execute(CURRENT_USERS_QUERY).await?;
        let mut users = IndexMap::new();
        for row in rows {
            let name = row.get("name").cloned().unwrap_or_default();
            let id = row
                .get("id")
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or_default();
            users.insert(name, id);
        }
        Ok(users)
    }

    /// Current group name to member user ids.
    pub async fn current_groups(&self) -> Result<IndexMap<String, Vec<i64>>, AclSyncError> {
        let rows = self.executor.execute(CURRENT_GROUPS_QUERY).await?;
        let mut groups = IndexMap::new();
        for row in rows {
            let name = row.get("name").cloned().unwrap_or_default();
            let ids = row
                .get("user_list")
                .map(|list| {
                    list.split(',')
                        .filter_map(|id| id.parse::<i64>().ok())
                        .collect()
                })
                .unwrap_or_default();
            groups.insert(name, ids);
        }
        Ok(groups)
    }

    /// Current group name to member user names, ids resolved through
    /// `pg_user`.
    pub async fn current_user_groups(
        &self,
    ) -> Result<IndexMap<String, Vec<String>>, AclSyncError> {
        let groups = self.current_groups().await?;
        let users = self.current_users().await?;
        let by_id: HashMap<i64, &String> = users.iter().map(|(name, id)| (*id, name)).collect();
        Ok(groups
            .into_iter()
            .map(|(group, ids)| {
                let members = ids
                    .iter()
                    .filter_map(|id| by_id.get(id).map(|name| (*name).clone()))
                    .collect();
                (group, members)
            })
            .collect())
    }

    /// Current user name to the role flags it holds.
    pub async fn current_user_roles(
        &self,
    ) -> Result<IndexMap<String, Vec<String>>, AclSyncError> {
        let rows = self.executor.execute(CURRENT_USER_ROLES_QUERY).await?;
        let mut roles = IndexMap::new();
        for row in rows {
            let name = row.get("name").cloned().unwrap_or_default();
            let user_roles = row
                .get("user_roles")
                .map(|list| {
                    list.split(',')
                        .filter(|role| !role.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default();
            roles.insert(name, user_roles);
        }
        Ok(roles)
    }

    /// The cluster's full current ACL state at one scope. Grantees matching
    /// a current group name get the `"group "` prefix; PUBLIC grants are
    /// ignored.
    pub async fn current_acl(&self, scope: Scope) -> Result<AclMap, AclSyncError> {
        let query = match scope {
            Scope::Database => DATABASE_ACL_QUERY,
            Scope::Schema => SCHEMA_ACL_QUERY,
            Scope::Table => TABLE_ACL_QUERY,
        };
        let rows = self.executor.execute(query).await?;
        let groups = self.current_groups().await?;

        let mut acl = AclMap::new();
        for row in rows {
            let name = row.get("name").cloned().unwrap_or_default();
            let raw = row.get("acls").cloned().unwrap_or_default();
            debug!("Current ACL: [{scope}] '{name}': {raw}");
            for (grantee, privileges) in
                grants::parse_acl_entries(scope, &raw, &self.master_username)
            {
                if grantee.is_empty() {
                    continue;
                }
                let grantee = if groups.contains_key(&grantee) {
                    debug!("Grantee '{grantee}' has been identified as a group");
                    format!("group {grantee}")
                } else {
                    grantee
                };
                let held = acl
                    .entry(grantee)
                    .or_default()
                    .entry(name.clone())
                    .or_default();
                for privilege in privileges {
                    if !held.contains(&privilege) {
                        held.push(privilege);
                    }
                }
            }
        }
        Ok(acl)
    }

    /// Qualified names of every table in one schema.
    pub async fn tables_in_schema(&self, schema: &str) -> Result<Vec<String>, AclSyncError> {
        let query = format!(
            "select tablename from pg_tables where schemaname='{}';",
            quote_literal(schema)
        );
        let rows = self.executor.execute(&query).await?;
        Ok(rows
            .iter()
            .filter_map(|row| row.get("tablename"))
            .map(|table| format!("{schema}.{table}"))
            .collect())
    }

    /// Schemas owned by one user.
    pub async fn owned_schemas(&self, user: &str) -> Result<Vec<String>, AclSyncError> {
        let query = format!(
            "select pg_namespace.nspname as schemaname \
             from pg_namespace \
             left join pg_user on pg_namespace.nspowner = pg_user.usesysid \
             where pg_user.usename = '{}';",
            quote_literal(user)
        );
        let rows = self.executor.execute(&query).await?;
        Ok(rows
            .iter()
            .filter_map(|row| row.get("schemaname").cloned())
            .collect())
    }

    /// Qualified names of every table owned by one user.
    pub async fn owned_tables(&self, user: &str) -> Result<Vec<String>, AclSyncError> {
        let query = format!(
            "select (schemaname || '.' || tablename) as tablename \
             from pg_tables where tableowner = '{}';",
            quote_literal(user)
        );
        let rows = self.executor.execute(&query).await?;
        Ok(rows
            .iter()
            .filter_map(|row| row.get("tablename").cloned())
            .collect())
    }
}
