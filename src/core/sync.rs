// src/core/sync.rs

//! The reconciler: drives the ordered reconciliation phases (users, groups,
//! group membership, role flags, then ACLs at database, schema, and table
//! scope), applying corrective statements for every divergence found.

use crate::core::catalog::CurrentStateReader;
use crate::core::diff;
use crate::core::errors::AclSyncError;
use crate::core::executor::{Executor, StatementRunner};
use crate::core::grants::GrantMap;
use crate::core::policy::PolicyDocument;
use crate::core::privilege::Scope;
use crate::core::resolver::DesiredStateResolver;
use crate::core::statements;
use indexmap::IndexMap;
use rand::Rng;
use rand::distributions::Alphanumeric;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Everything a run needs to know, passed in explicitly rather than read
/// from process-wide state.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// The superuser identity. Never deleted, exempt from role and ACL
    /// divergence accounting.
    pub master_username: String,
    /// The ordered list of schemas this tool manages. Objects outside them
    /// are never granted on; on user deletion they are dropped rather than
    /// reassigned.
    pub production_schemas: Vec<String>,
    /// Protected users exempt from "undefined" detection.
    pub system_users: Vec<String>,
    /// Protected groups exempt from "undefined" detection.
    pub system_groups: Vec<String>,
    /// Compute and log corrective statements without executing them.
    pub dry_run: bool,
    pub max_retries: u32,
    pub retry_backoff: Duration,
}

pub struct Reconciler<'a> {
    options: SyncOptions,
    policy: &'a PolicyDocument,
    runner: StatementRunner<'a>,
    reader: CurrentStateReader<'a>,
}

impl<'a> Reconciler<'a> {
    pub fn new(
        options: SyncOptions,
        policy: &'a PolicyDocument,
        executor: &'a dyn Executor,
    ) -> Self {
        let runner = StatementRunner::new(
            executor,
            options.dry_run,
            options.max_retries,
            options.retry_backoff,
        );
        let reader = CurrentStateReader::new(executor, options.master_username.clone());
        Self {
            options,
            policy,
            runner,
            reader,
        }
    }

    /// Runs every phase in order, aborting on the first fatal error. The
    /// phases assume their predecessors already converged; there are no
    /// backward transitions.
    pub async fn run(&self) -> Result<(), AclSyncError> {
        self.banner();
        self.sync_users().await?;
        self.sync_groups().await?;
        self.sync_user_groups().await?;
        self.sync_user_roles().await?;
        self.sync_acl().await?;
        Ok(())
    }

    fn banner(&self) {
        info!("Starting ACL sync");
        if self.options.dry_run {
            info!("Running in DRY-MODE (not enforcing state)");
        } else {
            warn!("Dry mode disabled, executing on production");
            info!("Running in PRODUCTION-MODE (enforcing state)");
        }
        info!("Master user:    {}", self.options.master_username);
        info!("Synced schemas: {}", self.options.production_schemas.join(", "));
        info!("System users:   {}", self.options.system_users.join(", "));
        info!("System groups:  {}", self.options.system_groups.join(", "));
    }

    /// Phase 1: user identities. Extra users are dropped after their object
    /// ownership is resolved; missing users are created with password, role
    /// flags, and a search path covering the production schemas.
    pub async fn sync_users(&self) -> Result<(), AclSyncError> {
        let current_users: Vec<String> =
            self.reader.current_users().await?.keys().cloned().collect();
        let defined_users: Vec<String> = self.policy.users.keys().cloned().collect();

        let divergence =
            diff::diff_excluding(&current_users, &defined_users, &self.options.system_users);
        debug!("Undefined users: {:?}", divergence.undefined);
        debug!("Missing users: {:?}", divergence.missing);

        for user in &divergence.undefined {
            self.delete_user(user).await?;
        }
        for user in &divergence.missing {
            let Some(user_policy) = self.policy.users.get(user) else {
                continue;
            };
            let password = match &user_policy.password {
                Some(password) => password.clone(),
                None => generate_password(),
            };
            self.runner
                .run(&statements::create_user(user, &password, &user_policy.roles)?)
                .await?;
            self.runner
                .run(&statements::set_search_path(
                    user,
                    &self.options.production_schemas,
                )?)
                .await?;
        }

        if divergence.is_synced() {
            info!("All users are in sync");
        }
        Ok(())
    }

    /// Phase 2: group identities.
    pub async fn sync_groups(&self) -> Result<(), AclSyncError> {
        let current_groups: Vec<String> =
            self.reader.current_groups().await?.keys().cloned().collect();
        let defined_groups: Vec<String> = self.policy.groups.keys().cloned().collect();

        let divergence =
            diff::diff_excluding(&current_groups, &defined_groups, &self.options.system_groups);

        for group in &divergence.undefined {
            self.delete_group(group).await?;
        }
        for group in &divergence.missing {
            self.runner.run(&statements::create_group(group)?).await?;
        }

        if divergence.is_synced() {
            info!("All groups are in sync");
        }
        Ok(())
    }

    /// Phase 3: group membership. Assumes identity reconciliation already
    /// succeeded; any user or group identity mismatch here is fatal.
    pub async fn sync_user_groups(&self) -> Result<(), AclSyncError> {
        let current_user_groups = self.reader.current_user_groups().await?;
        let defined_user_groups = self.defined_user_groups();
        self.check_identity_sync(
            "group",
            &current_user_groups.keys().cloned().collect::<Vec<_>>(),
            &defined_user_groups.keys().cloned().collect::<Vec<_>>(),
            &self.options.system_groups,
        )?;

        let current_users: Vec<String> =
            self.reader.current_users().await?.keys().cloned().collect();
        let defined_users: Vec<String> = self.policy.users.keys().cloned().collect();
        self.check_identity_sync(
            "user",
            &current_users,
            &defined_users,
            &self.options.system_users,
        )?;

        let mut diverged = 0;
        let empty = Vec::new();
        for (group, current_members) in &current_user_groups {
            let defined_members = defined_user_groups.get(group).unwrap_or(&empty);
            let divergence = diff::diff(current_members, defined_members);

            for user in &divergence.undefined {
                self.runner
                    .run(&statements::remove_user_from_group(user, group)?)
                    .await?;
            }
            for user in &divergence.missing {
                self.runner
                    .run(&statements::add_user_to_group(user, group)?)
                    .await?;
            }

            diverged += divergence.count();
            if divergence.is_synced() {
                debug!("Users of group {group} are in sync");
            }
        }

        if diverged == 0 {
            info!("All user groups are in sync");
        }
        Ok(())
    }

    /// Phase 4: role flags. The desired flags of a user are the union of
    /// its direct roles and the roles of every group it belongs to. A user
    /// present on only one side at this stage is fatal.
    pub async fn sync_user_roles(&self) -> Result<(), AclSyncError> {
        let defined_user_roles = self.defined_user_roles();
        let current_user_roles = self.reader.current_user_roles().await?;

        let mut users: Vec<String> = Vec::new();
        for user in defined_user_roles.keys().chain(current_user_roles.keys()) {
            if !users.contains(user) {
                users.push(user.clone());
            }
        }

        let mut diverged = 0;
        for user in &users {
            if *user == self.options.master_username
                || self.options.system_users.contains(user)
            {
                continue;
            }

            let (Some(current_roles), Some(defined_roles)) =
                (current_user_roles.get(user), defined_user_roles.get(user))
            else {
                return Err(AclSyncError::Sync(format!("users are not in sync: {user}")));
            };

            let divergence = diff::diff(current_roles, defined_roles);
            diverged += divergence.count();

            for role in &divergence.undefined {
                self.runner
                    .run(&statements::disable_role(user, role)?)
                    .await?;
            }
            for role in &divergence.missing {
                self.runner
                    .run(&statements::enable_role(user, role)?)
                    .await?;
            }

            if divergence.is_synced() {
                debug!("Roles of {user} are in sync");
            }
        }

        if diverged == 0 {
            info!("All user roles are in sync");
        }
        Ok(())
    }

    /// Phase 5: ACLs, strictly after phases 1-4 succeeded, at database,
    /// then schema, then table scope.
    pub async fn sync_acl(&self) -> Result<(), AclSyncError> {
        for scope in [Scope::Database, Scope::Schema, Scope::Table] {
            self.sync_scope_acl(scope).await?;
        }
        Ok(())
    }

    async fn sync_scope_acl(&self, scope: Scope) -> Result<(), AclSyncError> {
        let current_acl = self.reader.current_acl(scope).await?;
        let resolver = DesiredStateResolver::new(
            self.policy,
            &self.options.production_schemas,
            &self.reader,
        );
        let defined_acl = resolver.desired_acl(scope).await?;

        let mut grantees: Vec<String> = Vec::new();
        for grantee in current_acl.keys().chain(defined_acl.keys()) {
            if !grantee.is_empty() && !grantees.contains(grantee) {
                grantees.push(grantee.clone());
            }
        }

        // Every grantee must resolve to a known current user or group
        // before anything is mutated.
        let mut known: Vec<String> =
            self.reader.current_users().await?.keys().cloned().collect();
        known.extend(
            self.reader
                .current_groups()
                .await?
                .keys()
                .map(|group| format!("group {group}")),
        );
        let unknown: Vec<String> = grantees
            .iter()
            .filter(|grantee| !known.contains(grantee))
            .cloned()
            .collect();
        if !unknown.is_empty() {
            return Err(AclSyncError::Sync(format!(
                "users or groups not in sync, could not find: {}",
                unknown.join(", ")
            )));
        }

        let mut diverged = 0;
        let empty = GrantMap::new();
        for grantee in &grantees {
            let current = current_acl.get(grantee).unwrap_or(&empty);
            let defined = defined_acl.get(grantee).unwrap_or(&empty);
            diverged += self
                .sync_grantee_privileges(grantee, scope, current, defined)
                .await?;
        }

        if diverged == 0 {
            info!("All {scope} privileges are in sync");
        }
        Ok(())
    }

    async fn sync_grantee_privileges(
        &self,
        grantee: &str,
        scope: Scope,
        current: &GrantMap,
        defined: &GrantMap,
    ) -> Result<usize, AclSyncError> {
        let mut identifiers: Vec<String> = Vec::new();
        for identifier in current.keys().chain(defined.keys()) {
            if !identifiers.contains(identifier) {
                identifiers.push(identifier.clone());
            }
        }

        let mut unsynced = 0;
        let empty = Vec::new();
        for identifier in &identifiers {
            if self.is_unmanaged(scope, identifier) {
                debug!(
                    "SKIPPED {scope} '{identifier}'. Cannot sync privileges for object outside production schemas!"
                );
                continue;
            }

            let current_privileges = current.get(identifier).unwrap_or(&empty);
            let defined_privileges = defined.get(identifier).unwrap_or(&empty);
            let divergence = diff::diff(current_privileges, defined_privileges);
            unsynced += divergence.count();

            self.revoke_privileges(grantee, scope, identifier, &divergence.undefined)
                .await?;
            self.grant_privileges(grantee, scope, identifier, &divergence.missing)
                .await?;
        }

        if unsynced == 0 {
            debug!("{scope} privileges for {grantee} are in sync");
        }
        Ok(unsynced)
    }

    /// Objects outside the managed production-schema set are skipped, not
    /// modified.
    fn is_unmanaged(&self, scope: Scope, identifier: &str) -> bool {
        match scope {
            Scope::Database => false,
            Scope::Schema => !self
                .options
                .production_schemas
                .iter()
                .any(|schema| schema == identifier),
            Scope::Table => !self
                .options
                .production_schemas
                .iter()
                .any(|schema| identifier.starts_with(&format!("{schema}."))),
        }
    }

    async fn grant_privileges(
        &self,
        grantee: &str,
        scope: Scope,
        identifier: &str,
        privileges: &[String],
    ) -> Result<(), AclSyncError> {
        if privileges.is_empty() {
            return Ok(());
        }
        self.runner
            .run(&statements::grant(grantee, scope, identifier, privileges)?)
            .await
    }

    async fn revoke_privileges(
        &self,
        grantee: &str,
        scope: Scope,
        identifier: &str,
        privileges: &[String],
    ) -> Result<(), AclSyncError> {
        if privileges.is_empty() {
            return Ok(());
        }
        self.runner
            .run(&statements::revoke(grantee, scope, identifier, privileges)?)
            .await
    }

    /// Drops a user: ownership is resolved first, then every privilege the
    /// user holds is revoked, and only then does the drop statement execute.
    async fn delete_user(&self, user: &str) -> Result<(), AclSyncError> {
        if user == self.options.master_username {
            return Err(AclSyncError::Sync(
                "refusing to drop the master user; declare it in the policy".to_string(),
            ));
        }

        let owned_schemas = self.reader.owned_schemas(user).await?;
        let owned_tables = self.reader.owned_tables(user).await?;
        self.resolve_object_ownership(&owned_schemas, &owned_tables)
            .await?;
        self.revoke_all_privileges(user).await?;

        self.runner.run(&statements::drop_user(user)?).await
    }

    /// Eliminates dangling ownership before a user drop: objects inside the
    /// production-schema set are reassigned to the master user before
    /// anything outside it is destructively dropped. Tables are handled
    /// before schemas; schema drops cascade.
    async fn resolve_object_ownership(
        &self,
        schemas: &[String],
        tables: &[String],
    ) -> Result<(), AclSyncError> {
        let master = &self.options.master_username;

        let (production_tables, other_tables): (Vec<&String>, Vec<&String>) =
            tables.iter().partition(|table| {
                table
                    .split('.')
                    .next()
                    .map(|schema| self.options.production_schemas.iter().any(|p| p == schema))
                    .unwrap_or(false)
            });
        for table in production_tables {
            self.runner
                .run(&statements::alter_table_owner(table, master)?)
                .await?;
        }
        for table in other_tables {
            self.runner.run(&statements::drop_table(table)?).await?;
        }

        let (production_schemas, other_schemas): (Vec<&String>, Vec<&String>) = schemas
            .iter()
            .partition(|schema| self.options.production_schemas.contains(schema));
        for schema in production_schemas {
            self.runner
                .run(&statements::alter_schema_owner(schema, master)?)
                .await?;
        }
        for schema in other_schemas {
            self.runner
                .run(&statements::drop_schema_cascade(schema)?)
                .await?;
        }

        Ok(())
    }

    /// Revokes every privilege a grantee currently holds, across all three
    /// scopes.
    async fn revoke_all_privileges(&self, grantee: &str) -> Result<(), AclSyncError> {
        for scope in [Scope::Table, Scope::Schema, Scope::Database] {
            let acl = self.reader.current_acl(scope).await?;
            if let Some(grants) = acl.get(grantee) {
                for (identifier, privileges) in grants {
                    self.revoke_privileges(grantee, scope, identifier, privileges)
                        .await?;
                }
            }
        }
        Ok(())
    }

    /// Drops a group after revoking everything `"group <name>"` holds.
    async fn delete_group(&self, group: &str) -> Result<(), AclSyncError> {
        let full_group_name = format!("group {group}");
        self.revoke_all_privileges(&full_group_name).await?;
        self.runner.run(&statements::drop_group(group)?).await
    }

    fn check_identity_sync(
        &self,
        kind: &str,
        current: &[String],
        defined: &[String],
        protected: &[String],
    ) -> Result<(), AclSyncError> {
        debug!(
            "Check whether {kind}s are in sync. Current: {current:?}; Defined: {defined:?}; Protected: {protected:?}"
        );
        let divergence = diff::diff_excluding(current, defined, protected);
        if !divergence.is_synced() {
            return Err(AclSyncError::Sync(format!("{kind}s are out of sync")));
        }
        Ok(())
    }

    /// Group name to the member users the policy declares for it.
    fn defined_user_groups(&self) -> IndexMap<String, Vec<String>> {
        self.policy
            .groups
            .keys()
            .map(|group| {
                let members = self
                    .policy
                    .users
                    .iter()
                    .filter(|(_, user)| user.groups.contains(group))
                    .map(|(name, _)| name.clone())
                    .collect();
                (group.clone(), members)
            })
            .collect()
    }

    /// User name to the union of its direct role flags and the role flags
    /// of every group it belongs to.
    fn defined_user_roles(&self) -> IndexMap<String, Vec<String>> {
        self.policy
            .users
            .iter()
            .map(|(name, user)| {
                let mut roles = user.roles.clone();
                for group in &user.groups {
                    if let Some(group_policy) = self.policy.groups.get(group) {
                        roles.extend(group_policy.roles.iter().cloned());
                    }
                }
                let mut unique: Vec<String> = Vec::new();
                for role in roles {
                    if !unique.contains(&role) {
                        unique.push(role);
                    }
                }
                (name.clone(), unique)
            })
            .collect()
    }
}

/// Generates a password that satisfies the account policy: at least one
/// lowercase letter, one uppercase letter, and one digit.
pub fn generate_password() -> String {
    let mut rng = rand::thread_rng();
    loop {
        let password: String = (&mut rng)
            .sample_iter(&Alphanumeric)
            .take(24)
            .map(char::from)
            .collect();
        let has_lowercase = password.chars().any(|c| c.is_ascii_lowercase());
        let has_uppercase = password.chars().any(|c| c.is_ascii_uppercase());
        let has_digit = password.chars().any(|c| c.is_ascii_digit());
        if has_lowercase && has_uppercase && has_digit {
            return password;
        }
    }
}
