// src/config.rs

//! Manages tool configuration: loading, defaults, and validation.

use crate::core::errors::AclSyncError;
use crate::core::sync::SyncOptions;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::time::Duration;

/// Connection parameters for the managed cluster.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_host")]
    pub host: String,
    #[serde(default = "default_db_port")]
    pub port: u16,
    pub user: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    pub database: String,
    /// The run is sequential, so a single session suffices.
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

impl DatabaseConfig {
    /// Connection URL for sqlx.
    pub fn connection_url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.user,
            self.password.as_deref().unwrap_or(""),
            self.host,
            self.port,
            self.database
        )
    }
}

fn default_db_host() -> String {
    "127.0.0.1".to_string()
}
fn default_db_port() -> u16 {
    5432
}
fn default_pool_size() -> u32 {
    1
}
fn default_connect_timeout() -> u64 {
    30
}

/// A raw representation of the config file before validation.
#[derive(Deserialize)]
struct RawConfig {
    #[serde(default = "default_log_level")]
    log_level: String,
    policy_file: String,
    master_username: String,
    production_schemas: Vec<String>,
    #[serde(default = "default_system_users")]
    system_users: Vec<String>,
    #[serde(default = "default_system_groups")]
    system_groups: Vec<String>,
    #[serde(default = "default_dry_run")]
    dry_run: bool,
    #[serde(default = "default_max_retries")]
    max_retries: u32,
    #[serde(default = "default_retry_backoff")]
    retry_backoff_secs: u64,
    database: DatabaseConfig,
}

fn default_log_level() -> String {
    "info".to_string()
}
fn default_system_users() -> Vec<String> {
    vec!["rdsdb".to_string(), "postgres".to_string()]
}
fn default_system_groups() -> Vec<String> {
    vec!["pg_signal_backend".to_string()]
}
fn default_dry_run() -> bool {
    true
}
fn default_max_retries() -> u32 {
    3
}
fn default_retry_backoff() -> u64 {
    10
}

/// The final, validated tool configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub log_level: String,
    pub policy_file: String,
    pub master_username: String,
    pub production_schemas: Vec<String>,
    pub system_users: Vec<String>,
    pub system_groups: Vec<String>,
    pub dry_run: bool,
    pub max_retries: u32,
    pub retry_backoff_secs: u64,
    pub database: DatabaseConfig,
}

impl Config {
    pub fn from_file(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file at '{path}'"))?;
        let raw: RawConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse TOML from '{path}'"))?;

        let config = Config {
            log_level: raw.log_level,
            policy_file: raw.policy_file,
            master_username: raw.master_username,
            production_schemas: raw.production_schemas,
            system_users: raw.system_users,
            system_groups: raw.system_groups,
            dry_run: raw.dry_run,
            max_retries: raw.max_retries,
            retry_backoff_secs: raw.retry_backoff_secs,
            database: raw.database,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AclSyncError> {
        if self.master_username.is_empty() {
            return Err(AclSyncError::Config(
                "no master username provided".to_string(),
            ));
        }
        if self.production_schemas.is_empty() {
            return Err(AclSyncError::Config(
                "no production schemas provided".to_string(),
            ));
        }
        if self.policy_file.is_empty() {
            return Err(AclSyncError::Config("no policy file provided".to_string()));
        }
        Ok(())
    }

    /// The subset of the configuration the reconciler itself needs.
    pub fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            master_username: self.master_username.clone(),
            production_schemas: self.production_schemas.clone(),
            system_users: self.system_users.clone(),
            system_groups: self.system_groups.clone(),
            dry_run: self.dry_run,
            max_retries: self.max_retries,
            retry_backoff: Duration::from_secs(self.retry_backoff_secs),
        }
    }
}
