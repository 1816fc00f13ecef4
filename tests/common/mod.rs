#![allow(dead_code)]

use aclsync::core::errors::AclSyncError;
use aclsync::core::executor::{Executor, Row};
use aclsync::core::policy::PolicyDocument;
use aclsync::core::sync::SyncOptions;
use async_trait::async_trait;
use std::sync::Mutex;
use std::time::Duration;

/// Test double that serves canned rows for catalog queries (matched by SQL
/// fragment, first match wins) and records every statement it is asked to
/// execute.
#[derive(Default)]
pub struct MockExecutor {
    fixtures: Vec<(String, Vec<Row>)>,
    transient_failures: Mutex<Vec<(String, usize)>>,
    fatal_failures: Vec<String>,
    statements: Mutex<Vec<String>>,
}

impl MockExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rows(mut self, fragment: &str, rows: Vec<Row>) -> Self {
        self.fixtures.push((fragment.to_string(), rows));
        self
    }

    /// The next `times` statements containing `fragment` fail with the
    /// transient (undefined table) error class.
    pub fn failing_transiently(self, fragment: &str, times: usize) -> Self {
        self.transient_failures
            .lock()
            .unwrap()
            .push((fragment.to_string(), times));
        self
    }

    /// Statements containing `fragment` always fail with a fatal execution
    /// error.
    pub fn failing_fatally(mut self, fragment: &str) -> Self {
        self.fatal_failures.push(fragment.to_string());
        self
    }

    /// Every statement the executor received, queries included.
    pub fn executed(&self) -> Vec<String> {
        self.statements.lock().unwrap().clone()
    }

    /// Only the mutating statements the executor received.
    pub fn mutations(&self) -> Vec<String> {
        self.executed()
            .into_iter()
            .filter(|statement| !statement.trim_start().starts_with("select"))
            .collect()
    }

    pub fn executed_count(&self, fragment: &str) -> usize {
        self.executed()
            .iter()
            .filter(|statement| statement.contains(fragment))
            .count()
    }
}

#[async_trait]
impl Executor for MockExecutor {
    async fn execute(&self, statement: &str) -> Result<Vec<Row>, AclSyncError> {
        self.statements.lock().unwrap().push(statement.to_string());

        {
            let mut failures = self.transient_failures.lock().unwrap();
            for (fragment, remaining) in failures.iter_mut() {
                if statement.contains(fragment.as_str()) && *remaining > 0 {
                    *remaining -= 1;
                    return Err(AclSyncError::TransientExecution(format!(
                        "relation referenced by statement does not exist: {statement}"
                    )));
                }
            }
        }

        for fragment in &self.fatal_failures {
            if statement.contains(fragment.as_str()) {
                return Err(AclSyncError::Execution(format!(
                    "statement rejected: {statement}"
                )));
            }
        }

        for (fragment, rows) in &self.fixtures {
            if statement.contains(fragment.as_str()) {
                return Ok(rows.clone());
            }
        }
        Ok(Vec::new())
    }
}

pub fn row(pairs: &[(&str, &str)]) -> Row {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

pub fn policy(value: serde_json::Value) -> PolicyDocument {
    serde_json::from_value(value).expect("test policy should deserialize")
}

pub fn options(dry_run: bool) -> SyncOptions {
    SyncOptions {
        master_username: "admin".to_string(),
        production_schemas: vec!["prod".to_string()],
        system_users: vec!["rdsdb".to_string(), "postgres".to_string()],
        system_groups: vec!["pg_signal_backend".to_string()],
        dry_run,
        max_retries: 3,
        retry_backoff: Duration::from_millis(1),
    }
}
