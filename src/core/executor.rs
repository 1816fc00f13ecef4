// src/core/executor.rs

//! Statement execution: the `Executor` capability the whole engine runs
//! against, the sqlx-backed production implementation, and the retrying
//! statement runner every corrective statement passes through.

use crate::config::DatabaseConfig;
use crate::core::errors::AclSyncError;
use crate::core::statements;
use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Column, Row as _};
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info};

/// One result row, column name to textual value.
pub type Row = HashMap<String, String>;

/// Capability to run a statement against the live cluster and get rows back.
#[async_trait]
pub trait Executor: Send + Sync {
    async fn execute(&self, statement: &str) -> Result<Vec<Row>, AclSyncError>;
}

/// sqlx-backed executor holding one small pool against the managed cluster.
/// The run is sequential by design, so the pool defaults to a single
/// connection.
pub struct PgExecutor {
    pool: PgPool,
}

impl PgExecutor {
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, AclSyncError> {
        debug!(
            host = %config.host,
            database = %config.database,
            "Opening database connection pool"
        );
        let pool = PgPoolOptions::new()
            .max_connections(config.pool_size)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
            .connect(&config.connection_url())
            .await
            .map_err(|e| {
                AclSyncError::Execution(format!(
                    "failed to connect to database at {}:{}: {e}",
                    config.host, config.port
                ))
            })?;
        Ok(Self { pool })
    }

    fn row_to_map(row: &PgRow) -> Row {
        let mut map = Row::new();
        for column in row.columns() {
            let name = column.name();
            let value = row
                .try_get::<String, _>(name)
                .or_else(|_| row.try_get::<i64, _>(name).map(|v| v.to_string()))
                .or_else(|_| row.try_get::<i32, _>(name).map(|v| v.to_string()))
                .or_else(|_| {
                    row.try_get::<sqlx::postgres::types::Oid, _>(name)
                        .map(|v| v.0.to_string())
                })
                .or_else(|_| row.try_get::<bool, _>(name).map(|v| v.to_string()))
                .unwrap_or_default();
            map.insert(name.to_string(), value);
        }
        map
    }
}

#[async_trait]
impl Executor for PgExecutor {
    async fn execute(&self, statement: &str) -> Result<Vec<Row>, AclSyncError> {
        let rows = sqlx::query(statement)
            .fetch_all(&self.pool)
            .await
            .map_err(classify_error)?;
        Ok(rows.iter().map(Self::row_to_map).collect())
    }
}

/// Postgres reports a statement against a not-yet-visible relation as
/// `42P01` (undefined table, typically catalog lag right after object
/// creation); that class is retried. Everything else is fatal.
fn classify_error(err: sqlx::Error) -> AclSyncError {
    if let sqlx::Error::Database(ref db_err) = err {
        if db_err.code().as_deref() == Some("42P01") {
            return AclSyncError::TransientExecution(db_err.to_string());
        }
    }
    AclSyncError::Execution(err.to_string())
}

/// The single execution path for corrective statements: redacted logging,
/// dry-run short-circuit, and a bounded linear-backoff retry loop for the
/// transient failure class only.
pub struct StatementRunner<'a> {
    executor: &'a dyn Executor,
    dry_run: bool,
    max_retries: u32,
    retry_backoff: Duration,
}

impl<'a> StatementRunner<'a> {
    pub fn new(
        executor: &'a dyn Executor,
        dry_run: bool,
        max_retries: u32,
        retry_backoff: Duration,
    ) -> Self {
        Self {
            executor,
            dry_run,
            max_retries,
            retry_backoff,
        }
    }

    pub async fn run(&self, statement: &str) -> Result<(), AclSyncError> {
        info!("{}", statements::redact(statement));
        if self.dry_run {
            return Ok(());
        }

        let mut attempts: u32 = 0;
        loop {
            if attempts > 0 {
                let delay = self.retry_backoff * attempts;
                info!("Retrying statement in {:?}...", delay);
                sleep(delay).await;
            }
            attempts += 1;
            match self.executor.execute(statement).await {
                Ok(_) => return Ok(()),
                Err(AclSyncError::TransientExecution(message)) => {
                    error!("Transient execution failure: {message}");
                    if attempts > self.max_retries {
                        return Err(AclSyncError::Sync(
                            "maximum number of attempts exceeded, giving up".to_string(),
                        ));
                    }
                }
                Err(other) => return Err(other),
            }
        }
    }
}
