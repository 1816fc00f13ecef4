// src/main.rs

//! The main entry point for the aclsync command-line tool.

use aclsync::config::Config;
use aclsync::core::executor::PgExecutor;
use aclsync::core::policy::PolicyDocument;
use aclsync::core::sync::Reconciler;
use anyhow::Result;
use std::env;
use tracing::error;
use tracing_subscriber::filter::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    const VERSION: &str = env!("CARGO_PKG_VERSION");

    let args: Vec<String> = env::args().collect();

    if args.contains(&"--version".to_string()) {
        println!("aclsync version {VERSION}");
        return Ok(());
    }

    // The configuration path can be provided via a --config flag;
    // otherwise, it defaults to "aclsync.toml".
    let config_path = args
        .iter()
        .position(|arg| arg == "--config")
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str())
        .unwrap_or("aclsync.toml");

    let mut config = match Config::from_file(config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load configuration from \"{config_path}\": {e:#}");
            std::process::exit(1);
        }
    };

    // Dry-run is the default; enforcing state on the cluster is opt-in.
    if args.contains(&"--apply".to_string()) {
        config.dry_run = false;
    }

    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| config.log_level.clone());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(log_level))
        .compact()
        .with_ansi(true)
        .init();

    let policy = match PolicyDocument::from_file(&config.policy_file) {
        Ok(policy) => policy,
        Err(e) => {
            error!("Failed to load policy document: {e}");
            std::process::exit(1);
        }
    };

    let executor = match PgExecutor::connect(&config.database).await {
        Ok(executor) => executor,
        Err(e) => {
            error!("{e}");
            std::process::exit(1);
        }
    };

    let reconciler = Reconciler::new(config.sync_options(), &policy, &executor);
    if let Err(e) = reconciler.run().await {
        error!("Sync aborted: {e}");
        return Err(e.into());
    }

    Ok(())
}
