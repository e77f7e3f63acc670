//! PackageBuild Controller
//!
//! Keeps a single `batch/v1` Job in sync with each `PackageBuild` custom
//! resource: creates the job when it is missing, replaces it when its
//! execution spec drifts from the declared template, and projects
//! observed state back onto the resource's status.

mod backoff;
mod cluster;
mod compare;
mod controller;
mod error;
mod index;
mod job_builder;
mod naming;
mod owner;
mod queue;
mod reconciler;
mod status;
#[cfg(test)]
mod test_utils;
mod watcher;

use crate::controller::{Controller, ControllerConfig};
use crate::error::ControllerError;
use crate::naming::NamingStrategy;
use std::env;
use std::time::Duration;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), ControllerError> {
    tracing_subscriber::fmt::init();

    info!("Starting PackageBuild Controller");

    // Load configuration from environment variables
    let namespace = env::var("WATCH_NAMESPACE").ok();
    let workers = match env::var("RECONCILE_WORKERS") {
        Ok(raw) => raw.parse::<usize>().ok().filter(|w| *w > 0).ok_or_else(|| {
            ControllerError::InvalidConfig(format!(
                "RECONCILE_WORKERS must be a positive integer, got \"{}\"",
                raw
            ))
        })?,
        Err(_) => 4,
    };
    let pass_timeout = match env::var("RECONCILE_TIMEOUT_SECS") {
        Ok(raw) => {
            let secs = raw.parse::<u64>().ok().filter(|s| *s > 0).ok_or_else(|| {
                ControllerError::InvalidConfig(format!(
                    "RECONCILE_TIMEOUT_SECS must be a positive integer, got \"{}\"",
                    raw
                ))
            })?;
            Duration::from_secs(secs)
        }
        Err(_) => Duration::from_secs(300),
    };
    let naming = match env::var("JOB_NAMING") {
        Ok(raw) => NamingStrategy::parse(&raw)?,
        Err(_) => NamingStrategy::default(),
    };

    info!("Configuration:");
    info!("  Namespace: {}", namespace.as_deref().unwrap_or("default"));
    info!("  Workers: {}", workers);
    info!("  Pass timeout: {:?}", pass_timeout);
    info!("  Naming: {:?}", naming);

    // Initialize and run controller
    let controller = Controller::new(ControllerConfig {
        namespace,
        workers,
        pass_timeout,
        naming,
    })
    .await?;
    controller.run().await?;

    Ok(())
}
