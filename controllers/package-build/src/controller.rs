//! Main controller implementation.
//!
//! This module contains the `Controller` struct that orchestrates
//! reconciliation and resource watching for the PackageBuild controller.

use crate::cluster::{ClusterAccess, KubeCluster};
use crate::error::ControllerError;
use crate::index::{JOB_OWNER_INDEX_KEY, JobOwnerIndex};
use crate::naming::NamingStrategy;
use crate::queue::Dispatcher;
use crate::reconciler::Reconciler;
use crate::watcher::Watcher;
use crds::PackageBuild;
use k8s_openapi::api::batch::v1::Job;
use kube::{Api, Client};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::info;

/// Controller configuration, resolved from the environment in `main`.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Namespace to watch; `None` falls back to `default`
    pub namespace: Option<String>,
    /// Concurrent reconcile passes
    pub workers: usize,
    /// Deadline for a single reconcile pass
    pub pass_timeout: Duration,
    /// Job name derivation strategy
    pub naming: NamingStrategy,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            namespace: None,
            workers: 4,
            pass_timeout: Duration::from_secs(300),
            naming: NamingStrategy::default(),
        }
    }
}

/// Main controller for PackageBuild management.
pub struct Controller {
    build_watcher: JoinHandle<Result<(), ControllerError>>,
    job_watcher: JoinHandle<Result<(), ControllerError>>,
    dispatcher: JoinHandle<Result<(), ControllerError>>,
}

impl Controller {
    /// Creates a new controller instance.
    pub async fn new(config: ControllerConfig) -> Result<Self, ControllerError> {
        info!("Initializing PackageBuild Controller");

        // Create Kubernetes client
        let kube_client = Client::try_default().await?;

        // Create API clients
        let ns = config.namespace.as_deref().unwrap_or("default");
        let build_api: Api<PackageBuild> = Api::namespaced(kube_client.clone(), ns);
        let job_api: Api<Job> = Api::namespaced(kube_client, ns);
        let cluster = KubeCluster::new(build_api.clone(), job_api.clone());

        // Build the job→owner index once before watching starts
        let jobs = cluster.list_jobs().await?;
        let index = JobOwnerIndex::build(&jobs);
        info!(
            "Indexed {} existing owned jobs under {}",
            index.len(),
            JOB_OWNER_INDEX_KEY
        );

        // Create reconciler and dispatcher
        let reconciler = Reconciler::new(cluster.clone(), config.naming);
        let (queue, dispatcher) = Dispatcher::new(reconciler, config.workers, config.pass_timeout);

        // Startup pass: every known resource gets one reconcile, and
        // indexed owners are enqueued so orphan-adjacent jobs are
        // re-checked even if their owner event is never replayed
        for build in cluster.list_package_builds().await? {
            if let Some(name) = build.metadata.name {
                queue.enqueue(name);
            }
        }
        for owner in index.owners() {
            queue.enqueue(owner.clone());
        }

        // Create watchers - use Arc to share the queue handle
        let watcher_instance = Arc::new(Watcher::new(queue, build_api, job_api));

        // Start watchers and dispatcher in background tasks
        let build_watcher = {
            let watcher = Arc::clone(&watcher_instance);
            tokio::spawn(async move { watcher.watch_package_builds().await })
        };
        let job_watcher = {
            let watcher = watcher_instance;
            tokio::spawn(async move { watcher.watch_jobs().await })
        };
        let dispatcher = tokio::spawn(dispatcher.run());

        Ok(Self {
            build_watcher,
            job_watcher,
            dispatcher,
        })
    }

    /// Runs the controller until shutdown.
    pub async fn run(mut self) -> Result<(), ControllerError> {
        info!("PackageBuild Controller running");

        // Wait for any task to exit (they should run forever)
        tokio::select! {
            result = &mut self.build_watcher => {
                result.map_err(|e| ControllerError::Watch(format!("PackageBuild watcher panicked: {}", e)))?
                    .map_err(|e| ControllerError::Watch(format!("PackageBuild watcher error: {}", e)))?;
            }
            result = &mut self.job_watcher => {
                result.map_err(|e| ControllerError::Watch(format!("Job watcher panicked: {}", e)))?
                    .map_err(|e| ControllerError::Watch(format!("Job watcher error: {}", e)))?;
            }
            result = &mut self.dispatcher => {
                result.map_err(|e| ControllerError::Watch(format!("Dispatcher panicked: {}", e)))?
                    .map_err(|e| ControllerError::Watch(format!("Dispatcher error: {}", e)))?;
            }
        }

        Ok(())
    }
}
