//! Kubernetes resource watchers.
//!
//! This module handles watching PackageBuild and Job resources for
//! changes and feeding the reconcile work queue. Job events are routed to
//! the owning PackageBuild's key through the controller-owner extraction
//! the field index uses.

use crate::error::ControllerError;
use crate::index::controller_owner_name;
use crate::queue::WorkQueue;
use crds::PackageBuild;
use futures::TryStreamExt;
use k8s_openapi::api::batch::v1::Job;
use kube::Api;
use kube_runtime::watcher;
use tracing::{debug, info};

/// Watches Kubernetes resources for changes.
pub struct Watcher {
    queue: WorkQueue,
    build_api: Api<PackageBuild>,
    job_api: Api<Job>,
}

impl Watcher {
    /// Creates a new watcher instance.
    pub fn new(queue: WorkQueue, build_api: Api<PackageBuild>, job_api: Api<Job>) -> Self {
        Self {
            queue,
            build_api,
            job_api,
        }
    }

    /// Starts watching PackageBuild resources.
    pub async fn watch_package_builds(&self) -> Result<(), ControllerError> {
        info!("Starting PackageBuild watcher");

        let mut stream = Box::pin(watcher(self.build_api.clone(), watcher::Config::default()));

        while let Some(event) = stream
            .try_next()
            .await
            .map_err(|e| ControllerError::Watch(format!("Watcher stream error: {}", e)))?
        {
            match event {
                watcher::Event::Apply(build) => {
                    if let Some(name) = build.metadata.name {
                        info!("PackageBuild applied: {}", name);
                        self.queue.enqueue(name);
                    }
                }
                watcher::Event::Delete(build) => {
                    if let Some(name) = build.metadata.name {
                        info!("PackageBuild deleted: {}", name);
                        // the pass observes Absent and returns cleanly;
                        // the owned job is garbage-collected by Kubernetes
                        self.queue.enqueue(name);
                    }
                }
                watcher::Event::Init => {
                    info!("PackageBuild watcher initialized");
                }
                watcher::Event::InitApply(build) => {
                    if let Some(name) = build.metadata.name {
                        debug!("PackageBuild init apply: {}", name);
                        self.queue.enqueue(name);
                    }
                }
                watcher::Event::InitDone => {
                    info!("PackageBuild watcher initialization complete");
                }
            }
        }

        Ok(())
    }

    /// Starts watching Job resources, routing events to their owners.
    pub async fn watch_jobs(&self) -> Result<(), ControllerError> {
        info!("Starting Job watcher");

        let mut stream = Box::pin(watcher(self.job_api.clone(), watcher::Config::default()));

        while let Some(event) = stream
            .try_next()
            .await
            .map_err(|e| ControllerError::Watch(format!("Watcher stream error: {}", e)))?
        {
            match event {
                watcher::Event::Apply(job) | watcher::Event::InitApply(job) => {
                    self.route_job(&job);
                }
                watcher::Event::Delete(job) => {
                    debug!(
                        "Job deleted: {}",
                        job.metadata.name.as_deref().unwrap_or("<unknown>")
                    );
                    self.route_job(&job);
                }
                watcher::Event::Init => {
                    info!("Job watcher initialized");
                }
                watcher::Event::InitDone => {
                    info!("Job watcher initialization complete");
                }
            }
        }

        Ok(())
    }

    /// Enqueues the owning PackageBuild of a changed job, if any.
    fn route_job(&self, job: &Job) {
        match controller_owner_name(job) {
            Some(owner) => {
                debug!(
                    "Routing Job {} event to PackageBuild {}",
                    job.metadata.name.as_deref().unwrap_or("<unknown>"),
                    owner
                );
                self.queue.enqueue(owner);
            }
            None => {
                debug!(
                    "Job {} has no PackageBuild owner, ignoring",
                    job.metadata.name.as_deref().unwrap_or("<unknown>")
                );
            }
        }
    }
}
