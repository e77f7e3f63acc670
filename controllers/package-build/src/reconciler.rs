//! Reconciliation logic for PackageBuild resources.
//!
//! One pass drives the cluster toward the declared state: fetch the
//! resource, locate its current owned job, then create, replace, or
//! leave the job alone and project status. States are never stored; each
//! pass re-infers them from cluster reads.

use crate::cluster::ClusterAccess;
use crate::compare::job_specs_equal;
use crate::error::ControllerError;
use crate::index::controller_owner_name;
use crate::job_builder::build_job;
use crate::naming::NamingStrategy;
use crate::status::{job_time, project_status, status_patch};
use chrono::{DateTime, Utc};
use crds::PackageBuild;
use k8s_openapi::api::batch::v1::Job;
use std::time::Duration;
use tracing::{debug, error, info};

/// Fixed delay before re-checking that a created job settled.
pub const REQUEUE_INTERVAL: Duration = Duration::from_secs(60);

/// How a pass wants to be scheduled next. Requeue is an explicit delayed
/// self-trigger, not an error path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Nothing more to do; the next trigger is event-driven.
    Done,

    /// Run again after the given delay.
    RequeueAfter(Duration),
}

/// Reconciles PackageBuild resources against their owned jobs.
pub struct Reconciler<C> {
    cluster: C,
    naming: NamingStrategy,
}

impl<C: ClusterAccess> Reconciler<C> {
    /// Creates a new reconciler instance.
    pub fn new(cluster: C, naming: NamingStrategy) -> Self {
        Self { cluster, naming }
    }

    /// Runs one reconcile pass for the resource named `name`.
    pub async fn reconcile(&self, name: &str) -> Result<Outcome, ControllerError> {
        let Some(build) = self.cluster.get_package_build(name).await? else {
            info!("PackageBuild {} not found, ignoring since it must be deleted", name);
            return Ok(Outcome::Done);
        };

        let trigger = Utc::now();
        let Some(existing) = self.find_current_job(name, trigger).await? else {
            return self.create_job(&build, trigger).await;
        };
        let existing_name = existing.metadata.name.clone().unwrap_or_default();

        let Some(desired_spec) = build.spec.job_template.spec.as_ref() else {
            // retrying cannot succeed until the user edits the spec
            error!("PackageBuild {} has no jobTemplate.spec, not requeuing", name);
            return Ok(Outcome::Done);
        };
        let existing_spec = existing.spec.clone().unwrap_or_default();
        if !job_specs_equal(&existing_spec, desired_spec) {
            info!(
                "Job {} spec doesn't match desired state, deleting and recreating",
                existing_name
            );
            self.cluster.delete_job(&existing_name).await?;
            return self.create_job(&build, trigger).await;
        }

        debug!("Job {} matches desired state, updating status", existing_name);
        self.update_status(name, &build, Some(&existing)).await?;
        Ok(Outcome::Done)
    }

    /// The resource's current owned job, if any.
    ///
    /// Under fixed-nominal naming the derived name is the request key, so
    /// a direct get suffices. Under trigger-time naming each pass derives
    /// a fresh name, so the current job is the newest one carrying this
    /// resource's controller-owner reference.
    async fn find_current_job(
        &self,
        name: &str,
        trigger: DateTime<Utc>,
    ) -> Result<Option<Job>, ControllerError> {
        match self.naming {
            NamingStrategy::FixedNominal => {
                self.cluster.get_job(&self.naming.job_name(name, trigger)).await
            }
            NamingStrategy::TriggerTime => {
                let jobs = self.cluster.list_jobs().await?;
                Ok(jobs
                    .into_iter()
                    .filter(|job| controller_owner_name(job).as_deref() == Some(name))
                    .max_by_key(|job| job_time(job)))
            }
        }
    }

    /// Synthesizes and creates the owned job, then asks for a requeue to
    /// confirm the creation settled.
    async fn create_job(
        &self,
        build: &PackageBuild,
        trigger: DateTime<Utc>,
    ) -> Result<Outcome, ControllerError> {
        let name = build.metadata.name.as_deref().unwrap_or("<unnamed>");
        let job = match build_job(build, self.naming, trigger) {
            Ok(job) => job,
            Err(e) if e.is_construction() => {
                // don't bother requeuing until we get a change to the spec
                error!("Unable to construct job from template for {}: {}", name, e);
                return Ok(Outcome::Done);
            }
            Err(e) => return Err(e),
        };

        let job_name = job.metadata.name.as_deref().unwrap_or("<unnamed>");
        info!("Creating Job {} for PackageBuild {}", job_name, name);
        match self.cluster.create_job(&job).await {
            Ok(()) => {}
            Err(e) if e.is_already_exists() => {
                // lost a race with an earlier delivery of the same trigger;
                // the next pass folds into the mismatch/match path
                debug!("Job {} already exists, re-evaluating on requeue", job_name);
            }
            Err(e) => {
                error!("Failed to create Job {}: {}", job_name, e);
                return Err(e);
            }
        }
        Ok(Outcome::RequeueAfter(REQUEUE_INTERVAL))
    }

    /// Projects status from the observed job and writes it through the
    /// status subresource.
    async fn update_status(
        &self,
        name: &str,
        build: &PackageBuild,
        observed: Option<&Job>,
    ) -> Result<(), ControllerError> {
        let status = project_status(build, observed, true);
        let patch = status_patch(&status);
        self.cluster.patch_package_build_status(name, &patch).await?;
        debug!("Updated PackageBuild {} status", name);
        Ok(())
    }
}
