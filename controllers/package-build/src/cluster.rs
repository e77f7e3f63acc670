//! Cluster access abstraction.
//!
//! The reconciler depends on this trait instead of a concrete client so
//! unit tests can substitute an in-memory fake. `KubeCluster` is the
//! production implementation over namespaced `Api` handles.

use crate::error::ControllerError;
use crds::PackageBuild;
use k8s_openapi::api::batch::v1::Job;
use kube::api::{DeleteParams, ListParams, Patch, PatchParams, PostParams};
use kube::{Api, Error as KubeError};

/// Cluster read/write operations the reconciler needs.
#[async_trait::async_trait]
pub trait ClusterAccess: Send + Sync {
    /// Fetch a PackageBuild; `None` when it does not exist.
    async fn get_package_build(&self, name: &str) -> Result<Option<PackageBuild>, ControllerError>;

    /// List all PackageBuilds in the watched namespace.
    async fn list_package_builds(&self) -> Result<Vec<PackageBuild>, ControllerError>;

    /// Fetch a job; `None` when it does not exist.
    async fn get_job(&self, name: &str) -> Result<Option<Job>, ControllerError>;

    /// List all jobs in the watched namespace.
    async fn list_jobs(&self) -> Result<Vec<Job>, ControllerError>;

    /// Create a job. An AlreadyExists rejection surfaces as a
    /// `ControllerError` for which `is_already_exists()` holds.
    async fn create_job(&self, job: &Job) -> Result<(), ControllerError>;

    /// Delete a job. Deleting a job that is already gone succeeds.
    async fn delete_job(&self, name: &str) -> Result<(), ControllerError>;

    /// Merge-patch a PackageBuild's status subresource.
    async fn patch_package_build_status(
        &self,
        name: &str,
        patch: &serde_json::Value,
    ) -> Result<(), ControllerError>;
}

/// Production cluster access over kube `Api` handles.
#[derive(Clone)]
pub struct KubeCluster {
    build_api: Api<PackageBuild>,
    job_api: Api<Job>,
}

impl KubeCluster {
    /// Creates cluster access from namespaced API handles.
    pub fn new(build_api: Api<PackageBuild>, job_api: Api<Job>) -> Self {
        Self { build_api, job_api }
    }
}

fn is_not_found(error: &KubeError) -> bool {
    matches!(error, KubeError::Api(response) if response.code == 404)
}

#[async_trait::async_trait]
impl ClusterAccess for KubeCluster {
    async fn get_package_build(&self, name: &str) -> Result<Option<PackageBuild>, ControllerError> {
        match self.build_api.get(name).await {
            Ok(build) => Ok(Some(build)),
            Err(e) if is_not_found(&e) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn list_package_builds(&self) -> Result<Vec<PackageBuild>, ControllerError> {
        Ok(self.build_api.list(&ListParams::default()).await?.items)
    }

    async fn get_job(&self, name: &str) -> Result<Option<Job>, ControllerError> {
        match self.job_api.get(name).await {
            Ok(job) => Ok(Some(job)),
            Err(e) if is_not_found(&e) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn list_jobs(&self) -> Result<Vec<Job>, ControllerError> {
        Ok(self.job_api.list(&ListParams::default()).await?.items)
    }

    async fn create_job(&self, job: &Job) -> Result<(), ControllerError> {
        self.job_api.create(&PostParams::default(), job).await?;
        Ok(())
    }

    async fn delete_job(&self, name: &str) -> Result<(), ControllerError> {
        // background propagation: the pods go away with the job
        match self.job_api.delete(name, &DeleteParams::background()).await {
            Ok(_) => Ok(()),
            Err(e) if is_not_found(&e) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn patch_package_build_status(
        &self,
        name: &str,
        patch: &serde_json::Value,
    ) -> Result<(), ControllerError> {
        self.build_api
            .patch_status(name, &PatchParams::default(), &Patch::Merge(patch))
            .await?;
        Ok(())
    }
}
