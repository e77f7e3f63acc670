//! Test utilities for unit testing the reconciler.
//!
//! This module provides helpers for creating test data and an in-memory
//! `ClusterAccess` fake that records every write it sees.

use crate::cluster::ClusterAccess;
use crate::error::ControllerError;
use crate::owner::link_controller_owner;
use crds::{PackageBuild, PackageBuildSpec};
use k8s_openapi::api::batch::v1::{Job, JobCondition, JobStatus};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::Error as KubeError;
use kube::core::ErrorResponse;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Helper to create a test PackageBuild with a populated job template.
pub fn make_package_build(name: &str, namespace: &str) -> PackageBuild {
    let spec: PackageBuildSpec = serde_json::from_value(serde_json::json!({
        "packageName": name,
        "jobTemplate": {
            "metadata": {
                "labels": {"app": name},
                "annotations": {"team": "builds"}
            },
            "spec": {
                "backoffLimit": 2,
                "template": {
                    "spec": {
                        "restartPolicy": "Never",
                        "containers": [{"name": "build", "image": "builder:1"}]
                    }
                }
            }
        }
    }))
    .expect("test spec should deserialize");

    PackageBuild {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            uid: Some(format!("uid-{}", name)),
            ..Default::default()
        },
        spec,
        status: None,
    }
}

/// Helper to create a bare job with no owner.
pub fn make_job(name: &str, namespace: &str) -> Job {
    Job {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            uid: Some(format!("uid-{}", name)),
            ..Default::default()
        },
        spec: None,
        status: None,
    }
}

/// Helper to create a job owned by `build`, carrying its template spec.
pub fn make_owned_job(name: &str, namespace: &str, build: &PackageBuild) -> Job {
    let mut job = make_job(name, namespace);
    job.spec = build.spec.job_template.spec.clone();
    link_controller_owner(&mut job, build).expect("test build should be referencable");
    job
}

/// Helper to append a condition to a job's status.
pub fn with_job_condition(mut job: Job, type_: &str, status: &str) -> Job {
    let condition = JobCondition {
        type_: type_.to_string(),
        status: status.to_string(),
        ..Default::default()
    };
    job.status
        .get_or_insert_with(JobStatus::default)
        .conditions
        .get_or_insert_with(Vec::new)
        .push(condition);
    job
}

/// A transient API-server failure (retryable).
pub fn transient_error() -> ControllerError {
    ControllerError::Kube(KubeError::Api(ErrorResponse {
        status: "Failure".to_string(),
        message: "the server is currently unable to handle the request".to_string(),
        reason: "InternalError".to_string(),
        code: 500,
    }))
}

fn already_exists_error(name: &str) -> ControllerError {
    ControllerError::Kube(KubeError::Api(ErrorResponse {
        status: "Failure".to_string(),
        message: format!("jobs.batch \"{}\" already exists", name),
        reason: "AlreadyExists".to_string(),
        code: 409,
    }))
}

/// In-memory cluster state behind the fake.
#[derive(Debug, Default)]
pub struct FakeState {
    pub builds: HashMap<String, PackageBuild>,
    pub jobs: HashMap<String, Job>,
    pub created: Vec<String>,
    pub deleted: Vec<String>,
    pub status_patches: Vec<(String, serde_json::Value)>,
    /// Simulate cache lag: gets report jobs as missing while the store
    /// still holds them, so creates collide.
    pub hide_jobs_from_get: bool,
    /// Fail this many job gets with a transient error before recovering.
    pub get_job_failures: u32,
}

/// In-memory `ClusterAccess` implementation for reconciler tests.
#[derive(Debug, Clone, Default)]
pub struct FakeCluster {
    state: Arc<Mutex<FakeState>>,
}

impl FakeCluster {
    /// Creates an empty fake cluster.
    pub fn new() -> Self {
        Self::default()
    }

    /// Locks the backing state for inspection or seeding.
    pub fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Seeds a PackageBuild.
    pub fn insert_build(&self, build: PackageBuild) {
        let name = build.metadata.name.clone().expect("build has a name");
        self.lock().builds.insert(name, build);
    }

    /// Seeds a job without recording a create.
    pub fn insert_job(&self, job: Job) {
        let name = job.metadata.name.clone().expect("job has a name");
        self.lock().jobs.insert(name, job);
    }
}

#[async_trait::async_trait]
impl ClusterAccess for FakeCluster {
    async fn get_package_build(&self, name: &str) -> Result<Option<PackageBuild>, ControllerError> {
        Ok(self.lock().builds.get(name).cloned())
    }

    async fn list_package_builds(&self) -> Result<Vec<PackageBuild>, ControllerError> {
        Ok(self.lock().builds.values().cloned().collect())
    }

    async fn get_job(&self, name: &str) -> Result<Option<Job>, ControllerError> {
        let mut state = self.lock();
        if state.get_job_failures > 0 {
            state.get_job_failures -= 1;
            return Err(transient_error());
        }
        if state.hide_jobs_from_get {
            return Ok(None);
        }
        Ok(state.jobs.get(name).cloned())
    }

    async fn list_jobs(&self) -> Result<Vec<Job>, ControllerError> {
        Ok(self.lock().jobs.values().cloned().collect())
    }

    async fn create_job(&self, job: &Job) -> Result<(), ControllerError> {
        let name = job.metadata.name.clone().expect("job has a name");
        let mut state = self.lock();
        if state.jobs.contains_key(&name) {
            return Err(already_exists_error(&name));
        }
        state.jobs.insert(name.clone(), job.clone());
        state.created.push(name);
        Ok(())
    }

    async fn delete_job(&self, name: &str) -> Result<(), ControllerError> {
        let mut state = self.lock();
        state.jobs.remove(name);
        state.deleted.push(name.to_string());
        Ok(())
    }

    async fn patch_package_build_status(
        &self,
        name: &str,
        patch: &serde_json::Value,
    ) -> Result<(), ControllerError> {
        let mut state = self.lock();
        if !state.builds.contains_key(name) {
            return Err(ControllerError::Kube(KubeError::Api(ErrorResponse {
                status: "Failure".to_string(),
                message: format!("packagebuilds.pkgforge.io \"{}\" not found", name),
                reason: "NotFound".to_string(),
                code: 404,
            })));
        }
        state.status_patches.push((name.to_string(), patch.clone()));
        Ok(())
    }
}
