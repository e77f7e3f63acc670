//! PackageBuild CRD
//!
//! Declares a package build/publish task carried out by a single owned
//! `batch/v1` Job.

use crate::conditions::Condition;
use k8s_openapi::api::batch::v1::JobTemplateSpec;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "pkgforge.io",
    version = "v1",
    kind = "PackageBuild",
    namespaced,
    status = "PackageBuildStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct PackageBuildSpec {
    /// Name of the package to build/publish
    pub package_name: String,

    /// What the owned job is expected to do with the package
    #[serde(default)]
    pub build_type: BuildType,

    /// Where the package sources come from
    #[serde(default)]
    pub source_type: SourceType,

    /// Source path (interpretation depends on sourceType)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_path: Option<String>,

    /// Source URL (interpretation depends on sourceType)
    #[serde(default, rename = "sourceURL", skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,

    /// How many finished successful jobs to retain
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub successful_jobs_history_limit: Option<u32>,

    /// How many finished failed jobs to retain
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_jobs_history_limit: Option<u32>,

    /// Template for the owned job. The execution spec inside is copied
    /// verbatim onto created jobs and is opaque to the controller.
    #[schemars(schema_with = "job_template_schema")]
    pub job_template: JobTemplateSpec,
}

/// `JobTemplateSpec` comes from k8s-openapi and carries no schemars
/// implementation; the apiserver validates the embedded job spec, so the
/// CRD schema only needs to preserve it.
fn job_template_schema(_generator: &mut schemars::SchemaGenerator) -> schemars::Schema {
    schemars::json_schema!({
        "type": "object",
        "x-kubernetes-preserve-unknown-fields": true
    })
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
/// Build task flavor
#[serde(rename_all = "PascalCase")]
pub enum BuildType {
    /// Build the package only
    #[default]
    Build,

    /// Build, then publish
    BuildPublish,

    /// Publish a previously built package
    Publish,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
/// Package source location flavor
#[serde(rename_all = "PascalCase")]
pub enum SourceType {
    /// Sources available on a local path
    #[default]
    Local,

    /// Sources fetched from a Git repository
    Git,

    /// Sources fetched from an S3 bucket
    S3,
}

/// Observed state, rebuilt from the cluster on every reconcile pass.
///
/// Every field serializes even when empty: status is written as a merge
/// patch, and a field the projector dropped must overwrite (not outlive)
/// the previous pass's value.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PackageBuildStatus {
    /// References to currently running owned jobs
    #[serde(default)]
    #[schemars(length(max = 10))]
    pub active: Vec<JobReference>,

    /// Nominal start time of the most recently observed owned job
    #[serde(default)]
    pub last_job_time: Option<chrono::DateTime<chrono::Utc>>,

    /// Observed conditions, unique per type
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

/// Reference to an owned job.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct JobReference {
    /// Job name
    pub name: String,

    /// Job namespace
    pub namespace: String,

    /// Job UID, when known
    #[serde(default)]
    pub uid: Option<String>,
}
