//! Status projection.
//!
//! Rebuilds a PackageBuild's status wholly from the observed job each
//! pass. Stored status is never an input: it only lends condition
//! transition timestamps so an unchanged world does not churn them.

use crate::job_builder::JOB_TIME_ANNOTATION;
use chrono::{DateTime, Utc};
use crds::{
    Condition, ConditionStatus, JobReference, PackageBuild, PackageBuildStatus, set_condition,
};
use k8s_openapi::api::batch::v1::Job;

/// Upper bound on active job references carried in status.
pub const MAX_ACTIVE_REFS: usize = 10;

/// Condition: the live job's execution spec matches the declared template.
pub const CONDITION_JOB_IN_SYNC: &str = "JobInSync";

/// Condition: the live job reported completion.
pub const CONDITION_JOB_COMPLETE: &str = "JobComplete";

/// Condition: the live job reported failure.
pub const CONDITION_JOB_FAILED: &str = "JobFailed";

/// Projects observed state onto a fresh status record.
pub fn project_status(
    build: &PackageBuild,
    observed: Option<&Job>,
    in_sync: bool,
) -> PackageBuildStatus {
    let mut status = PackageBuildStatus::default();
    // carry prior conditions over only so unchanged statuses keep their
    // transition timestamps; every value below is recomputed
    if let Some(previous) = &build.status {
        status.conditions = previous.conditions.clone();
    }

    if let Some(job) = observed {
        if !job_finished(job) {
            status.active.push(JobReference {
                name: job.metadata.name.clone().unwrap_or_default(),
                namespace: job.metadata.namespace.clone().unwrap_or_default(),
                uid: job.metadata.uid.clone(),
            });
        }
        status.active.truncate(MAX_ACTIVE_REFS);
        status.last_job_time = job_time(job);
    }

    let in_sync_condition = if in_sync {
        Condition::new(
            CONDITION_JOB_IN_SYNC,
            ConditionStatus::True,
            "JobMatches",
            "owned job matches the declared template",
        )
    } else {
        Condition::new(
            CONDITION_JOB_IN_SYNC,
            ConditionStatus::False,
            "SpecChanged",
            "owned job is being replaced to match the declared template",
        )
    };
    set_condition(&mut status.conditions, in_sync_condition);
    set_condition(
        &mut status.conditions,
        mirrored_condition(observed, "Complete", CONDITION_JOB_COMPLETE),
    );
    set_condition(
        &mut status.conditions,
        mirrored_condition(observed, "Failed", CONDITION_JOB_FAILED),
    );

    status
}

/// Wraps a projected status as the merge-patch document for the status
/// subresource. The document carries a `status` key only, so applying it
/// can never perturb spec fields.
pub fn status_patch(status: &PackageBuildStatus) -> serde_json::Value {
    serde_json::json!({ "status": status })
}

/// Nominal trigger time stamped on the job at synthesis; falls back to the
/// cluster's creation timestamp for jobs predating the annotation.
pub(crate) fn job_time(job: &Job) -> Option<DateTime<Utc>> {
    let stamped = job
        .metadata
        .annotations
        .as_ref()
        .and_then(|annotations| annotations.get(JOB_TIME_ANNOTATION))
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map(|t| t.with_timezone(&Utc));
    stamped.or_else(|| job.metadata.creation_timestamp.as_ref().map(|t| t.0))
}

fn job_condition_status(job: &Job, type_: &str) -> Option<String> {
    job.status
        .as_ref()?
        .conditions
        .as_ref()?
        .iter()
        .find(|c| c.type_ == type_)
        .map(|c| c.status.clone())
}

/// A job is finished once it reports Complete=True or Failed=True.
fn job_finished(job: &Job) -> bool {
    ["Complete", "Failed"]
        .iter()
        .any(|type_| job_condition_status(job, type_).as_deref() == Some("True"))
}

/// Mirrors one of the job's own conditions onto the resource; `Unknown`
/// while the job reports neither value.
fn mirrored_condition(observed: Option<&Job>, job_type: &str, resource_type: &str) -> Condition {
    match observed.and_then(|job| job_condition_status(job, job_type)) {
        Some(value) if value == "True" => Condition::new(
            resource_type,
            ConditionStatus::True,
            &format!("Job{}", job_type),
            &format!("owned job reported {}", job_type),
        ),
        Some(value) if value == "False" => Condition::new(
            resource_type,
            ConditionStatus::False,
            &format!("JobNot{}", job_type),
            &format!("owned job reported not {}", job_type),
        ),
        _ => Condition::new(
            resource_type,
            ConditionStatus::Unknown,
            "JobRunning",
            "owned job has not reported this condition",
        ),
    }
}
