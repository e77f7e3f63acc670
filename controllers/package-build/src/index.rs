//! Job-to-owner field index.
//!
//! A reverse lookup from owned jobs to their owning PackageBuild's name.
//! The index is built once at startup from a job list and read-only
//! afterwards; live job events are routed through the same extraction
//! function without consulting it.

use crate::owner::{API_GROUP_VERSION, OWNER_KIND, controller_owner_of};
use k8s_openapi::api::batch::v1::Job;
use std::collections::HashMap;

/// Synthetic index key name, fixed for the process lifetime.
pub const JOB_OWNER_INDEX_KEY: &str = ".metadata.controller";

/// Extracts the owning PackageBuild's name from a job.
///
/// Returns `None` for jobs with no controller owner and for jobs
/// controlled by some other type; neither is an error.
pub fn controller_owner_name(job: &Job) -> Option<String> {
    let owner = controller_owner_of(job)?;
    if owner.api_version != API_GROUP_VERSION || owner.kind != OWNER_KIND {
        return None;
    }
    Some(owner.name.clone())
}

/// Owner name → owned job names, for O(1) event routing.
#[derive(Debug, Default)]
pub struct JobOwnerIndex {
    by_owner: HashMap<String, Vec<String>>,
    indexed: usize,
}

impl JobOwnerIndex {
    /// Builds the index from a job listing.
    pub fn build(jobs: &[Job]) -> Self {
        let mut index = Self::default();
        for job in jobs {
            let Some(owner) = controller_owner_name(job) else {
                continue;
            };
            let Some(job_name) = job.metadata.name.clone() else {
                continue;
            };
            index.by_owner.entry(owner).or_default().push(job_name);
            index.indexed += 1;
        }
        index
    }

    /// Job names owned by `owner_name`; empty for unknown owners.
    pub fn jobs_for(&self, owner_name: &str) -> &[String] {
        self.by_owner.get(owner_name).map_or(&[], Vec::as_slice)
    }

    /// Owner names with at least one indexed job.
    pub fn owners(&self) -> impl Iterator<Item = &String> {
        self.by_owner.keys()
    }

    /// Number of indexed jobs.
    pub fn len(&self) -> usize {
        self.indexed
    }

    /// True when no job was indexed.
    pub fn is_empty(&self) -> bool {
        self.indexed == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{make_job, make_owned_job, make_package_build};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;

    #[test]
    fn test_owned_job_is_discoverable_under_owner_name() {
        let build = make_package_build("leviathan", "default");
        let job = make_owned_job("leviathan-0", "default", &build);

        let index = JobOwnerIndex::build(&[job.clone()]);
        assert_eq!(index.jobs_for("leviathan"), ["leviathan-0".to_string()]);
        assert_eq!(index.len(), 1);
        assert_eq!(controller_owner_name(&job).as_deref(), Some("leviathan"));
    }

    #[test]
    fn test_ownerless_job_yields_empty_lookup() {
        let job = make_job("stray-0", "default");

        let index = JobOwnerIndex::build(&[job.clone()]);
        assert!(index.is_empty());
        assert!(index.jobs_for("stray").is_empty());
        assert_eq!(controller_owner_name(&job), None);
    }

    #[test]
    fn test_foreign_controller_owner_is_not_indexed() {
        let mut job = make_job("nightly-0", "default");
        job.metadata.owner_references = Some(vec![OwnerReference {
            api_version: "batch/v1".to_string(),
            kind: "CronJob".to_string(),
            name: "nightly".to_string(),
            uid: "other-uid".to_string(),
            controller: Some(true),
            block_owner_deletion: Some(true),
        }]);

        let index = JobOwnerIndex::build(&[job.clone()]);
        assert!(index.is_empty());
        assert_eq!(controller_owner_name(&job), None);
    }

    #[test]
    fn test_non_controller_reference_is_ignored() {
        let build = make_package_build("leviathan", "default");
        let mut job = make_owned_job("leviathan-0", "default", &build);
        if let Some(references) = job.metadata.owner_references.as_mut() {
            for reference in references.iter_mut() {
                reference.controller = Some(false);
            }
        }

        assert_eq!(controller_owner_name(&job), None);
        assert!(JobOwnerIndex::build(&[job]).is_empty());
    }

    #[test]
    fn test_multiple_jobs_group_under_one_owner() {
        let build = make_package_build("leviathan", "default");
        let jobs = vec![
            make_owned_job("leviathan-0", "default", &build),
            make_owned_job("leviathan-1", "default", &build),
            make_job("stray-0", "default"),
        ];

        let index = JobOwnerIndex::build(&jobs);
        assert_eq!(index.len(), 2);
        assert_eq!(index.jobs_for("leviathan").len(), 2);
    }
}
