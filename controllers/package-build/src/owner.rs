//! Controller-owner references.
//!
//! An owned job carries exactly one controller-owner reference back to its
//! PackageBuild. Kubernetes garbage collection uses it to cascade deletion,
//! and the job watcher uses it to route job events back to the owner.

use crate::error::ControllerError;
use crds::PackageBuild;
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;

/// API group/version of the owning resource type, fixed for the process
/// lifetime.
pub const API_GROUP_VERSION: &str = "pkgforge.io/v1";

/// Kind of the owning resource type.
pub const OWNER_KIND: &str = "PackageBuild";

/// Stamps `job` with a controller-owner reference to `owner`.
///
/// Fails with `MissingMetadata` when the owner cannot be referenced (not
/// yet persisted: no name or no UID) and with `OwnershipConflict` when the
/// job already names a different controller owner.
pub fn link_controller_owner(job: &mut Job, owner: &PackageBuild) -> Result<(), ControllerError> {
    let name = owner
        .metadata
        .name
        .clone()
        .ok_or_else(|| ControllerError::MissingMetadata("PackageBuild has no name".to_string()))?;
    let uid = owner
        .metadata
        .uid
        .clone()
        .ok_or_else(|| ControllerError::MissingMetadata("PackageBuild has no uid".to_string()))?;

    let reference = OwnerReference {
        api_version: API_GROUP_VERSION.to_string(),
        kind: OWNER_KIND.to_string(),
        name,
        uid,
        controller: Some(true),
        block_owner_deletion: Some(true),
    };

    let owner_references = job.metadata.owner_references.get_or_insert_with(Vec::new);
    if let Some(existing) = owner_references.iter().find(|r| r.controller == Some(true)) {
        if existing.uid == reference.uid {
            // already claimed by this owner, nothing to do
            return Ok(());
        }
        return Err(ControllerError::OwnershipConflict(format!(
            "job {} already controlled by {} {}",
            job.metadata.name.as_deref().unwrap_or("<unnamed>"),
            existing.kind,
            existing.name
        )));
    }
    owner_references.push(reference);
    Ok(())
}

/// The job's controller-owner reference, if it has one.
pub fn controller_owner_of(job: &Job) -> Option<&OwnerReference> {
    job.metadata
        .owner_references
        .as_ref()?
        .iter()
        .find(|r| r.controller == Some(true))
}
