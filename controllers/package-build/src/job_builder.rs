//! Job synthesis.
//!
//! Builds the desired job descriptor for a PackageBuild: deterministic
//! name, fresh label/annotation maps, a deep copy of the template's
//! execution spec, and a controller-owner reference.

use crate::error::ControllerError;
use crate::naming::NamingStrategy;
use crate::owner::link_controller_owner;
use chrono::{DateTime, SecondsFormat, Utc};
use crds::PackageBuild;
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::collections::BTreeMap;

/// Annotation carrying the nominal trigger time of the pass that created
/// the job. The status projector reads it back to reconstitute
/// `lastJobTime` without trusting stored status.
pub const JOB_TIME_ANNOTATION: &str = "pkgforge.io/job-time";

/// Synthesizes the desired job for `build`, triggered at `trigger`.
///
/// The execution spec is copied by value and the label/annotation maps are
/// fresh: later edits to the resource's template cannot retroactively
/// alter a job this call produced.
pub fn build_job(
    build: &PackageBuild,
    naming: NamingStrategy,
    trigger: DateTime<Utc>,
) -> Result<Job, ControllerError> {
    let build_name = build
        .metadata
        .name
        .as_deref()
        .ok_or_else(|| ControllerError::MissingMetadata("PackageBuild has no name".to_string()))?;
    let namespace = build.metadata.namespace.clone().ok_or_else(|| {
        ControllerError::MissingMetadata("PackageBuild has no namespace".to_string())
    })?;

    let template = &build.spec.job_template;
    let spec = template.spec.clone().ok_or_else(|| {
        ControllerError::InvalidTemplate("jobTemplate.spec is required".to_string())
    })?;

    let mut labels = BTreeMap::new();
    let mut annotations = BTreeMap::new();
    if let Some(metadata) = &template.metadata {
        for (k, v) in metadata.labels.iter().flatten() {
            labels.insert(k.clone(), v.clone());
        }
        for (k, v) in metadata.annotations.iter().flatten() {
            annotations.insert(k.clone(), v.clone());
        }
    }
    annotations.insert(
        JOB_TIME_ANNOTATION.to_string(),
        naming
            .nominal_time(trigger)
            .to_rfc3339_opts(SecondsFormat::Secs, true),
    );

    let mut job = Job {
        metadata: ObjectMeta {
            name: Some(naming.job_name(build_name, trigger)),
            namespace: Some(namespace),
            labels: Some(labels),
            annotations: Some(annotations),
            ..Default::default()
        },
        spec: Some(spec),
        status: None,
    };
    link_controller_owner(&mut job, build)?;

    Ok(job)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::owner::controller_owner_of;
    use crate::test_utils::make_package_build;

    #[test]
    fn test_build_job_copies_template() {
        let build = make_package_build("leviathan", "default");
        let job = build_job(&build, NamingStrategy::FixedNominal, Utc::now())
            .expect("synthesis should succeed");

        assert_eq!(job.metadata.name.as_deref(), Some("leviathan-0"));
        assert_eq!(job.metadata.namespace.as_deref(), Some("default"));
        assert_eq!(job.spec, build.spec.job_template.spec);

        let labels = job.metadata.labels.as_ref().expect("labels set");
        assert_eq!(labels.get("app").map(String::as_str), Some("leviathan"));

        let reference = controller_owner_of(&job).expect("controller owner set");
        assert_eq!(reference.name, "leviathan");
    }

    #[test]
    fn test_build_job_stamps_job_time() {
        let build = make_package_build("leviathan", "default");
        let trigger = DateTime::parse_from_rfc3339("2026-03-04T05:06:07Z")
            .expect("valid timestamp")
            .with_timezone(&Utc);

        let fixed = build_job(&build, NamingStrategy::FixedNominal, trigger)
            .expect("synthesis should succeed");
        let annotations = fixed.metadata.annotations.as_ref().expect("annotations set");
        assert_eq!(
            annotations.get(JOB_TIME_ANNOTATION).map(String::as_str),
            Some("1970-01-01T00:00:00Z")
        );

        let keyed = build_job(&build, NamingStrategy::TriggerTime, trigger)
            .expect("synthesis should succeed");
        let annotations = keyed.metadata.annotations.as_ref().expect("annotations set");
        assert_eq!(
            annotations.get(JOB_TIME_ANNOTATION).map(String::as_str),
            Some("2026-03-04T05:06:07Z")
        );
        assert_eq!(keyed.metadata.name.as_deref(), Some("leviathan-1772600767"));
    }

    #[test]
    fn test_maps_are_fresh_not_aliased() {
        let mut build = make_package_build("leviathan", "default");
        let job = build_job(&build, NamingStrategy::FixedNominal, Utc::now())
            .expect("synthesis should succeed");

        // mutate the source template after synthesis
        if let Some(metadata) = build.spec.job_template.metadata.as_mut() {
            if let Some(labels) = metadata.labels.as_mut() {
                labels.insert("app".to_string(), "changed".to_string());
            }
        }

        let labels = job.metadata.labels.as_ref().expect("labels set");
        assert_eq!(labels.get("app").map(String::as_str), Some("leviathan"));
    }

    #[test]
    fn test_missing_template_spec_is_a_construction_error() {
        let mut build = make_package_build("leviathan", "default");
        build.spec.job_template.spec = None;

        let error = build_job(&build, NamingStrategy::FixedNominal, Utc::now())
            .expect_err("missing template spec");
        assert!(matches!(error, ControllerError::InvalidTemplate(_)));
        assert!(error.is_construction());
    }

    #[test]
    fn test_unreferencable_owner_is_a_construction_error() {
        let mut build = make_package_build("leviathan", "default");
        build.metadata.uid = None;

        let error = build_job(&build, NamingStrategy::FixedNominal, Utc::now())
            .expect_err("missing owner uid");
        assert!(error.is_construction());
    }
}
