//! Controller-specific error types.
//!
//! This module defines error types specific to the PackageBuild controller
//! that are not covered by upstream library errors.

use kube::Error as KubeError;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur in the PackageBuild controller.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Kubernetes API error
    #[error("Kubernetes error: {0}")]
    Kube(#[from] KubeError),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Structurally invalid job template on a PackageBuild
    #[error("Invalid job template: {0}")]
    InvalidTemplate(String),

    /// A job is already claimed by a different controller owner
    #[error("Ownership conflict: {0}")]
    OwnershipConflict(String),

    /// Required object metadata is missing
    #[error("Missing object metadata: {0}")]
    MissingMetadata(String),

    /// Resource watch failed
    #[error("Resource watch failed: {0}")]
    Watch(String),

    /// A reconcile pass overran its deadline
    #[error("Reconcile pass timed out after {0:?}")]
    Timeout(Duration),
}

impl ControllerError {
    /// Construction errors: retrying without a spec change cannot succeed,
    /// so the pass ends without a requeue.
    pub fn is_construction(&self) -> bool {
        matches!(
            self,
            Self::InvalidTemplate(_) | Self::OwnershipConflict(_) | Self::MissingMetadata(_)
        )
    }

    /// Errors worth retrying with backoff: network/API-server trouble,
    /// write conflicts, and overrun deadlines.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Kube(_) | Self::Timeout(_) | Self::Watch(_))
    }

    /// True for a create rejected because the object already exists. The
    /// next pass folds this into the mismatch/match path.
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::Kube(KubeError::Api(response)) if response.code == 409)
    }
}
