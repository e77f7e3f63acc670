//! Pkgforge CRD Definitions
//!
//! Kubernetes Custom Resource Definitions for the pkgforge controllers.

pub mod conditions;
pub mod package_build;

pub use conditions::*;
pub use package_build::*;
