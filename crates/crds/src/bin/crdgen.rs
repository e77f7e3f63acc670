//! CRD generation binary
//!
//! Prints the PackageBuild CustomResourceDefinition manifest as YAML, for
//! piping into `kubectl apply -f -`.

use crds::PackageBuild;
use kube::CustomResourceExt;

fn main() -> Result<(), serde_yaml::Error> {
    print!("{}", serde_yaml::to_string(&PackageBuild::crd())?);
    Ok(())
}
