//! Job name derivation.
//!
//! A job's name is derived from its owning PackageBuild's name plus a
//! nominal trigger timestamp, so re-reconciling an unchanged resource can
//! never produce a second job identity.

use crate::error::ControllerError;
use chrono::{DateTime, Utc};

/// Strategy for choosing the nominal trigger time that keys a job's name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NamingStrategy {
    /// Zero-valued nominal timestamp: the name collapses to one fixed
    /// value per resource, so the controller manages a single current job
    /// per PackageBuild and a replacement reuses its predecessor's name.
    #[default]
    FixedNominal,

    /// Key on the observed trigger instant: distinct passes can produce
    /// distinct job identities.
    TriggerTime,
}

impl NamingStrategy {
    /// Parses the `JOB_NAMING` environment value.
    pub fn parse(value: &str) -> Result<Self, ControllerError> {
        match value {
            "fixed-nominal" => Ok(Self::FixedNominal),
            "trigger-time" => Ok(Self::TriggerTime),
            other => Err(ControllerError::InvalidConfig(format!(
                "JOB_NAMING must be \"fixed-nominal\" or \"trigger-time\", got \"{}\"",
                other
            ))),
        }
    }

    /// The nominal time recorded for a pass triggered at `trigger`.
    pub fn nominal_time(&self, trigger: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            Self::FixedNominal => DateTime::<Utc>::UNIX_EPOCH,
            Self::TriggerTime => trigger,
        }
    }

    /// Derives the owned job's name. Same inputs always yield the same
    /// name.
    pub fn job_name(&self, resource_name: &str, trigger: DateTime<Utc>) -> String {
        format!("{}-{}", resource_name, self.nominal_time(trigger).timestamp())
    }
}
