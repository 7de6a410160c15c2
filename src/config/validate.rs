// src/config/validate.rs

use crate::config::model::{Manifest, RawManifest};
use crate::errors::{Result, SchedulerError};
use crate::source::split_key;
use crate::types::parse_duration;

impl TryFrom<RawManifest> for Manifest {
    type Error = SchedulerError;

    fn try_from(raw: RawManifest) -> std::result::Result<Self, Self::Error> {
        validate_raw_manifest(&raw)?;
        Ok(Manifest::new_unchecked(raw.scheduler, raw.resource, raw.dependency))
    }
}

fn validate_raw_manifest(raw: &RawManifest) -> Result<()> {
    validate_scheduler_section(raw)?;
    validate_resource_keys(raw)?;
    validate_dependency_entries(raw)?;
    Ok(())
}

fn validate_scheduler_section(raw: &RawManifest) -> Result<()> {
    let section = &raw.scheduler;

    if section.max_in_flight == Some(0) {
        return Err(SchedulerError::Config(
            "[scheduler].max_in_flight must be >= 1 (got 0)".to_string(),
        ));
    }

    if section.max_attempts == 0 {
        return Err(SchedulerError::Config(
            "[scheduler].max_attempts must be >= 1 (got 0)".to_string(),
        ));
    }

    for (field, value) in [
        ("retry_backoff", &section.retry_backoff),
        ("timeout", &section.timeout),
    ] {
        if let Some(value) = value {
            parse_duration(value).map_err(|e| {
                SchedulerError::Config(format!("[scheduler].{field} = \"{value}\": {e}"))
            })?;
        }
    }

    Ok(())
}

fn validate_resource_keys(raw: &RawManifest) -> Result<()> {
    for key in raw.resource.keys() {
        if split_key(key).is_none() {
            return Err(SchedulerError::Config(format!(
                "resource key '{key}' must have the form \"kind/name\""
            )));
        }
    }
    Ok(())
}

// Unknown parent/child keys are deliberately not rejected here: the graph
// builder applies the configured `unknown_reference_policy`.
fn validate_dependency_entries(raw: &RawManifest) -> Result<()> {
    for (i, dep) in raw.dependency.iter().enumerate() {
        if dep.parent.trim().is_empty() || dep.child.trim().is_empty() {
            return Err(SchedulerError::Config(format!(
                "dependency #{i} must name both `parent` and `child`"
            )));
        }
    }
    Ok(())
}
