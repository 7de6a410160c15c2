// src/config/model.rs

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;

use crate::types::UnknownReferencePolicy;

/// Manifest as read from a TOML file, before validation.
///
/// ```toml
/// [scheduler]
/// unknown_reference_policy = "fail"
/// max_in_flight = 4
///
/// [resource."service/db"]
/// cmd = "kubectl apply -f db.yaml"
///
/// [resource."pod/web"]
/// labels = { app = "web" }
/// cmd = "kubectl apply -f web.yaml"
///
/// [[dependency]]
/// parent = "service/db"
/// child = "pod/web"
/// ```
///
/// All sections are optional.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawManifest {
    #[serde(default)]
    pub scheduler: SchedulerSection,

    /// Resources keyed by `kind/name`.
    #[serde(default)]
    pub resource: BTreeMap<String, ResourceEntry>,

    #[serde(default)]
    pub dependency: Vec<DependencyEntry>,
}

/// Validated manifest. Only constructible through `TryFrom<RawManifest>`.
#[derive(Debug, Clone)]
pub struct Manifest {
    pub scheduler: SchedulerSection,
    pub resource: BTreeMap<String, ResourceEntry>,
    pub dependency: Vec<DependencyEntry>,
}

impl Manifest {
    pub(crate) fn new_unchecked(
        scheduler: SchedulerSection,
        resource: BTreeMap<String, ResourceEntry>,
        dependency: Vec<DependencyEntry>,
    ) -> Self {
        Self {
            scheduler,
            resource,
            dependency,
        }
    }
}

/// `[scheduler]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerSection {
    /// `"fail"` (default) or `"ignore"`.
    #[serde(default)]
    pub unknown_reference_policy: UnknownReferencePolicy,

    /// Upper bound on concurrently running creations. Absent = unbounded.
    #[serde(default)]
    pub max_in_flight: Option<usize>,

    /// Total attempts per resource, including the first. `1` disables retries.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before a retry, e.g. `"500ms"`.
    #[serde(default)]
    pub retry_backoff: Option<String>,

    /// Deadline for the whole run, e.g. `"5m"`.
    #[serde(default)]
    pub timeout: Option<String>,
}

fn default_max_attempts() -> u32 {
    1
}

impl Default for SchedulerSection {
    fn default() -> Self {
        Self {
            unknown_reference_policy: UnknownReferencePolicy::default(),
            max_in_flight: None,
            max_attempts: default_max_attempts(),
            retry_backoff: None,
            timeout: None,
        }
    }
}

impl SchedulerSection {
    /// Parsed `retry_backoff`; zero when unset. Assumes a validated manifest.
    pub fn retry_backoff(&self) -> Duration {
        self.retry_backoff
            .as_deref()
            .and_then(|s| crate::types::parse_duration(s).ok())
            .unwrap_or(Duration::ZERO)
    }

    /// Parsed `timeout`. Assumes a validated manifest.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
            .as_deref()
            .and_then(|s| crate::types::parse_duration(s).ok())
    }
}

/// `[resource."kind/name"]` entry.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ResourceEntry {
    #[serde(default)]
    pub labels: BTreeMap<String, String>,

    /// Command that provisions the resource.
    #[serde(default)]
    pub cmd: Option<String>,

    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

/// `[[dependency]]` entry: `parent` must be Ready before `child` starts.
#[derive(Debug, Clone, Deserialize)]
pub struct DependencyEntry {
    pub parent: String,
    pub child: String,

    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}
