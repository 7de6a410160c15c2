// src/source/mod.rs

//! Record source boundary.
//!
//! The scheduler never talks to a cluster API directly. It reads two kinds of
//! records through the [`RecordSource`] trait:
//! - resource definitions (one per object to create), and
//! - dependency records (`parent` must be Ready before `child` starts).
//!
//! - [`memory`] holds [`StaticSource`], an in-memory source used by tests and
//!   embedders.
//! - [`manifest`] adapts a loaded TOML manifest into a source.
//! - [`selector`] implements label selectors usable as a [`ResourceFilter`].

use std::collections::BTreeMap;
use std::fmt::Debug;

use anyhow::Result;

pub mod manifest;
pub mod memory;
pub mod selector;

pub use manifest::ManifestSource;
pub use memory::StaticSource;
pub use selector::Selector;

/// Label set attached to definitions and dependency records.
pub type Labels = BTreeMap<String, String>;

/// Opaque data handed to the creation operation.
///
/// The scheduler itself never looks inside; only [`crate::exec::ShellCreator`]
/// interprets `cmd` and `env`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourcePayload {
    /// Command that provisions the resource (e.g. `kubectl apply -f pod.yaml`).
    pub cmd: Option<String>,
    /// Extra environment for `cmd`.
    pub env: BTreeMap<String, String>,
}

/// A single cluster object to be created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceDefinition {
    pub kind: String,
    pub name: String,
    pub labels: Labels,
    pub payload: ResourcePayload,
}

impl ResourceDefinition {
    pub fn new(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            name: name.into(),
            labels: Labels::new(),
            payload: ResourcePayload::default(),
        }
    }

    /// Build a definition from a `kind/name` key.
    ///
    /// Returns `None` if the key does not contain exactly one `/` separating
    /// two non-empty parts.
    pub fn from_key(key: &str) -> Option<Self> {
        let (kind, name) = split_key(key)?;
        Some(Self::new(kind, name))
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    pub fn with_cmd(mut self, cmd: impl Into<String>) -> Self {
        self.payload.cmd = Some(cmd.into());
        self
    }

    /// Unique key within a graph, e.g. `pod/ready-1`.
    pub fn key(&self) -> String {
        format!("{}/{}", self.kind, self.name)
    }
}

/// Split a `kind/name` key into its parts.
pub fn split_key(key: &str) -> Option<(&str, &str)> {
    let (kind, name) = key.split_once('/')?;
    if kind.is_empty() || name.is_empty() || name.contains('/') {
        return None;
    }
    Some((kind, name))
}

/// Declared ordering constraint: `parent` before `child`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyRecord {
    pub parent: String,
    pub child: String,
    pub labels: Labels,
}

impl DependencyRecord {
    pub fn new(parent: impl Into<String>, child: impl Into<String>) -> Self {
        Self {
            parent: parent.into(),
            child: child.into(),
            labels: Labels::new(),
        }
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// A dependency without labels of its own takes those of its child
    /// resource, so selecting a resource also selects what it requires.
    pub(crate) fn inheriting_labels(mut self, child_labels: Option<&Labels>) -> Self {
        if self.labels.is_empty()
            && let Some(labels) = child_labels
        {
            self.labels = labels.clone();
        }
        self
    }
}

/// Caller-supplied predicate restricting which records participate.
pub trait ResourceFilter: Send + Sync {
    fn matches(&self, labels: &Labels) -> bool;
}

impl<F> ResourceFilter for F
where
    F: Fn(&Labels) -> bool + Send + Sync,
{
    fn matches(&self, labels: &Labels) -> bool {
        self(labels)
    }
}

/// Source of resource definitions and dependency records.
///
/// Both operations accept an optional filter; `None` means "everything".
pub trait RecordSource: Send + Sync + Debug {
    fn list_resource_definitions(
        &self,
        filter: Option<&dyn ResourceFilter>,
    ) -> Result<Vec<ResourceDefinition>>;

    fn list_dependencies(&self, filter: Option<&dyn ResourceFilter>)
    -> Result<Vec<DependencyRecord>>;
}

/// Apply an optional filter to a label set.
pub(crate) fn passes(filter: Option<&dyn ResourceFilter>, labels: &Labels) -> bool {
    filter.is_none_or(|f| f.matches(labels))
}
