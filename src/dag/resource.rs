// src/dag/resource.rs

//! Graph nodes and their status state machine.

use std::fmt;

use crate::source::ResourceDefinition;

use super::graph::DependencyGraph;

/// Index of a node in a [`DependencyGraph`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeIndex(pub(crate) usize);

impl NodeIndex {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Lifecycle of a scheduled resource.
///
/// ```text
/// Init ──► Creating ──► Ready
///             │  ▲
///             ▼  │ (retry policy only)
///            Error
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceStatus {
    /// Built, creation not attempted yet.
    Init,
    /// Creation dispatched and not yet returned.
    Creating,
    /// Creation succeeded; satisfies dependents.
    Ready,
    /// Creation failed. Terminal unless retried.
    Error,
}

impl ResourceStatus {
    pub fn can_transition_to(self, next: ResourceStatus) -> bool {
        use ResourceStatus::*;
        matches!(
            (self, next),
            (Init, Creating) | (Creating, Ready) | (Creating, Error) | (Error, Creating)
        )
    }
}

impl fmt::Display for ResourceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ResourceStatus::Init => "init",
            ResourceStatus::Creating => "creating",
            ResourceStatus::Ready => "ready",
            ResourceStatus::Error => "error",
        };
        f.write_str(s)
    }
}

/// One resource definition plus its live status and edges.
///
/// Edges are indices into the owning graph: `requires` lists nodes that must
/// be Ready first, `required_by` lists nodes waiting on this one.
#[derive(Debug, Clone)]
pub struct ScheduledResource {
    key: String,
    definition: ResourceDefinition,
    pub(crate) status: ResourceStatus,
    pub(crate) requires: Vec<NodeIndex>,
    pub(crate) required_by: Vec<NodeIndex>,
}

impl ScheduledResource {
    pub fn new(definition: ResourceDefinition) -> Self {
        Self {
            key: definition.key(),
            definition,
            status: ResourceStatus::Init,
            requires: Vec::new(),
            required_by: Vec::new(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn definition(&self) -> &ResourceDefinition {
        &self.definition
    }

    pub fn status(&self) -> ResourceStatus {
        self.status
    }

    pub fn requires(&self) -> &[NodeIndex] {
        &self.requires
    }

    pub fn required_by(&self) -> &[NodeIndex] {
        &self.required_by
    }

    /// True iff any requirement is not Ready.
    ///
    /// Evaluated against the current statuses in `graph` on every call.
    pub fn is_blocked(&self, graph: &DependencyGraph) -> bool {
        self.requires
            .iter()
            .any(|&req| graph.node(req).status != ResourceStatus::Ready)
    }
}
