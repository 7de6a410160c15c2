// src/dag/graph.rs

use std::collections::HashMap;

use petgraph::algo::toposort;
use petgraph::graph::DiGraph;
use tracing::{debug, warn};

use crate::dag::cycles::{Cycle, detect_cycles};
use crate::dag::resource::{NodeIndex, ResourceStatus, ScheduledResource};
use crate::errors::{Result, SchedulerError};
use crate::source::{DependencyRecord, RecordSource, ResourceDefinition, ResourceFilter};
use crate::types::UnknownReferencePolicy;

/// In-memory dependency graph keyed by resource key.
///
/// Nodes live in a single arena; edges are arena indices, so the mutual
/// `requires` / `required_by` references never own each other. Iteration
/// follows the order in which the record source returned definitions.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    nodes: Vec<ScheduledResource>,
    index: HashMap<String, NodeIndex>,
}

/// Build a graph from a record source.
///
/// Every included definition becomes one `Init` node. Every dependency
/// record `(parent, child)` adds `child` to `parent.required_by` and `parent`
/// to `child.requires`. Self-dependencies are kept (the cycle detector
/// reports them); duplicate records add a single edge.
pub fn build_dependency_graph(
    source: &dyn RecordSource,
    filter: Option<&dyn ResourceFilter>,
    policy: UnknownReferencePolicy,
) -> Result<DependencyGraph> {
    let definitions = source
        .list_resource_definitions(filter)
        .map_err(SchedulerError::Source)?;
    let dependencies = source
        .list_dependencies(filter)
        .map_err(SchedulerError::Source)?;

    DependencyGraph::from_records(definitions, dependencies, policy)
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from already-listed records.
    pub fn from_records(
        definitions: impl IntoIterator<Item = ResourceDefinition>,
        dependencies: impl IntoIterator<Item = DependencyRecord>,
        policy: UnknownReferencePolicy,
    ) -> Result<Self> {
        let mut graph = DependencyGraph::new();

        for def in definitions {
            graph.add_resource(def)?;
        }

        for dep in dependencies {
            graph.add_dependency(&dep, policy)?;
        }

        debug!(
            nodes = graph.len(),
            edges = graph.edge_count(),
            "dependency graph built"
        );
        Ok(graph)
    }

    /// Add a node. A key that already exists is a source error.
    pub fn add_resource(&mut self, def: ResourceDefinition) -> Result<NodeIndex> {
        let node = ScheduledResource::new(def);
        if self.index.contains_key(node.key()) {
            return Err(SchedulerError::Source(anyhow::anyhow!(
                "duplicate resource key '{}'",
                node.key()
            )));
        }

        let idx = NodeIndex(self.nodes.len());
        self.index.insert(node.key().to_string(), idx);
        self.nodes.push(node);
        Ok(idx)
    }

    /// Link `dep.parent -> dep.child`.
    ///
    /// Returns `Ok(false)` if the edge was dropped (duplicate, or unknown key
    /// under [`UnknownReferencePolicy::Ignore`]).
    pub fn add_dependency(
        &mut self,
        dep: &DependencyRecord,
        policy: UnknownReferencePolicy,
    ) -> Result<bool> {
        let (parent, child) = match (self.index_of(&dep.parent), self.index_of(&dep.child)) {
            (Some(p), Some(c)) => (p, c),
            (p, _) => {
                let missing = if p.is_none() { &dep.parent } else { &dep.child };
                return match policy {
                    UnknownReferencePolicy::Fail => Err(SchedulerError::UnknownReference {
                        parent: dep.parent.clone(),
                        child: dep.child.clone(),
                        missing: missing.clone(),
                    }),
                    UnknownReferencePolicy::Ignore => {
                        warn!(
                            parent = %dep.parent,
                            child = %dep.child,
                            missing = %missing,
                            "dropping dependency on unknown resource"
                        );
                        Ok(false)
                    }
                };
            }
        };

        if self.nodes[parent.0].required_by.contains(&child) {
            debug!(parent = %dep.parent, child = %dep.child, "duplicate dependency ignored");
            return Ok(false);
        }

        self.nodes[parent.0].required_by.push(child);
        self.nodes[child.0].requires.push(parent);
        Ok(true)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn edge_count(&self) -> usize {
        self.nodes.iter().map(|n| n.required_by.len()).sum()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    pub fn index_of(&self, key: &str) -> Option<NodeIndex> {
        self.index.get(key).copied()
    }

    pub fn get(&self, key: &str) -> Option<&ScheduledResource> {
        self.index_of(key).map(|idx| &self.nodes[idx.0])
    }

    /// Node at `idx`. Panics if `idx` does not belong to this graph.
    pub fn node(&self, idx: NodeIndex) -> &ScheduledResource {
        &self.nodes[idx.0]
    }

    pub fn key_of(&self, idx: NodeIndex) -> &str {
        self.nodes[idx.0].key()
    }

    /// Keys for a list of indices, e.g. a node's `requires`.
    pub fn keys_of(&self, indices: &[NodeIndex]) -> Vec<String> {
        indices.iter().map(|&i| self.key_of(i).to_string()).collect()
    }

    pub fn indices(&self) -> impl Iterator<Item = NodeIndex> + '_ {
        (0..self.nodes.len()).map(NodeIndex)
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeIndex, &ScheduledResource)> {
        self.nodes.iter().enumerate().map(|(i, n)| (NodeIndex(i), n))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.nodes.iter().map(|n| n.key())
    }

    pub fn status_of(&self, idx: NodeIndex) -> ResourceStatus {
        self.nodes[idx.0].status
    }

    /// Overwrite a status without transition checks.
    ///
    /// During a run the scheduler is the only caller; outside a run this is
    /// handy for inspecting blocking behaviour.
    pub fn set_status(&mut self, idx: NodeIndex, status: ResourceStatus) {
        self.nodes[idx.0].status = status;
    }

    /// True iff at least one requirement of `idx` is not Ready.
    pub fn is_blocked(&self, idx: NodeIndex) -> bool {
        self.nodes[idx.0].is_blocked(self)
    }

    /// All cycles in the graph, see [`detect_cycles`].
    pub fn cycles(&self) -> Vec<Cycle> {
        detect_cycles(self)
    }

    /// Group nodes into waves: every node only requires nodes from earlier
    /// waves, so each wave can be created fully in parallel.
    ///
    /// Fails with [`SchedulerError::CyclicDependency`] on a cyclic graph.
    pub fn creation_waves(&self) -> Result<Vec<Vec<String>>> {
        let order = toposort(&self.to_petgraph(), None).map_err(|_| {
            SchedulerError::CyclicDependency {
                cycles: self.cycles().iter().map(|c| c.keys(self)).collect(),
            }
        })?;

        let mut depth = vec![0usize; self.nodes.len()];
        let mut waves: Vec<Vec<String>> = Vec::new();

        for pg_idx in order {
            let i = pg_idx.index();
            let node = &self.nodes[i];
            let d = node
                .requires
                .iter()
                .map(|r| depth[r.0] + 1)
                .max()
                .unwrap_or(0);
            depth[i] = d;

            if waves.len() <= d {
                waves.resize_with(d + 1, Vec::new);
            }
            waves[d].push(node.key().to_string());
        }

        Ok(waves)
    }

    /// Mirror of this graph in `petgraph` form; node weights are arena
    /// indices and edges point parent -> child.
    pub(crate) fn to_petgraph(&self) -> DiGraph<usize, ()> {
        let mut pg = DiGraph::with_capacity(self.nodes.len(), self.edge_count());
        let handles: Vec<_> = (0..self.nodes.len()).map(|i| pg.add_node(i)).collect();

        for (i, node) in self.nodes.iter().enumerate() {
            for child in &node.required_by {
                pg.add_edge(handles[i], handles[child.0], ());
            }
        }
        pg
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::StaticSource;

    fn build(keys: &[&str], deps: &[(&str, &str)]) -> Result<DependencyGraph> {
        let source = StaticSource::from_keys(keys, deps);
        build_dependency_graph(&source, None, UnknownReferencePolicy::Fail)
    }

    #[test]
    fn builds_two_node_chain() {
        let graph = build(&["pod/ready-1", "pod/ready-2"], &[("pod/ready-1", "pod/ready-2")])
            .unwrap();

        assert_eq!(graph.len(), 2);

        let first = graph.get("pod/ready-1").expect("pod/ready-1 in graph");
        assert_eq!(first.key(), "pod/ready-1");
        assert!(first.requires().is_empty());
        assert_eq!(graph.keys_of(first.required_by()), vec!["pod/ready-2"]);

        let second = graph.get("pod/ready-2").expect("pod/ready-2 in graph");
        assert_eq!(second.key(), "pod/ready-2");
        assert_eq!(graph.keys_of(second.requires()), vec!["pod/ready-1"]);
        assert!(second.required_by().is_empty());
    }

    #[test]
    fn dependencies_never_add_nodes() {
        let graph = build(
            &["pod/a", "pod/b", "pod/c"],
            &[("pod/a", "pod/b"), ("pod/a", "pod/c"), ("pod/b", "pod/c")],
        )
        .unwrap();
        assert_eq!(graph.len(), 3);
        assert_eq!(graph.edge_count(), 3);
        assert!(graph.iter().all(|(_, n)| n.status() == ResourceStatus::Init));
    }

    #[test]
    fn duplicate_records_add_one_edge() {
        let graph = build(&["pod/a", "pod/b"], &[("pod/a", "pod/b"), ("pod/a", "pod/b")]).unwrap();
        assert_eq!(graph.edge_count(), 1);
        assert_eq!(graph.get("pod/b").unwrap().requires().len(), 1);
    }

    #[test]
    fn self_dependency_is_kept() {
        let graph = build(&["pod/a"], &[("pod/a", "pod/a")]).unwrap();
        let a = graph.get("pod/a").unwrap();
        assert_eq!(graph.keys_of(a.requires()), vec!["pod/a"]);
        assert_eq!(graph.keys_of(a.required_by()), vec!["pod/a"]);
    }

    #[test]
    fn unknown_reference_fails_by_default() {
        let err = build(&["pod/a"], &[("pod/a", "pod/missing")]).unwrap_err();
        match err {
            SchedulerError::UnknownReference { missing, .. } => assert_eq!(missing, "pod/missing"),
            other => panic!("expected UnknownReference, got {other:?}"),
        }
    }

    #[test]
    fn unknown_reference_can_be_ignored() {
        let source = StaticSource::from_keys(
            &["pod/a", "pod/b"],
            &[("pod/ghost", "pod/a"), ("pod/a", "pod/b")],
        );
        let graph =
            build_dependency_graph(&source, None, UnknownReferencePolicy::Ignore).unwrap();
        assert_eq!(graph.len(), 2);
        assert_eq!(graph.edge_count(), 1);
        assert!(graph.get("pod/a").unwrap().requires().is_empty());
    }

    #[test]
    fn duplicate_keys_are_a_source_error() {
        let err = build(&["pod/a", "pod/a"], &[]).unwrap_err();
        assert!(matches!(err, SchedulerError::Source(_)));
    }

    #[test]
    fn unreadable_source_is_a_source_error() {
        let source = StaticSource::from_keys(&["pod/a"], &[]);
        source.fail_with("connection refused");
        let err = build_dependency_graph(&source, None, UnknownReferencePolicy::Fail).unwrap_err();
        match err {
            SchedulerError::Source(e) => assert!(e.to_string().contains("connection refused")),
            other => panic!("expected Source error, got {other:?}"),
        }
    }

    #[test]
    fn is_blocked_tracks_requirement_statuses() {
        let mut graph = build(
            &["pod/one", "pod/two", "pod/three"],
            &[("pod/two", "pod/one"), ("pod/three", "pod/one")],
        )
        .unwrap();
        let one = graph.index_of("pod/one").unwrap();
        let two = graph.index_of("pod/two").unwrap();
        let three = graph.index_of("pod/three").unwrap();

        assert!(!graph.is_blocked(two), "no requirements means never blocked");
        assert!(graph.is_blocked(one));

        graph.set_status(two, ResourceStatus::Ready);
        graph.set_status(three, ResourceStatus::Ready);
        assert!(!graph.is_blocked(one));
        assert_eq!(graph.status_of(one), ResourceStatus::Init);

        graph.set_status(two, ResourceStatus::Creating);
        assert!(graph.is_blocked(one));
    }

    #[test]
    fn creation_waves_layer_the_graph() {
        let graph = build(
            &["svc/db", "pod/api", "pod/web", "cm/config"],
            &[("svc/db", "pod/api"), ("pod/api", "pod/web"), ("cm/config", "pod/web")],
        )
        .unwrap();

        let mut waves = graph.creation_waves().unwrap();
        for wave in waves.iter_mut() {
            wave.sort();
        }
        assert_eq!(waves, vec![
            vec!["cm/config".to_string(), "svc/db".to_string()],
            vec!["pod/api".to_string()],
            vec!["pod/web".to_string()],
        ]);
    }

    #[test]
    fn creation_waves_reject_cycles() {
        let graph = build(&["pod/a", "pod/b"], &[("pod/a", "pod/b"), ("pod/b", "pod/a")]).unwrap();
        assert!(matches!(
            graph.creation_waves(),
            Err(SchedulerError::CyclicDependency { .. })
        ));
    }
}
