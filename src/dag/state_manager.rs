// src/dag/state_manager.rs

//! Status transitions for resources during a scheduling run.

use std::collections::VecDeque;

use tracing::{debug, warn};

use crate::dag::graph::DependencyGraph;
use crate::dag::resource::{NodeIndex, ResourceStatus};

/// Resources whose requirements are all `Ready` but that have not left
/// `Init` yet, plus the per-node count of requirements still outstanding.
///
/// Only the dependents of a resource that just became `Ready` are ever
/// re-examined, so a whole run touches each edge once.
#[derive(Debug, Default)]
pub struct ReadyQueue {
    unmet: Vec<usize>,
    queue: VecDeque<NodeIndex>,
}

impl ReadyQueue {
    /// Count unmet requirements for every node and queue the `Init` nodes
    /// that have none, in graph order.
    pub fn seed(graph: &DependencyGraph) -> Self {
        let mut unmet = Vec::with_capacity(graph.len());
        let mut queue = VecDeque::new();

        for (idx, node) in graph.iter() {
            let pending = node
                .requires()
                .iter()
                .filter(|&&r| graph.status_of(r) != ResourceStatus::Ready)
                .count();
            if pending == 0 && node.status() == ResourceStatus::Init {
                queue.push_back(idx);
            }
            unmet.push(pending);
        }

        Self { unmet, queue }
    }

    /// Number of queued nodes waiting for a free slot.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

/// Applies status transitions to a graph.
///
/// Borrowed for the duration of a single scheduler step; the scheduler owns
/// the graph, the per-node `blocked_by` bookkeeping and the ready queue.
pub struct StateManager<'a> {
    graph: &'a mut DependencyGraph,
    blocked_by: &'a mut [Option<NodeIndex>],
    ready: &'a mut ReadyQueue,
}

impl<'a> StateManager<'a> {
    pub fn new(
        graph: &'a mut DependencyGraph,
        blocked_by: &'a mut [Option<NodeIndex>],
        ready: &'a mut ReadyQueue,
    ) -> Self {
        Self {
            graph,
            blocked_by,
            ready,
        }
    }

    /// Perform a checked transition. Returns `false` (and changes nothing)
    /// if `from -> to` is not a legal edge of the state machine or the node
    /// is not currently in `from`.
    pub fn transition(&mut self, idx: NodeIndex, from: ResourceStatus, to: ResourceStatus) -> bool {
        let current = self.graph.status_of(idx);
        if current != from || !from.can_transition_to(to) {
            warn!(
                resource = %self.graph.key_of(idx),
                %current,
                %from,
                %to,
                "rejected status transition"
            );
            return false;
        }

        self.graph.set_status(idx, to);
        debug!(resource = %self.graph.key_of(idx), %from, %to, "status transition");
        true
    }

    /// Take up to `limit` queued nodes that are still `Init` and not
    /// permanently blocked, and move them to `Creating`.
    ///
    /// Each node can only leave `Init` once, so a node is never returned
    /// twice across calls. Nodes beyond `limit` stay queued.
    pub fn collect_new_ready(&mut self, limit: usize) -> Vec<NodeIndex> {
        let mut collected = Vec::new();

        while collected.len() < limit {
            let Some(idx) = self.ready.queue.pop_front() else {
                break;
            };
            if self.blocked_by[idx.index()].is_some()
                || self.graph.status_of(idx) != ResourceStatus::Init
            {
                continue;
            }
            if self.transition(idx, ResourceStatus::Init, ResourceStatus::Creating) {
                collected.push(idx);
            }
        }

        collected
    }

    /// Account for `done` having become `Ready`: each dependent whose last
    /// outstanding requirement it was joins the ready queue.
    ///
    /// Returns the newly queued nodes.
    pub fn release_dependents(&mut self, done: NodeIndex) -> Vec<NodeIndex> {
        let mut released = Vec::new();

        for &child in self.graph.node(done).required_by() {
            let i = child.index();
            self.ready.unmet[i] = self.ready.unmet[i].saturating_sub(1);
            if self.ready.unmet[i] == 0
                && self.blocked_by[i].is_none()
                && self.graph.status_of(child) == ResourceStatus::Init
            {
                self.ready.queue.push_back(child);
                released.push(child);
            }
        }

        released
    }

    /// Mark every transitive dependent of `failed` that is still `Init` as
    /// permanently blocked by it.
    ///
    /// Returns the newly blocked nodes.
    pub fn mark_dependents_blocked(&mut self, failed: NodeIndex) -> Vec<NodeIndex> {
        let mut stack: Vec<NodeIndex> = self.graph.node(failed).required_by().to_vec();
        let mut newly_blocked = Vec::new();

        while let Some(idx) = stack.pop() {
            if self.blocked_by[idx.index()].is_some()
                || self.graph.status_of(idx) != ResourceStatus::Init
            {
                continue;
            }

            self.blocked_by[idx.index()] = Some(failed);
            debug!(
                resource = %self.graph.key_of(idx),
                failed = %self.graph.key_of(failed),
                "dependent permanently blocked by upstream failure"
            );
            newly_blocked.push(idx);
            stack.extend_from_slice(self.graph.node(idx).required_by());
        }

        newly_blocked
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dag::build_dependency_graph;
    use crate::source::StaticSource;
    use crate::types::UnknownReferencePolicy;

    fn diamond() -> DependencyGraph {
        let source = StaticSource::from_keys(
            &["pod/a", "pod/b", "pod/c", "pod/d", "pod/e"],
            &[
                ("pod/a", "pod/b"),
                ("pod/a", "pod/c"),
                ("pod/b", "pod/d"),
                ("pod/c", "pod/d"),
            ],
        );
        build_dependency_graph(&source, None, UnknownReferencePolicy::Fail).unwrap()
    }

    fn bookkeeping(graph: &DependencyGraph) -> (Vec<Option<NodeIndex>>, ReadyQueue) {
        (vec![None; graph.len()], ReadyQueue::seed(graph))
    }

    #[test]
    fn collects_unblocked_roots_once() {
        let mut graph = diamond();
        let (mut blocked, mut ready) = bookkeeping(&graph);
        let mut mgr = StateManager::new(&mut graph, &mut blocked, &mut ready);

        let first = mgr.collect_new_ready(usize::MAX);
        assert_eq!(first.len(), 2, "pod/a and pod/e are roots");
        assert!(mgr.collect_new_ready(usize::MAX).is_empty());

        let keys = graph.keys_of(&first);
        assert_eq!(keys, vec!["pod/a", "pod/e"]);
        assert!(first.iter().all(|&i| graph.status_of(i) == ResourceStatus::Creating));
    }

    #[test]
    fn respects_limit() {
        let mut graph = diamond();
        let (mut blocked, mut ready) = bookkeeping(&graph);
        let mut mgr = StateManager::new(&mut graph, &mut blocked, &mut ready);

        assert_eq!(mgr.collect_new_ready(1).len(), 1);
        assert_eq!(mgr.collect_new_ready(1).len(), 1);
        assert!(mgr.collect_new_ready(1).is_empty());
    }

    #[test]
    fn join_is_released_by_its_last_requirement_only() {
        let mut graph = diamond();
        let (mut blocked, mut ready) = bookkeeping(&graph);
        let a = graph.index_of("pod/a").unwrap();
        let b = graph.index_of("pod/b").unwrap();
        let c = graph.index_of("pod/c").unwrap();

        let mut mgr = StateManager::new(&mut graph, &mut blocked, &mut ready);
        mgr.collect_new_ready(usize::MAX);
        assert!(mgr.transition(a, ResourceStatus::Creating, ResourceStatus::Ready));
        assert_eq!(mgr.release_dependents(a), vec![b, c]);
        assert_eq!(mgr.collect_new_ready(usize::MAX), vec![b, c]);

        assert!(mgr.transition(b, ResourceStatus::Creating, ResourceStatus::Ready));
        assert!(mgr.release_dependents(b).is_empty(), "pod/d still waits on pod/c");
        assert!(mgr.transition(c, ResourceStatus::Creating, ResourceStatus::Ready));
        let released = mgr.release_dependents(c);

        assert_eq!(graph.keys_of(&released), vec!["pod/d"]);
    }

    #[test]
    fn seed_counts_resources_that_are_already_ready() {
        let mut graph = diamond();
        let a = graph.index_of("pod/a").unwrap();
        graph.set_status(a, ResourceStatus::Ready);

        let ready = ReadyQueue::seed(&graph);

        // pod/b, pod/c and pod/e
        assert_eq!(ready.len(), 3);
    }

    #[test]
    fn failure_blocks_transitive_dependents_only() {
        let mut graph = diamond();
        let (mut blocked, mut ready) = bookkeeping(&graph);
        let b = graph.index_of("pod/b").unwrap();
        graph.set_status(b, ResourceStatus::Error);

        let mut mgr = StateManager::new(&mut graph, &mut blocked, &mut ready);
        let newly = mgr.mark_dependents_blocked(b);

        assert_eq!(graph.keys_of(&newly), vec!["pod/d"]);
        let c = graph.index_of("pod/c").unwrap();
        assert!(blocked[c.index()].is_none());
    }

    #[test]
    fn illegal_transitions_are_rejected() {
        let mut graph = diamond();
        let (mut blocked, mut ready) = bookkeeping(&graph);
        let a = graph.index_of("pod/a").unwrap();
        let mut mgr = StateManager::new(&mut graph, &mut blocked, &mut ready);

        assert!(!mgr.transition(a, ResourceStatus::Init, ResourceStatus::Ready));
        assert!(mgr.transition(a, ResourceStatus::Init, ResourceStatus::Creating));
        assert!(!mgr.transition(a, ResourceStatus::Init, ResourceStatus::Creating));
        assert_eq!(graph.status_of(a), ResourceStatus::Creating);
    }
}
