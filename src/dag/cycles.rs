// src/dag/cycles.rs

//! Cycle detection over a [`DependencyGraph`].
//!
//! [`detect_cycles`] walks the graph depth-first from every node, following
//! `required_by` edges (parent -> child) in list order. The current path is
//! kept on an explicit stack. An edge back into the path closes a cycle,
//! which is emitted as the slice of the path from the revisited node to the
//! current one. Nodes whose edges have all been explored are never entered
//! again, so the whole pass is O(V + E).
//!
//! A self-dependency is reported as `[v, v]`.
//!
//! [`cyclic_components`] is a coarser diagnostic: it groups nodes into
//! strongly connected components, so two cycles sharing a node come back as
//! one component.

use petgraph::algo::tarjan_scc;
use tracing::{debug, trace};

use crate::dag::graph::DependencyGraph;
use crate::dag::resource::NodeIndex;

/// One elementary cycle as an ordered list of nodes.
///
/// The closing edge runs from the last entry back to the first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cycle(Vec<NodeIndex>);

impl Cycle {
    pub fn nodes(&self) -> &[NodeIndex] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn is_self_loop(&self) -> bool {
        self.0.len() == 2 && self.0[0] == self.0[1]
    }

    pub fn keys(&self, graph: &DependencyGraph) -> Vec<String> {
        graph.keys_of(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    /// On the current DFS path at the given position.
    OnPath(usize),
    Explored,
}

/// DFS frame: a node and the position of its next unexplored edge.
struct Frame {
    node: NodeIndex,
    next_edge: usize,
}

/// Enumerate the cycles of `graph`. Returns an empty vector for a DAG.
///
/// For a fixed graph the result is deterministic. Independent cycles and
/// cycles that share a node through separate back edges are each reported
/// once.
pub fn detect_cycles(graph: &DependencyGraph) -> Vec<Cycle> {
    let mut marks = vec![Mark::Unvisited; graph.len()];
    let mut path: Vec<NodeIndex> = Vec::new();
    let mut stack: Vec<Frame> = Vec::new();
    let mut cycles = Vec::new();

    for start in graph.indices() {
        if marks[start.index()] != Mark::Unvisited {
            continue;
        }

        marks[start.index()] = Mark::OnPath(0);
        path.push(start);
        stack.push(Frame {
            node: start,
            next_edge: 0,
        });

        while let Some(frame) = stack.last_mut() {
            let current = frame.node;
            let edges = graph.node(current).required_by();

            let Some(&next) = edges.get(frame.next_edge) else {
                // All edges explored: leave the path for good.
                stack.pop();
                path.pop();
                marks[current.index()] = Mark::Explored;
                continue;
            };
            frame.next_edge += 1;

            match marks[next.index()] {
                Mark::Unvisited => {
                    marks[next.index()] = Mark::OnPath(path.len());
                    path.push(next);
                    stack.push(Frame {
                        node: next,
                        next_edge: 0,
                    });
                }
                Mark::OnPath(pos) => {
                    let cycle = if next == current {
                        vec![current, current]
                    } else {
                        path[pos..].to_vec()
                    };
                    trace!(
                        cycle = ?graph.keys_of(&cycle),
                        "back edge closes a cycle"
                    );
                    cycles.push(Cycle(cycle));
                }
                Mark::Explored => {}
            }
        }
    }

    if !cycles.is_empty() {
        debug!(count = cycles.len(), "cycles detected in dependency graph");
    }
    cycles
}

/// Strongly connected components that contain a cycle: components with more
/// than one node, plus single nodes that depend on themselves. Each is
/// returned as a sorted key list.
pub fn cyclic_components(graph: &DependencyGraph) -> Vec<Vec<String>> {
    let pg = graph.to_petgraph();

    let mut components: Vec<Vec<String>> = tarjan_scc(&pg)
        .into_iter()
        .filter(|scc| scc.len() > 1 || pg.contains_edge(scc[0], scc[0]))
        .map(|scc| {
            let mut keys: Vec<String> = scc
                .into_iter()
                .map(|n| graph.key_of(NodeIndex(pg[n])).to_string())
                .collect();
            keys.sort();
            keys
        })
        .collect();

    components.sort();
    components
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dag::build_dependency_graph;
    use crate::source::StaticSource;
    use crate::types::UnknownReferencePolicy;

    fn graph(keys: &[&str], deps: &[(&str, &str)]) -> DependencyGraph {
        let source = StaticSource::from_keys(keys, deps);
        build_dependency_graph(&source, None, UnknownReferencePolicy::Fail).unwrap()
    }

    fn sorted_keys(g: &DependencyGraph, c: &Cycle) -> Vec<String> {
        let mut keys = c.keys(g);
        keys.sort();
        keys
    }

    #[test]
    fn acyclic_graph_has_no_cycles() {
        let g = graph(&["pod/ready-1", "pod/ready-2"], &[("pod/ready-1", "pod/ready-2")]);
        assert!(detect_cycles(&g).is_empty());
    }

    #[test]
    fn two_node_cycle() {
        let g = graph(
            &["pod/ready-1", "pod/ready-2"],
            &[("pod/ready-1", "pod/ready-2"), ("pod/ready-2", "pod/ready-1")],
        );
        let cycles = detect_cycles(&g);
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].len(), 2);
    }

    #[test]
    fn self_loop_is_reported_as_pair() {
        let g = graph(&["pod/ready-1"], &[("pod/ready-1", "pod/ready-1")]);
        let cycles = detect_cycles(&g);

        assert_eq!(cycles.len(), 1);
        assert!(cycles[0].is_self_loop());
        assert_eq!(cycles[0].keys(&g), vec!["pod/ready-1", "pod/ready-1"]);
    }

    #[test]
    fn long_ring() {
        let g = graph(
            &["pod/1", "pod/2", "pod/3", "pod/4", "pod/5"],
            &[
                ("pod/1", "pod/2"),
                ("pod/2", "pod/3"),
                ("pod/3", "pod/4"),
                ("pod/4", "pod/1"),
            ],
        );
        let cycles = detect_cycles(&g);
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].keys(&g), vec!["pod/1", "pod/2", "pod/3", "pod/4"]);
    }

    #[test]
    fn cycles_sharing_a_node_are_reported_separately() {
        // pod/1 -> 2 -> 3 -> 1 and pod/1 -> 5 -> 4 -> 1
        let g = graph(
            &["pod/1", "pod/2", "pod/3", "pod/4", "pod/5"],
            &[
                ("pod/1", "pod/2"),
                ("pod/2", "pod/3"),
                ("pod/3", "pod/1"),
                ("pod/4", "pod/1"),
                ("pod/1", "pod/5"),
                ("pod/5", "pod/4"),
            ],
        );
        let cycles = detect_cycles(&g);
        assert_eq!(cycles.len(), 2);

        let mut found: Vec<Vec<String>> = cycles.iter().map(|c| sorted_keys(&g, c)).collect();
        found.sort();
        assert_eq!(found, vec![
            vec!["pod/1", "pod/2", "pod/3"],
            vec!["pod/1", "pod/4", "pod/5"],
        ]);

        // The component view merges them.
        assert_eq!(cyclic_components(&g), vec![vec![
            "pod/1", "pod/2", "pod/3", "pod/4", "pod/5"
        ]]);
    }

    #[test]
    fn independent_cycles_do_not_mix() {
        let g = graph(
            &["pod/1", "pod/2", "pod/3", "pod/4", "pod/5", "pod/6", "pod/7"],
            &[
                ("pod/1", "pod/2"),
                ("pod/2", "pod/3"),
                ("pod/3", "pod/4"),
                ("pod/4", "pod/2"),
                ("pod/1", "pod/5"),
                ("pod/5", "pod/6"),
                ("pod/6", "pod/7"),
                ("pod/7", "pod/5"),
            ],
        );
        let cycles = detect_cycles(&g);
        assert_eq!(cycles.len(), 2);
        assert_eq!(cycles[0].len(), 3);
        assert_eq!(cycles[1].len(), 3);

        let mut found: Vec<Vec<String>> = cycles.iter().map(|c| sorted_keys(&g, c)).collect();
        found.sort();
        assert_eq!(found, vec![
            vec!["pod/2", "pod/3", "pod/4"],
            vec!["pod/5", "pod/6", "pod/7"],
        ]);
    }

    #[test]
    fn components_include_self_loops_only_when_present() {
        let g = graph(&["pod/a", "pod/b"], &[("pod/a", "pod/a"), ("pod/a", "pod/b")]);
        assert_eq!(cyclic_components(&g), vec![vec!["pod/a"]]);

        let dag = graph(&["pod/a", "pod/b"], &[("pod/a", "pod/b")]);
        assert!(cyclic_components(&dag).is_empty());
    }

    #[test]
    fn detection_does_not_mutate_statuses() {
        let g = graph(&["pod/a", "pod/b"], &[("pod/a", "pod/b"), ("pod/b", "pod/a")]);
        let before: Vec<_> = g.iter().map(|(_, n)| n.status()).collect();
        let _ = detect_cycles(&g);
        let after: Vec<_> = g.iter().map(|(_, n)| n.status()).collect();
        assert_eq!(before, after);
    }
}
