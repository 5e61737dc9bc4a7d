//! Cycle detection.
//!
//! Depth-first search from every unvisited node (in URN order), so cycles in
//! disconnected components are found too. Nodes on the current DFS path are
//! marked; an edge back to a marked node closes one cycle, reported as the
//! path suffix from that node to the current node with the start repeated at
//! the end. A self-loop is reported as `[a, a]`.
//!
//! The search is iterative, so deep dependency chains cannot overflow the
//! call stack. Complexity is O(V + E).

use crate::graph::ProtocolGraph;
use crate::urn::Urn;
use petgraph::Direction;
use petgraph::algo::tarjan_scc;
use petgraph::stable_graph::NodeIndex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Result of cycle detection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleReport {
    /// Whether any cycle exists
    pub has_cycle: bool,
    /// Each cycle as a closed URN sequence (first element repeated last)
    pub cycles: Vec<Vec<Urn>>,
}

#[derive(Clone, Copy)]
enum Mark {
    /// On the current DFS path at this position
    OnPath(usize),
    Done,
}

struct Frame {
    node: NodeIndex,
    successors: Vec<NodeIndex>,
    cursor: usize,
}

impl ProtocolGraph {
    /// Detect cycles across the whole graph.
    #[must_use]
    pub fn detect_cycles(&self) -> CycleReport {
        let mut marks: HashMap<NodeIndex, Mark> = HashMap::with_capacity(self.node_count());
        let mut path: Vec<NodeIndex> = Vec::new();
        let mut cycles = Vec::new();

        for root in self.sorted_indices() {
            if marks.contains_key(&root) {
                continue;
            }

            marks.insert(root, Mark::OnPath(0));
            path.push(root);
            let mut stack = vec![self.frame(root)];

            while let Some(frame) = stack.last_mut() {
                let node = frame.node;
                let next = frame.successors.get(frame.cursor).copied();
                frame.cursor += 1;

                let Some(next) = next else {
                    marks.insert(node, Mark::Done);
                    path.pop();
                    stack.pop();
                    continue;
                };

                match marks.get(&next) {
                    Some(Mark::OnPath(position)) => {
                        let mut cycle: Vec<Urn> = path[*position..]
                            .iter()
                            .map(|&index| self.urn_at(index).clone())
                            .collect();
                        cycle.push(self.urn_at(next).clone());
                        cycles.push(cycle);
                    }
                    Some(Mark::Done) => {}
                    None => {
                        marks.insert(next, Mark::OnPath(path.len()));
                        path.push(next);
                        stack.push(self.frame(next));
                    }
                }
            }
        }

        CycleReport {
            has_cycle: !cycles.is_empty(),
            cycles,
        }
    }

    /// Every node that lies on some cycle: members of a strongly connected
    /// component larger than one node, plus nodes with a self-loop.
    #[must_use]
    pub fn nodes_in_cycles(&self) -> BTreeSet<Urn> {
        let mut members = BTreeSet::new();
        for component in tarjan_scc(&self.graph) {
            let cyclic = component.len() > 1
                || component
                    .first()
                    .is_some_and(|&index| self.graph.find_edge(index, index).is_some());
            if cyclic {
                members.extend(component.into_iter().map(|index| self.urn_at(index).clone()));
            }
        }
        members
    }

    fn frame(&self, node: NodeIndex) -> Frame {
        Frame {
            node,
            successors: self.neighbors(node, Direction::Outgoing),
            cursor: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::fixtures::{api, dependency_graph, names};

    #[test]
    fn acyclic_graph_has_no_cycles() {
        let graph = dependency_graph(&["a", "b", "c"], &[("a", "b"), ("b", "c"), ("a", "c")]);

        let report = graph.detect_cycles();

        assert!(!report.has_cycle);
        assert!(report.cycles.is_empty());
        assert!(graph.nodes_in_cycles().is_empty());
    }

    #[test]
    fn two_node_cycle_is_closed_sequence() {
        let graph = dependency_graph(&["a", "b"], &[("a", "b"), ("b", "a")]);

        let report = graph.detect_cycles();

        assert!(report.has_cycle);
        assert_eq!(report.cycles.len(), 1);
        assert_eq!(names(&report.cycles[0]), vec!["a", "b", "a"]);
    }

    #[test]
    fn self_loop_is_a_length_one_cycle() {
        let graph = dependency_graph(&["a"], &[("a", "a")]);

        let report = graph.detect_cycles();

        assert!(report.has_cycle);
        assert_eq!(names(&report.cycles[0]), vec!["a", "a"]);
        assert!(graph.nodes_in_cycles().contains(&api("a")));
    }

    #[test]
    fn disconnected_cyclic_component_is_found() {
        // a -> b is acyclic; x <-> y lives in a separate component.
        let graph = dependency_graph(
            &["a", "b", "x", "y"],
            &[("a", "b"), ("x", "y"), ("y", "x")],
        );

        let report = graph.detect_cycles();

        assert!(report.has_cycle);
        assert_eq!(names(&report.cycles[0]), vec!["x", "y", "x"]);
        let in_cycles = graph.nodes_in_cycles();
        let members: Vec<&str> = in_cycles.iter().map(Urn::id).collect();
        assert_eq!(members, vec!["x", "y"]);
    }

    #[test]
    fn cycle_reports_only_the_path_suffix() {
        // a -> b -> c -> d -> b: the cycle starts at b, not at the root.
        let graph = dependency_graph(
            &["a", "b", "c", "d"],
            &[("a", "b"), ("b", "c"), ("c", "d"), ("d", "b")],
        );

        let report = graph.detect_cycles();

        assert_eq!(report.cycles.len(), 1);
        assert_eq!(names(&report.cycles[0]), vec!["b", "c", "d", "b"]);
        assert!(!graph.nodes_in_cycles().contains(&api("a")));
    }

    #[test]
    fn deep_chain_does_not_overflow() {
        let names: Vec<String> = (0..5_000).map(|i| format!("n{i:05}")).collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let edges: Vec<(&str, &str)> = refs.windows(2).map(|w| (w[0], w[1])).collect();
        let graph = dependency_graph(&refs, &edges);

        assert!(!graph.detect_cycles().has_cycle);
    }
}
