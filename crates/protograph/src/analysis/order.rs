//! Build ordering.
//!
//! Kahn's algorithm over a working node set: each node starts with a count
//! of its outgoing edges (dependencies) that stay inside the set; nodes whose
//! count reaches zero are emitted, and every emitted node releases one count
//! from each dependent inside the set. Ties are broken by URN.
//!
//! If fewer nodes are emitted than the working set holds, the remainder sits
//! on or behind a cycle and the ordering fails with
//! `Error::CircularDependency`.

use crate::error::{Error, Result};
use crate::graph::ProtocolGraph;
use crate::urn::Urn;
use petgraph::Direction;
use petgraph::stable_graph::NodeIndex;
use petgraph::visit::EdgeRef;
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use tracing::debug;

impl ProtocolGraph {
    /// Build order for `urn` and everything it transitively relies on,
    /// dependencies first.
    ///
    /// Returns `Ok(None)` if `urn` is not in the graph.
    ///
    /// # Errors
    ///
    /// Returns `Error::CircularDependency` if the closure contains a cycle.
    pub fn build_order(&self, urn: &Urn) -> Result<Option<Vec<Urn>>> {
        let Some(start) = self.index_of(urn) else {
            return Ok(None);
        };
        let scope = self.dependency_closure(start);
        self.kahn(&scope).map(Some)
    }

    /// Build order for the whole graph, dependencies first.
    ///
    /// # Errors
    ///
    /// Returns `Error::CircularDependency` if the graph contains a cycle.
    pub fn full_build_order(&self) -> Result<Vec<Urn>> {
        let scope: HashSet<NodeIndex> = self.graph.node_indices().collect();
        self.kahn(&scope)
    }

    /// `start` plus every node reachable along outgoing edges.
    pub(crate) fn dependency_closure(&self, start: NodeIndex) -> HashSet<NodeIndex> {
        let mut closure = HashSet::from([start]);
        let mut queue = VecDeque::from([start]);
        while let Some(node) = queue.pop_front() {
            for next in self.graph.neighbors_directed(node, Direction::Outgoing) {
                if closure.insert(next) {
                    queue.push_back(next);
                }
            }
        }
        closure
    }

    fn kahn(&self, working: &HashSet<NodeIndex>) -> Result<Vec<Urn>> {
        let mut pending: HashMap<NodeIndex, usize> = working
            .iter()
            .map(|&node| {
                let dependencies = self
                    .graph
                    .edges_directed(node, Direction::Outgoing)
                    .filter(|edge| working.contains(&edge.target()))
                    .count();
                (node, dependencies)
            })
            .collect();

        let mut ready: BTreeSet<(&Urn, NodeIndex)> = pending
            .iter()
            .filter(|&(_, &count)| count == 0)
            .map(|(&node, _)| (self.urn_at(node), node))
            .collect();

        let mut order = Vec::with_capacity(working.len());
        while let Some((urn, node)) = ready.pop_first() {
            order.push(urn.clone());
            for edge in self.graph.edges_directed(node, Direction::Incoming) {
                let dependent = edge.source();
                let Some(count) = pending.get_mut(&dependent) else {
                    continue;
                };
                *count -= 1;
                if *count == 0 {
                    ready.insert((self.urn_at(dependent), dependent));
                }
            }
        }

        if order.len() < working.len() {
            let emitted: HashSet<&Urn> = order.iter().collect();
            let mut remaining: Vec<Urn> = working
                .iter()
                .map(|&node| self.urn_at(node))
                .filter(|urn| !emitted.contains(urn))
                .cloned()
                .collect();
            remaining.sort();
            debug!(
                expected = working.len(),
                obtained = order.len(),
                "build order stalled on a cycle"
            );
            return Err(Error::CircularDependency {
                expected: working.len(),
                obtained: order.len(),
                remaining,
            });
        }

        Ok(order)
    }
}
