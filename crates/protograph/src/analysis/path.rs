//! Shortest dependency path.

use crate::graph::ProtocolGraph;
use crate::urn::Urn;
use petgraph::Direction;
use petgraph::stable_graph::NodeIndex;
use std::collections::{HashMap, VecDeque};

impl ProtocolGraph {
    /// Find the shortest path from `from` to `to` along dependency edges.
    ///
    /// Breadth-first over outgoing edges, unweighted. The path includes both
    /// endpoints; `find_path(x, x)` is `[x]`. Returns `None` if either node is
    /// absent or `to` is unreachable from `from`.
    #[must_use]
    pub fn find_path(&self, from: &Urn, to: &Urn) -> Option<Vec<Urn>> {
        let start = self.index_of(from)?;
        let goal = self.index_of(to)?;
        if start == goal {
            return Some(vec![from.clone()]);
        }

        let mut parents: HashMap<NodeIndex, NodeIndex> = HashMap::new();
        let mut queue = VecDeque::from([start]);

        while let Some(node) = queue.pop_front() {
            for next in self.neighbors(node, Direction::Outgoing) {
                if next == start || parents.contains_key(&next) {
                    continue;
                }
                parents.insert(next, node);
                if next == goal {
                    return Some(self.unwind(&parents, start, goal));
                }
                queue.push_back(next);
            }
        }

        None
    }

    fn unwind(
        &self,
        parents: &HashMap<NodeIndex, NodeIndex>,
        start: NodeIndex,
        goal: NodeIndex,
    ) -> Vec<Urn> {
        let mut path = vec![self.urn_at(goal).clone()];
        let mut current = goal;
        while current != start {
            let Some(&parent) = parents.get(&current) else {
                break;
            };
            path.push(self.urn_at(parent).clone());
            current = parent;
        }
        path.reverse();
        path
    }
}
