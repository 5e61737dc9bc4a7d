//! Impact and risk analysis.
//!
//! Downstream impact follows incoming edges (who relies on this artifact);
//! upstream impact follows outgoing edges (what this artifact relies on).
//! Both are breadth-first, so a node's reported depth is its shortest
//! distance from the target. Cyclic regions are handled by the visited set:
//! reachability stays well defined even where ordering does not.

use crate::config::RiskPolicy;
use crate::domain::{EdgeKey, EdgeMetadata};
use crate::graph::ProtocolGraph;
use crate::urn::Urn;
use petgraph::Direction;
use petgraph::stable_graph::NodeIndex;
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

/// Options for [`ProtocolGraph::impact_of_change`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImpactOptions {
    /// Maximum traversal depth; `None` for the full transitive closure
    pub max_depth: Option<usize>,
    /// Report what the target relies on
    pub include_upstream: bool,
    /// Report what relies on the target
    pub include_downstream: bool,
}

impl Default for ImpactOptions {
    fn default() -> Self {
        Self {
            max_depth: None,
            include_upstream: true,
            include_downstream: true,
        }
    }
}

/// Direction of an impact traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImpactDirection {
    /// Towards dependents (incoming edges)
    Downstream,
    /// Towards dependencies (outgoing edges)
    Upstream,
}

impl From<ImpactDirection> for Direction {
    fn from(direction: ImpactDirection) -> Self {
        match direction {
            ImpactDirection::Downstream => Direction::Incoming,
            ImpactDirection::Upstream => Direction::Outgoing,
        }
    }
}

/// Nodes reached in one direction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImpactSet {
    /// Neighbors at distance one, sorted by URN
    pub direct: Vec<Urn>,
    /// Nodes at distance two or more, sorted by URN
    pub transitive: Vec<Urn>,
    /// `direct.len() + transitive.len()`
    pub total: usize,
    /// Largest distance reached
    pub max_depth_reached: usize,
}

/// Result of [`ProtocolGraph::impact_of_change`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImpactReport {
    /// The artifact being changed
    pub target: Urn,
    /// Artifacts relying on the target, if requested
    pub downstream: Option<ImpactSet>,
    /// Artifacts the target relies on, if requested
    pub upstream: Option<ImpactSet>,
}

/// Coarse breaking-change severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    /// Nothing is affected
    None,
    /// Score below the medium threshold
    Low,
    /// Score below the high threshold
    Medium,
    /// Score at or above the high threshold
    High,
}

/// Result of [`ProtocolGraph::assess_risk`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskAssessment {
    /// Assessed artifact
    pub urn: Urn,
    /// Risk tier
    pub level: RiskLevel,
    /// Score in `[0, 100]`
    pub score: u8,
    /// Number of direct dependents
    pub direct_dependents: usize,
    /// Number of transitive (non-direct) dependents
    pub transitive_dependents: usize,
    /// Whether the artifact lies on a dependency cycle
    pub in_cycle: bool,
    /// Contributing factors, in scoring order
    pub reasons: Vec<String>,
}

/// An edge crossed during impact traversal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpactEdge {
    /// Edge identity
    pub key: EdgeKey,
    /// Edge metadata, for audit
    pub metadata: EdgeMetadata,
    /// Traversal that crossed the edge
    pub direction: ImpactDirection,
    /// Distance of the far endpoint from the target along this traversal
    pub depth: usize,
}

/// Result of [`ProtocolGraph::detailed_impact`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailedImpact {
    /// Full upstream and downstream report
    pub report: ImpactReport,
    /// Risk assessment of the target
    pub risk: RiskAssessment,
    /// Every edge crossed, downstream first, each group sorted by key
    pub edges: Vec<ImpactEdge>,
}

#[derive(Default)]
struct Traversal {
    reached: Vec<(NodeIndex, usize)>,
    edges: Vec<ImpactEdge>,
    /// Some path led back to the start node.
    revisits_start: bool,
}

impl ProtocolGraph {
    /// Nodes affected by a change to `urn`.
    ///
    /// Returns `None` if `urn` is not in the graph.
    #[must_use]
    pub fn impact_of_change(&self, urn: &Urn, options: ImpactOptions) -> Option<ImpactReport> {
        let start = self.index_of(urn)?;
        let set = |direction| {
            let traversal = self.traverse(start, direction, options.max_depth, false);
            self.impact_set(&traversal)
        };
        Some(ImpactReport {
            target: urn.clone(),
            downstream: options
                .include_downstream
                .then(|| set(ImpactDirection::Downstream)),
            upstream: options
                .include_upstream
                .then(|| set(ImpactDirection::Upstream)),
        })
    }

    /// Score the breaking-change risk of modifying `urn`.
    ///
    /// The score grows with the number of direct and transitive dependents;
    /// cycle participation and PII declarations add fixed penalties. Returns
    /// `None` if `urn` is not in the graph.
    #[must_use]
    pub fn assess_risk(&self, urn: &Urn, policy: &RiskPolicy) -> Option<RiskAssessment> {
        let start = self.index_of(urn)?;
        let traversal = self.traverse(start, ImpactDirection::Downstream, None, false);
        Some(self.score(urn, &traversal, policy))
    }

    /// Impact in both directions plus the edges connecting the affected
    /// nodes, for audit. Returns `None` if `urn` is not in the graph.
    #[must_use]
    pub fn detailed_impact(&self, urn: &Urn, policy: &RiskPolicy) -> Option<DetailedImpact> {
        let start = self.index_of(urn)?;
        let downstream = self.traverse(start, ImpactDirection::Downstream, None, true);
        let upstream = self.traverse(start, ImpactDirection::Upstream, None, true);

        let report = ImpactReport {
            target: urn.clone(),
            downstream: Some(self.impact_set(&downstream)),
            upstream: Some(self.impact_set(&upstream)),
        };
        let risk = self.score(urn, &downstream, policy);
        let mut edges = downstream.edges;
        edges.extend(upstream.edges);

        Some(DetailedImpact {
            report,
            risk,
            edges,
        })
    }

    fn traverse(
        &self,
        start: NodeIndex,
        direction: ImpactDirection,
        max_depth: Option<usize>,
        collect_edges: bool,
    ) -> Traversal {
        let graph_direction = Direction::from(direction);
        let mut traversal = Traversal::default();
        let mut depths: HashMap<NodeIndex, usize> = HashMap::from([(start, 0)]);
        let mut queue = VecDeque::from([(start, 0)]);

        while let Some((node, depth)) = queue.pop_front() {
            if max_depth.is_some_and(|max| depth >= max) {
                continue;
            }

            let mut incident: Vec<_> = self
                .graph
                .edges_directed(node, graph_direction)
                .map(|edge| {
                    let next = match direction {
                        ImpactDirection::Downstream => edge.source(),
                        ImpactDirection::Upstream => edge.target(),
                    };
                    (next, edge.weight())
                })
                .collect();
            incident.sort_by(|a, b| a.1.key.cmp(&b.1.key));

            for (next, edge) in incident {
                if collect_edges {
                    traversal.edges.push(ImpactEdge {
                        key: edge.key.clone(),
                        metadata: edge.metadata.clone(),
                        direction,
                        depth: depth + 1,
                    });
                }
                if next == start {
                    traversal.revisits_start = true;
                }
                if depths.contains_key(&next) {
                    continue;
                }
                depths.insert(next, depth + 1);
                traversal.reached.push((next, depth + 1));
                queue.push_back((next, depth + 1));
            }
        }

        traversal
    }

    fn impact_set(&self, traversal: &Traversal) -> ImpactSet {
        let mut direct = Vec::new();
        let mut transitive = Vec::new();
        for &(node, depth) in &traversal.reached {
            let urn = self.urn_at(node).clone();
            if depth == 1 {
                direct.push(urn);
            } else {
                transitive.push(urn);
            }
        }
        direct.sort();
        transitive.sort();

        ImpactSet {
            total: direct.len() + transitive.len(),
            max_depth_reached: traversal
                .reached
                .iter()
                .map(|&(_, depth)| depth)
                .max()
                .unwrap_or(0),
            direct,
            transitive,
        }
    }

    fn score(&self, urn: &Urn, downstream: &Traversal, policy: &RiskPolicy) -> RiskAssessment {
        let direct = downstream.reached.iter().filter(|&&(_, d)| d == 1).count();
        let transitive = downstream.reached.len() - direct;
        let in_cycle = downstream.revisits_start;
        let pii_fields = self.node(urn).map_or(0, |node| node.pii_fields().len());

        let mut reasons = Vec::new();
        let mut score: u64 = 0;

        if direct > 0 {
            score = score.saturating_add(weighted(direct, policy.direct_weight));
            reasons.push(plural(direct, "direct dependent"));
        }
        if transitive > 0 {
            score = score.saturating_add(weighted(transitive, policy.transitive_weight));
            reasons.push(plural(transitive, "transitive dependent"));
        }
        if in_cycle {
            score = score.saturating_add(u64::from(policy.cycle_penalty));
            reasons.push("participates in a dependency cycle".to_string());
        }
        if pii_fields > 0 {
            score = score.saturating_add(u64::from(policy.pii_penalty));
            reasons.push(format!("declares {}", plural(pii_fields, "PII field")));
        }

        let score = u8::try_from(score.min(100)).unwrap_or(100);
        RiskAssessment {
            urn: urn.clone(),
            level: policy.level_for(score),
            score,
            direct_dependents: direct,
            transitive_dependents: transitive,
            in_cycle,
            reasons,
        }
    }
}

fn weighted(count: usize, weight: u32) -> u64 {
    u64::try_from(count)
        .unwrap_or(u64::MAX)
        .saturating_mul(u64::from(weight))
}

fn plural(count: usize, noun: &str) -> String {
    if count == 1 {
        format!("1 {noun}")
    } else {
        format!("{count} {noun}s")
    }
}
