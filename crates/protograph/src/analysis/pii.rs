//! PII flow tracing.
//!
//! Tracing starts at an endpoint and walks data flow backwards: across an
//! incoming edge whose kind moves data forward (`exposes`, `produces`,
//! `writes_to`) and across an outgoing edge whose kind moves data backward
//! (`reads_from`, `consumes`, `derives_from`). `depends_on` edges carry no
//! data and are never crossed.
//!
//! # Confidence
//!
//! A path's confidence is the minimum of the source's strongest qualifying
//! field confidence and every edge confidence along the path (edges without
//! a confidence count as `1.0`). A report's overall confidence is the maximum
//! over its sources, or `0.0` when nothing was found.
//!
//! Each source is reported with one path: the shortest one. Among equally
//! short paths the most confident is kept, and when two artifacts are linked
//! by several kinds the most confident edge is used.

use crate::config::DEFAULT_PII_MAX_DEPTH;
use crate::domain::{ArtifactKind, DataFlow, PiiField};
use crate::graph::ProtocolGraph;
use crate::urn::Urn;
use petgraph::Direction;
use petgraph::stable_graph::NodeIndex;
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::Entry;
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::debug;

/// Options for [`ProtocolGraph::trace_pii_flow`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PiiTraceOptions {
    /// Maximum hops walked back from the endpoint
    pub max_depth: usize,
    /// Fields and edges below this confidence are ignored
    pub min_confidence: f64,
}

impl Default for PiiTraceOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_PII_MAX_DEPTH,
            min_confidence: 0.0,
        }
    }
}

/// One PII-declaring artifact whose data reaches the endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PiiSource {
    /// The declaring artifact
    pub urn: Urn,
    /// Declared fields at or above the confidence floor
    pub fields: Vec<PiiField>,
    /// Data path from the source to the endpoint, both inclusive
    pub path: Vec<Urn>,
    /// Path confidence
    pub confidence: f64,
}

/// Result of [`ProtocolGraph::trace_pii_flow`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PiiFlowReport {
    /// Traced endpoint
    pub endpoint: Urn,
    /// Whether any source was found
    pub has_pii: bool,
    /// Distinct sources, sorted by URN
    pub sources: Vec<PiiSource>,
    /// Maximum path confidence
    pub confidence: f64,
}

/// An endpoint that exposes PII.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointExposure {
    /// The exposing endpoint
    pub endpoint: Urn,
    /// Source URNs, sorted
    pub sources: Vec<Urn>,
    /// Distinct categories exposed, sorted
    pub categories: Vec<String>,
    /// Maximum path confidence
    pub confidence: f64,
}

impl From<PiiFlowReport> for EndpointExposure {
    fn from(report: PiiFlowReport) -> Self {
        let categories: BTreeSet<String> = report
            .sources
            .iter()
            .flat_map(|source| &source.fields)
            .map(|field| field.category_or_field().to_string())
            .collect();
        Self {
            endpoint: report.endpoint,
            sources: report.sources.into_iter().map(|source| source.urn).collect(),
            categories: categories.into_iter().collect(),
            confidence: report.confidence,
        }
    }
}

/// Result of [`ProtocolGraph::pii_summary`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PiiSummary {
    /// Number of `api.endpoint` nodes traced
    pub endpoints_scanned: usize,
    /// Number of endpoints exposing PII
    pub exposing_endpoints: usize,
    /// Distinct source artifacts across all endpoints
    pub distinct_sources: usize,
    /// Distinct categories across all endpoints, sorted
    pub categories: Vec<String>,
    /// Highest confidence observed
    pub max_confidence: f64,
    /// Per-endpoint detail
    pub endpoints: Vec<EndpointExposure>,
}

struct Hop {
    /// Next node on the way to the endpoint.
    toward_endpoint: NodeIndex,
    /// Minimum edge confidence from this node to the endpoint.
    confidence: f64,
}

impl ProtocolGraph {
    /// Find every PII-declaring artifact whose data reaches `endpoint`.
    ///
    /// The endpoint's own declarations are not counted. Returns `None` if
    /// `endpoint` is not in the graph.
    #[must_use]
    pub fn trace_pii_flow(&self, endpoint: &Urn, options: PiiTraceOptions) -> Option<PiiFlowReport> {
        let start = self.index_of(endpoint)?;

        let mut hops: HashMap<NodeIndex, Hop> = HashMap::new();
        let mut visited = HashSet::from([start]);
        let mut reached = Vec::new();
        let mut frontier = vec![start];

        // One depth per pass; among equally short arrivals the most
        // confident hop wins.
        for _ in 0..options.max_depth {
            let mut level: HashMap<NodeIndex, Hop> = HashMap::new();
            for &node in &frontier {
                let carried = hops.get(&node).map_or(1.0, |hop| hop.confidence);
                for (next, edge_confidence) in self.data_origins(node, options.min_confidence) {
                    if visited.contains(&next) {
                        continue;
                    }
                    let confidence = carried.min(edge_confidence);
                    match level.entry(next) {
                        Entry::Occupied(mut best) if best.get().confidence < confidence => {
                            best.insert(Hop {
                                toward_endpoint: node,
                                confidence,
                            });
                        }
                        Entry::Occupied(_) => {}
                        Entry::Vacant(slot) => {
                            slot.insert(Hop {
                                toward_endpoint: node,
                                confidence,
                            });
                        }
                    }
                }
            }
            if level.is_empty() {
                break;
            }

            frontier = level.keys().copied().collect();
            frontier.sort_by(|a, b| self.urn_at(*a).cmp(self.urn_at(*b)));
            visited.extend(frontier.iter().copied());
            reached.extend(frontier.iter().copied());
            hops.extend(level);
        }

        let mut sources: Vec<PiiSource> = reached
            .into_iter()
            .filter_map(|index| self.pii_source(index, start, &hops, options.min_confidence))
            .collect();
        sources.sort_by(|a, b| a.urn.cmp(&b.urn));

        let confidence = sources
            .iter()
            .map(|source| source.confidence)
            .fold(0.0, f64::max);

        debug!(
            endpoint = %endpoint,
            sources = sources.len(),
            confidence,
            "Traced PII flow"
        );

        Some(PiiFlowReport {
            endpoint: endpoint.clone(),
            has_pii: !sources.is_empty(),
            sources,
            confidence,
        })
    }

    /// Every `api.endpoint` node that exposes PII, sorted by URN.
    #[must_use]
    pub fn find_pii_exposing_endpoints(&self, options: PiiTraceOptions) -> Vec<EndpointExposure> {
        self.nodes_by_kind(ArtifactKind::ApiEndpoint)
            .into_iter()
            .filter_map(|node| self.trace_pii_flow(node.urn(), options))
            .filter(|report| report.has_pii)
            .map(EndpointExposure::from)
            .collect()
    }

    /// Aggregate PII exposure across all endpoints.
    #[must_use]
    pub fn pii_summary(&self, options: PiiTraceOptions) -> PiiSummary {
        let endpoints = self.find_pii_exposing_endpoints(options);

        let sources: BTreeSet<&Urn> = endpoints.iter().flat_map(|e| &e.sources).collect();
        let categories: BTreeSet<&String> = endpoints.iter().flat_map(|e| &e.categories).collect();

        PiiSummary {
            endpoints_scanned: self.nodes_by_kind(ArtifactKind::ApiEndpoint).len(),
            exposing_endpoints: endpoints.len(),
            distinct_sources: sources.len(),
            categories: categories.into_iter().cloned().collect(),
            max_confidence: endpoints
                .iter()
                .map(|e| e.confidence)
                .fold(0.0, f64::max),
            endpoints,
        }
    }

    /// Nodes whose data flows directly into `node`, with the connecting
    /// edge's confidence. One entry per neighbor, keeping the most confident
    /// edge, ordered by URN.
    fn data_origins(&self, node: NodeIndex, min_confidence: f64) -> Vec<(NodeIndex, f64)> {
        let forward_in = self
            .graph
            .edges_directed(node, Direction::Incoming)
            .filter(|edge| edge.weight().key.kind.data_flow() == Some(DataFlow::Forward))
            .map(|edge| (edge.source(), edge.weight().metadata.confidence()));
        let backward_out = self
            .graph
            .edges_directed(node, Direction::Outgoing)
            .filter(|edge| edge.weight().key.kind.data_flow() == Some(DataFlow::Backward))
            .map(|edge| (edge.target(), edge.weight().metadata.confidence()));

        let mut origins: Vec<(NodeIndex, f64)> = forward_in
            .chain(backward_out)
            .filter(|&(_, confidence)| confidence >= min_confidence)
            .collect();
        origins.sort_by(|a, b| {
            self.urn_at(a.0)
                .cmp(self.urn_at(b.0))
                .then(b.1.total_cmp(&a.1))
        });
        origins.dedup_by_key(|origin| origin.0);
        origins
    }

    fn pii_source(
        &self,
        index: NodeIndex,
        endpoint: NodeIndex,
        hops: &HashMap<NodeIndex, Hop>,
        min_confidence: f64,
    ) -> Option<PiiSource> {
        let fields: Vec<PiiField> = self.graph[index]
            .pii_fields()
            .iter()
            .filter(|field| field.confidence >= min_confidence)
            .cloned()
            .collect();
        let strongest = fields.iter().map(|field| field.confidence).reduce(f64::max)?;
        let hop = hops.get(&index)?;

        let mut path = vec![self.urn_at(index).clone()];
        let mut current = index;
        while current != endpoint {
            let Some(next) = hops.get(&current) else {
                break;
            };
            current = next.toward_endpoint;
            path.push(self.urn_at(current).clone());
        }

        Some(PiiSource {
            urn: self.urn_at(index).clone(),
            fields,
            path,
            confidence: strongest.min(hop.confidence),
        })
    }
}
