//! Graph store for protocol artifacts using petgraph.
//!
//! # Architecture
//!
//! The store uses:
//! - `petgraph::StableDiGraph` holding [`Node`] and [`Edge`] records, so node
//!   and edge indices stay valid across removals
//! - `HashMap<Urn, NodeIndex>` and `HashMap<EdgeKey, EdgeIndex>` for O(1)
//!   identity lookups
//! - Secondary indexes by artifact kind, authority and bare URN
//!
//! Edges store endpoint URNs inside their key, never references to nodes, so
//! removal is index deletion rather than reference chasing.
//!
//! ## Edge Direction Convention
//!
//! An edge `from -> to` reads "`from` relies on `to`":
//!
//! - **Edge source**: the dependent
//! - **Edge target**: the dependency
//!
//! Outgoing edges therefore lead to upstream artifacts and incoming edges to
//! downstream consumers. PII tracing uses per-kind data-flow semantics instead
//! (see [`EdgeKind::data_flow`]).
//!
//! # Invariants
//!
//! - No dangling edges: both endpoints exist whenever an edge exists.
//! - Nodes are never created implicitly by edge insertion.
//! - Every URN in `node_map` appears in exactly one `by_kind`, one
//!   `by_authority` and one `by_bare` bucket.
//!
//! # Performance Characteristics
//!
//! - Add/remove node: O(1) amortized, plus O(degree) cascade on removal
//! - Add/remove edge: O(1) amortized
//! - Incident edges: O(degree)
//! - Lookup by kind or authority: O(1) plus result materialization
//!
//! # Thread Safety
//!
//! None. Hosts serialize mutations against all other calls.

pub mod snapshot;

use crate::domain::{ArtifactKind, Edge, EdgeKey, EdgeKind, EdgeMetadata, Manifest, Node};
use crate::error::{Error, Result};
use crate::urn::Urn;
use petgraph::Direction;
use petgraph::stable_graph::{EdgeIndex, NodeIndex, StableDiGraph};
use petgraph::visit::EdgeRef;
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

/// In-memory dependency graph of protocol artifacts.
#[derive(Debug, Clone, Default)]
pub struct ProtocolGraph {
    /// Node and edge records. Edge direction: dependent -> dependency.
    pub(crate) graph: StableDiGraph<Node, Edge>,

    /// Mapping from URN to graph node.
    pub(crate) node_map: HashMap<Urn, NodeIndex>,

    /// Mapping from edge identity to graph edge.
    edge_map: HashMap<EdgeKey, EdgeIndex>,

    by_kind: HashMap<ArtifactKind, BTreeSet<Urn>>,
    by_authority: HashMap<String, BTreeSet<Urn>>,
    /// Versioned siblings grouped by bare URN string.
    by_bare: HashMap<String, BTreeSet<Urn>>,
}

impl ProtocolGraph {
    /// Create an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // ========== Mutations ==========

    /// Insert a node.
    ///
    /// Returns `true` if the node was newly inserted and `false` if a node
    /// with this URN already exists. Duplicate insertion never overwrites the
    /// stored manifest.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidUrn` if the URN carries a version range
    /// - `Error::InvalidKind` if `kind` disagrees with the URN's kind segment
    /// - `Error::InvalidPayload` if the manifest's PII list is malformed
    pub fn add_node(&mut self, urn: Urn, kind: ArtifactKind, manifest: Manifest) -> Result<bool> {
        let node = Node::new(urn, kind, manifest)?;
        if self.node_map.contains_key(node.urn()) {
            debug!(urn = %node.urn(), "node already present, insertion ignored");
            return Ok(false);
        }

        let urn = node.urn().clone();
        let index = self.graph.add_node(node);
        self.node_map.insert(urn.clone(), index);
        self.by_kind.entry(kind).or_default().insert(urn.clone());
        self.by_authority
            .entry(urn.authority().to_string())
            .or_default()
            .insert(urn.clone());
        self.by_bare
            .entry(urn.bare_str().to_string())
            .or_default()
            .insert(urn.clone());

        debug!(%urn, %kind, "node added");
        Ok(true)
    }

    /// Remove a node and every incident edge in both directions.
    ///
    /// Returns `true` if the node existed.
    pub fn remove_node(&mut self, urn: &Urn) -> bool {
        let Some(index) = self.node_map.remove(urn) else {
            return false;
        };

        let mut incident: Vec<EdgeKey> = self
            .graph
            .edges_directed(index, Direction::Outgoing)
            .chain(self.graph.edges_directed(index, Direction::Incoming))
            .map(|edge| edge.weight().key.clone())
            .collect();
        // Self-loops show up in both directions.
        incident.sort();
        incident.dedup();
        for key in &incident {
            self.edge_map.remove(key);
        }

        // StableGraph drops incident edges along with the node.
        if let Some(node) = self.graph.remove_node(index) {
            remove_from_bucket(&mut self.by_kind, &node.kind(), urn);
            remove_from_bucket(&mut self.by_authority, urn.authority(), urn);
            remove_from_bucket(&mut self.by_bare, urn.bare_str(), urn);
        }

        debug!(%urn, cascaded_edges = incident.len(), "node removed");
        true
    }

    /// Insert an edge between two existing nodes.
    ///
    /// Re-adding an existing `(from, kind, to)` replaces its metadata and
    /// returns the same key.
    ///
    /// # Errors
    ///
    /// - `Error::UnknownNode` if either endpoint is absent
    /// - `Error::InvalidPayload` if the metadata's confidence is malformed
    pub fn add_edge(
        &mut self,
        from: &Urn,
        kind: EdgeKind,
        to: &Urn,
        metadata: EdgeMetadata,
    ) -> Result<EdgeKey> {
        let from_index = self.require(from)?;
        let to_index = self.require(to)?;
        metadata.validate()?;

        let key = EdgeKey::new(from.clone(), kind, to.clone());
        if let Some(&existing) = self.edge_map.get(&key) {
            if let Some(edge) = self.graph.edge_weight_mut(existing) {
                edge.metadata = metadata;
            }
            debug!(edge = %key, "edge metadata replaced");
            return Ok(key);
        }

        let index = self.graph.add_edge(
            from_index,
            to_index,
            Edge {
                key: key.clone(),
                metadata,
            },
        );
        self.edge_map.insert(key.clone(), index);
        debug!(edge = %key, "edge added");
        Ok(key)
    }

    /// Remove exactly one edge. Returns `true` if it existed.
    pub fn remove_edge(&mut self, key: &EdgeKey) -> bool {
        let Some(index) = self.edge_map.remove(key) else {
            return false;
        };
        self.graph.remove_edge(index);
        debug!(edge = %key, "edge removed");
        true
    }

    // ========== Lookups ==========

    /// Get a node by URN.
    #[must_use]
    pub fn node(&self, urn: &Urn) -> Option<&Node> {
        self.node_map.get(urn).map(|&index| &self.graph[index])
    }

    /// Returns `true` if a node with this URN exists.
    #[must_use]
    pub fn contains_node(&self, urn: &Urn) -> bool {
        self.node_map.contains_key(urn)
    }

    /// Get an edge by key.
    #[must_use]
    pub fn edge(&self, key: &EdgeKey) -> Option<&Edge> {
        self.edge_map.get(key).map(|&index| &self.graph[index])
    }

    /// Number of nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.node_map.len()
    }

    /// Number of edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edge_map.len()
    }

    /// Returns `true` if the graph has no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.node_map.is_empty()
    }

    /// All nodes, sorted by URN.
    #[must_use]
    pub fn nodes(&self) -> Vec<&Node> {
        let mut nodes: Vec<&Node> = self.graph.node_indices().map(|i| &self.graph[i]).collect();
        nodes.sort_by(|a, b| a.urn().cmp(b.urn()));
        nodes
    }

    /// All edges, sorted by key.
    #[must_use]
    pub fn edges(&self) -> Vec<&Edge> {
        let mut edges: Vec<&Edge> = self.graph.edge_indices().map(|i| &self.graph[i]).collect();
        edges.sort_by(|a, b| a.key.cmp(&b.key));
        edges
    }

    /// Edges leaving `urn` (its dependencies). Empty for unknown URNs.
    #[must_use]
    pub fn out_edges(&self, urn: &Urn) -> Vec<&Edge> {
        self.incident(urn, Direction::Outgoing)
    }

    /// Edges entering `urn` (its dependents). Empty for unknown URNs.
    #[must_use]
    pub fn in_edges(&self, urn: &Urn) -> Vec<&Edge> {
        self.incident(urn, Direction::Incoming)
    }

    fn incident(&self, urn: &Urn, direction: Direction) -> Vec<&Edge> {
        self.node_map.get(urn).map_or_else(Vec::new, |&index| {
            self.graph
                .edges_directed(index, direction)
                .map(|edge| edge.weight())
                .collect()
        })
    }

    /// Nodes of one artifact kind, sorted by URN.
    #[must_use]
    pub fn nodes_by_kind(&self, kind: ArtifactKind) -> Vec<&Node> {
        self.materialize(self.by_kind.get(&kind))
    }

    /// Nodes under one authority, sorted by URN.
    #[must_use]
    pub fn nodes_by_authority(&self, authority: &str) -> Vec<&Node> {
        self.materialize(self.by_authority.get(authority))
    }

    /// Stored siblings of `urn`'s bare identity that satisfy its version
    /// suffix, sorted by URN. A bare query returns every sibling.
    #[must_use]
    pub fn resolve(&self, urn: &Urn) -> Vec<&Node> {
        self.by_bare
            .get(urn.bare_str())
            .into_iter()
            .flatten()
            .filter(|candidate| urn.matches(candidate))
            .filter_map(|candidate| self.node(candidate))
            .collect()
    }

    fn materialize(&self, bucket: Option<&BTreeSet<Urn>>) -> Vec<&Node> {
        bucket
            .into_iter()
            .flatten()
            .filter_map(|urn| self.node(urn))
            .collect()
    }

    // ========== Crate-internal traversal helpers ==========

    pub(crate) fn index_of(&self, urn: &Urn) -> Option<NodeIndex> {
        self.node_map.get(urn).copied()
    }

    pub(crate) fn urn_at(&self, index: NodeIndex) -> &Urn {
        self.graph[index].urn()
    }

    /// All node indices ordered by URN, for deterministic traversals.
    pub(crate) fn sorted_indices(&self) -> Vec<NodeIndex> {
        let mut indices: Vec<NodeIndex> = self.graph.node_indices().collect();
        indices.sort_by(|a, b| self.urn_at(*a).cmp(self.urn_at(*b)));
        indices
    }

    /// Distinct neighbors in one direction, ordered by URN.
    pub(crate) fn neighbors(&self, index: NodeIndex, direction: Direction) -> Vec<NodeIndex> {
        let mut neighbors: Vec<NodeIndex> =
            self.graph.neighbors_directed(index, direction).collect();
        neighbors.sort_by(|a, b| self.urn_at(*a).cmp(self.urn_at(*b)));
        neighbors.dedup();
        neighbors
    }

    fn require(&self, urn: &Urn) -> Result<NodeIndex> {
        self.index_of(urn)
            .ok_or_else(|| Error::UnknownNode(urn.clone()))
    }
}

fn remove_from_bucket<K, Q>(index: &mut HashMap<K, BTreeSet<Urn>>, key: &Q, urn: &Urn)
where
    K: std::borrow::Borrow<Q> + std::hash::Hash + Eq,
    Q: std::hash::Hash + Eq + ?Sized,
{
    if let Some(bucket) = index.get_mut(key) {
        bucket.remove(urn);
        if bucket.is_empty() {
            index.remove(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn urn(s: &str) -> Urn {
        Urn::parse(s).unwrap()
    }

    fn graph_with(urns: &[&str]) -> ProtocolGraph {
        let mut graph = ProtocolGraph::new();
        for s in urns {
            let urn = urn(s);
            let kind = urn.kind();
            graph.add_node(urn, kind, Manifest::new()).unwrap();
        }
        graph
    }

    #[test]
    fn duplicate_node_insertion_is_a_no_op() {
        let mut graph = ProtocolGraph::new();
        let a = urn("urn:proto:api:acme.com/a");
        let manifest = Manifest::from_value(json!({"title": "first"})).unwrap();

        assert!(graph.add_node(a.clone(), ArtifactKind::Api, manifest).unwrap());
        let replacement = Manifest::from_value(json!({"title": "second"})).unwrap();
        assert!(!graph.add_node(a.clone(), ArtifactKind::Api, replacement).unwrap());

        assert_eq!(graph.node_count(), 1);
        assert_eq!(
            graph.node(&a).unwrap().manifest().get("title"),
            Some(&json!("first"))
        );
    }

    #[test]
    fn failed_insertion_leaves_no_trace() {
        let mut graph = ProtocolGraph::new();
        let bad = Manifest::from_value(json!({"pii": [{"field": "email"}]})).unwrap();

        let err = graph
            .add_node(urn("urn:proto:data:acme.com/d"), ArtifactKind::Data, bad)
            .unwrap_err();

        assert!(err.is_structural());
        assert!(graph.is_empty());
        assert!(graph.nodes_by_kind(ArtifactKind::Data).is_empty());
    }

    #[test]
    fn edge_requires_both_endpoints() {
        let mut graph = graph_with(&["urn:proto:api:acme.com/a"]);
        let a = urn("urn:proto:api:acme.com/a");
        let missing = urn("urn:proto:api:acme.com/missing");

        let err = graph
            .add_edge(&a, EdgeKind::DependsOn, &missing, EdgeMetadata::new())
            .unwrap_err();
        assert!(matches!(err, Error::UnknownNode(u) if u == missing));

        let err = graph
            .add_edge(&missing, EdgeKind::DependsOn, &a, EdgeMetadata::new())
            .unwrap_err();
        assert!(matches!(err, Error::UnknownNode(_)));
        assert_eq!(graph.edge_count(), 0);
        assert!(!graph.contains_node(&missing));
    }

    #[test]
    fn re_adding_an_edge_replaces_metadata() {
        let mut graph = graph_with(&["urn:proto:api:acme.com/a", "urn:proto:api:acme.com/b"]);
        let a = urn("urn:proto:api:acme.com/a");
        let b = urn("urn:proto:api:acme.com/b");

        let first = graph
            .add_edge(&a, EdgeKind::DependsOn, &b, EdgeMetadata::with_confidence(0.3))
            .unwrap();
        let second = graph
            .add_edge(&a, EdgeKind::DependsOn, &b, EdgeMetadata::with_confidence(0.8))
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(graph.edge_count(), 1);
        let stored = graph.edge(&first).unwrap();
        assert!((stored.metadata.confidence() - 0.8).abs() < f64::EPSILON);
    }

    #[test]
    fn different_kinds_between_same_nodes_are_distinct_edges() {
        let mut graph = graph_with(&["urn:proto:api:acme.com/a", "urn:proto:data:acme.com/d"]);
        let a = urn("urn:proto:api:acme.com/a");
        let d = urn("urn:proto:data:acme.com/d");

        graph
            .add_edge(&a, EdgeKind::ReadsFrom, &d, EdgeMetadata::new())
            .unwrap();
        graph
            .add_edge(&a, EdgeKind::WritesTo, &d, EdgeMetadata::new())
            .unwrap();

        assert_eq!(graph.edge_count(), 2);
        assert_eq!(graph.out_edges(&a).len(), 2);
        assert_eq!(graph.in_edges(&d).len(), 2);
    }

    #[test]
    fn remove_node_cascades_to_incident_edges() {
        let mut graph = graph_with(&[
            "urn:proto:api:acme.com/a",
            "urn:proto:api:acme.com/b",
            "urn:proto:api:acme.com/c",
        ]);
        let a = urn("urn:proto:api:acme.com/a");
        let b = urn("urn:proto:api:acme.com/b");
        let c = urn("urn:proto:api:acme.com/c");
        graph
            .add_edge(&a, EdgeKind::DependsOn, &b, EdgeMetadata::new())
            .unwrap();
        let bc = graph
            .add_edge(&b, EdgeKind::DependsOn, &c, EdgeMetadata::new())
            .unwrap();
        let ac = graph
            .add_edge(&a, EdgeKind::DependsOn, &c, EdgeMetadata::new())
            .unwrap();

        assert!(graph.remove_node(&b));
        assert!(!graph.remove_node(&b));

        assert_eq!(graph.edge_count(), 1);
        assert!(graph.edge(&bc).is_none());
        assert!(graph.edge(&ac).is_some());
        assert!(graph.in_edges(&c).iter().all(|e| e.key.from != b));
    }

    #[test]
    fn remove_edge_deletes_exactly_one_edge() {
        let mut graph = graph_with(&["urn:proto:api:acme.com/a", "urn:proto:api:acme.com/b"]);
        let a = urn("urn:proto:api:acme.com/a");
        let b = urn("urn:proto:api:acme.com/b");
        let key = graph
            .add_edge(&a, EdgeKind::DependsOn, &b, EdgeMetadata::new())
            .unwrap();

        assert!(graph.remove_edge(&key));
        assert!(!graph.remove_edge(&key));
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn kind_and_authority_indexes_track_removal() {
        let mut graph = graph_with(&[
            "urn:proto:api:acme.com/a",
            "urn:proto:data:acme.com/d",
            "urn:proto:data:globex.io/e",
        ]);

        assert_eq!(graph.nodes_by_kind(ArtifactKind::Data).len(), 2);
        assert_eq!(graph.nodes_by_authority("acme.com").len(), 2);

        graph.remove_node(&urn("urn:proto:data:acme.com/d"));

        assert_eq!(graph.nodes_by_kind(ArtifactKind::Data).len(), 1);
        assert_eq!(graph.nodes_by_authority("acme.com").len(), 1);
        assert!(graph.nodes_by_authority("initech.net").is_empty());
    }

    #[test]
    fn resolve_matches_versioned_siblings() {
        let graph = graph_with(&[
            "urn:proto:api:acme.com/billing@1.0.0",
            "urn:proto:api:acme.com/billing@1.5.0",
            "urn:proto:api:acme.com/billing@2.0.0",
            "urn:proto:api:acme.com/shipping@1.2.0",
        ]);

        let resolved: Vec<&str> = graph
            .resolve(&urn("urn:proto:api:acme.com/billing@^1.0.0"))
            .into_iter()
            .map(|node| node.urn().as_str())
            .collect();
        assert_eq!(
            resolved,
            vec![
                "urn:proto:api:acme.com/billing@1.0.0",
                "urn:proto:api:acme.com/billing@1.5.0",
            ]
        );
        assert_eq!(
            graph.resolve(&urn("urn:proto:api:acme.com/billing")).len(),
            3
        );
    }
}
