//! Common test utilities shared across integration tests.

#![allow(dead_code)]

use protograph::{ArtifactKind, EdgeKind, EdgeMetadata, Manifest, PiiField, ProtocolGraph, Urn};
use tracing_subscriber::EnvFilter;

/// Install a test subscriber honoring `RUST_LOG`. Safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Parse a URN, panicking on malformed test input.
pub fn urn(s: &str) -> Urn {
    Urn::parse(s).unwrap_or_else(|e| panic!("bad test URN {s}: {e}"))
}

/// `urn:proto:api:acme.com/<name>`
pub fn api(name: &str) -> Urn {
    urn(&format!("urn:proto:api:acme.com/{name}"))
}

/// `urn:proto:data:acme.com/<name>`
pub fn data(name: &str) -> Urn {
    urn(&format!("urn:proto:data:acme.com/{name}"))
}

/// `urn:proto:api.endpoint:acme.com/<name>`
pub fn endpoint(name: &str) -> Urn {
    urn(&format!("urn:proto:api.endpoint:acme.com/{name}"))
}

/// Insert a node whose kind is taken from its URN.
pub fn add(graph: &mut ProtocolGraph, urn: &Urn) {
    graph
        .add_node(urn.clone(), urn.kind(), Manifest::new())
        .expect("node insertion failed");
}

/// Insert a node declaring the given `(field, confidence)` PII entries.
pub fn add_with_pii(graph: &mut ProtocolGraph, urn: &Urn, fields: &[(&str, f64)]) {
    let fields: Vec<PiiField> = fields
        .iter()
        .map(|&(field, confidence)| PiiField {
            field: field.to_string(),
            category: None,
            confidence,
        })
        .collect();
    graph
        .add_node(urn.clone(), urn.kind(), Manifest::new().with_pii(&fields))
        .expect("node insertion failed");
}

/// Insert an edge without metadata.
pub fn link(graph: &mut ProtocolGraph, from: &Urn, kind: EdgeKind, to: &Urn) {
    graph
        .add_edge(from, kind, to, EdgeMetadata::new())
        .expect("edge insertion failed");
}

/// API nodes named `names`, connected by `depends_on` edges.
pub fn dependency_graph(names: &[&str], edges: &[(&str, &str)]) -> ProtocolGraph {
    let mut graph = ProtocolGraph::new();
    for name in names {
        graph
            .add_node(api(name), ArtifactKind::Api, Manifest::new())
            .expect("node insertion failed");
    }
    for (from, to) in edges {
        link(&mut graph, &api(from), EdgeKind::DependsOn, &api(to));
    }
    graph
}
