//! Graph export, import and JSONL persistence.
//!
//! A [`GraphSnapshot`] carries every node and edge as plain records (URNs and
//! kinds as strings, payloads as JSON), so a snapshot produced by another
//! process goes through the same validation as direct insertion.
//!
//! # JSONL layout
//!
//! One tagged record per line: a `header` line followed by `node` lines and
//! then `edge` lines.
//!
//! ```text
//! {"record":"header","format":"protograph-snapshot-v1","exported_at":"..."}
//! {"record":"node","urn":"urn:proto:data:acme.com/users","kind":"data","manifest":{}}
//! {"record":"edge","from":"...","kind":"exposes","to":"...","metadata":{}}
//! ```

use super::ProtocolGraph;
use crate::domain::{ArtifactKind, Edge, EdgeKey, EdgeKind, EdgeMetadata, Manifest, Node};
use crate::error::{Error, Result};
use crate::urn::Urn;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use tracing::{info, warn};

/// Format tag of the current snapshot layout.
pub const SNAPSHOT_FORMAT: &str = "protograph-snapshot-v1";

/// A serialized node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    /// Node URN
    pub urn: String,
    /// Artifact kind (`api`, `api.endpoint`, `data`, `event`, `semantic`)
    pub kind: String,
    /// Manifest payload
    #[serde(default)]
    pub manifest: Value,
}

/// A serialized edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeRecord {
    /// Source URN
    pub from: String,
    /// Edge kind (`depends_on`, `exposes`, ...)
    pub kind: String,
    /// Target URN
    pub to: String,
    /// Metadata payload
    #[serde(default)]
    pub metadata: Value,
}

impl From<&Node> for NodeRecord {
    fn from(node: &Node) -> Self {
        Self {
            urn: node.urn().to_string(),
            kind: node.kind().to_string(),
            manifest: node.manifest().clone().into_value(),
        }
    }
}

impl From<&Edge> for EdgeRecord {
    fn from(edge: &Edge) -> Self {
        Self {
            from: edge.key.from.to_string(),
            kind: edge.key.kind.to_string(),
            to: edge.key.to.to_string(),
            metadata: edge.metadata.clone().into_value(),
        }
    }
}

/// Complete, self-describing copy of a graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    /// Layout tag, [`SNAPSHOT_FORMAT`]
    pub format: String,
    /// Export time
    pub exported_at: DateTime<Utc>,
    /// Nodes sorted by URN
    pub nodes: Vec<NodeRecord>,
    /// Edges sorted by key
    pub edges: Vec<EdgeRecord>,
}

impl GraphSnapshot {
    /// SHA-256 over nodes and edges, ignoring the export time.
    ///
    /// Two graphs with equal fingerprints answer every query identically.
    ///
    /// # Errors
    ///
    /// Returns `Error::Json` if the records cannot be serialized.
    pub fn fingerprint(&self) -> Result<String> {
        let mut hasher = Sha256::new();
        hasher.update(serde_json::to_vec(&self.nodes)?);
        hasher.update(serde_json::to_vec(&self.edges)?);
        Ok(format!("sha256:{:x}", hasher.finalize()))
    }
}

impl ProtocolGraph {
    /// Export every node and edge in deterministic order.
    #[must_use]
    pub fn export(&self) -> GraphSnapshot {
        GraphSnapshot {
            format: SNAPSHOT_FORMAT.to_string(),
            exported_at: Utc::now(),
            nodes: self.nodes().into_iter().map(NodeRecord::from).collect(),
            edges: self.edges().into_iter().map(EdgeRecord::from).collect(),
        }
    }

    /// Rebuild a graph from a snapshot.
    ///
    /// Import is strict: the first invalid record fails the whole import.
    ///
    /// # Errors
    ///
    /// - `Error::Snapshot` for an unknown format tag or a duplicate record
    /// - Any structural error raised by node or edge insertion
    pub fn import(snapshot: &GraphSnapshot) -> Result<Self> {
        if snapshot.format != SNAPSHOT_FORMAT {
            return Err(Error::Snapshot(format!(
                "unsupported format '{}', expected '{SNAPSHOT_FORMAT}'",
                snapshot.format
            )));
        }

        let mut graph = Self::new();
        for record in &snapshot.nodes {
            let (urn, kind, manifest) = parse_node(record)?;
            if !graph.add_node(urn, kind, manifest)? {
                return Err(Error::Snapshot(format!("duplicate node {}", record.urn)));
            }
        }
        for record in &snapshot.edges {
            let (from, kind, to, metadata) = parse_edge(record)?;
            if graph.edge(&EdgeKey::new(from.clone(), kind, to.clone())).is_some() {
                return Err(Error::Snapshot(format!(
                    "duplicate edge {} -[{}]-> {}",
                    record.from, record.kind, record.to
                )));
            }
            graph.add_edge(&from, kind, &to, metadata)?;
        }

        Ok(graph)
    }
}

fn parse_node(record: &NodeRecord) -> Result<(Urn, ArtifactKind, Manifest)> {
    Ok((
        Urn::parse(&record.urn)?,
        record.kind.parse()?,
        Manifest::from_value(record.manifest.clone())?,
    ))
}

fn parse_edge(record: &EdgeRecord) -> Result<(Urn, EdgeKind, Urn, EdgeMetadata)> {
    Ok((
        Urn::parse(&record.from)?,
        record.kind.parse()?,
        Urn::parse(&record.to)?,
        EdgeMetadata::from_value(record.metadata.clone())?,
    ))
}

#[derive(Serialize, Deserialize)]
#[serde(tag = "record", rename_all = "snake_case")]
enum SnapshotLine {
    Header {
        format: String,
        exported_at: DateTime<Utc>,
    },
    Node(NodeRecord),
    Edge(EdgeRecord),
}

/// Non-fatal problems found while loading a JSONL snapshot.
///
/// The offending record is skipped; everything else is loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadWarning {
    /// Line is not a valid snapshot record
    MalformedLine {
        /// 1-based line number
        line_number: usize,
        /// Parser message
        error: String,
    },

    /// Node record failed validation or repeats an earlier URN
    InvalidNode {
        /// 1-based line number
        line_number: usize,
        /// URN as written
        urn: String,
        /// Validation message
        error: String,
    },

    /// Edge references a node that was not loaded
    OrphanedEdge {
        /// 1-based line number
        line_number: usize,
        /// Source URN as written
        from: String,
        /// Target URN as written
        to: String,
    },

    /// Edge record failed validation
    InvalidEdge {
        /// 1-based line number
        line_number: usize,
        /// Validation message
        error: String,
    },
}

impl fmt::Display for LoadWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedLine { line_number, error } => {
                write!(f, "line {line_number}: malformed record: {error}")
            }
            Self::InvalidNode {
                line_number,
                urn,
                error,
            } => write!(f, "line {line_number}: skipped node {urn}: {error}"),
            Self::OrphanedEdge {
                line_number,
                from,
                to,
            } => write!(f, "line {line_number}: skipped orphaned edge {from} -> {to}"),
            Self::InvalidEdge { line_number, error } => {
                write!(f, "line {line_number}: skipped edge: {error}")
            }
        }
    }
}

/// Save a graph as JSONL.
///
/// Writes to a `.tmp` sibling first and renames it over `path`, so an
/// interrupted save leaves the previous file intact.
///
/// # Errors
///
/// Returns `Error::Io` or `Error::Json` if writing fails.
pub fn save_to_jsonl(graph: &ProtocolGraph, path: &Path) -> Result<()> {
    let temp_path = path.with_extension("tmp");

    let written = write_snapshot_lines(graph.export(), &temp_path)
        .and_then(|()| fs::rename(&temp_path, path).map_err(Error::from));
    if let Err(e) = written {
        // Best effort cleanup.
        let _ = fs::remove_file(&temp_path);
        return Err(e);
    }

    info!(
        path = %path.display(),
        nodes = graph.node_count(),
        edges = graph.edge_count(),
        "Saved graph snapshot"
    );
    Ok(())
}

fn write_snapshot_lines(snapshot: GraphSnapshot, temp_path: &Path) -> Result<()> {
    let mut writer = BufWriter::new(File::create(temp_path)?);
    let header = SnapshotLine::Header {
        format: snapshot.format,
        exported_at: snapshot.exported_at,
    };
    let lines = std::iter::once(header)
        .chain(snapshot.nodes.into_iter().map(SnapshotLine::Node))
        .chain(snapshot.edges.into_iter().map(SnapshotLine::Edge));
    for line in lines {
        serde_json::to_writer(&mut writer, &line)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}

/// Load a JSONL snapshot, skipping bad records.
///
/// Nodes are loaded before edges regardless of line order. Every skipped
/// record produces a [`LoadWarning`], which is also logged.
///
/// # Errors
///
/// Returns `Error::Io` if the file cannot be read and `Error::Snapshot` if a
/// header declares an unsupported format.
pub fn load_from_jsonl(path: &Path) -> Result<(ProtocolGraph, Vec<LoadWarning>)> {
    let reader = BufReader::new(File::open(path)?);
    let mut warnings = Vec::new();
    let mut nodes = Vec::new();
    let mut edges = Vec::new();

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let line_number = index + 1;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<SnapshotLine>(&line) {
            Ok(SnapshotLine::Header { format, .. }) if format != SNAPSHOT_FORMAT => {
                return Err(Error::Snapshot(format!(
                    "unsupported format '{format}', expected '{SNAPSHOT_FORMAT}'"
                )));
            }
            Ok(SnapshotLine::Header { .. }) => {}
            Ok(SnapshotLine::Node(record)) => nodes.push((line_number, record)),
            Ok(SnapshotLine::Edge(record)) => edges.push((line_number, record)),
            Err(e) => warnings.push(LoadWarning::MalformedLine {
                line_number,
                error: e.to_string(),
            }),
        }
    }

    let mut graph = ProtocolGraph::new();

    for (line_number, record) in nodes {
        let inserted = parse_node(&record)
            .and_then(|(urn, kind, manifest)| graph.add_node(urn, kind, manifest));
        let error = match inserted {
            Ok(true) => continue,
            Ok(false) => "duplicate node".to_string(),
            Err(e) => e.to_string(),
        };
        warnings.push(LoadWarning::InvalidNode {
            line_number,
            urn: record.urn,
            error,
        });
    }

    for (line_number, record) in edges {
        let result = parse_edge(&record)
            .and_then(|(from, kind, to, metadata)| graph.add_edge(&from, kind, &to, metadata));
        match result {
            Ok(_) => {}
            Err(Error::UnknownNode(_)) => warnings.push(LoadWarning::OrphanedEdge {
                line_number,
                from: record.from,
                to: record.to,
            }),
            Err(e) => warnings.push(LoadWarning::InvalidEdge {
                line_number,
                error: e.to_string(),
            }),
        }
    }

    for warning in &warnings {
        warn!(path = %path.display(), "{warning}");
    }
    info!(
        path = %path.display(),
        nodes = graph.node_count(),
        edges = graph.edge_count(),
        warnings = warnings.len(),
        "Loaded graph snapshot"
    );

    Ok((graph, warnings))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PiiField;
    use serde_json::json;
    use tempfile::TempDir;

    fn sample() -> ProtocolGraph {
        let mut graph = ProtocolGraph::new();
        let users = Urn::parse("urn:proto:data:acme.com/users").unwrap();
        let get_user = Urn::parse("urn:proto:api.endpoint:acme.com/get-user@1.0.0").unwrap();
        let api = Urn::parse("urn:proto:api:acme.com/accounts").unwrap();
        let manifest = Manifest::new().with_pii(&[PiiField {
            field: "email".into(),
            category: Some("contact".into()),
            confidence: 0.95,
        }]);
        graph.add_node(users.clone(), ArtifactKind::Data, manifest).unwrap();
        graph
            .add_node(get_user.clone(), ArtifactKind::ApiEndpoint, Manifest::new())
            .unwrap();
        graph.add_node(api.clone(), ArtifactKind::Api, Manifest::new()).unwrap();
        graph
            .add_edge(&users, EdgeKind::Exposes, &get_user, EdgeMetadata::with_confidence(0.9))
            .unwrap();
        graph
            .add_edge(&api, EdgeKind::DependsOn, &users, EdgeMetadata::new())
            .unwrap();
        graph
    }

    #[test]
    fn export_import_preserves_structure() {
        let graph = sample();
        let snapshot = graph.export();

        let restored = ProtocolGraph::import(&snapshot).unwrap();

        assert_eq!(restored.node_count(), 3);
        assert_eq!(restored.edge_count(), 2);
        assert_eq!(
            restored.export().fingerprint().unwrap(),
            snapshot.fingerprint().unwrap()
        );
    }

    #[test]
    fn fingerprint_ignores_export_time() {
        let graph = sample();
        let mut first = graph.export();
        let second = graph.export();
        first.exported_at = DateTime::<Utc>::MIN_UTC;

        assert_eq!(first.fingerprint().unwrap(), second.fingerprint().unwrap());
        assert!(first.fingerprint().unwrap().starts_with("sha256:"));
    }

    #[test]
    fn import_rejects_unknown_format() {
        let mut snapshot = sample().export();
        snapshot.format = "something-else".into();

        let err = ProtocolGraph::import(&snapshot).unwrap_err();

        assert!(matches!(err, Error::Snapshot(_)));
    }

    #[test]
    fn import_is_strict_about_dangling_edges() {
        let mut snapshot = sample().export();
        snapshot.nodes.retain(|node| node.kind != "api");

        let err = ProtocolGraph::import(&snapshot).unwrap_err();

        assert!(matches!(err, Error::UnknownNode(_)));
    }

    #[test]
    fn import_rejects_duplicate_nodes() {
        let mut snapshot = sample().export();
        let first = snapshot.nodes[0].clone();
        snapshot.nodes.push(first);

        let err = ProtocolGraph::import(&snapshot).unwrap_err();

        assert!(matches!(err, Error::Snapshot(_)));
    }

    #[test]
    fn jsonl_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("graph.jsonl");
        let graph = sample();

        save_to_jsonl(&graph, &path).unwrap();
        let (loaded, warnings) = load_from_jsonl(&path).unwrap();

        assert!(warnings.is_empty());
        assert!(!path.with_extension("tmp").exists());
        assert_eq!(
            loaded.export().fingerprint().unwrap(),
            graph.export().fingerprint().unwrap()
        );
    }

    #[test]
    fn jsonl_load_skips_bad_records() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("graph.jsonl");
        let lines = [
            json!({"record": "header", "format": SNAPSHOT_FORMAT, "exported_at": "2026-01-01T00:00:00Z"}).to_string(),
            json!({"record": "edge", "from": "urn:proto:api:acme.com/a", "kind": "depends_on", "to": "urn:proto:api:acme.com/b"}).to_string(),
            json!({"record": "node", "urn": "urn:proto:api:acme.com/a", "kind": "api"}).to_string(),
            "{not json".to_string(),
            json!({"record": "node", "urn": "urn:proto:api:acme.com/c", "kind": "widget"}).to_string(),
            json!({"record": "node", "urn": "urn:proto:api:acme.com/a", "kind": "api"}).to_string(),
            json!({"record": "edge", "from": "urn:proto:api:acme.com/a", "kind": "likes", "to": "urn:proto:api:acme.com/a"}).to_string(),
        ];
        fs::write(&path, lines.join("\n")).unwrap();

        let (graph, warnings) = load_from_jsonl(&path).unwrap();

        assert_eq!(graph.node_count(), 1);
        assert_eq!(graph.edge_count(), 0);
        assert_eq!(warnings.len(), 5);
        assert!(matches!(warnings[0], LoadWarning::MalformedLine { line_number: 4, .. }));
        assert!(matches!(warnings[1], LoadWarning::InvalidNode { line_number: 5, .. }));
        assert!(matches!(warnings[2], LoadWarning::InvalidNode { line_number: 6, .. }));
        assert!(matches!(warnings[3], LoadWarning::OrphanedEdge { line_number: 2, .. }));
        assert!(matches!(warnings[4], LoadWarning::InvalidEdge { line_number: 7, .. }));
    }

    #[test]
    fn jsonl_load_rejects_unknown_header_format() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("graph.jsonl");
        let header = json!({"record": "header", "format": "v0", "exported_at": "2026-01-01T00:00:00Z"});
        fs::write(&path, header.to_string()).unwrap();

        let err = load_from_jsonl(&path).unwrap_err();

        assert!(matches!(err, Error::Snapshot(_)));
    }
}
