//! The `urn-catalog-v1` document.
//!
//! ```json
//! {
//!   "version": "1.0.0",
//!   "format": "urn-catalog-v1",
//!   "lastModified": "2026-01-01T00:00:00Z",
//!   "artifacts": { "<urn>": { "urn": "<urn>", "namespace": "...", ... } },
//!   "indexes": { "byNamespace": { ... }, "byTag": { ... }, ... },
//!   "dependencyGraph": { "nodes": [...], "edges": [{ "from": "...", "to": "..." }] }
//! }
//! ```
//!
//! `indexes` and `dependencyGraph` are derived from `artifacts`; readers
//! rebuild them through [`CatalogIndex`] rather than trusting the stored copy.

use crate::artifact::Artifact;
use crate::error::{Error, Result};
use crate::index::CatalogIndex;
use chrono::{DateTime, Utc};
use protograph::Urn;
use schemars::{JsonSchema, Schema, schema_for};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::path::Path;
use tracing::debug;

/// Format tag of catalog documents.
pub const CATALOG_FORMAT: &str = "urn-catalog-v1";

/// Document schema version written by [`CatalogDocument::from_artifacts`].
pub const CATALOG_VERSION: &str = "1.0.0";

/// Persisted catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CatalogDocument {
    /// Document schema version
    pub version: String,
    /// Format tag, [`CATALOG_FORMAT`]
    pub format: String,
    /// Last modification time
    #[schemars(with = "String")]
    pub last_modified: DateTime<Utc>,
    /// Artifacts keyed by URN
    pub artifacts: BTreeMap<String, Artifact>,
    /// Derived lookup tables
    #[serde(default)]
    pub indexes: DocumentIndexes,
    /// Derived dependency edges
    #[serde(default)]
    pub dependency_graph: DependencyGraph,
}

/// Lookup tables stored alongside the artifacts. Every list is sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct DocumentIndexes {
    /// URNs per namespace
    pub by_namespace: BTreeMap<String, Vec<String>>,
    /// URNs per tag
    pub by_tag: BTreeMap<String, Vec<String>>,
    /// URNs per owner
    pub by_owner: BTreeMap<String, Vec<String>>,
    /// URNs per artifact kind
    pub by_type: BTreeMap<String, Vec<String>>,
    /// URNs per classification tier
    pub by_classification: BTreeMap<String, Vec<String>>,
    /// PII-flagged URNs
    pub pii: Vec<String>,
}

/// Dependency edges declared by artifacts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct DependencyGraph {
    /// Every artifact URN
    pub nodes: Vec<String>,
    /// One edge per declared dependency
    pub edges: Vec<DependencyEdge>,
}

/// A declared dependency.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
pub struct DependencyEdge {
    /// Dependent artifact
    pub from: String,
    /// Dependency URN as declared, possibly a range
    pub to: String,
}

impl CatalogDocument {
    /// Assemble a document, deriving its index and dependency sections.
    pub fn from_artifacts(artifacts: impl IntoIterator<Item = Artifact>) -> Self {
        let index = CatalogIndex::build(artifacts);
        let indexes = DocumentIndexes::from(&index);

        let mut edges: Vec<DependencyEdge> = index
            .artifacts()
            .flat_map(|artifact| {
                artifact.dependencies.iter().map(|dependency| DependencyEdge {
                    from: artifact.urn.to_string(),
                    to: dependency.to_string(),
                })
            })
            .collect();
        edges.sort();
        edges.dedup();

        Self {
            version: CATALOG_VERSION.to_string(),
            format: CATALOG_FORMAT.to_string(),
            last_modified: Utc::now(),
            dependency_graph: DependencyGraph {
                nodes: index.artifacts().map(|a| a.urn.to_string()).collect(),
                edges,
            },
            artifacts: index
                .artifacts()
                .map(|a| (a.urn.to_string(), a.clone()))
                .collect(),
            indexes,
        }
    }

    /// Build the secondary indexes for this document's artifacts.
    #[must_use]
    pub fn index(&self) -> CatalogIndex {
        CatalogIndex::build(self.artifacts.values().cloned())
    }

    /// Pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns `Error::Json` if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the document to `path`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Json` or `Error::Io` if writing fails.
    pub fn save(&self, path: &Path) -> Result<()> {
        fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Read and validate a document from `path`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the file cannot be read and
    /// `Error::Validation` if its content is not a valid catalog.
    pub fn load(path: &Path) -> Result<Self> {
        parse_document(&fs::read_to_string(path)?)
    }
}

impl From<&CatalogIndex> for DocumentIndexes {
    fn from(index: &CatalogIndex) -> Self {
        fn listing<K: ToString>(map: &HashMap<K, BTreeSet<Urn>>) -> BTreeMap<String, Vec<String>> {
            map.iter()
                .map(|(key, urns)| (key.to_string(), urns.iter().map(Urn::to_string).collect()))
                .collect()
        }

        Self {
            by_namespace: listing(&index.by_namespace),
            by_tag: listing(&index.by_tag),
            by_owner: listing(&index.by_owner),
            by_type: listing(&index.by_type),
            by_classification: listing(&index.by_classification),
            pii: index.pii.iter().map(Urn::to_string).collect(),
        }
    }
}

/// Parse and validate a catalog document.
///
/// Checks the format tag and that every artifact is keyed by its own URN.
///
/// # Errors
///
/// Returns `Error::Validation` describing the first problem found.
pub fn parse_document(json: &str) -> Result<CatalogDocument> {
    let document: CatalogDocument =
        serde_json::from_str(json).map_err(|e| Error::Validation(e.to_string()))?;

    if document.format != CATALOG_FORMAT {
        return Err(Error::Validation(format!(
            "unsupported format '{}', expected '{CATALOG_FORMAT}'",
            document.format
        )));
    }

    for (key, artifact) in &document.artifacts {
        let key_urn = Urn::parse(key)
            .map_err(|e| Error::Validation(format!("artifact key '{key}': {e}")))?;
        if key_urn != artifact.urn {
            return Err(Error::Validation(format!(
                "artifact key '{key}' does not match its urn '{}'",
                artifact.urn
            )));
        }
    }

    debug!(artifacts = document.artifacts.len(), "Parsed catalog document");
    Ok(document)
}

/// JSON Schema of [`CatalogDocument`].
#[must_use]
pub fn catalog_schema() -> Schema {
    schema_for!(CatalogDocument)
}
