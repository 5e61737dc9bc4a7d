//! Domain types for the protocol artifact graph.
//!
//! This module contains the node and edge vocabulary: artifact kinds, edge
//! kinds, the opaque manifest and metadata payloads, and the typed accessors
//! for the few fields the analyses rely on (PII declarations and edge
//! confidence).

use crate::error::{Error, Result};
use crate::urn::Urn;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Manifest key holding the list of PII-bearing fields.
pub const PII_FIELDS_KEY: &str = "pii";

/// Metadata key holding an edge's confidence score.
pub const CONFIDENCE_KEY: &str = "confidence";

/// Kind of protocol artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ArtifactKind {
    /// An API surface
    #[serde(rename = "api")]
    Api,

    /// A single operation exposed by an API
    #[serde(rename = "api.endpoint")]
    ApiEndpoint,

    /// A data source (table, bucket, stream)
    #[serde(rename = "data")]
    Data,

    /// An event or message type
    #[serde(rename = "event")]
    Event,

    /// A semantic type shared across artifacts
    #[serde(rename = "semantic")]
    Semantic,
}

impl ArtifactKind {
    /// Every artifact kind, in declaration order.
    pub const ALL: [Self; 5] = [
        Self::Api,
        Self::ApiEndpoint,
        Self::Data,
        Self::Event,
        Self::Semantic,
    ];

    /// The URN kind segment for this kind.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Api => "api",
            Self::ApiEndpoint => "api.endpoint",
            Self::Data => "data",
            Self::Event => "event",
            Self::Semantic => "semantic",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArtifactKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| Error::InvalidKind(s.to_string()))
    }
}

/// Direction in which data moves along an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataFlow {
    /// Data moves from the edge source to the edge target.
    Forward,
    /// Data moves from the edge target to the edge source.
    Backward,
}

/// Type of relationship between two artifacts.
///
/// Every edge `from -> to` reads "`from` relies on `to`" for ordering, path
/// finding and impact analysis. Data flow is kind-specific, see
/// [`EdgeKind::data_flow`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    /// Generic dependency
    DependsOn,

    /// Source emits the target (e.g. an API producing an event)
    Produces,

    /// Source subscribes to the target
    Consumes,

    /// Source reads the target data source
    ReadsFrom,

    /// Source writes into the target data source
    WritesTo,

    /// Source data is exposed through the target
    Exposes,

    /// Source is derived from the target
    DerivesFrom,
}

impl EdgeKind {
    /// Every edge kind, in declaration order.
    pub const ALL: [Self; 7] = [
        Self::DependsOn,
        Self::Produces,
        Self::Consumes,
        Self::ReadsFrom,
        Self::WritesTo,
        Self::Exposes,
        Self::DerivesFrom,
    ];

    /// Wire name of the edge kind.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DependsOn => "depends_on",
            Self::Produces => "produces",
            Self::Consumes => "consumes",
            Self::ReadsFrom => "reads_from",
            Self::WritesTo => "writes_to",
            Self::Exposes => "exposes",
            Self::DerivesFrom => "derives_from",
        }
    }

    /// How data moves along an edge of this kind, or `None` for pure
    /// dependencies that carry no data.
    #[must_use]
    pub fn data_flow(&self) -> Option<DataFlow> {
        match self {
            Self::Exposes | Self::Produces | Self::WritesTo => Some(DataFlow::Forward),
            Self::ReadsFrom | Self::Consumes | Self::DerivesFrom => Some(DataFlow::Backward),
            Self::DependsOn => None,
        }
    }
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EdgeKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| Error::InvalidEdgeKind(s.to_string()))
    }
}

/// A PII-bearing field declared by a manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PiiField {
    /// Field name (e.g. `email`)
    pub field: String,

    /// PII category (e.g. `contact`), if the importer classified it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    /// Detection confidence in `[0, 1]`
    pub confidence: f64,
}

impl PiiField {
    /// Category used for summaries: the declared category, falling back to
    /// the field name.
    #[must_use]
    pub fn category_or_field(&self) -> &str {
        self.category.as_deref().unwrap_or(&self.field)
    }
}

fn check_confidence(value: f64, context: &str) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(Error::InvalidPayload(format!(
            "{context}: confidence {value} is outside [0, 1]"
        )))
    }
}

fn object_payload(value: Value, what: &str) -> Result<Map<String, Value>> {
    match value {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        other => Err(Error::InvalidPayload(format!(
            "{what} must be an object, got {other}"
        ))),
    }
}

/// Opaque keyed payload describing an artifact.
///
/// Only the `pii` list is interpreted by this crate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Manifest(Map<String, Value>);

impl Manifest {
    /// Create an empty manifest.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap a JSON value. `null` becomes an empty manifest.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidPayload` if the value is not an object.
    pub fn from_value(value: Value) -> Result<Self> {
        object_payload(value, "manifest").map(Self)
    }

    /// Builder-style helper declaring PII fields.
    #[must_use]
    pub fn with_pii(mut self, fields: &[PiiField]) -> Self {
        let list = fields
            .iter()
            .map(|f| serde_json::to_value(f).unwrap_or(Value::Null))
            .collect();
        self.0.insert(PII_FIELDS_KEY.to_string(), Value::Array(list));
        self
    }

    /// Look up a raw manifest entry.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Insert a raw manifest entry, returning the previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(key.into(), value)
    }

    /// The underlying map.
    #[must_use]
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Convert back into a JSON value.
    #[must_use]
    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    /// Decode the declared PII fields.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidPayload` if the `pii` entry is not a list of
    /// `{ field, category?, confidence }` objects, or a confidence falls
    /// outside `[0, 1]`.
    pub fn pii_fields(&self) -> Result<Vec<PiiField>> {
        let Some(raw) = self.0.get(PII_FIELDS_KEY) else {
            return Ok(Vec::new());
        };
        let fields: Vec<PiiField> = serde_json::from_value(raw.clone())
            .map_err(|e| Error::InvalidPayload(format!("manifest 'pii' list: {e}")))?;
        for field in &fields {
            check_confidence(field.confidence, &format!("PII field '{}'", field.field))?;
        }
        Ok(fields)
    }
}

/// Opaque keyed payload attached to an edge.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EdgeMetadata(Map<String, Value>);

impl EdgeMetadata {
    /// Create empty metadata.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Metadata carrying only a confidence score.
    #[must_use]
    pub fn with_confidence(confidence: f64) -> Self {
        let mut map = Map::new();
        map.insert(CONFIDENCE_KEY.to_string(), Value::from(confidence));
        Self(map)
    }

    /// Wrap a JSON value. `null` becomes empty metadata.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidPayload` if the value is not an object.
    pub fn from_value(value: Value) -> Result<Self> {
        object_payload(value, "edge metadata").map(Self)
    }

    /// Look up a raw metadata entry.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// The underlying map.
    #[must_use]
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Convert back into a JSON value.
    #[must_use]
    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    /// Edge confidence, defaulting to `1.0` when absent.
    ///
    /// Metadata is validated on insertion, so stored edges always report a
    /// value in `[0, 1]`.
    #[must_use]
    pub fn confidence(&self) -> f64 {
        self.0
            .get(CONFIDENCE_KEY)
            .and_then(Value::as_f64)
            .unwrap_or(1.0)
    }

    /// Check the typed fields.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidPayload` if `confidence` is present but not a
    /// number in `[0, 1]`.
    pub fn validate(&self) -> Result<()> {
        match self.0.get(CONFIDENCE_KEY) {
            None => Ok(()),
            Some(value) => {
                let confidence = value.as_f64().ok_or_else(|| {
                    Error::InvalidPayload(format!("edge confidence must be a number, got {value}"))
                })?;
                check_confidence(confidence, "edge")
            }
        }
    }
}

/// One artifact stored in the graph.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    urn: Urn,
    kind: ArtifactKind,
    manifest: Manifest,
    pii_fields: Vec<PiiField>,
}

impl Node {
    /// Validate and build a node.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidUrn` if the URN carries a version range
    /// - `Error::InvalidKind` if `kind` disagrees with the URN's kind segment
    /// - `Error::InvalidPayload` if the manifest's PII list is malformed
    pub fn new(urn: Urn, kind: ArtifactKind, manifest: Manifest) -> Result<Self> {
        if urn.is_range() {
            return Err(Error::InvalidUrn {
                input: urn.to_string(),
                reason: "node URNs must be bare or pin an exact version".to_string(),
            });
        }
        if urn.kind() != kind {
            return Err(Error::InvalidKind(format!(
                "node kind '{kind}' does not match URN kind '{}' in {urn}",
                urn.kind()
            )));
        }
        let pii_fields = manifest.pii_fields()?;
        Ok(Self {
            urn,
            kind,
            manifest,
            pii_fields,
        })
    }

    /// Node identity.
    #[must_use]
    pub fn urn(&self) -> &Urn {
        &self.urn
    }

    /// Artifact kind.
    #[must_use]
    pub fn kind(&self) -> ArtifactKind {
        self.kind
    }

    /// Opaque manifest payload.
    #[must_use]
    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// PII fields decoded from the manifest at insertion.
    #[must_use]
    pub fn pii_fields(&self) -> &[PiiField] {
        &self.pii_fields
    }

    /// Returns `true` if the manifest declares any PII field.
    #[must_use]
    pub fn declares_pii(&self) -> bool {
        !self.pii_fields.is_empty()
    }
}

/// Stable identity of an edge: `(from, kind, to)`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EdgeKey {
    /// Edge source
    pub from: Urn,
    /// Relationship kind
    pub kind: EdgeKind,
    /// Edge target
    pub to: Urn,
}

impl EdgeKey {
    /// Create an edge key.
    #[must_use]
    pub fn new(from: Urn, kind: EdgeKind, to: Urn) -> Self {
        Self { from, kind, to }
    }
}

impl fmt::Display for EdgeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -[{}]-> {}", self.from, self.kind, self.to)
    }
}

/// A directed, typed relationship stored in the graph.
#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    /// Edge identity
    pub key: EdgeKey,
    /// Opaque metadata (e.g. a confidence score)
    pub metadata: EdgeMetadata,
}
