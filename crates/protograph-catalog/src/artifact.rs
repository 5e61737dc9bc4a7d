//! Flat catalog records.

use crate::error::Result;
use protograph::{ArtifactKind, Urn};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Data classification tier, from least to most sensitive.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    /// Publicly shareable
    Public,
    /// Internal use only
    #[default]
    Internal,
    /// Restricted to need-to-know
    Confidential,
    /// Regulated data
    Restricted,
}

impl Classification {
    /// Every tier, least sensitive first.
    pub const ALL: [Self; 4] = [
        Self::Public,
        Self::Internal,
        Self::Confidential,
        Self::Restricted,
    ];

    /// Serialized name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Internal => "internal",
            Self::Confidential => "confidential",
            Self::Restricted => "restricted",
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One catalog entry.
///
/// Unlike a graph node, an artifact carries governance metadata and lists its
/// dependencies inline. Catalogs are reloaded wholesale rather than patched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    /// Artifact identity
    #[schemars(with = "String")]
    pub urn: Urn,

    /// Human-readable name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Owning namespace (e.g. a team or domain)
    pub namespace: String,

    /// Free-form tags
    #[serde(default)]
    pub tags: Vec<String>,

    /// Owning team or person
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,

    /// Whether the artifact handles PII
    #[serde(default)]
    pub pii: bool,

    /// Classification tier
    #[serde(default)]
    pub classification: Classification,

    /// URNs this artifact depends on; may carry version ranges
    #[serde(default)]
    #[schemars(with = "Vec<String>")]
    pub dependencies: Vec<Urn>,

    /// `sha256:<hex>` over the record with this field cleared
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,

    /// Published version
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Whether the artifact is deprecated
    #[serde(default)]
    pub deprecated: bool,
}

impl Artifact {
    /// Create an artifact with default governance metadata.
    #[must_use]
    pub fn new(urn: Urn, namespace: impl Into<String>) -> Self {
        Self {
            urn,
            name: None,
            namespace: namespace.into(),
            tags: Vec::new(),
            owner: None,
            pii: false,
            classification: Classification::default(),
            dependencies: Vec::new(),
            checksum: None,
            version: None,
            deprecated: false,
        }
    }

    /// Artifact kind, taken from the URN.
    #[must_use]
    pub fn kind(&self) -> ArtifactKind {
        self.urn.kind()
    }

    /// Returns `true` if the artifact carries `tag`.
    #[must_use]
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    /// SHA-256 over the canonical JSON form with `checksum` cleared.
    ///
    /// # Errors
    ///
    /// Returns `Error::Json` if the record cannot be serialized.
    pub fn compute_checksum(&self) -> Result<String> {
        let unsigned = Self {
            checksum: None,
            ..self.clone()
        };
        let digest = Sha256::digest(serde_json::to_vec(&unsigned)?);
        Ok(format!("sha256:{digest:x}"))
    }

    /// Store the current checksum in the record.
    ///
    /// # Errors
    ///
    /// Returns `Error::Json` if the record cannot be serialized.
    pub fn seal(&mut self) -> Result<()> {
        self.checksum = Some(self.compute_checksum()?);
        Ok(())
    }

    /// Returns `true` if the stored checksum matches the content, or no
    /// checksum is stored.
    ///
    /// # Errors
    ///
    /// Returns `Error::Json` if the record cannot be serialized.
    pub fn verify_checksum(&self) -> Result<bool> {
        match &self.checksum {
            None => Ok(true),
            Some(stored) => Ok(*stored == self.compute_checksum()?),
        }
    }
}
