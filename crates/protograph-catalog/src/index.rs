//! Secondary indexes over a catalog.
//!
//! [`CatalogIndex`] is built once per catalog load. Each grouping maps a key
//! to the set of URNs carrying it, so point queries are a hash lookup plus
//! materialization of the matching records.

use crate::artifact::{Artifact, Classification};
use crate::error::Result;
use protograph::{ArtifactKind, Urn};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{info, warn};

/// Inverted indexes over a flat artifact collection.
#[derive(Debug, Clone, Default)]
pub struct CatalogIndex {
    pub(crate) artifacts: BTreeMap<Urn, Artifact>,
    pub(crate) by_namespace: HashMap<String, BTreeSet<Urn>>,
    pub(crate) by_tag: HashMap<String, BTreeSet<Urn>>,
    pub(crate) by_owner: HashMap<String, BTreeSet<Urn>>,
    pub(crate) by_type: HashMap<ArtifactKind, BTreeSet<Urn>>,
    pub(crate) by_classification: HashMap<Classification, BTreeSet<Urn>>,
    pub(crate) pii: BTreeSet<Urn>,
    pub(crate) deprecated: BTreeSet<Urn>,
    /// Dependents keyed by the bare identity of the dependency they declare.
    dependents: HashMap<String, BTreeSet<Urn>>,
    /// Versioned siblings keyed by bare identity.
    by_bare: HashMap<String, BTreeSet<Urn>>,
}

impl CatalogIndex {
    /// Build every index in one pass.
    ///
    /// A URN listed twice keeps its last record.
    pub fn build(artifacts: impl IntoIterator<Item = Artifact>) -> Self {
        let mut records = BTreeMap::new();
        for artifact in artifacts {
            if let Some(previous) = records.insert(artifact.urn.clone(), artifact) {
                warn!(urn = %previous.urn, "Duplicate catalog artifact, keeping the last record");
            }
        }

        let mut index = Self::default();
        for (urn, artifact) in &records {
            index.insert(urn, artifact);
        }
        index.artifacts = records;

        info!(
            artifacts = index.artifacts.len(),
            namespaces = index.by_namespace.len(),
            tags = index.by_tag.len(),
            pii = index.pii.len(),
            "Built catalog index"
        );
        index
    }

    fn insert(&mut self, urn: &Urn, artifact: &Artifact) {
        let add = |map: &mut HashMap<String, BTreeSet<Urn>>, key: &str| {
            map.entry(key.to_string()).or_default().insert(urn.clone());
        };
        add(&mut self.by_namespace, &artifact.namespace);
        for tag in &artifact.tags {
            add(&mut self.by_tag, tag);
        }
        if let Some(owner) = &artifact.owner {
            add(&mut self.by_owner, owner);
        }
        add(&mut self.by_bare, urn.bare_str());
        for dependency in &artifact.dependencies {
            add(&mut self.dependents, dependency.bare_str());
        }

        self.by_type
            .entry(artifact.kind())
            .or_default()
            .insert(urn.clone());
        self.by_classification
            .entry(artifact.classification)
            .or_default()
            .insert(urn.clone());
        if artifact.pii {
            self.pii.insert(urn.clone());
        }
        if artifact.deprecated {
            self.deprecated.insert(urn.clone());
        }
    }

    /// Number of indexed artifacts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    /// Returns `true` if the catalog is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }

    /// Look up one artifact.
    #[must_use]
    pub fn get(&self, urn: &Urn) -> Option<&Artifact> {
        self.artifacts.get(urn)
    }

    /// Every artifact, sorted by URN.
    pub fn artifacts(&self) -> impl Iterator<Item = &Artifact> {
        self.artifacts.values()
    }

    /// Artifacts in `namespace`.
    #[must_use]
    pub fn find_by_namespace(&self, namespace: &str) -> Vec<&Artifact> {
        self.materialize(self.by_namespace.get(namespace))
    }

    /// Artifacts tagged `tag`.
    #[must_use]
    pub fn find_by_tag(&self, tag: &str) -> Vec<&Artifact> {
        self.materialize(self.by_tag.get(tag))
    }

    /// Artifacts owned by `owner`.
    #[must_use]
    pub fn find_by_owner(&self, owner: &str) -> Vec<&Artifact> {
        self.materialize(self.by_owner.get(owner))
    }

    /// Artifacts of one kind.
    #[must_use]
    pub fn find_by_type(&self, kind: ArtifactKind) -> Vec<&Artifact> {
        self.materialize(self.by_type.get(&kind))
    }

    /// Artifacts in one classification tier.
    #[must_use]
    pub fn find_by_classification(&self, classification: Classification) -> Vec<&Artifact> {
        self.materialize(self.by_classification.get(&classification))
    }

    /// Artifacts flagged as handling PII.
    #[must_use]
    pub fn find_pii(&self) -> Vec<&Artifact> {
        self.materialize(Some(&self.pii))
    }

    /// Deprecated artifacts.
    #[must_use]
    pub fn find_deprecated(&self) -> Vec<&Artifact> {
        self.materialize(Some(&self.deprecated))
    }

    /// Artifacts declaring a dependency satisfied by `target`.
    ///
    /// A bare `target` matches dependencies on any version of its identity.
    #[must_use]
    pub fn dependents_of(&self, target: &Urn) -> Vec<&Artifact> {
        self.dependents
            .get(target.bare_str())
            .into_iter()
            .flatten()
            .filter_map(|urn| self.artifacts.get(urn))
            .filter(|artifact| {
                artifact.dependencies.iter().any(|dependency| {
                    dependency == target
                        || dependency.matches(target)
                        || (target.is_bare() && dependency.same_identity(target))
                })
            })
            .collect()
    }

    /// Catalog artifacts satisfying a dependency URN, which may carry a
    /// version range. Sorted by URN.
    #[must_use]
    pub fn resolve_dependency(&self, dependency: &Urn) -> Vec<&Artifact> {
        self.by_bare
            .get(dependency.bare_str())
            .into_iter()
            .flatten()
            .filter(|candidate| *candidate == dependency || dependency.matches(candidate))
            .filter_map(|urn| self.artifacts.get(urn))
            .collect()
    }

    /// URNs of artifacts whose stored checksum does not match their content.
    ///
    /// # Errors
    ///
    /// Returns `Error::Json` if a record cannot be serialized.
    pub fn verify_checksums(&self) -> Result<Vec<Urn>> {
        let mut mismatched = Vec::new();
        for artifact in self.artifacts.values() {
            if !artifact.verify_checksum()? {
                warn!(urn = %artifact.urn, "Catalog checksum mismatch");
                mismatched.push(artifact.urn.clone());
            }
        }
        Ok(mismatched)
    }

    pub(crate) fn materialize(&self, bucket: Option<&BTreeSet<Urn>>) -> Vec<&Artifact> {
        bucket
            .into_iter()
            .flatten()
            .filter_map(|urn| self.artifacts.get(urn))
            .collect()
    }
}
