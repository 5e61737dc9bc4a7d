//! Compound governance queries.
//!
//! A [`GovernanceQuery`] is answered by intersecting the candidate sets of
//! every indexed criterion, smallest first, so the cost is bounded by the
//! most selective criterion. Criteria without an index (a `pii: false`
//! flag and compliance tags) are applied as filters afterwards.

use crate::artifact::{Artifact, Classification};
use crate::index::CatalogIndex;
use protograph::{ArtifactKind, Urn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Conjunctive filter over catalog metadata. Unset criteria match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GovernanceQuery {
    /// Exact namespace
    pub namespace: Option<String>,
    /// Exact owner
    pub owner: Option<String>,
    /// Required PII flag
    pub pii: Option<bool>,
    /// Exact classification tier
    pub classification: Option<Classification>,
    /// Artifact kind
    pub kind: Option<ArtifactKind>,
    /// Tags that must all be present
    pub tags: Vec<String>,
    /// Compliance tags that must all be present
    pub compliance_tags: Vec<String>,
}

impl GovernanceQuery {
    /// An empty query, matching every artifact.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Require a namespace.
    #[must_use]
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Require an owner.
    #[must_use]
    pub fn owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    /// Require the PII flag to equal `pii`.
    #[must_use]
    pub fn pii(mut self, pii: bool) -> Self {
        self.pii = Some(pii);
        self
    }

    /// Require a classification tier.
    #[must_use]
    pub fn classification(mut self, classification: Classification) -> Self {
        self.classification = Some(classification);
        self
    }

    /// Require an artifact kind.
    #[must_use]
    pub fn kind(mut self, kind: ArtifactKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Require a tag, in addition to any already required.
    #[must_use]
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Require a compliance tag.
    #[must_use]
    pub fn compliance_tag(mut self, tag: impl Into<String>) -> Self {
        self.compliance_tags.push(tag.into());
        self
    }

    /// Naive evaluation against one artifact.
    #[must_use]
    pub fn matches(&self, artifact: &Artifact) -> bool {
        self.namespace.as_ref().is_none_or(|ns| *ns == artifact.namespace)
            && self
                .owner
                .as_ref()
                .is_none_or(|owner| artifact.owner.as_ref() == Some(owner))
            && self.pii.is_none_or(|pii| pii == artifact.pii)
            && self
                .classification
                .is_none_or(|c| c == artifact.classification)
            && self.kind.is_none_or(|kind| kind == artifact.kind())
            && self.tags.iter().all(|tag| artifact.has_tag(tag))
            && self.compliance_tags.iter().all(|tag| artifact.has_tag(tag))
    }
}

/// Aggregate counts over a catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogStats {
    /// Number of artifacts
    pub total: usize,
    /// Number of PII-flagged artifacts
    pub pii: usize,
    /// Number of deprecated artifacts
    pub deprecated: usize,
    /// Artifact count per namespace
    pub by_namespace: BTreeMap<String, usize>,
    /// Artifact count per kind
    pub by_type: BTreeMap<String, usize>,
    /// Artifact count per classification tier
    pub by_classification: BTreeMap<String, usize>,
    /// Artifact count per tag
    pub by_tag: BTreeMap<String, usize>,
    /// Number of distinct owners
    pub owners: usize,
}

impl CatalogIndex {
    /// Artifacts matching every criterion of `query`, sorted by URN.
    #[must_use]
    pub fn query(&self, query: &GovernanceQuery) -> Vec<&Artifact> {
        let mut sets: Vec<&BTreeSet<Urn>> = Vec::new();

        let lookups = [
            query
                .namespace
                .as_ref()
                .map(|ns| self.by_namespace.get(ns)),
            query.owner.as_ref().map(|owner| self.by_owner.get(owner)),
            query
                .classification
                .map(|c| self.by_classification.get(&c)),
            query.kind.map(|kind| self.by_type.get(&kind)),
            (query.pii == Some(true)).then_some(Some(&self.pii)),
        ];
        let tag_lookups = query.tags.iter().map(|tag| Some(self.by_tag.get(tag)));

        for lookup in lookups.into_iter().chain(tag_lookups).flatten() {
            match lookup {
                Some(set) => sets.push(set),
                None => return Vec::new(),
            }
        }

        sets.sort_by_key(|set| set.len());
        let candidates: Vec<&Urn> = match sets.split_first() {
            None => self.artifacts.keys().collect(),
            Some((smallest, rest)) => smallest
                .iter()
                .filter(|urn| rest.iter().all(|set| set.contains(*urn)))
                .collect(),
        };

        candidates
            .into_iter()
            .filter_map(|urn| self.artifacts.get(urn))
            .filter(|artifact| query.pii != Some(false) || !artifact.pii)
            .filter(|artifact| {
                query
                    .compliance_tags
                    .iter()
                    .all(|tag| artifact.has_tag(tag))
            })
            .collect()
    }

    /// Artifacts carrying at least one of `tags`, sorted by URN.
    #[must_use]
    pub fn find_by_any_tag<S: AsRef<str>>(&self, tags: &[S]) -> Vec<&Artifact> {
        let union: BTreeSet<&Urn> = tags
            .iter()
            .filter_map(|tag| self.by_tag.get(tag.as_ref()))
            .flatten()
            .collect();
        union
            .into_iter()
            .filter_map(|urn| self.artifacts.get(urn))
            .collect()
    }

    /// Counts taken from the indexes, without scanning records.
    #[must_use]
    pub fn stats(&self) -> CatalogStats {
        fn counts<K: ToString>(
            groups: impl IntoIterator<Item = (K, usize)>,
        ) -> BTreeMap<String, usize> {
            groups
                .into_iter()
                .map(|(key, count)| (key.to_string(), count))
                .collect()
        }

        CatalogStats {
            total: self.len(),
            pii: self.pii.len(),
            deprecated: self.deprecated.len(),
            by_namespace: counts(self.by_namespace.iter().map(|(k, v)| (k, v.len()))),
            by_type: counts(self.by_type.iter().map(|(k, v)| (k, v.len()))),
            by_classification: counts(self.by_classification.iter().map(|(k, v)| (k, v.len()))),
            by_tag: counts(self.by_tag.iter().map(|(k, v)| (k, v.len()))),
            owners: self.by_owner.len(),
        }
    }
}
