//! # Protograph: dependency graph and governance analysis for protocol artifacts
//!
//! Protograph stores APIs, API endpoints, data sources, events and semantic
//! types as nodes of a typed dependency graph and answers governance
//! questions over it: does a change break consumers, does PII reach an
//! exposed endpoint, is there a circular dependency, in what order must
//! artifacts be updated.
//!
//! ## Quick Start
//!
//! ```
//! use protograph::{
//!     ArtifactKind, EdgeKind, EdgeMetadata, EngineConfig, GovernanceEngine, Manifest, Urn,
//! };
//!
//! let mut engine = GovernanceEngine::new(EngineConfig::default())?;
//! let users = Urn::parse("urn:proto:api:acme.com/users")?;
//! let auth = Urn::parse("urn:proto:api:acme.com/auth")?;
//! engine.add_node(users.clone(), ArtifactKind::Api, Manifest::new())?;
//! engine.add_node(auth.clone(), ArtifactKind::Api, Manifest::new())?;
//! engine.add_edge(&users, EdgeKind::DependsOn, &auth, EdgeMetadata::new())?;
//!
//! assert_eq!(engine.full_build_order()?, vec![auth, users]);
//! # Ok::<(), protograph::Error>(())
//! ```
//!
//! ## Layout
//!
//! - [`urn`]: identifier grammar and version-range resolution
//! - [`domain`]: node and edge vocabulary
//! - [`graph`]: the graph store and its snapshot format
//! - [`analysis`]: cycles, build order, paths, impact/risk, PII flow
//! - [`cache`] and [`engine`]: memoized reads with whole-cache invalidation
//! - [`config`]: YAML engine configuration

#![forbid(unsafe_code)]

pub mod analysis;
pub mod cache;
pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod graph;
pub mod urn;

pub use analysis::{
    CycleReport, DetailedImpact, EndpointExposure, ImpactDirection, ImpactEdge, ImpactOptions,
    ImpactReport, ImpactSet, PiiFlowReport, PiiSource, PiiSummary, PiiTraceOptions,
    RiskAssessment, RiskLevel,
};
pub use cache::{CacheStats, QueryCache};
pub use config::{CacheConfig, EngineConfig, PiiConfig, RiskPolicy, RiskThresholds};
pub use domain::{ArtifactKind, Edge, EdgeKey, EdgeKind, EdgeMetadata, Manifest, Node, PiiField};
pub use engine::GovernanceEngine;
pub use error::{Error, Result};
pub use graph::ProtocolGraph;
pub use graph::snapshot::{
    GraphSnapshot, LoadWarning, SNAPSHOT_FORMAT, load_from_jsonl, save_to_jsonl,
};
pub use urn::{Urn, Version, VersionReq, resolve_latest, resolve_version_range};
