//! Error types for protograph operations.
//!
//! Errors fall into three groups:
//!
//! - **Structural**: `InvalidUrn`, `InvalidKind`, `InvalidEdgeKind`, `UnknownNode`
//!   and `InvalidPayload` reject a mutation before anything is written. A host
//!   service should map these to a client error.
//! - **Governance findings**: `CircularDependency` is raised only by ordering
//!   queries. A cyclic graph is a valid state; the error is the answer.
//! - **Infrastructure**: I/O, JSON, configuration and snapshot format problems.
//!
//! Absent query targets are not errors. Reads return `Option` or an empty
//! collection instead.

use crate::urn::Urn;
use std::io;
use thiserror::Error;

/// The error type for protograph operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Identifier does not match the URN grammar.
    #[error("Invalid URN '{input}': {reason}")]
    InvalidUrn {
        /// The rejected input
        input: String,
        /// Why it was rejected
        reason: String,
    },

    /// Node kind outside the artifact kind enumeration, or disagreeing with
    /// the kind segment of the node's URN.
    #[error("Invalid artifact kind: {0}")]
    InvalidKind(String),

    /// Edge kind outside the relationship enumeration.
    #[error("Invalid edge kind: {0}")]
    InvalidEdgeKind(String),

    /// An edge endpoint is not present in the graph.
    #[error("Unknown node: {0}")]
    UnknownNode(Urn),

    /// Ordering was requested over a cyclic region.
    #[error(
        "Circular dependency: expected {expected} nodes in build order, obtained {obtained}"
    )]
    CircularDependency {
        /// Size of the working node set
        expected: usize,
        /// Number of nodes emitted before the cycle stalled the ordering
        obtained: usize,
        /// Nodes that could not be ordered, sorted by URN
        remaining: Vec<Urn>,
    },

    /// A manifest or edge metadata payload failed its typed accessors.
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Snapshot format error.
    #[error("Snapshot error: {0}")]
    Snapshot(String),

    /// IO error occurred.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization or deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Returns `true` for integrity violations that reject a mutation.
    ///
    /// These map to a client-error response in a host service.
    #[must_use]
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::InvalidUrn { .. }
                | Self::InvalidKind(_)
                | Self::InvalidEdgeKind(_)
                | Self::UnknownNode(_)
                | Self::InvalidPayload(_)
        )
    }

    /// Returns `true` when the error is itself a governance answer
    /// (the requested ordering does not exist because of a cycle).
    #[must_use]
    pub fn is_governance_finding(&self) -> bool {
        matches!(self, Self::CircularDependency { .. })
    }

    pub(crate) fn invalid_urn(input: &str, reason: impl Into<String>) -> Self {
        Self::InvalidUrn {
            input: input.to_string(),
            reason: reason.into(),
        }
    }
}

/// A specialized Result type for protograph operations.
pub type Result<T> = std::result::Result<T, Error>;
