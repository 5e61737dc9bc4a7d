//! # protograph-catalog: governance metadata index for protocol artifacts
//!
//! A catalog is a flat collection of [`Artifact`] records persisted as an
//! `urn-catalog-v1` JSON document. [`CatalogIndex`] keeps inverted indexes
//! over namespace, tag, owner, kind, classification, PII flag and declared
//! dependencies so that governance lookups never scan the whole catalog.
//!
//! ```
//! use protograph::Urn;
//! use protograph_catalog::{Artifact, CatalogIndex, GovernanceQuery};
//!
//! let mut users = Artifact::new(Urn::parse("urn:proto:api:acme.com/users")?, "identity");
//! users.tags = vec!["gdpr".into()];
//! users.pii = true;
//!
//! let index = CatalogIndex::build([users]);
//! let hits = index.query(&GovernanceQuery::new().namespace("identity").pii(true));
//! assert_eq!(hits.len(), 1);
//! # Ok::<(), protograph_catalog::Error>(())
//! ```

#![forbid(unsafe_code)]

pub mod artifact;
pub mod document;
pub mod error;
pub mod index;
pub mod query;

pub use artifact::{Artifact, Classification};
pub use document::{
    CATALOG_FORMAT, CATALOG_VERSION, CatalogDocument, DependencyEdge, DependencyGraph,
    DocumentIndexes, catalog_schema, parse_document,
};
pub use error::{Error, Result};
pub use index::CatalogIndex;
pub use query::{CatalogStats, GovernanceQuery};
