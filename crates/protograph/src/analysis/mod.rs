//! Graph analyses over [`ProtocolGraph`](crate::graph::ProtocolGraph).
//!
//! Each submodule adds methods to `ProtocolGraph`:
//!
//! - [`cycles`]: cycle detection over every component
//! - [`order`]: dependency-first build ordering (Kahn's algorithm)
//! - [`path`]: shortest dependency path (BFS)
//! - [`impact`]: upstream/downstream impact sets and risk scoring
//! - [`pii`]: PII flow tracing towards exposed endpoints
//!
//! All analyses are pure functions of graph structure. Traversals visit
//! neighbors in URN order so repeated runs produce identical results.

pub mod cycles;
pub mod impact;
pub mod order;
pub mod path;
pub mod pii;

pub use cycles::CycleReport;
pub use impact::{
    DetailedImpact, ImpactDirection, ImpactEdge, ImpactOptions, ImpactReport, ImpactSet,
    RiskAssessment, RiskLevel,
};
pub use pii::{EndpointExposure, PiiFlowReport, PiiSource, PiiSummary, PiiTraceOptions};
