//! Cache-owning facade over [`ProtocolGraph`].
//!
//! [`GovernanceEngine`] routes every mutation through itself so the query
//! cache can be cleared whenever graph state changes, and memoizes the
//! analytical reads. Cached reads take `&mut self` to update recency and
//! counters; hosts sharing an engine across threads wrap it in a lock.

use crate::analysis::{
    CycleReport, DetailedImpact, EndpointExposure, ImpactOptions, ImpactReport, PiiFlowReport,
    PiiSummary, PiiTraceOptions, RiskAssessment,
};
use crate::cache::{CacheKey, CacheStats, CachedValue, QueryCache};
use crate::config::EngineConfig;
use crate::domain::{ArtifactKind, EdgeKey, EdgeKind, EdgeMetadata, Manifest};
use crate::error::Result;
use crate::graph::ProtocolGraph;
use crate::graph::snapshot::GraphSnapshot;
use crate::urn::Urn;
use tracing::info;

/// Look up `$key`; on a miss evaluate `$compute` and store the result.
macro_rules! memoized {
    ($engine:ident, $key:expr, $variant:ident, $compute:expr) => {{
        let key = $key;
        match $engine.cache.get(&key) {
            Some(CachedValue::$variant(value)) => value,
            _ => {
                let value = $compute;
                $engine
                    .cache
                    .insert(key, CachedValue::$variant(value.clone()));
                value
            }
        }
    }};
}

/// A protocol graph with a mutation-invalidated query cache.
#[derive(Debug)]
pub struct GovernanceEngine {
    graph: ProtocolGraph,
    cache: QueryCache,
    config: EngineConfig,
}

impl GovernanceEngine {
    /// Create an engine over an empty graph.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the configuration fails validation.
    pub fn new(config: EngineConfig) -> Result<Self> {
        Self::with_graph(ProtocolGraph::new(), config)
    }

    /// Create an engine over an existing graph.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the configuration fails validation.
    pub fn with_graph(graph: ProtocolGraph, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let cache = QueryCache::new(&config.cache)?;
        Ok(Self {
            graph,
            cache,
            config,
        })
    }

    /// Read-only access to the underlying graph. Queries made directly on it
    /// bypass the cache.
    #[must_use]
    pub fn graph(&self) -> &ProtocolGraph {
        &self.graph
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// PII options taken from configuration.
    #[must_use]
    pub fn default_pii_options(&self) -> PiiTraceOptions {
        PiiTraceOptions::from(&self.config.pii)
    }

    // ========== Mutations ==========

    /// Insert a node; see [`ProtocolGraph::add_node`].
    ///
    /// # Errors
    ///
    /// Propagates structural errors from the graph store.
    pub fn add_node(&mut self, urn: Urn, kind: ArtifactKind, manifest: Manifest) -> Result<bool> {
        let inserted = self.graph.add_node(urn, kind, manifest)?;
        if inserted {
            self.cache.invalidate();
        }
        Ok(inserted)
    }

    /// Remove a node and its incident edges; see [`ProtocolGraph::remove_node`].
    pub fn remove_node(&mut self, urn: &Urn) -> bool {
        let removed = self.graph.remove_node(urn);
        if removed {
            self.cache.invalidate();
        }
        removed
    }

    /// Insert or update an edge; see [`ProtocolGraph::add_edge`].
    ///
    /// # Errors
    ///
    /// Propagates structural errors from the graph store.
    pub fn add_edge(
        &mut self,
        from: &Urn,
        kind: EdgeKind,
        to: &Urn,
        metadata: EdgeMetadata,
    ) -> Result<EdgeKey> {
        let key = self.graph.add_edge(from, kind, to, metadata)?;
        self.cache.invalidate();
        Ok(key)
    }

    /// Remove an edge; see [`ProtocolGraph::remove_edge`].
    pub fn remove_edge(&mut self, key: &EdgeKey) -> bool {
        let removed = self.graph.remove_edge(key);
        if removed {
            self.cache.invalidate();
        }
        removed
    }

    /// Apply several mutations behind a single cache invalidation.
    ///
    /// The cache is cleared even when `f` fails, since mutations applied
    /// before the failure are kept.
    ///
    /// # Errors
    ///
    /// Returns whatever `f` returns.
    pub fn mutate<T>(&mut self, f: impl FnOnce(&mut ProtocolGraph) -> Result<T>) -> Result<T> {
        let result = f(&mut self.graph);
        self.cache.invalidate();
        result
    }

    /// Replace the whole graph with a snapshot's content.
    ///
    /// On error the current graph and cache are left untouched.
    ///
    /// # Errors
    ///
    /// Propagates errors from [`ProtocolGraph::import`].
    pub fn import_snapshot(&mut self, snapshot: &GraphSnapshot) -> Result<()> {
        self.graph = ProtocolGraph::import(snapshot)?;
        self.cache.invalidate();
        info!(
            nodes = self.graph.node_count(),
            edges = self.graph.edge_count(),
            "Imported graph snapshot"
        );
        Ok(())
    }

    /// Export the current graph.
    #[must_use]
    pub fn export_snapshot(&self) -> GraphSnapshot {
        self.graph.export()
    }

    /// Drop every cached result.
    pub fn invalidate_cache(&mut self) {
        self.cache.invalidate();
    }

    /// Cache counters.
    #[must_use]
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    // ========== Cached reads ==========

    /// Cached [`ProtocolGraph::detect_cycles`].
    pub fn detect_cycles(&mut self) -> CycleReport {
        memoized!(self, CacheKey::Cycles, Cycles, self.graph.detect_cycles())
    }

    /// Cached [`ProtocolGraph::build_order`]. Failed orderings are recomputed
    /// on every call.
    ///
    /// # Errors
    ///
    /// Returns `Error::CircularDependency` if the closure contains a cycle.
    pub fn build_order(&mut self, urn: &Urn) -> Result<Option<Vec<Urn>>> {
        let key = CacheKey::BuildOrder(urn.clone());
        if let Some(CachedValue::BuildOrder(order)) = self.cache.get(&key) {
            return Ok(order);
        }
        let order = self.graph.build_order(urn)?;
        self.cache.insert(key, CachedValue::BuildOrder(order.clone()));
        Ok(order)
    }

    /// Cached [`ProtocolGraph::full_build_order`]. Failed orderings are
    /// recomputed on every call.
    ///
    /// # Errors
    ///
    /// Returns `Error::CircularDependency` if the graph contains a cycle.
    pub fn full_build_order(&mut self) -> Result<Vec<Urn>> {
        let key = CacheKey::FullBuildOrder;
        if let Some(CachedValue::FullBuildOrder(order)) = self.cache.get(&key) {
            return Ok(order);
        }
        let order = self.graph.full_build_order()?;
        self.cache
            .insert(key, CachedValue::FullBuildOrder(order.clone()));
        Ok(order)
    }

    /// Cached [`ProtocolGraph::find_path`].
    pub fn find_path(&mut self, from: &Urn, to: &Urn) -> Option<Vec<Urn>> {
        memoized!(
            self,
            CacheKey::Path(from.clone(), to.clone()),
            Path,
            self.graph.find_path(from, to)
        )
    }

    /// Cached [`ProtocolGraph::impact_of_change`].
    pub fn impact_of_change(&mut self, urn: &Urn, options: ImpactOptions) -> Option<ImpactReport> {
        memoized!(
            self,
            CacheKey::Impact(urn.clone(), options),
            Impact,
            self.graph.impact_of_change(urn, options)
        )
    }

    /// Cached [`ProtocolGraph::assess_risk`] under the configured policy.
    pub fn assess_risk(&mut self, urn: &Urn) -> Option<RiskAssessment> {
        memoized!(
            self,
            CacheKey::Risk(urn.clone()),
            Risk,
            self.graph.assess_risk(urn, &self.config.risk)
        )
    }

    /// Cached [`ProtocolGraph::detailed_impact`] under the configured policy.
    pub fn detailed_impact(&mut self, urn: &Urn) -> Option<DetailedImpact> {
        memoized!(
            self,
            CacheKey::DetailedImpact(urn.clone()),
            DetailedImpact,
            self.graph.detailed_impact(urn, &self.config.risk)
        )
    }

    /// Cached [`ProtocolGraph::trace_pii_flow`].
    pub fn trace_pii_flow(
        &mut self,
        endpoint: &Urn,
        options: PiiTraceOptions,
    ) -> Option<PiiFlowReport> {
        memoized!(
            self,
            CacheKey::PiiTrace(endpoint.clone(), options.into()),
            PiiTrace,
            self.graph.trace_pii_flow(endpoint, options)
        )
    }

    /// Cached [`ProtocolGraph::find_pii_exposing_endpoints`] with the
    /// configured PII options.
    pub fn find_pii_exposing_endpoints(&mut self) -> Vec<EndpointExposure> {
        let options = self.default_pii_options();
        memoized!(
            self,
            CacheKey::PiiExposingEndpoints(options.into()),
            PiiExposingEndpoints,
            self.graph.find_pii_exposing_endpoints(options)
        )
    }

    /// Cached [`ProtocolGraph::pii_summary`] with the configured PII options.
    pub fn pii_summary(&mut self) -> PiiSummary {
        let options = self.default_pii_options();
        memoized!(
            self,
            CacheKey::PiiSummary(options.into()),
            PiiSummary,
            self.graph.pii_summary(options)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheConfig;
    use crate::error::Error;

    fn api(name: &str) -> Urn {
        Urn::parse(&format!("urn:proto:api:test.local/{name}")).unwrap()
    }

    fn engine_with(names: &[&str]) -> GovernanceEngine {
        let mut engine = GovernanceEngine::new(EngineConfig::default()).unwrap();
        for name in names {
            engine.add_node(api(name), ArtifactKind::Api, Manifest::new()).unwrap();
        }
        engine
    }

    #[test]
    fn repeated_reads_hit_the_cache() {
        let mut engine = engine_with(&["a", "b"]);
        engine
            .add_edge(&api("a"), EdgeKind::DependsOn, &api("b"), EdgeMetadata::new())
            .unwrap();

        let first = engine.full_build_order().unwrap();
        let second = engine.full_build_order().unwrap();

        assert_eq!(first, second);
        let stats = engine.cache_stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn mutation_invalidates_cached_results() {
        let mut engine = engine_with(&["a", "b"]);
        assert!(!engine.detect_cycles().has_cycle);

        engine
            .add_edge(&api("a"), EdgeKind::DependsOn, &api("b"), EdgeMetadata::new())
            .unwrap();
        engine
            .add_edge(&api("b"), EdgeKind::DependsOn, &api("a"), EdgeMetadata::new())
            .unwrap();

        assert!(engine.detect_cycles().has_cycle);
        assert!(engine.cache_stats().invalidations >= 2);
    }

    #[test]
    fn duplicate_node_does_not_invalidate() {
        let mut engine = engine_with(&["a"]);
        engine.detect_cycles();
        let before = engine.cache_stats().invalidations;

        assert!(!engine.add_node(api("a"), ArtifactKind::Api, Manifest::new()).unwrap());

        assert_eq!(engine.cache_stats().invalidations, before);
        assert_eq!(engine.cache_stats().len, 1);
    }

    #[test]
    fn batched_mutations_invalidate_once() {
        let mut engine = engine_with(&["a", "b", "c"]);
        engine.detect_cycles();
        let before = engine.cache_stats().invalidations;

        engine
            .mutate(|graph| {
                graph.add_edge(&api("a"), EdgeKind::DependsOn, &api("b"), EdgeMetadata::new())?;
                graph.add_edge(&api("b"), EdgeKind::DependsOn, &api("c"), EdgeMetadata::new())?;
                Ok(())
            })
            .unwrap();

        assert_eq!(engine.cache_stats().invalidations, before + 1);
        assert_eq!(
            engine.build_order(&api("a")).unwrap().unwrap(),
            vec![api("c"), api("b"), api("a")]
        );
    }

    #[test]
    fn failed_batch_still_invalidates() {
        let mut engine = engine_with(&["a", "b"]);
        assert_eq!(engine.find_path(&api("a"), &api("b")), None);

        let err = engine
            .mutate(|graph| {
                graph.add_edge(&api("a"), EdgeKind::DependsOn, &api("b"), EdgeMetadata::new())?;
                graph.add_edge(&api("a"), EdgeKind::DependsOn, &api("missing"), EdgeMetadata::new())
            })
            .unwrap_err();

        assert!(matches!(err, Error::UnknownNode(_)));
        assert_eq!(
            engine.find_path(&api("a"), &api("b")),
            Some(vec![api("a"), api("b")])
        );
    }

    #[test]
    fn circular_orderings_are_not_cached() {
        let mut engine = engine_with(&["a", "b"]);
        engine
            .mutate(|graph| {
                graph.add_edge(&api("a"), EdgeKind::DependsOn, &api("b"), EdgeMetadata::new())?;
                graph.add_edge(&api("b"), EdgeKind::DependsOn, &api("a"), EdgeMetadata::new())
            })
            .unwrap();

        assert!(engine.full_build_order().unwrap_err().is_governance_finding());
        assert!(engine.full_build_order().unwrap_err().is_governance_finding());
        assert_eq!(engine.cache_stats().len, 0);
    }

    #[test]
    fn disabled_cache_computes_every_time() {
        let config = EngineConfig {
            cache: CacheConfig {
                enabled: false,
                ..CacheConfig::default()
            },
            ..EngineConfig::default()
        };
        let mut engine = GovernanceEngine::new(config).unwrap();
        engine.add_node(api("a"), ArtifactKind::Api, Manifest::new()).unwrap();

        engine.detect_cycles();
        engine.detect_cycles();

        let stats = engine.cache_stats();
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 2);
        assert_eq!(stats.len, 0);
    }

    #[test]
    fn import_snapshot_replaces_graph() {
        let mut source = engine_with(&["x", "y"]);
        source
            .add_edge(&api("x"), EdgeKind::DependsOn, &api("y"), EdgeMetadata::new())
            .unwrap();
        let snapshot = source.export_snapshot();
        let mut engine = engine_with(&["a"]);
        engine.detect_cycles();

        engine.import_snapshot(&snapshot).unwrap();

        assert!(!engine.graph().contains_node(&api("a")));
        assert_eq!(engine.graph().edge_count(), 1);
        assert_eq!(engine.cache_stats().len, 0);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let mut config = EngineConfig::default();
        config.cache.capacity = 0;

        assert!(matches!(
            GovernanceEngine::new(config).unwrap_err(),
            Error::Config(_)
        ));
    }
}
