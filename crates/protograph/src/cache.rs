//! Bounded LRU cache for analytical query results.
//!
//! Entries are keyed by operation and arguments. There is no fine-grained
//! invalidation: any structural mutation clears every entry, so a read issued
//! after a mutation never observes a stale result. Batch mutations before
//! issuing reads to keep the cache warm.

use crate::analysis::{
    CycleReport, DetailedImpact, EndpointExposure, ImpactOptions, ImpactReport, PiiFlowReport,
    PiiSummary, PiiTraceOptions, RiskAssessment,
};
use crate::config::CacheConfig;
use crate::error::{Error, Result};
use crate::urn::Urn;
use lru::LruCache;
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use tracing::{debug, trace};

/// PII options in hashable form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PiiKey {
    max_depth: usize,
    min_confidence_bits: u64,
}

impl From<PiiTraceOptions> for PiiKey {
    fn from(options: PiiTraceOptions) -> Self {
        Self {
            max_depth: options.max_depth,
            min_confidence_bits: options.min_confidence.to_bits(),
        }
    }
}

/// Operation and argument signature of a cached query.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// `detect_cycles()`
    Cycles,
    /// `full_build_order()`
    FullBuildOrder,
    /// `build_order(urn)`
    BuildOrder(Urn),
    /// `find_path(from, to)`
    Path(Urn, Urn),
    /// `impact_of_change(urn, options)`
    Impact(Urn, ImpactOptions),
    /// `assess_risk(urn)`
    Risk(Urn),
    /// `detailed_impact(urn)`
    DetailedImpact(Urn),
    /// `trace_pii_flow(endpoint, options)`
    PiiTrace(Urn, PiiKey),
    /// `find_pii_exposing_endpoints(options)`
    PiiExposingEndpoints(PiiKey),
    /// `pii_summary(options)`
    PiiSummary(PiiKey),
}

impl CacheKey {
    /// Name of the cached operation, for logs.
    #[must_use]
    pub fn operation(&self) -> &'static str {
        match self {
            Self::Cycles => "detect_cycles",
            Self::FullBuildOrder => "full_build_order",
            Self::BuildOrder(_) => "build_order",
            Self::Path(..) => "find_path",
            Self::Impact(..) => "impact_of_change",
            Self::Risk(_) => "assess_risk",
            Self::DetailedImpact(_) => "detailed_impact",
            Self::PiiTrace(..) => "trace_pii_flow",
            Self::PiiExposingEndpoints(_) => "find_pii_exposing_endpoints",
            Self::PiiSummary(_) => "pii_summary",
        }
    }
}

/// A cached query result.
///
/// Ordering failures are not cached; only successful orderings are.
#[derive(Debug, Clone)]
pub enum CachedValue {
    /// Cycle report
    Cycles(CycleReport),
    /// Full build order
    FullBuildOrder(Vec<Urn>),
    /// Scoped build order, `None` for an unknown node
    BuildOrder(Option<Vec<Urn>>),
    /// Shortest path
    Path(Option<Vec<Urn>>),
    /// Impact report
    Impact(Option<ImpactReport>),
    /// Risk assessment
    Risk(Option<RiskAssessment>),
    /// Detailed impact
    DetailedImpact(Option<DetailedImpact>),
    /// PII flow report
    PiiTrace(Option<PiiFlowReport>),
    /// Exposing endpoints
    PiiExposingEndpoints(Vec<EndpointExposure>),
    /// PII summary
    PiiSummary(PiiSummary),
}

/// Cache counters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Lookups answered from the cache
    pub hits: u64,
    /// Lookups that required computation
    pub misses: u64,
    /// `hits / (hits + misses)`, `0.0` before any lookup
    pub hit_ratio: f64,
    /// Entries currently held
    pub len: usize,
    /// Maximum number of entries
    pub capacity: usize,
    /// Number of full clears caused by mutations
    pub invalidations: u64,
}

/// LRU cache of query results with hit/miss accounting.
#[derive(Debug)]
pub struct QueryCache {
    entries: LruCache<CacheKey, CachedValue>,
    enabled: bool,
    hits: u64,
    misses: u64,
    invalidations: u64,
}

impl QueryCache {
    /// Create a cache from its configuration section.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the capacity is zero.
    pub fn new(config: &CacheConfig) -> Result<Self> {
        let capacity = NonZeroUsize::new(config.capacity).ok_or_else(|| {
            Error::Config("cache.capacity must be greater than zero".to_string())
        })?;
        Ok(Self {
            entries: LruCache::new(capacity),
            enabled: config.enabled,
            hits: 0,
            misses: 0,
            invalidations: 0,
        })
    }

    /// Look up a result, marking it most recently used.
    ///
    /// A disabled cache always misses.
    pub fn get(&mut self, key: &CacheKey) -> Option<CachedValue> {
        let found = if self.enabled {
            self.entries.get(key).cloned()
        } else {
            None
        };

        if found.is_some() {
            self.hits += 1;
            trace!(operation = key.operation(), "Cache hit");
        } else {
            self.misses += 1;
            trace!(operation = key.operation(), "Cache miss");
        }
        found
    }

    /// Store a result, evicting the least recently used entry when full.
    pub fn insert(&mut self, key: CacheKey, value: CachedValue) {
        if !self.enabled {
            return;
        }
        if let Some((evicted, _)) = self.entries.push(key.clone(), value)
            && evicted != key
        {
            trace!(operation = evicted.operation(), "Evicted cache entry");
        }
    }

    /// Drop every entry.
    pub fn invalidate(&mut self) {
        let dropped = self.entries.len();
        self.entries.clear();
        self.invalidations += 1;
        debug!(dropped, "Invalidated query cache");
    }

    /// Whether memoization is active.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Entries currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no entry is held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Current counters.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        let lookups = self.hits + self.misses;
        #[allow(clippy::cast_precision_loss)]
        let hit_ratio = if lookups == 0 {
            0.0
        } else {
            self.hits as f64 / lookups as f64
        };
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            hit_ratio,
            len: self.entries.len(),
            capacity: self.entries.cap().get(),
            invalidations: self.invalidations,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn urn(name: &str) -> Urn {
        Urn::parse(&format!("urn:proto:api:test.local/{name}")).unwrap()
    }

    fn cache(capacity: usize) -> QueryCache {
        QueryCache::new(&CacheConfig {
            capacity,
            enabled: true,
        })
        .unwrap()
    }

    fn path_value(name: &str) -> CachedValue {
        CachedValue::Path(Some(vec![urn(name)]))
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let err = QueryCache::new(&CacheConfig {
            capacity: 0,
            enabled: true,
        })
        .unwrap_err();

        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn hits_and_misses_are_counted() {
        let mut cache = cache(4);
        let key = CacheKey::Risk(urn("a"));

        assert!(cache.get(&key).is_none());
        cache.insert(key.clone(), CachedValue::Risk(None));
        assert!(matches!(cache.get(&key), Some(CachedValue::Risk(None))));

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert!((stats.hit_ratio - 0.5).abs() < f64::EPSILON);
        assert_eq!(stats.len, 1);
        assert_eq!(stats.capacity, 4);
    }

    #[test]
    fn least_recently_used_entry_is_evicted() {
        let mut cache = cache(2);
        let a = CacheKey::Path(urn("a"), urn("x"));
        let b = CacheKey::Path(urn("b"), urn("x"));
        let c = CacheKey::Path(urn("c"), urn("x"));

        cache.insert(a.clone(), path_value("a"));
        cache.insert(b.clone(), path_value("b"));
        cache.get(&a);
        cache.insert(c.clone(), path_value("c"));

        assert!(cache.get(&a).is_some());
        assert!(cache.get(&b).is_none());
        assert!(cache.get(&c).is_some());
    }

    #[test]
    fn invalidate_clears_everything() {
        let mut cache = cache(8);
        cache.insert(CacheKey::Cycles, CachedValue::Cycles(CycleReport::default()));
        cache.insert(CacheKey::FullBuildOrder, CachedValue::FullBuildOrder(vec![]));

        cache.invalidate();

        assert!(cache.is_empty());
        assert!(cache.get(&CacheKey::Cycles).is_none());
        assert_eq!(cache.stats().invalidations, 1);
    }

    #[test]
    fn disabled_cache_never_stores() {
        let mut cache = QueryCache::new(&CacheConfig {
            capacity: 8,
            enabled: false,
        })
        .unwrap();

        cache.insert(CacheKey::Cycles, CachedValue::Cycles(CycleReport::default()));

        assert!(cache.get(&CacheKey::Cycles).is_none());
        assert!(cache.is_empty());
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn pii_keys_distinguish_confidence_floors() {
        let loose = CacheKey::PiiSummary(PiiTraceOptions::default().into());
        let strict = CacheKey::PiiSummary(
            PiiTraceOptions {
                min_confidence: 0.8,
                ..PiiTraceOptions::default()
            }
            .into(),
        );

        assert_ne!(loose, strict);
        assert_eq!(loose.operation(), "pii_summary");
    }
}
