//! Engine configuration.
//!
//! Configuration is a YAML document with three optional sections. Missing
//! sections and fields fall back to their defaults:
//!
//! ```yaml
//! cache:
//!   capacity: 256
//!   enabled: true
//! pii:
//!   max_depth: 10
//!   min_confidence: 0.0
//! risk:
//!   direct_weight: 10
//!   transitive_weight: 5
//!   cycle_penalty: 15
//!   pii_penalty: 10
//!   thresholds:
//!     medium: 30
//!     high: 60
//! ```

use crate::analysis::{PiiTraceOptions, RiskLevel};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Default number of cached query results.
pub const DEFAULT_CACHE_CAPACITY: usize = 256;

/// Default PII traversal depth, in hops from the endpoint.
pub const DEFAULT_PII_MAX_DEPTH: usize = 10;

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Query cache settings
    pub cache: CacheConfig,

    /// Default PII tracing options
    pub pii: PiiConfig,

    /// Risk scoring weights
    pub risk: RiskPolicy,
}

/// Query cache section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of cached results; must be positive
    pub capacity: usize,

    /// When `false`, every read is computed fresh
    pub enabled: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CACHE_CAPACITY,
            enabled: true,
        }
    }
}

/// PII tracing section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PiiConfig {
    /// Maximum hops walked back from an endpoint
    pub max_depth: usize,

    /// Fields below this confidence are ignored
    pub min_confidence: f64,
}

impl Default for PiiConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_PII_MAX_DEPTH,
            min_confidence: 0.0,
        }
    }
}

impl From<&PiiConfig> for PiiTraceOptions {
    fn from(config: &PiiConfig) -> Self {
        Self {
            max_depth: config.max_depth,
            min_confidence: config.min_confidence,
        }
    }
}

/// Risk scoring weights and tier thresholds.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskPolicy {
    /// Points per direct dependent
    pub direct_weight: u32,

    /// Points per transitive dependent
    pub transitive_weight: u32,

    /// Points added when the artifact lies on a cycle
    pub cycle_penalty: u32,

    /// Points added when the artifact declares PII
    pub pii_penalty: u32,

    /// Tier boundaries
    pub thresholds: RiskThresholds,
}

impl Default for RiskPolicy {
    fn default() -> Self {
        Self {
            direct_weight: 10,
            transitive_weight: 5,
            cycle_penalty: 15,
            pii_penalty: 10,
            thresholds: RiskThresholds::default(),
        }
    }
}

impl RiskPolicy {
    /// Map a score to its tier.
    #[must_use]
    pub fn level_for(&self, score: u8) -> RiskLevel {
        if score == 0 {
            RiskLevel::None
        } else if score < self.thresholds.medium {
            RiskLevel::Low
        } else if score < self.thresholds.high {
            RiskLevel::Medium
        } else {
            RiskLevel::High
        }
    }
}

/// Lowest scores of the medium and high tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskThresholds {
    /// First score classified as medium
    pub medium: u8,
    /// First score classified as high
    pub high: u8,
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            medium: 30,
            high: 60,
        }
    }
}

impl EngineConfig {
    /// Parse and validate a YAML document.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the document does not parse or fails
    /// [`EngineConfig::validate`].
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let config: Self =
            serde_yaml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the file cannot be read and `Error::Config` if
    /// its content is invalid.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Save configuration to a file.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` on serialization failure and `Error::Io` if the
    /// file cannot be written.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content =
            serde_yaml::to_string(self).map_err(|e| Error::Config(format!("YAML error: {e}")))?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Check value ranges.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the cache capacity is zero, the PII
    /// confidence floor is outside `[0, 1]`, or the risk thresholds are not
    /// `0 < medium < high <= 100`.
    pub fn validate(&self) -> Result<()> {
        if self.cache.capacity == 0 {
            return Err(Error::Config(
                "cache.capacity must be greater than zero".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.pii.min_confidence) {
            return Err(Error::Config(format!(
                "pii.min_confidence must be within [0, 1], got {}",
                self.pii.min_confidence
            )));
        }

        let RiskThresholds { medium, high } = self.risk.thresholds;
        if medium == 0 || medium >= high || high > 100 {
            return Err(Error::Config(format!(
                "risk thresholds must satisfy 0 < medium < high <= 100, got medium={medium} high={high}"
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tempfile::TempDir;

    #[test]
    fn empty_document_yields_defaults() {
        let config = EngineConfig::from_yaml_str("{}").unwrap();

        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.cache.capacity, 256);
        assert_eq!(config.pii.max_depth, 10);
        assert_eq!(config.risk.thresholds.high, 60);
    }

    #[test]
    fn partial_sections_keep_remaining_defaults() {
        let config = EngineConfig::from_yaml_str(
            "cache:\n  enabled: false\nrisk:\n  cycle_penalty: 40\n",
        )
        .unwrap();

        assert!(!config.cache.enabled);
        assert_eq!(config.cache.capacity, DEFAULT_CACHE_CAPACITY);
        assert_eq!(config.risk.cycle_penalty, 40);
        assert_eq!(config.risk.direct_weight, 10);
    }

    #[rstest]
    #[case::zero_capacity("cache:\n  capacity: 0\n")]
    #[case::confidence_above_one("pii:\n  min_confidence: 1.5\n")]
    #[case::inverted_thresholds("risk:\n  thresholds:\n    medium: 70\n    high: 40\n")]
    #[case::threshold_above_hundred("risk:\n  thresholds:\n    high: 120\n")]
    #[case::not_yaml_mapping("- just\n- a list\n")]
    fn invalid_documents_are_rejected(#[case] yaml: &str) {
        let err = EngineConfig::from_yaml_str(yaml).unwrap_err();

        assert!(matches!(err, Error::Config(_)));
    }

    #[rstest]
    #[case(0, RiskLevel::None)]
    #[case(1, RiskLevel::Low)]
    #[case(29, RiskLevel::Low)]
    #[case(30, RiskLevel::Medium)]
    #[case(59, RiskLevel::Medium)]
    #[case(60, RiskLevel::High)]
    #[case(100, RiskLevel::High)]
    fn score_maps_to_level(#[case] score: u8, #[case] expected: RiskLevel) {
        assert_eq!(RiskPolicy::default().level_for(score), expected);
    }

    #[test]
    fn save_and_load_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("engine.yaml");
        let mut config = EngineConfig::default();
        config.cache.capacity = 32;
        config.pii.min_confidence = 0.5;

        config.save(&path).unwrap();
        let loaded = EngineConfig::load(&path).unwrap();

        assert_eq!(loaded, config);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let temp_dir = TempDir::new().unwrap();

        let err = EngineConfig::load(&temp_dir.path().join("absent.yaml")).unwrap_err();

        assert!(matches!(err, Error::Io(_)));
    }
}
