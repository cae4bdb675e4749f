//! Engine configuration loading and validation
//!
//! Configuration resolution follows a fixed priority order:
//! 1. Explicit path supplied by the caller (highest priority)
//! 2. `CANOPY_CONFIG` environment variable
//! 3. Platform config file (`canopy/engine.toml` under the OS config dir)
//! 4. Compiled defaults (fallback)
//!
//! Misconfigured thresholds or tier boundaries are fatal at load time:
//! a schedule with gaps or overlaps would make classification partial,
//! so `validate` rejects it before the engine ever sees a record.

use crate::types::Tier;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Environment variable naming an alternate config file
pub const ENV_CONFIG_PATH: &str = "CANOPY_CONFIG";

/// Match confidence thresholds and the fuzzy-evidence ceiling
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchThresholds {
    /// At/above this confidence a match commits automatically
    pub high: f64,
    /// Splits the review band into probable vs possible matches
    pub medium: f64,
    /// Below this confidence two records are distinct entities
    pub low: f64,
    /// Ceiling for accumulated fuzzy signals; only a strong-identifier
    /// match may reach confidence 1.0
    pub fuzzy_cap: f64,
}

impl Default for MatchThresholds {
    fn default() -> Self {
        Self {
            high: 0.90,
            medium: 0.70,
            low: 0.50,
            fuzzy_cap: 0.95,
        }
    }
}

/// One enterprise revenue bracket: [min_mrr, max_mrr) in $/month
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierBoundary {
    /// Tier this bracket classifies into
    pub tier: Tier,
    /// Human-readable bracket label, e.g. "$10k–$50k"
    pub label: String,
    /// Inclusive lower bound
    pub min_mrr: f64,
    /// Exclusive upper bound; `None` only for the top bracket
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_mrr: Option<f64>,
}

impl TierBoundary {
    fn new(tier: Tier, label: &str, min_mrr: f64, max_mrr: Option<f64>) -> Self {
        Self {
            tier,
            label: label.to_string(),
            min_mrr,
            max_mrr,
        }
    }
}

/// Tier schedule configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TierConfig {
    /// MRR at/above which an account counts as enterprise ($/month)
    pub enterprise_threshold: f64,
    /// Ordered enterprise brackets, lowest first; MRR under the
    /// enterprise threshold always classifies as SMB
    pub boundaries: Vec<TierBoundary>,
}

impl Default for TierConfig {
    fn default() -> Self {
        Self {
            enterprise_threshold: 1_500.0,
            boundaries: vec![
                TierBoundary::new(Tier::E1, "$1.5k–$10k", 1_500.0, Some(10_000.0)),
                TierBoundary::new(Tier::E2, "$10k–$50k", 10_000.0, Some(50_000.0)),
                TierBoundary::new(Tier::E3, "$50k–$150k", 50_000.0, Some(150_000.0)),
                TierBoundary::new(Tier::E4, "$150k–$500k", 150_000.0, Some(500_000.0)),
                TierBoundary::new(Tier::E5, "$500k+", 500_000.0, None),
            ],
        }
    }
}

/// Scoring policy constants
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Weight on growth potential in the overall priority blend
    pub growth_weight: f64,
    /// Weight on attach propensity in the overall priority blend
    pub attach_weight: f64,
    /// Weight on inverted churn risk in the overall priority blend
    pub retention_weight: f64,
    /// Non-negative satisfaction below this still signals churn risk
    pub low_satisfaction_threshold: f64,
    /// Overall priority above this counts as high priority in views
    pub high_priority_floor: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            growth_weight: 0.40,
            attach_weight: 0.35,
            retention_weight: 0.25,
            low_satisfaction_threshold: 20.0,
            high_priority_floor: 0.7,
        }
    }
}

/// Complete engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub matching: MatchThresholds,
    pub tiers: TierConfig,
    pub scoring: ScoringConfig,
}

impl EngineConfig {
    /// Load and validate configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the file cannot be read, `Error::Config` if
    /// it fails to parse or fails validation.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: EngineConfig = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse {}: {}", path.display(), e)))?;
        config.validate()?;
        info!("Loaded engine configuration from {}", path.display());
        Ok(config)
    }

    /// Resolve configuration following the priority order in the module docs
    ///
    /// A config file that is found but malformed or invalid is a hard
    /// error, never a silent fall-through to defaults: boundary and
    /// threshold mistakes must surface at startup, not at classify time.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        // Priority 1: explicit path from the caller
        if let Some(path) = explicit {
            return Self::load(path);
        }

        // Priority 2: environment variable
        if let Ok(path) = std::env::var(ENV_CONFIG_PATH) {
            return Self::load(Path::new(&path));
        }

        // Priority 3: platform config file, if present
        if let Some(path) = platform_config_path() {
            if path.exists() {
                return Self::load(&path);
            }
        }

        // Priority 4: compiled defaults
        debug!("No configuration file found, using compiled defaults");
        Ok(Self::default())
    }

    /// Validate thresholds, tier boundaries, and scoring weights
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` naming the first violated constraint.
    pub fn validate(&self) -> Result<()> {
        self.matching.validate()?;
        self.tiers.validate()?;
        self.scoring.validate()?;
        Ok(())
    }
}

impl MatchThresholds {
    /// Validate threshold ordering and the fuzzy ceiling
    pub fn validate(&self) -> Result<()> {
        if !(self.low > 0.0 && self.low < self.medium && self.medium < self.high && self.high <= 1.0)
        {
            return Err(Error::Config(format!(
                "match thresholds must satisfy 0 < low < medium < high <= 1 (got low={}, medium={}, high={})",
                self.low, self.medium, self.high
            )));
        }
        if !(self.fuzzy_cap > 0.0 && self.fuzzy_cap < 1.0) {
            return Err(Error::Config(format!(
                "fuzzy_cap must be strictly between 0 and 1 to stay below deterministic confidence (got {})",
                self.fuzzy_cap
            )));
        }
        Ok(())
    }
}

impl TierConfig {
    /// Validate the boundary table: one bracket per enterprise tier,
    /// anchored at the enterprise threshold, contiguous, top unbounded
    pub fn validate(&self) -> Result<()> {
        if self.enterprise_threshold <= 0.0 {
            return Err(Error::Config(format!(
                "enterprise_threshold must be positive (got {})",
                self.enterprise_threshold
            )));
        }
        if self.boundaries.len() != Tier::ENTERPRISE.len() {
            return Err(Error::Config(format!(
                "expected {} enterprise tier boundaries, got {}",
                Tier::ENTERPRISE.len(),
                self.boundaries.len()
            )));
        }
        for (boundary, expected) in self.boundaries.iter().zip(Tier::ENTERPRISE) {
            if boundary.tier != expected {
                return Err(Error::Config(format!(
                    "tier boundaries out of order: expected {}, got {}",
                    expected, boundary.tier
                )));
            }
        }

        let first = &self.boundaries[0];
        if first.min_mrr != self.enterprise_threshold {
            return Err(Error::Config(format!(
                "first boundary must start at the enterprise threshold ({} != {})",
                first.min_mrr, self.enterprise_threshold
            )));
        }

        for pair in self.boundaries.windows(2) {
            let (lower, upper) = (&pair[0], &pair[1]);
            match lower.max_mrr {
                // Contiguity: each bracket must end exactly where the next begins
                Some(max) if max == upper.min_mrr => {}
                Some(max) if max > upper.min_mrr => {
                    return Err(Error::Config(format!(
                        "tier boundaries overlap: {} ends at {} but {} starts at {}",
                        lower.tier, max, upper.tier, upper.min_mrr
                    )));
                }
                Some(max) => {
                    return Err(Error::Config(format!(
                        "gap between tier boundaries: {} ends at {} but {} starts at {}",
                        lower.tier, max, upper.tier, upper.min_mrr
                    )));
                }
                None => {
                    return Err(Error::Config(format!(
                        "only the top tier may be unbounded, but {} has no upper bound",
                        lower.tier
                    )));
                }
            }
        }

        let last = self
            .boundaries
            .last()
            .ok_or_else(|| Error::Config("tier boundary list is empty".to_string()))?;
        if last.max_mrr.is_some() {
            return Err(Error::Config(format!(
                "top tier {} must be unbounded above",
                last.tier
            )));
        }
        for boundary in &self.boundaries {
            if let Some(max) = boundary.max_mrr {
                if max <= boundary.min_mrr {
                    return Err(Error::Config(format!(
                        "tier {} has empty range [{}, {})",
                        boundary.tier, boundary.min_mrr, max
                    )));
                }
            }
        }
        Ok(())
    }
}

impl ScoringConfig {
    /// Validate weight bounds and the priority blend sum
    pub fn validate(&self) -> Result<()> {
        for (name, weight) in [
            ("growth_weight", self.growth_weight),
            ("attach_weight", self.attach_weight),
            ("retention_weight", self.retention_weight),
        ] {
            if !(0.0..=1.0).contains(&weight) {
                return Err(Error::Config(format!(
                    "{} must be within [0, 1] (got {})",
                    name, weight
                )));
            }
        }
        let sum = self.growth_weight + self.attach_weight + self.retention_weight;
        if (sum - 1.0).abs() > 1e-9 {
            return Err(Error::Config(format!(
                "priority weights must sum to 1.0 (got {})",
                sum
            )));
        }
        if self.low_satisfaction_threshold < 0.0 {
            return Err(Error::Config(format!(
                "low_satisfaction_threshold must be non-negative (got {})",
                self.low_satisfaction_threshold
            )));
        }
        if !(self.high_priority_floor > 0.0 && self.high_priority_floor < 1.0) {
            return Err(Error::Config(format!(
                "high_priority_floor must be strictly between 0 and 1 (got {})",
                self.high_priority_floor
            )));
        }
        Ok(())
    }
}

/// Platform config file path for the current OS
fn platform_config_path() -> Option<PathBuf> {
    if cfg!(target_os = "linux") {
        // ~/.config/canopy/engine.toml first, then /etc/canopy/engine.toml
        if let Some(user_config) = dirs::config_dir().map(|d| d.join("canopy").join("engine.toml"))
        {
            if user_config.exists() {
                return Some(user_config);
            }
        }
        let system_config = PathBuf::from("/etc/canopy/engine.toml");
        if system_config.exists() {
            return Some(system_config);
        }
        None
    } else {
        dirs::config_dir().map(|d| d.join("canopy").join("engine.toml"))
    }
}
