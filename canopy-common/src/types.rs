//! Shared domain vocabulary for Canopy
//!
//! Closed enumerations used across the engine: revenue tiers, score
//! dimensions, and the upstream systems records can originate from.
//! Kept in the common crate so events and configuration speak the same
//! types as the engine itself.

use serde::{Deserialize, Serialize};

/// Revenue tier assigned to an account from its MRR
///
/// `Smb` covers everything below the enterprise threshold; `E1` through
/// `E5` are the enterprise brackets, lowest to highest. The derived
/// ordering follows declaration order, so tier comparisons follow
/// revenue bands.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum Tier {
    /// Below the enterprise threshold
    Smb,
    /// First enterprise bracket
    E1,
    E2,
    E3,
    E4,
    /// Top bracket (unbounded above)
    E5,
}

impl Tier {
    /// Enterprise tiers in ascending revenue order
    pub const ENTERPRISE: [Tier; 5] = [Tier::E1, Tier::E2, Tier::E3, Tier::E4, Tier::E5];

    /// All tiers in ascending revenue order
    pub const ALL: [Tier; 6] = [
        Tier::Smb,
        Tier::E1,
        Tier::E2,
        Tier::E3,
        Tier::E4,
        Tier::E5,
    ];

    /// Whether this tier is at or above the enterprise threshold
    pub fn is_enterprise(&self) -> bool {
        !matches!(self, Tier::Smb)
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Tier::Smb => write!(f, "SMB"),
            Tier::E1 => write!(f, "E1"),
            Tier::E2 => write!(f, "E2"),
            Tier::E3 => write!(f, "E3"),
            Tier::E4 => write!(f, "E4"),
            Tier::E5 => write!(f, "E5"),
        }
    }
}

/// Score dimension enumeration
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ScoreKind {
    /// Room to grow revenue and product footprint
    GrowthPotential,
    /// Likelihood of contraction or non-renewal
    ChurnRisk,
    /// Likelihood of buying the next product in the adoption journey
    AttachPropensity,
    /// Composite go-to-market priority
    OverallPriority,
}

impl ScoreKind {
    /// All score dimensions, in the order views report them
    pub const ALL: [ScoreKind; 4] = [
        ScoreKind::GrowthPotential,
        ScoreKind::ChurnRisk,
        ScoreKind::AttachPropensity,
        ScoreKind::OverallPriority,
    ];
}

impl std::fmt::Display for ScoreKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScoreKind::GrowthPotential => write!(f, "growth_potential"),
            ScoreKind::ChurnRisk => write!(f, "churn_risk"),
            ScoreKind::AttachPropensity => write!(f, "attach_propensity"),
            ScoreKind::OverallPriority => write!(f, "overall_priority"),
        }
    }
}

/// Upstream system a source record originates from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SourceSystem {
    Crm,
    Billing,
    Quoting,
    Ticketing,
}

impl std::fmt::Display for SourceSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceSystem::Crm => write!(f, "crm"),
            SourceSystem::Billing => write!(f, "billing"),
            SourceSystem::Quoting => write!(f, "quoting"),
            SourceSystem::Ticketing => write!(f, "ticketing"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_ordering_follows_revenue_bands() {
        assert!(Tier::Smb < Tier::E1);
        assert!(Tier::E1 < Tier::E2);
        assert!(Tier::E4 < Tier::E5);
    }

    #[test]
    fn test_tier_enterprise_flag() {
        assert!(!Tier::Smb.is_enterprise());
        for tier in Tier::ENTERPRISE {
            assert!(tier.is_enterprise());
        }
    }

    #[test]
    fn test_tier_serialization() {
        let json = serde_json::to_string(&Tier::E3).unwrap();
        assert_eq!(json, "\"E3\"");
        let json = serde_json::to_string(&Tier::Smb).unwrap();
        assert_eq!(json, "\"SMB\"");

        let tier: Tier = serde_json::from_str("\"E5\"").unwrap();
        assert_eq!(tier, Tier::E5);
    }

    #[test]
    fn test_score_kind_display() {
        assert_eq!(ScoreKind::GrowthPotential.to_string(), "growth_potential");
        assert_eq!(ScoreKind::OverallPriority.to_string(), "overall_priority");
    }

    #[test]
    fn test_source_system_serialization() {
        let json = serde_json::to_string(&SourceSystem::Billing).unwrap();
        assert_eq!(json, "\"billing\"");
        let system: SourceSystem = serde_json::from_str("\"crm\"").unwrap();
        assert_eq!(system, SourceSystem::Crm);
    }
}
