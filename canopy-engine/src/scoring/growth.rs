//! Growth Potential Scorer
//!
//! Measures room to grow revenue and product footprint: MRR headroom
//! under the tier ceiling, gaps in the SD-WAN/SASE journey, circuit
//! utilization pressure, and multi-site spread.

use super::require_account_id;
use crate::tiers::TierSchedule;
use crate::types::{Account, AccountSignals, ScoreResult};
use canopy_common::types::ScoreKind;
use canopy_common::Result;

/// Headroom fraction above which the strong bonus applies
const HIGH_HEADROOM: f64 = 0.5;
const HIGH_HEADROOM_WEIGHT: f64 = 0.20;
/// Headroom fraction above which the moderate bonus applies
const MODERATE_HEADROOM: f64 = 0.2;
const MODERATE_HEADROOM_WEIGHT: f64 = 0.10;

/// Missing SD-WAN while the journey starts at connectivity
const SDWAN_GAP_WEIGHT: f64 = 0.25;
/// Has SD-WAN but not yet SASE; never stacks with the SD-WAN gap
const SASE_GAP_WEIGHT: f64 = 0.20;

const HIGH_UTILIZATION: f64 = 0.8;
const HIGH_UTILIZATION_WEIGHT: f64 = 0.15;
const ELEVATED_UTILIZATION: f64 = 0.6;
const ELEVATED_UTILIZATION_WEIGHT: f64 = 0.08;

const LARGE_FOOTPRINT_SITES: u32 = 10;
const LARGE_FOOTPRINT_WEIGHT: f64 = 0.15;
const MULTI_SITE_SITES: u32 = 3;
const MULTI_SITE_WEIGHT: f64 = 0.08;

/// Fraction of the tier ceiling the account has not yet reached
///
/// `None` when the tier has no ceiling (the top bracket). Clamped to
/// [0, 1] so stale tier state or negative MRR cannot produce a
/// headroom outside the signal's range. Batch scoring uses this to
/// fill `mrr_headroom` when the caller supplied none.
pub fn headroom_within_ceiling(account: &Account, schedule: &TierSchedule) -> Option<f64> {
    let ceiling = schedule.ceiling(account.tier)?;
    if ceiling <= 0.0 {
        return None;
    }
    Some(((ceiling - account.mrr) / ceiling).clamp(0.0, 1.0))
}

/// Score growth potential for one account
///
/// Additive factors, clamped to [0, 1]:
/// - headroom under the tier ceiling (>50% adds 0.20, >20% adds 0.10)
/// - SD-WAN gap adds 0.25, or SASE gap adds 0.20 once SD-WAN is held
/// - bandwidth utilization (>80% adds 0.15, >60% adds 0.08)
/// - site footprint (10+ adds 0.15, 3+ adds 0.08)
///
/// # Errors
/// Returns `Error::InvalidInput` if the account carries a nil id.
pub fn score_growth(account: &Account, signals: &AccountSignals) -> Result<ScoreResult> {
    let account_id = require_account_id(account)?;
    let mut score = 0.0;
    let mut factors = Vec::new();

    if let Some(headroom) = signals.mrr_headroom {
        if headroom > HIGH_HEADROOM {
            score += HIGH_HEADROOM_WEIGHT;
            factors.push("high_mrr_headroom".to_string());
        } else if headroom > MODERATE_HEADROOM {
            score += MODERATE_HEADROOM_WEIGHT;
            factors.push("moderate_mrr_headroom".to_string());
        }
    }

    // One product-gap bonus at most: the SASE gap only exists once
    // SD-WAN is already held
    if !signals.has_sdwan {
        score += SDWAN_GAP_WEIGHT;
        factors.push("sdwan_gap".to_string());
    } else if !signals.has_sase {
        score += SASE_GAP_WEIGHT;
        factors.push("sase_gap".to_string());
    }

    if let Some(utilization) = signals.bandwidth_utilization {
        if utilization > HIGH_UTILIZATION {
            score += HIGH_UTILIZATION_WEIGHT;
            factors.push("high_bandwidth_utilization".to_string());
        } else if utilization > ELEVATED_UTILIZATION {
            score += ELEVATED_UTILIZATION_WEIGHT;
            factors.push("elevated_bandwidth_utilization".to_string());
        }
    }

    if let Some(sites) = signals.site_count {
        if sites >= LARGE_FOOTPRINT_SITES {
            score += LARGE_FOOTPRINT_WEIGHT;
            factors.push("large_multi_site_footprint".to_string());
        } else if sites >= MULTI_SITE_SITES {
            score += MULTI_SITE_WEIGHT;
            factors.push("multi_site_footprint".to_string());
        }
    }

    Ok(ScoreResult::new(
        account_id,
        ScoreKind::GrowthPotential,
        score,
        factors,
    ))
}
