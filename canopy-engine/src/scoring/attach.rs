//! Attach Propensity Scorer
//!
//! Models the fixed product-adoption journey Connectivity, then
//! SD-WAN, then SASE. Propensity rewards the next step in that
//! journey; a fully bundled account is low-propensity by policy, not
//! by arithmetic.

use super::require_account_id;
use crate::types::{Account, AccountSignals, ScoreResult};
use canopy_common::types::{ScoreKind, Tier};
use canopy_common::Result;

/// Connectivity held without SD-WAN: SD-WAN is next in the journey
const SDWAN_NEXT_WEIGHT: f64 = 0.35;
/// SD-WAN held without SASE: SASE is next in the journey
const SASE_NEXT_WEIGHT: f64 = 0.35;
/// Connectivity held without a managed-services wrapper
const MANAGED_GAP_WEIGHT: f64 = 0.15;
/// Bonus for accounts in the enterprise-buyer tiers
const ENTERPRISE_BUYER_WEIGHT: f64 = 0.10;
/// Flat score assigned to an account holding the full bundle
const FULL_BUNDLE_SCORE: f64 = 0.10;

/// Tiers whose buying behavior earns the enterprise-buyer bonus
const ENTERPRISE_BUYER_TIERS: [Tier; 3] = [Tier::E3, Tier::E4, Tier::E5];

/// Score attach propensity for one account
///
/// An account holding connectivity, SD-WAN, and SASE scores a flat
/// 0.10 before any additive rule runs; the tier bonus does not apply
/// to it. Otherwise journey gaps accumulate: SD-WAN next adds 0.35,
/// SASE next adds 0.35, a managed-services gap adds 0.15, and the top
/// three tiers add 0.10. Clamped to [0, 1].
///
/// # Errors
/// Returns `Error::InvalidInput` if the account carries a nil id.
pub fn score_attach(account: &Account, signals: &AccountSignals) -> Result<ScoreResult> {
    let account_id = require_account_id(account)?;

    if signals.has_connectivity && signals.has_sdwan && signals.has_sase {
        return Ok(ScoreResult::new(
            account_id,
            ScoreKind::AttachPropensity,
            FULL_BUNDLE_SCORE,
            vec!["fully_bundled".to_string()],
        ));
    }

    let mut score = 0.0;
    let mut factors = Vec::new();

    if signals.has_connectivity && !signals.has_sdwan {
        score += SDWAN_NEXT_WEIGHT;
        factors.push("sdwan_next_in_journey".to_string());
    }
    if signals.has_sdwan && !signals.has_sase {
        score += SASE_NEXT_WEIGHT;
        factors.push("sase_next_in_journey".to_string());
    }
    if signals.has_connectivity && !signals.has_managed_services {
        score += MANAGED_GAP_WEIGHT;
        factors.push("managed_services_gap".to_string());
    }
    if ENTERPRISE_BUYER_TIERS.contains(&account.tier) {
        score += ENTERPRISE_BUYER_WEIGHT;
        factors.push("enterprise_buyer_profile".to_string());
    }

    Ok(ScoreResult::new(
        account_id,
        ScoreKind::AttachPropensity,
        score,
        factors,
    ))
}
