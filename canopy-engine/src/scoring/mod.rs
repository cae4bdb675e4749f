//! Account Scoring
//!
//! Four independent scoring dimensions over account attributes and
//! externally supplied signals: growth potential, churn risk, attach
//! propensity, and the overall priority blend. Every scorer is a pure
//! function of its inputs; no scorer reads persistent state, so batch
//! scoring is re-runnable offline and parallelizable per account.
//!
//! Missing optional signals contribute zero to a score, never an
//! error. The only input failure is an account without an identifier.

pub mod attach;
pub mod churn;
pub mod growth;
pub mod priority;

pub use attach::score_attach;
pub use churn::score_churn;
pub use growth::{headroom_within_ceiling, score_growth};
pub use priority::score_priority;

use crate::types::{Account, AccountSignals, ScoreCard};
use canopy_common::config::ScoringConfig;
use canopy_common::{Error, Result};
use uuid::Uuid;

/// Guard shared by every scorer: an account must carry an identifier
pub(crate) fn require_account_id(account: &Account) -> Result<Uuid> {
    if account.id.is_nil() {
        return Err(Error::InvalidInput(
            "account id required for scoring".to_string(),
        ));
    }
    Ok(account.id)
}

/// Score all four dimensions for one account
///
/// Growth, churn, and attach run first; overall priority blends their
/// values. The returned card carries every dimension.
///
/// # Errors
/// Returns `Error::InvalidInput` if the account carries a nil id.
pub fn score_account(
    account: &Account,
    signals: &AccountSignals,
    config: &ScoringConfig,
) -> Result<ScoreCard> {
    let growth = score_growth(account, signals)?;
    let churn = score_churn(account, signals, config)?;
    let attach = score_attach(account, signals)?;
    let priority = score_priority(account.id, growth.score, churn.score, attach.score, config)?;

    let mut card = ScoreCard::new(account.id);
    card.set(growth);
    card.set(churn);
    card.set(attach);
    card.set(priority);
    Ok(card)
}
