//! Overall Priority Scorer
//!
//! Fixed-weight linear blend of the other three dimensions. Churn is
//! inverted before weighting: retention strength raises priority.

use crate::types::ScoreResult;
use canopy_common::config::ScoringConfig;
use canopy_common::types::ScoreKind;
use canopy_common::{Error, Result};
use uuid::Uuid;

/// Blend growth, churn, and attach into one priority score
///
/// `growth * growth_weight + attach * attach_weight +
/// (1 - churn) * retention_weight`. The same three inputs always yield
/// the same output; nothing here rounds beyond floating point itself.
/// Inputs are expected in [0, 1]; the result is clamped to the same
/// range.
///
/// # Errors
/// Returns `Error::InvalidInput` if the account id is nil.
pub fn score_priority(
    account_id: Uuid,
    growth: f64,
    churn: f64,
    attach: f64,
    config: &ScoringConfig,
) -> Result<ScoreResult> {
    if account_id.is_nil() {
        return Err(Error::InvalidInput(
            "account id required for scoring".to_string(),
        ));
    }

    let retention = 1.0 - churn;
    let score = growth * config.growth_weight
        + attach * config.attach_weight
        + retention * config.retention_weight;

    let factors = vec![
        format!("growth_{growth:.2}"),
        format!("attach_{attach:.2}"),
        format!("retention_{retention:.2}"),
    ];

    Ok(ScoreResult::new(
        account_id,
        ScoreKind::OverallPriority,
        score,
        factors,
    ))
}
