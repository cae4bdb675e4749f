//! Churn Risk Scorer
//!
//! Measures contraction and non-renewal risk from relationship
//! signals: expansion recency, severity-1 incident history,
//! satisfaction, and contract runway.

use super::require_account_id;
use crate::types::{Account, AccountSignals, ScoreResult};
use canopy_common::config::ScoringConfig;
use canopy_common::types::ScoreKind;
use canopy_common::Result;

/// Months without expansion beyond which the account looks stalled
const STALE_EXPANSION_MONTHS: u32 = 18;
const STALE_EXPANSION_WEIGHT: f64 = 0.25;
const AGING_EXPANSION_MONTHS: u32 = 12;
const AGING_EXPANSION_WEIGHT: f64 = 0.15;

const REPEATED_SEV1_COUNT: u32 = 3;
const REPEATED_SEV1_WEIGHT: f64 = 0.30;
const ANY_SEV1_WEIGHT: f64 = 0.15;

const NEGATIVE_SATISFACTION_WEIGHT: f64 = 0.25;
const LOW_SATISFACTION_WEIGHT: f64 = 0.10;

/// Contract runway short enough to mean an active renewal decision
const EXPIRING_CONTRACT_MONTHS: u32 = 3;
const EXPIRING_CONTRACT_WEIGHT: f64 = 0.20;
const ENDING_CONTRACT_MONTHS: u32 = 6;
const ENDING_CONTRACT_WEIGHT: f64 = 0.10;

/// Score churn risk for one account
///
/// Additive factors, clamped to [0, 1]:
/// - months since last expansion (>18 adds 0.25, >12 adds 0.15)
/// - recent severity-1 incidents (3+ adds 0.30, 1+ adds 0.15)
/// - satisfaction (negative adds 0.25, under the configured low
///   threshold adds 0.10)
/// - contract runway (3 months or less adds 0.20, 6 or less adds 0.10)
///
/// # Errors
/// Returns `Error::InvalidInput` if the account carries a nil id.
pub fn score_churn(
    account: &Account,
    signals: &AccountSignals,
    config: &ScoringConfig,
) -> Result<ScoreResult> {
    let account_id = require_account_id(account)?;
    let mut score = 0.0;
    let mut factors = Vec::new();

    if let Some(months) = signals.months_since_last_expansion {
        if months > STALE_EXPANSION_MONTHS {
            score += STALE_EXPANSION_WEIGHT;
            factors.push("stale_expansion".to_string());
        } else if months > AGING_EXPANSION_MONTHS {
            score += AGING_EXPANSION_WEIGHT;
            factors.push("aging_expansion".to_string());
        }
    }

    if let Some(incidents) = signals.recent_sev1_incidents {
        if incidents >= REPEATED_SEV1_COUNT {
            score += REPEATED_SEV1_WEIGHT;
            factors.push("repeated_sev1_incidents".to_string());
        } else if incidents >= 1 {
            score += ANY_SEV1_WEIGHT;
            factors.push("recent_sev1_incident".to_string());
        }
    }

    if let Some(satisfaction) = signals.satisfaction_score {
        if satisfaction < 0.0 {
            score += NEGATIVE_SATISFACTION_WEIGHT;
            factors.push("negative_satisfaction".to_string());
        } else if satisfaction < config.low_satisfaction_threshold {
            score += LOW_SATISFACTION_WEIGHT;
            factors.push("low_satisfaction".to_string());
        }
    }

    if let Some(months) = signals.contract_months_remaining {
        if months <= EXPIRING_CONTRACT_MONTHS {
            score += EXPIRING_CONTRACT_WEIGHT;
            factors.push("contract_expiring".to_string());
        } else if months <= ENDING_CONTRACT_MONTHS {
            score += ENDING_CONTRACT_WEIGHT;
            factors.push("contract_ending_soon".to_string());
        }
    }

    Ok(ScoreResult::new(
        account_id,
        ScoreKind::ChurnRisk,
        score,
        factors,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::SourceRecord;
    use crate::tiers::TierSchedule;
    use canopy_common::types::SourceSystem;
    use canopy_common::Error;

    fn test_account() -> Account {
        let record = SourceRecord {
            system: SourceSystem::Crm,
            source_id: "crm-1".to_string(),
            name: "Acme".to_string(),
            address_line1: None,
            city: None,
            state: None,
            postal_code: None,
            industry_code: None,
            billing_id: None,
            crm_id: None,
            mrr: 12_000.0,
        };
        Account::from_record(&record, &TierSchedule::default()).unwrap()
    }

    fn config() -> ScoringConfig {
        ScoringConfig::default()
    }

    #[test]
    fn test_no_signals_scores_zero() {
        let result = score_churn(&test_account(), &AccountSignals::default(), &config()).unwrap();
        assert_eq!(result.score, 0.0);
        assert!(result.factors.is_empty());
    }

    #[test]
    fn test_expansion_recency_buckets() {
        let account = test_account();

        let stale = AccountSignals {
            months_since_last_expansion: Some(19),
            ..AccountSignals::default()
        };
        let result = score_churn(&account, &stale, &config()).unwrap();
        assert!((result.score - 0.25).abs() < 1e-9);
        assert_eq!(result.factors, vec!["stale_expansion".to_string()]);

        let aging = AccountSignals {
            months_since_last_expansion: Some(13),
            ..AccountSignals::default()
        };
        let result = score_churn(&account, &aging, &config()).unwrap();
        assert!((result.score - 0.15).abs() < 1e-9);

        // Exactly 12 months is still fresh
        let fresh = AccountSignals {
            months_since_last_expansion: Some(12),
            ..AccountSignals::default()
        };
        assert_eq!(score_churn(&account, &fresh, &config()).unwrap().score, 0.0);
    }

    #[test]
    fn test_sev1_incident_buckets() {
        let account = test_account();

        let repeated = AccountSignals {
            recent_sev1_incidents: Some(3),
            ..AccountSignals::default()
        };
        let result = score_churn(&account, &repeated, &config()).unwrap();
        assert!((result.score - 0.30).abs() < 1e-9);
        assert_eq!(result.factors, vec!["repeated_sev1_incidents".to_string()]);

        let single = AccountSignals {
            recent_sev1_incidents: Some(1),
            ..AccountSignals::default()
        };
        assert!((score_churn(&account, &single, &config()).unwrap().score - 0.15).abs() < 1e-9);

        let clean = AccountSignals {
            recent_sev1_incidents: Some(0),
            ..AccountSignals::default()
        };
        assert_eq!(score_churn(&account, &clean, &config()).unwrap().score, 0.0);
    }

    #[test]
    fn test_satisfaction_buckets() {
        let account = test_account();

        let negative = AccountSignals {
            satisfaction_score: Some(-5.0),
            ..AccountSignals::default()
        };
        let result = score_churn(&account, &negative, &config()).unwrap();
        assert!((result.score - 0.25).abs() < 1e-9);
        assert_eq!(result.factors, vec!["negative_satisfaction".to_string()]);

        // Default low threshold is 20.0
        let low = AccountSignals {
            satisfaction_score: Some(10.0),
            ..AccountSignals::default()
        };
        let result = score_churn(&account, &low, &config()).unwrap();
        assert!((result.score - 0.10).abs() < 1e-9);
        assert_eq!(result.factors, vec!["low_satisfaction".to_string()]);

        let healthy = AccountSignals {
            satisfaction_score: Some(50.0),
            ..AccountSignals::default()
        };
        assert_eq!(score_churn(&account, &healthy, &config()).unwrap().score, 0.0);
    }

    #[test]
    fn test_contract_runway_buckets() {
        let account = test_account();

        let expiring = AccountSignals {
            contract_months_remaining: Some(3),
            ..AccountSignals::default()
        };
        assert!((score_churn(&account, &expiring, &config()).unwrap().score - 0.20).abs() < 1e-9);

        let ending = AccountSignals {
            contract_months_remaining: Some(6),
            ..AccountSignals::default()
        };
        assert!((score_churn(&account, &ending, &config()).unwrap().score - 0.10).abs() < 1e-9);

        let comfortable = AccountSignals {
            contract_months_remaining: Some(7),
            ..AccountSignals::default()
        };
        assert_eq!(
            score_churn(&account, &comfortable, &config()).unwrap().score,
            0.0
        );
    }

    #[test]
    fn test_every_factor_firing_sums_to_one() {
        let account = test_account();
        let signals = AccountSignals {
            months_since_last_expansion: Some(24),
            recent_sev1_incidents: Some(5),
            satisfaction_score: Some(-10.0),
            contract_months_remaining: Some(1),
            ..AccountSignals::default()
        };
        let result = score_churn(&account, &signals, &config()).unwrap();

        // 0.25 + 0.30 + 0.25 + 0.20
        assert!((result.score - 1.0).abs() < 1e-9);
        assert!(result.score <= 1.0);
        assert_eq!(result.factors.len(), 4);
    }

    #[test]
    fn test_nil_account_id_rejected() {
        let mut account = test_account();
        account.id = uuid::Uuid::nil();
        let result = score_churn(&account, &AccountSignals::default(), &config());
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }
}
