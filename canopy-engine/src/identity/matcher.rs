//! Account Matcher
//!
//! Computes match confidence between an incoming source record and
//! existing unified accounts. Strong identifiers resolve first and are
//! the only path to full confidence; otherwise independent fuzzy
//! signals accumulate additively and are clamped below the
//! deterministic ceiling. Every contributing signal is recorded as a
//! reason string for audit and review triage.

use crate::ingest::SourceRecord;
use crate::similarity;
use crate::types::Account;
use canopy_common::config::MatchThresholds;
use canopy_common::types::SourceSystem;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

// ============================================================================
// Signal Weights
// ============================================================================

/// Contribution of a strong name similarity (>= `NAME_STRONG_SIM`)
const NAME_STRONG_WEIGHT: f64 = 0.40;
/// Contribution of a moderate name similarity (>= `NAME_MODERATE_SIM`)
const NAME_MODERATE_WEIGHT: f64 = 0.25;
/// Contribution of an exact postal code match
const POSTAL_WEIGHT: f64 = 0.20;
/// Contribution of an address refinement on top of a postal match
const ADDRESS_WEIGHT: f64 = 0.20;
/// Contribution of a case-insensitive industry code match
const INDUSTRY_WEIGHT: f64 = 0.10;

/// Name similarity floor for the strong contribution
const NAME_STRONG_SIM: f64 = 0.85;
/// Name similarity floor for the moderate contribution; below this a
/// name comparison contributes nothing, avoiding false positives from
/// very short or common names
const NAME_MODERATE_SIM: f64 = 0.70;
/// Address similarity floor; only consulted once postal codes agree
const ADDRESS_SIM_FLOOR: f64 = 0.80;

// ============================================================================
// Match Results
// ============================================================================

/// One scored pairing of an incoming record with an existing account
///
/// Names both sides of the comparison, so review queues and event
/// payloads can identify the records involved without dereferencing
/// the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchCandidate {
    /// System the incoming record arrived from
    pub record_system: SourceSystem,
    /// Incoming record's id within that system
    pub record_source_id: String,
    /// Existing unified account the record was compared against
    pub account_id: Uuid,
    /// Home system of the account's canonical record
    pub account_system: SourceSystem,
    /// Canonical record's id within its home system
    pub account_source_id: String,
    /// Match confidence in [0, 1]; exactly 1.0 only for a strong
    /// identifier match
    pub confidence: f64,
    /// Every signal that contributed, human-readable
    pub reasons: Vec<String>,
}

/// What the engine does with a candidate at a given confidence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchDisposition {
    /// At/above the high threshold: commit without adjudication
    AutoAccept,
    /// In the review band: hold for human adjudication
    Review,
    /// Below the low threshold: treat the records as distinct entities
    Distinct,
}

// ============================================================================
// AccountMatcher
// ============================================================================

/// Confidence scorer for record-to-account matching
///
/// Stateless apart from its thresholds; the same record pair always
/// produces the same confidence and reasons.
#[derive(Debug, Clone)]
pub struct AccountMatcher {
    thresholds: MatchThresholds,
}

impl AccountMatcher {
    pub fn new(thresholds: MatchThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &MatchThresholds {
        &self.thresholds
    }

    /// Score an incoming record against one unified account
    ///
    /// The account side of the comparison is its canonical record view,
    /// so `None` comes back for an account with no source links.
    /// Precedence is strict: an equal non-empty billing id, then an
    /// equal non-empty CRM id, each short-circuit to confidence 1.0.
    /// Otherwise independent fuzzy signals accumulate and the sum is
    /// clamped to the configured fuzzy cap.
    pub fn match_records(&self, incoming: &SourceRecord, account: &Account) -> Option<MatchCandidate> {
        let existing = account.canonical_record()?;
        let (confidence, reasons) = self.score_pair(incoming, &existing);
        Some(MatchCandidate {
            record_system: incoming.system,
            record_source_id: incoming.source_id.clone(),
            account_id: account.id,
            account_system: existing.system,
            account_source_id: existing.source_id,
            confidence,
            reasons,
        })
    }

    /// Confidence and reason labels for one record pair
    fn score_pair(&self, incoming: &SourceRecord, existing: &SourceRecord) -> (f64, Vec<String>) {
        if strong_id_equal(&incoming.billing_id, &existing.billing_id) {
            return (1.0, vec!["billing_id_match".to_string()]);
        }
        if strong_id_equal(&incoming.crm_id, &existing.crm_id) {
            return (1.0, vec!["crm_id_match".to_string()]);
        }

        let mut confidence = 0.0;
        let mut reasons = Vec::new();

        let name_sim = similarity::similarity(
            &similarity::normalize_name(&incoming.name),
            &similarity::normalize_name(&existing.name),
        );
        if name_sim >= NAME_STRONG_SIM {
            confidence += NAME_STRONG_WEIGHT;
            reasons.push(format!("name_match_{:.2}", name_sim));
        } else if name_sim >= NAME_MODERATE_SIM {
            confidence += NAME_MODERATE_WEIGHT;
            reasons.push(format!("name_match_{:.2}", name_sim));
        }

        if postal_equal(&incoming.postal_code, &existing.postal_code) {
            confidence += POSTAL_WEIGHT;
            reasons.push("postal_match".to_string());

            // Address similarity is a refinement of a postal agreement,
            // never an independent signal
            if let (Some(a), Some(b)) = (&incoming.address_line1, &existing.address_line1) {
                let addr_sim = similarity::similarity(
                    &similarity::normalize_address(a),
                    &similarity::normalize_address(b),
                );
                if addr_sim >= ADDRESS_SIM_FLOOR {
                    confidence += ADDRESS_WEIGHT;
                    reasons.push(format!("address_match_{:.2}", addr_sim));
                }
            }
        }

        if industry_equal(&incoming.industry_code, &existing.industry_code) {
            confidence += INDUSTRY_WEIGHT;
            reasons.push("industry_match".to_string());
        }

        (confidence.min(self.thresholds.fuzzy_cap), reasons)
    }

    /// Score an incoming record against every live account
    ///
    /// Superseded accounts and accounts with no source links are
    /// skipped. Candidates below the low threshold are dropped; the
    /// rest come back sorted by confidence, highest first, with equal
    /// confidences ordered by account id so batch runs are
    /// reproducible.
    pub fn candidates(&self, incoming: &SourceRecord, accounts: &[Account]) -> Vec<MatchCandidate> {
        let mut candidates: Vec<MatchCandidate> = accounts
            .iter()
            .filter(|account| !account.superseded)
            .filter_map(|account| self.match_records(incoming, account))
            .filter(|candidate| candidate.confidence >= self.thresholds.low)
            .collect();

        candidates.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.account_id.cmp(&b.account_id))
        });

        debug!(
            system = %incoming.system,
            source_id = %incoming.source_id,
            candidates = candidates.len(),
            top_confidence = ?candidates.first().map(|c| c.confidence),
            "Candidate scoring complete"
        );

        candidates
    }

    /// Best live candidate for the record, if any clears the low threshold
    pub fn best_candidate(&self, incoming: &SourceRecord, accounts: &[Account]) -> Option<MatchCandidate> {
        self.candidates(incoming, accounts).into_iter().next()
    }

    /// Account proven by the record's identifiers, if a live account
    /// owns one of them
    ///
    /// Walks the same precedence as scoring: the owner of the record's
    /// billing id wins over the owner of its CRM id. Should two live
    /// accounts ever own the same identifier, the lowest account id is
    /// chosen so resolution stays reproducible.
    pub fn identified_account(
        &self,
        incoming: &SourceRecord,
        accounts: &[Account],
    ) -> Option<MatchCandidate> {
        let owner = strong_id_owner(&incoming.billing_id, accounts, |a| &a.billing_id)
            .or_else(|| strong_id_owner(&incoming.crm_id, accounts, |a| &a.crm_id))?;
        self.match_records(incoming, owner)
    }

    /// Whether a confidence falls in the human-adjudication band
    ///
    /// True exactly when low <= confidence < high.
    pub fn needs_review(&self, confidence: f64) -> bool {
        confidence >= self.thresholds.low && confidence < self.thresholds.high
    }

    /// Resolve a confidence to its disposition
    pub fn disposition(&self, confidence: f64) -> MatchDisposition {
        if confidence >= self.thresholds.high {
            MatchDisposition::AutoAccept
        } else if confidence >= self.thresholds.low {
            MatchDisposition::Review
        } else {
            MatchDisposition::Distinct
        }
    }
}

impl Default for AccountMatcher {
    fn default() -> Self {
        Self::new(MatchThresholds::default())
    }
}

// ============================================================================
// Signal Helpers
// ============================================================================

/// Equality for strong identifiers
///
/// Blank values are absent: an empty or whitespace identifier never
/// equals another, so malformed upstream data cannot manufacture a
/// deterministic match. Comparison is case-sensitive; these are opaque
/// system keys, not text.
fn strong_id_equal(a: &Option<String>, b: &Option<String>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => {
            let a = a.trim();
            let b = b.trim();
            !a.is_empty() && a == b
        }
        _ => false,
    }
}

/// Live account whose identifier field equals the given id, lowest
/// account id first
fn strong_id_owner<'a, F>(id: &Option<String>, accounts: &'a [Account], field: F) -> Option<&'a Account>
where
    F: Fn(&Account) -> &Option<String>,
{
    accounts
        .iter()
        .filter(|account| !account.superseded)
        .filter(|account| strong_id_equal(id, field(account)))
        .min_by_key(|account| account.id)
}

/// Postal codes compare exactly after trimming; unlike industry codes
/// there is no case folding
fn postal_equal(a: &Option<String>, b: &Option<String>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => {
            let a = a.trim();
            let b = b.trim();
            !a.is_empty() && a == b
        }
        _ => false,
    }
}

fn industry_equal(a: &Option<String>, b: &Option<String>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => {
            let a = a.trim();
            let b = b.trim();
            !a.is_empty() && a.eq_ignore_ascii_case(b)
        }
        _ => false,
    }
}
