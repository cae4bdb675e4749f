//! Tier Classifier
//!
//! Maps monthly recurring revenue onto the closed `Tier` ladder using a
//! validated boundary schedule. Everything below the enterprise
//! threshold is SMB; above it, ordered half-open [min, max) brackets
//! decide the enterprise tier. The schedule is validated once at
//! construction, which is what makes `classify` total in practice.

use crate::types::Account;
use canopy_common::config::{TierBoundary, TierConfig};
use canopy_common::types::Tier;
use canopy_common::{Error, Result};
use chrono::Utc;
use std::collections::HashMap;

/// Validated, ordered tier boundary schedule
#[derive(Debug, Clone)]
pub struct TierSchedule {
    enterprise_threshold: f64,
    boundaries: Vec<TierBoundary>,
}

impl TierSchedule {
    /// Build a schedule from configuration, validating it first
    ///
    /// # Errors
    /// Returns `Error::Config` if the boundary table has gaps, overlaps,
    /// out-of-order tiers, or is not anchored at the enterprise
    /// threshold. Rejecting the table here is what keeps the
    /// unclassifiable-MRR branch in `classify` unreachable.
    pub fn new(config: &TierConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            enterprise_threshold: config.enterprise_threshold,
            boundaries: config.boundaries.clone(),
        })
    }

    /// MRR at/above which an account counts as enterprise
    pub fn enterprise_threshold(&self) -> f64 {
        self.enterprise_threshold
    }

    /// Classify an MRR value into its tier
    ///
    /// Brackets are half-open: a value exactly at a bracket's minimum
    /// belongs to that bracket, never the one below.
    ///
    /// # Errors
    /// Returns `Error::Internal` if no bracket covers an at/above
    /// threshold value. A schedule accepted by `new` cannot reach this;
    /// it exists to surface boundary-configuration bugs loudly instead
    /// of silently defaulting.
    pub fn classify(&self, mrr: f64) -> Result<Tier> {
        if mrr < self.enterprise_threshold {
            return Ok(Tier::Smb);
        }
        for boundary in &self.boundaries {
            let above_min = mrr >= boundary.min_mrr;
            let below_max = boundary.max_mrr.map_or(true, |max| mrr < max);
            if above_min && below_max {
                return Ok(boundary.tier);
            }
        }
        Err(Error::Internal(format!(
            "no tier boundary covers MRR {mrr}"
        )))
    }

    /// Return a copy of the account with tier and enterprise flag
    /// recomputed from its current MRR
    ///
    /// Never mutates in place; the `updated_at` stamp advances only when
    /// the classification actually changed.
    ///
    /// # Errors
    /// Propagates `classify` failures.
    pub fn classify_account(&self, account: &Account) -> Result<Account> {
        let tier = self.classify(account.mrr)?;
        let mut updated = account.clone();
        if updated.tier != tier || updated.is_enterprise != tier.is_enterprise() {
            updated.tier = tier;
            updated.is_enterprise = tier.is_enterprise();
            updated.updated_at = Utc::now();
        }
        Ok(updated)
    }

    /// Partition accounts by computed tier in one pass
    ///
    /// Classification runs from each account's MRR, so a stale stored
    /// tier never leaks into the partitioning.
    ///
    /// # Errors
    /// Propagates `classify` failures.
    pub fn segment(&self, accounts: &[Account]) -> Result<HashMap<Tier, Vec<Account>>> {
        let mut partitions: HashMap<Tier, Vec<Account>> = HashMap::new();
        for account in accounts {
            let tier = self.classify(account.mrr)?;
            partitions.entry(tier).or_default().push(account.clone());
        }
        Ok(partitions)
    }

    /// Upper MRR bound of a tier's bracket
    ///
    /// `None` for the unbounded top tier. The SMB ceiling is the
    /// enterprise threshold itself.
    pub fn ceiling(&self, tier: Tier) -> Option<f64> {
        if tier == Tier::Smb {
            return Some(self.enterprise_threshold);
        }
        self.boundaries
            .iter()
            .find(|b| b.tier == tier)
            .and_then(|b| b.max_mrr)
    }

    /// Human-readable bracket label for a tier
    pub fn label(&self, tier: Tier) -> &str {
        self.boundaries
            .iter()
            .find(|b| b.tier == tier)
            .map(|b| b.label.as_str())
            .unwrap_or("SMB")
    }
}

impl Default for TierSchedule {
    fn default() -> Self {
        let config = TierConfig::default();
        Self {
            enterprise_threshold: config.enterprise_threshold,
            boundaries: config.boundaries,
        }
    }
}
