//! Segment View Builder
//!
//! Per-tier aggregation over accounts and their score cards: counts,
//! revenue roll-ups, score means, and the expansion-opportunity
//! estimate. Views are always rebuilt from a frozen snapshot of their
//! inputs, never patched incrementally, so a view is internally
//! consistent even while the registry keeps moving.

use crate::tiers::TierSchedule;
use crate::types::{Account, ScoreCard};
use canopy_common::config::ScoringConfig;
use canopy_common::types::{ScoreKind, Tier};
use canopy_common::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;
use uuid::Uuid;

/// Months in the annualization factor
const MONTHS_PER_YEAR: f64 = 12.0;

/// Aggregated numbers for one tier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentSummary {
    pub tier: Tier,
    /// Human-readable bracket label
    pub label: String,
    pub account_count: usize,
    /// Sum of member MRR ($/month)
    pub total_mrr: f64,
    /// Mean member MRR; 0 for an empty segment
    pub average_mrr: f64,
    /// Total MRR annualized
    pub annualized_revenue: f64,
    /// Mean per score dimension, over members holding that dimension
    /// only; a dimension nobody holds is absent
    pub score_means: HashMap<ScoreKind, f64>,
    /// Members whose overall priority exceeds the configured floor
    pub high_priority_count: usize,
    /// (ceiling - average MRR) x count x average attach x 12; `None`
    /// whenever the tier has no ceiling or no attach average, so an
    /// unknown opportunity is never reported as zero
    pub expansion_opportunity: Option<f64>,
}

/// One tier's summary plus the members and cards it was built from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentView {
    pub summary: SegmentSummary,
    /// Member accounts, frozen at build time
    pub accounts: Vec<Account>,
    /// Score cards of members that had one
    pub score_cards: HashMap<Uuid, ScoreCard>,
    pub built_at: DateTime<Utc>,
}

/// Builds segment views from account snapshots
#[derive(Debug, Clone)]
pub struct SegmentViewBuilder {
    schedule: TierSchedule,
    high_priority_floor: f64,
}

impl SegmentViewBuilder {
    pub fn new(schedule: TierSchedule, scoring: &ScoringConfig) -> Self {
        Self {
            schedule,
            high_priority_floor: scoring.high_priority_floor,
        }
    }

    /// Build the view for one tier
    ///
    /// Members are selected by computed tier, so a stale stored tier on
    /// an input account cannot place it in the wrong segment.
    ///
    /// # Errors
    /// Propagates classification failures.
    pub fn build(
        &self,
        tier: Tier,
        accounts: &[Account],
        scores: Option<&HashMap<Uuid, ScoreCard>>,
    ) -> Result<SegmentView> {
        let mut members = Vec::new();
        for account in accounts {
            if self.schedule.classify(account.mrr)? == tier {
                members.push(account.clone());
            }
        }
        Ok(self.build_view(tier, members, scores))
    }

    /// Build one view per tier from a single partitioning pass
    ///
    /// Views come back lowest tier first: the SMB view only when it has
    /// members, then every enterprise tier, empty ones included.
    ///
    /// # Errors
    /// Propagates classification failures.
    pub fn build_all(
        &self,
        accounts: &[Account],
        scores: Option<&HashMap<Uuid, ScoreCard>>,
    ) -> Result<Vec<SegmentView>> {
        let mut partitions = self.schedule.segment(accounts)?;
        let mut views = Vec::with_capacity(Tier::ALL.len());

        if let Some(smb) = partitions.remove(&Tier::Smb) {
            if !smb.is_empty() {
                views.push(self.build_view(Tier::Smb, smb, scores));
            }
        }
        for tier in Tier::ENTERPRISE {
            let members = partitions.remove(&tier).unwrap_or_default();
            views.push(self.build_view(tier, members, scores));
        }

        debug!(
            views = views.len(),
            accounts = accounts.len(),
            "Segment views built"
        );
        Ok(views)
    }

    fn build_view(
        &self,
        tier: Tier,
        members: Vec<Account>,
        scores: Option<&HashMap<Uuid, ScoreCard>>,
    ) -> SegmentView {
        let account_count = members.len();
        let total_mrr: f64 = members.iter().map(|a| a.mrr).sum();
        let average_mrr = if account_count > 0 {
            total_mrr / account_count as f64
        } else {
            0.0
        };

        let mut score_means = HashMap::new();
        let mut high_priority_count = 0;
        let mut score_cards = HashMap::new();

        if let Some(cards) = scores {
            for kind in ScoreKind::ALL {
                let values: Vec<f64> = members
                    .iter()
                    .filter_map(|a| cards.get(&a.id).and_then(|c| c.score(kind)))
                    .collect();
                if !values.is_empty() {
                    score_means.insert(kind, values.iter().sum::<f64>() / values.len() as f64);
                }
            }
            for member in &members {
                if let Some(card) = cards.get(&member.id) {
                    if card
                        .score(ScoreKind::OverallPriority)
                        .is_some_and(|p| p > self.high_priority_floor)
                    {
                        high_priority_count += 1;
                    }
                    score_cards.insert(member.id, card.clone());
                }
            }
        }

        // Both inputs must exist: expansion against an unbounded tier
        // or without attach data has no defined value
        let expansion_opportunity = match (
            self.schedule.ceiling(tier),
            score_means.get(&ScoreKind::AttachPropensity),
        ) {
            (Some(ceiling), Some(attach_mean)) => {
                Some((ceiling - average_mrr) * account_count as f64 * attach_mean * MONTHS_PER_YEAR)
            }
            _ => None,
        };

        SegmentView {
            summary: SegmentSummary {
                tier,
                label: self.schedule.label(tier).to_string(),
                account_count,
                total_mrr,
                average_mrr,
                annualized_revenue: total_mrr * MONTHS_PER_YEAR,
                score_means,
                high_priority_count,
                expansion_opportunity,
            },
            accounts: members,
            score_cards,
            built_at: Utc::now(),
        }
    }
}
