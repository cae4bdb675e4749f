//! Resolution Pipeline
//!
//! Drives source records through lookup, matching, registration, and
//! review hand-off against an injected registry, review queue, and
//! event bus, then produces score cards and segment views from
//! consistent snapshots. Per-record data problems are isolated inside
//! a batch; invariant breaches abort it.

use crate::identity::{AccountMatcher, IdentityRegistry, MatchCandidate, MatchDisposition};
use crate::ingest::SourceRecord;
use crate::review::{ReviewItem, ReviewQueue};
use crate::scoring::{self, headroom_within_ceiling};
use crate::segments::{SegmentView, SegmentViewBuilder};
use crate::tiers::TierSchedule;
use crate::types::{Account, AccountSignals, ScoreCard};
use canopy_common::config::{EngineConfig, ScoringConfig};
use canopy_common::events::{CanopyEvent, EventBus};
use canopy_common::{Error, Result};
use chrono::Utc;
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// How one record left the pipeline
#[derive(Debug, Clone, PartialEq)]
pub enum RecordOutcome {
    /// No candidate cleared the low threshold; a fresh identity was
    /// registered
    Created { account_id: Uuid },
    /// A candidate at/above the high threshold committed automatically
    AutoLinked { account_id: Uuid, confidence: f64 },
    /// The record was already linked; its account's fields were
    /// refreshed
    Refreshed {
        account_id: Uuid,
        /// Whether the refresh moved the account to a different tier
        reclassified: bool,
    },
    /// The record was linked elsewhere, but its strong identifiers now
    /// prove a different account; the source followed the correction
    Relinked {
        account_id: Uuid,
        previous_account_id: Uuid,
    },
    /// A review-band candidate was queued and the record registered as
    /// a provisional identity pending adjudication
    QueuedForReview {
        provisional_account_id: Uuid,
        candidate_account_id: Uuid,
        item_id: Uuid,
    },
}

/// Tallies for one batch run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchOutcome {
    pub created: usize,
    pub auto_linked: usize,
    pub refreshed: usize,
    pub relinked: usize,
    pub queued_for_review: usize,
    /// Records rejected for bad input; never counts engine failures
    pub failed: usize,
}

impl BatchOutcome {
    /// Records that made it through resolution
    pub fn processed(&self) -> usize {
        self.created + self.auto_linked + self.refreshed + self.relinked + self.queued_for_review
    }
}

/// Orchestrates resolution, scoring, and view building
pub struct ResolutionPipeline {
    registry: IdentityRegistry,
    matcher: AccountMatcher,
    schedule: TierSchedule,
    scoring: ScoringConfig,
    review_queue: Box<dyn ReviewQueue>,
    events: EventBus,
}

impl ResolutionPipeline {
    /// Build a pipeline from validated configuration
    ///
    /// # Errors
    /// Returns `Error::Config` when thresholds, tier boundaries, or
    /// scoring weights fail validation; a pipeline never runs on a
    /// schedule that could fail classification later.
    pub fn new(
        config: &EngineConfig,
        review_queue: Box<dyn ReviewQueue>,
        events: EventBus,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            registry: IdentityRegistry::new(),
            matcher: AccountMatcher::new(config.matching.clone()),
            schedule: TierSchedule::new(&config.tiers)?,
            scoring: config.scoring.clone(),
            review_queue,
            events,
        })
    }

    pub fn registry(&self) -> &IdentityRegistry {
        &self.registry
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Snapshot of queued review items in triage order
    pub fn review_items(&self) -> Vec<ReviewItem> {
        self.review_queue.items()
    }

    // ========================================================================
    // Resolution
    // ========================================================================

    /// Resolve a batch of records
    ///
    /// Bad records are logged and counted, never fatal to the rest of
    /// the batch.
    ///
    /// # Errors
    /// Propagates engine failures (`Internal`, `NotFound`); input
    /// problems surface only in the `failed` tally.
    pub fn resolve_batch(&mut self, records: &[SourceRecord]) -> Result<BatchOutcome> {
        let mut outcome = BatchOutcome::default();
        for record in records {
            match self.resolve_record(record) {
                Ok(RecordOutcome::Created { .. }) => outcome.created += 1,
                Ok(RecordOutcome::AutoLinked { .. }) => outcome.auto_linked += 1,
                Ok(RecordOutcome::Refreshed { .. }) => outcome.refreshed += 1,
                Ok(RecordOutcome::Relinked { .. }) => outcome.relinked += 1,
                Ok(RecordOutcome::QueuedForReview { .. }) => outcome.queued_for_review += 1,
                Err(Error::InvalidInput(reason)) => {
                    warn!(
                        system = %record.system,
                        source_id = %record.source_id,
                        %reason,
                        "Record rejected"
                    );
                    outcome.failed += 1;
                }
                Err(other) => return Err(other),
            }
        }

        info!(
            created = outcome.created,
            auto_linked = outcome.auto_linked,
            refreshed = outcome.refreshed,
            relinked = outcome.relinked,
            queued_for_review = outcome.queued_for_review,
            failed = outcome.failed,
            "Batch resolution complete"
        );
        Ok(outcome)
    }

    /// Resolve one record
    ///
    /// Already-linked records refresh their account, unless their
    /// strong identifiers now prove a different live account, in which
    /// case the source follows the correction. Unlinked records are
    /// matched against every live account; the best candidate's
    /// disposition decides between automatic linking, review hand-off
    /// with a provisional identity, and a fresh identity.
    ///
    /// # Errors
    /// Returns `Error::InvalidInput` for a record failing validation;
    /// propagates registry and classification failures.
    pub fn resolve_record(&mut self, record: &SourceRecord) -> Result<RecordOutcome> {
        record.validate()?;

        if let Some(account_id) = self.registry.lookup(record.system, &record.source_id) {
            if let Some(correction) = self.find_correction(account_id, record) {
                return self.relink_source(account_id, correction, record);
            }
            return self.refresh_linked(account_id, record);
        }

        let live = self.registry.live_accounts();
        if let Some(candidate) = self.matcher.best_candidate(record, &live) {
            match self.matcher.disposition(candidate.confidence) {
                MatchDisposition::AutoAccept => return self.link_into(candidate, record),
                MatchDisposition::Review => return self.queue_for_review(candidate, record),
                // Below the low threshold candidates are already
                // filtered out; fall through to a fresh identity
                MatchDisposition::Distinct => {}
            }
        }

        let account_id = self.register_new_identity(record)?;
        Ok(RecordOutcome::Created { account_id })
    }

    fn refresh_linked(&mut self, account_id: Uuid, record: &SourceRecord) -> Result<RecordOutcome> {
        let account = self.registry.get(account_id).ok_or_else(|| {
            Error::Internal(format!(
                "source index points at missing account {account_id}"
            ))
        })?;

        let mut updated = account.clone();
        let old_tier = updated.tier;
        updated.absorb_record(record);
        let updated = self.schedule.classify_account(&updated)?;
        let tier_changed = updated.tier != old_tier;

        if tier_changed {
            info!(
                account_id = %account_id,
                old_tier = %old_tier,
                new_tier = %updated.tier,
                mrr = updated.mrr,
                "Account reclassified on refresh"
            );
            self.events.emit_lossy(CanopyEvent::AccountReclassified {
                account_id,
                old_tier,
                new_tier: updated.tier,
                mrr: updated.mrr,
                timestamp: Utc::now(),
            });
        }

        self.registry.update_account(updated)?;
        debug!(
            system = %record.system,
            source_id = %record.source_id,
            account_id = %account_id,
            "Linked record refreshed"
        );
        Ok(RecordOutcome::Refreshed {
            account_id,
            reclassified: tier_changed,
        })
    }

    /// Re-link check for an already-linked record
    ///
    /// A linked record normally refreshes its account in place. When
    /// its strong identifiers prove a different live account, the
    /// upstream system has corrected the linkage and the source must
    /// follow it. Fuzzy evidence never moves a linked source.
    fn find_correction(&self, current_id: Uuid, record: &SourceRecord) -> Option<MatchCandidate> {
        let identified = self
            .matcher
            .identified_account(record, &self.registry.live_accounts())?;
        if identified.account_id == current_id {
            return None;
        }
        Some(identified)
    }

    fn relink_source(
        &mut self,
        previous_account_id: Uuid,
        correction: MatchCandidate,
        record: &SourceRecord,
    ) -> Result<RecordOutcome> {
        let account = self.registry.get(correction.account_id).ok_or_else(|| {
            Error::Internal(format!(
                "match candidate points at missing account {}",
                correction.account_id
            ))
        })?;

        let mut updated = account.clone();
        let old_tier = updated.tier;
        updated.absorb_record(record);
        let updated = self.schedule.classify_account(&updated)?;
        let tier_changed = updated.tier != old_tier;
        let new_tier = updated.tier;
        let new_mrr = updated.mrr;

        // register() re-points the source key and strips the link from
        // the previous account
        self.registry
            .register(updated, record.system, &record.source_id)?;

        self.events.emit_lossy(CanopyEvent::SourceRelinked {
            system: record.system,
            source_id: record.source_id.clone(),
            old_account_id: previous_account_id,
            new_account_id: correction.account_id,
            timestamp: Utc::now(),
        });
        if tier_changed {
            self.events.emit_lossy(CanopyEvent::AccountReclassified {
                account_id: correction.account_id,
                old_tier,
                new_tier,
                mrr: new_mrr,
                timestamp: Utc::now(),
            });
        }

        info!(
            system = %record.system,
            source_id = %record.source_id,
            previous_account_id = %previous_account_id,
            account_id = %correction.account_id,
            confidence = correction.confidence,
            "Corrected record re-linked"
        );
        Ok(RecordOutcome::Relinked {
            account_id: correction.account_id,
            previous_account_id,
        })
    }

    fn link_into(&mut self, candidate: MatchCandidate, record: &SourceRecord) -> Result<RecordOutcome> {
        let account = self.registry.get(candidate.account_id).ok_or_else(|| {
            Error::Internal(format!(
                "match candidate points at missing account {}",
                candidate.account_id
            ))
        })?;

        let mut updated = account.clone();
        let old_tier = updated.tier;
        updated.absorb_record(record);
        let updated = self.schedule.classify_account(&updated)?;
        let tier_changed = updated.tier != old_tier;
        let new_tier = updated.tier;
        let new_mrr = updated.mrr;

        self.registry
            .register(updated, record.system, &record.source_id)?;

        self.events.emit_lossy(CanopyEvent::MatchAutoAccepted {
            account_id: candidate.account_id,
            system: record.system,
            source_id: record.source_id.clone(),
            confidence: candidate.confidence,
            reasons: candidate.reasons.clone(),
            timestamp: Utc::now(),
        });
        if tier_changed {
            self.events.emit_lossy(CanopyEvent::AccountReclassified {
                account_id: candidate.account_id,
                old_tier,
                new_tier,
                mrr: new_mrr,
                timestamp: Utc::now(),
            });
        }

        info!(
            account_id = %candidate.account_id,
            system = %record.system,
            source_id = %record.source_id,
            confidence = candidate.confidence,
            "Match auto-accepted"
        );
        Ok(RecordOutcome::AutoLinked {
            account_id: candidate.account_id,
            confidence: candidate.confidence,
        })
    }

    fn queue_for_review(
        &mut self,
        candidate: MatchCandidate,
        record: &SourceRecord,
    ) -> Result<RecordOutcome> {
        // The record gets its own identity up front; an accepted review
        // merges it, a rejected one leaves it standing
        let provisional_account_id = self.register_new_identity(record)?;

        let item = ReviewItem::new(
            provisional_account_id,
            candidate.clone(),
            self.matcher.thresholds(),
        );
        let item_id = item.id;
        self.review_queue.push(item)?;

        self.events.emit_lossy(CanopyEvent::MatchQueuedForReview {
            provisional_account_id,
            candidate_account_id: candidate.account_id,
            system: record.system,
            source_id: record.source_id.clone(),
            confidence: candidate.confidence,
            reasons: candidate.reasons.clone(),
            timestamp: Utc::now(),
        });
        Ok(RecordOutcome::QueuedForReview {
            provisional_account_id,
            candidate_account_id: candidate.account_id,
            item_id,
        })
    }

    fn register_new_identity(&mut self, record: &SourceRecord) -> Result<Uuid> {
        let account = Account::from_record(record, &self.schedule)?;
        let account_id = account.id;
        let tier = account.tier;
        self.registry
            .register(account, record.system, &record.source_id)?;

        self.events.emit_lossy(CanopyEvent::AccountRegistered {
            account_id,
            system: record.system,
            source_id: record.source_id.clone(),
            tier,
            timestamp: Utc::now(),
        });
        debug!(
            account_id = %account_id,
            system = %record.system,
            source_id = %record.source_id,
            tier = %tier,
            "New identity registered"
        );
        Ok(account_id)
    }

    // ========================================================================
    // Adjudication
    // ========================================================================

    /// Accept a queued match: merge the provisional identity into the
    /// candidate's account
    ///
    /// Returns the surviving account id.
    ///
    /// # Errors
    /// Returns `Error::NotFound` for an unknown item id; propagates
    /// merge failures.
    pub fn commit_match(&mut self, item_id: Uuid) -> Result<Uuid> {
        let item = self.review_queue.take(item_id).ok_or_else(|| {
            Error::NotFound(format!("review item {item_id} not queued"))
        })?;

        let winner_id = item.candidate.account_id;
        let loser_id = item.provisional_account_id;
        let relinked = self.registry.merge(winner_id, loser_id)?;

        self.events.emit_lossy(CanopyEvent::AccountsMerged {
            winner_id,
            loser_id,
            relinked_sources: relinked,
            timestamp: Utc::now(),
        });
        info!(
            winner_id = %winner_id,
            loser_id = %loser_id,
            confidence = item.candidate.confidence,
            "Review accepted; accounts merged"
        );
        Ok(winner_id)
    }

    /// Reject a queued match: both identities stay distinct
    ///
    /// # Errors
    /// Returns `Error::NotFound` for an unknown item id.
    pub fn reject_match(&mut self, item_id: Uuid) -> Result<()> {
        let item = self.review_queue.take(item_id).ok_or_else(|| {
            Error::NotFound(format!("review item {item_id} not queued"))
        })?;
        debug!(
            item_id = %item.id,
            provisional_account_id = %item.provisional_account_id,
            candidate_account_id = %item.candidate.account_id,
            "Review rejected; identities stay distinct"
        );
        Ok(())
    }

    // ========================================================================
    // Scoring & Views
    // ========================================================================

    /// Score every live account
    ///
    /// Supplied signals are used as-is per account; a missing headroom
    /// signal is derived from the account's position under its tier
    /// ceiling. Accounts without supplied signals score from defaults.
    ///
    /// # Errors
    /// Propagates scorer failures.
    pub fn score_batch(
        &self,
        signals: &HashMap<Uuid, AccountSignals>,
    ) -> Result<HashMap<Uuid, ScoreCard>> {
        let snapshot = self.registry.live_accounts();
        let mut cards = HashMap::with_capacity(snapshot.len());
        for account in &snapshot {
            let mut account_signals = signals.get(&account.id).cloned().unwrap_or_default();
            if account_signals.mrr_headroom.is_none() {
                account_signals.mrr_headroom = headroom_within_ceiling(account, &self.schedule);
            }
            let card = scoring::score_account(account, &account_signals, &self.scoring)?;
            cards.insert(account.id, card);
        }

        debug!(accounts = cards.len(), "Batch scoring complete");
        Ok(cards)
    }

    /// Build segment views over a frozen snapshot of live accounts
    ///
    /// # Errors
    /// Propagates classification failures.
    pub fn build_views(
        &self,
        scores: Option<&HashMap<Uuid, ScoreCard>>,
    ) -> Result<Vec<SegmentView>> {
        let snapshot = self.registry.live_accounts();
        let builder = SegmentViewBuilder::new(self.schedule.clone(), &self.scoring);
        let views = builder.build_all(&snapshot, scores)?;

        self.events.emit_lossy(CanopyEvent::SegmentViewsBuilt {
            view_count: views.len(),
            account_count: snapshot.len(),
            timestamp: Utc::now(),
        });
        Ok(views)
    }
}
