//! Review Queue
//!
//! Hand-off seam for matches in the human-adjudication band. The
//! engine pushes review items; a host drains them through whatever
//! workflow it runs and answers back through the pipeline's commit and
//! reject operations. The in-memory queue is the default
//! implementation and the one the test suite drives.

use crate::identity::MatchCandidate;
use canopy_common::config::MatchThresholds;
use canopy_common::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

/// Triage bucket within the review band
///
/// The medium threshold splits the band: at/above it a match is
/// probable and worth a reviewer's time first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewPriority {
    Probable,
    Possible,
}

impl ReviewPriority {
    /// Bucket a confidence using the configured medium threshold
    pub fn from_confidence(confidence: f64, thresholds: &MatchThresholds) -> Self {
        if confidence >= thresholds.medium {
            ReviewPriority::Probable
        } else {
            ReviewPriority::Possible
        }
    }
}

impl std::fmt::Display for ReviewPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReviewPriority::Probable => write!(f, "probable"),
            ReviewPriority::Possible => write!(f, "possible"),
        }
    }
}

/// One queued match awaiting adjudication
///
/// The incoming record is already registered under the provisional
/// account; accepting the item merges the provisional identity into
/// the candidate's account, rejecting leaves both identities distinct.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewItem {
    /// Queue item id
    pub id: Uuid,
    /// Provisional account registered for the incoming record
    pub provisional_account_id: Uuid,
    /// The match being adjudicated
    pub candidate: MatchCandidate,
    /// Triage bucket
    pub priority: ReviewPriority,
    pub queued_at: DateTime<Utc>,
}

impl ReviewItem {
    pub fn new(
        provisional_account_id: Uuid,
        candidate: MatchCandidate,
        thresholds: &MatchThresholds,
    ) -> Self {
        let priority = ReviewPriority::from_confidence(candidate.confidence, thresholds);
        Self {
            id: Uuid::new_v4(),
            provisional_account_id,
            candidate,
            priority,
            queued_at: Utc::now(),
        }
    }
}

/// Sink for matches that need human adjudication
pub trait ReviewQueue: Send {
    /// Queue an item for review
    fn push(&mut self, item: ReviewItem) -> Result<()>;

    /// Remove and return an item by id, if queued
    fn take(&mut self, item_id: Uuid) -> Option<ReviewItem>;

    /// Snapshot of queued items in triage order: probable matches
    /// first, higher confidence first within a bucket
    fn items(&self) -> Vec<ReviewItem>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Queue backed by a plain vector
#[derive(Debug, Default)]
pub struct InMemoryReviewQueue {
    items: Vec<ReviewItem>,
}

impl InMemoryReviewQueue {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ReviewQueue for InMemoryReviewQueue {
    fn push(&mut self, item: ReviewItem) -> Result<()> {
        debug!(
            item_id = %item.id,
            provisional_account_id = %item.provisional_account_id,
            candidate_account_id = %item.candidate.account_id,
            confidence = item.candidate.confidence,
            priority = %item.priority,
            "Match queued for review"
        );
        self.items.push(item);
        Ok(())
    }

    fn take(&mut self, item_id: Uuid) -> Option<ReviewItem> {
        let position = self.items.iter().position(|i| i.id == item_id)?;
        Some(self.items.remove(position))
    }

    fn items(&self) -> Vec<ReviewItem> {
        let mut snapshot = self.items.clone();
        snapshot.sort_by(|a, b| {
            a.priority.cmp(&b.priority).then_with(|| {
                b.candidate
                    .confidence
                    .partial_cmp(&a.candidate.confidence)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
        });
        snapshot
    }

    fn len(&self) -> usize {
        self.items.len()
    }
}
