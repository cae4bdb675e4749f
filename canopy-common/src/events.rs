//! Event types for the Canopy engine
//!
//! Provides the shared event enum and EventBus used for audit and
//! notification fan-out. Resolution, merge, and reclassification
//! outcomes are broadcast so hosts can persist an audit trail or
//! stream updates without the engine knowing about either.

use crate::types::{SourceSystem, Tier};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Canopy event types
///
/// Events are broadcast via EventBus and serialize with a `type` tag so
/// hosts can forward them directly over SSE or into an audit log.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum CanopyEvent {
    /// A source record was registered under a unified account
    ///
    /// Triggers:
    /// - Audit trail: record the link
    /// - Reporting: refresh account counts
    AccountRegistered {
        /// Unified account UUID
        account_id: Uuid,
        /// Source system the record came from
        system: SourceSystem,
        /// Record id within the source system
        source_id: String,
        /// Tier assigned at registration
        tier: Tier,
        /// When registration happened
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A source record's unified id changed on re-registration
    ///
    /// Expected consequence of an upstream correction, not an error.
    ///
    /// Triggers:
    /// - Audit trail: record the correction
    /// - Monitoring: alert if re-links spike
    SourceRelinked {
        /// Source system of the re-linked record
        system: SourceSystem,
        /// Record id within the source system
        source_id: String,
        /// Unified account the record was linked to before
        old_account_id: Uuid,
        /// Unified account the record is linked to now
        new_account_id: Uuid,
        /// When the re-link happened
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A match at/above the high threshold was committed automatically
    MatchAutoAccepted {
        /// Unified account the record was linked into
        account_id: Uuid,
        /// Source system of the incoming record
        system: SourceSystem,
        /// Record id within the source system
        source_id: String,
        /// Match confidence
        confidence: f64,
        /// Contributing match reasons, for audit
        reasons: Vec<String>,
        /// When the match committed
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A match in the review band was handed to human adjudication
    ///
    /// The incoming record is registered as a provisional identity in
    /// the meantime; an accepted review merges the two accounts.
    MatchQueuedForReview {
        /// Provisional account created for the incoming record
        provisional_account_id: Uuid,
        /// Existing account the candidate points at
        candidate_account_id: Uuid,
        /// Source system of the record under adjudication
        system: SourceSystem,
        /// Record id within the source system
        source_id: String,
        /// Match confidence
        confidence: f64,
        /// Contributing match reasons, for triage
        reasons: Vec<String>,
        /// When the candidate was queued
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Two unified accounts were merged after adjudication
    AccountsMerged {
        /// Surviving account
        winner_id: Uuid,
        /// Account marked superseded
        loser_id: Uuid,
        /// Number of source links re-pointed to the winner
        relinked_sources: usize,
        /// When the merge happened
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// An account's MRR change moved it to a different tier
    AccountReclassified {
        /// Unified account UUID
        account_id: Uuid,
        /// Tier before reclassification
        old_tier: Tier,
        /// Tier after reclassification
        new_tier: Tier,
        /// MRR that drove the change
        mrr: f64,
        /// When the reclassification happened
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A segment view rebuild completed
    SegmentViewsBuilt {
        /// Number of views produced
        view_count: usize,
        /// Accounts covered by the rebuild
        account_count: usize,
        /// When the rebuild completed
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl CanopyEvent {
    /// Get event type as string for filtering
    pub fn event_type(&self) -> &str {
        match self {
            CanopyEvent::AccountRegistered { .. } => "AccountRegistered",
            CanopyEvent::SourceRelinked { .. } => "SourceRelinked",
            CanopyEvent::MatchAutoAccepted { .. } => "MatchAutoAccepted",
            CanopyEvent::MatchQueuedForReview { .. } => "MatchQueuedForReview",
            CanopyEvent::AccountsMerged { .. } => "AccountsMerged",
            CanopyEvent::AccountReclassified { .. } => "AccountReclassified",
            CanopyEvent::SegmentViewsBuilt { .. } => "SegmentViewsBuilt",
        }
    }
}

// ========================================
// EventBus Implementation
// ========================================

/// Central event distribution bus for engine events
///
/// The EventBus uses tokio::broadcast internally, providing:
/// - Non-blocking publish (slow subscribers don't block the engine)
/// - Multiple concurrent subscribers
/// - Automatic cleanup when subscribers drop
/// - Lagged message detection for slow subscribers
///
/// # Examples
///
/// ```
/// use canopy_common::events::{CanopyEvent, EventBus};
/// use canopy_common::types::{SourceSystem, Tier};
/// use uuid::Uuid;
///
/// let event_bus = EventBus::new(100);
/// let mut rx = event_bus.subscribe();
///
/// event_bus.emit_lossy(CanopyEvent::AccountRegistered {
///     account_id: Uuid::new_v4(),
///     system: SourceSystem::Crm,
///     source_id: "crm-001".to_string(),
///     tier: Tier::Smb,
///     timestamp: chrono::Utc::now(),
/// });
///
/// let received = rx.try_recv().unwrap();
/// assert_eq!(received.event_type(), "AccountRegistered");
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<CanopyEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with the specified channel capacity
    ///
    /// # Arguments
    ///
    /// * `capacity` - Number of events buffered before old events drop
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Returns a receiver for all events emitted after subscription;
    /// earlier events are not replayed.
    pub fn subscribe(&self) -> broadcast::Receiver<CanopyEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists,
    /// `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: CanopyEvent,
    ) -> Result<usize, broadcast::error::SendError<CanopyEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring whether anyone is listening
    ///
    /// The engine uses this for all of its notifications: resolution
    /// must proceed whether or not a host has attached an audit sink.
    pub fn emit_lossy(&self, event: CanopyEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
