//! # Canopy Resolution Engine (canopy-engine)
//!
//! Identity resolution and segmentation for customer accounts.
//!
//! **Purpose:** Fuse account records from CRM and billing exports into
//! unified identities, classify each identity into a revenue tier,
//! score it along four go-to-market dimensions, and aggregate tiers
//! into segment views.
//!
//! **Architecture:** A synchronous [`pipeline::ResolutionPipeline`]
//! drives ingest adapters, the identifier/fuzzy matcher, the identity
//! registry, the review queue, and the scorers; hosts observe progress
//! through the `canopy-common` event bus.

pub mod identity;
pub mod ingest;
pub mod pipeline;
pub mod review;
pub mod scoring;
pub mod segments;
pub mod similarity;
pub mod tiers;
pub mod types;

pub use pipeline::{BatchOutcome, RecordOutcome, ResolutionPipeline};
pub use types::{Account, AccountSignals, ScoreCard, ScoreResult};
