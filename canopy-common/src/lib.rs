//! # Canopy Common Library
//!
//! Shared code for the Canopy engine crates including:
//! - Event types (CanopyEvent enum) and the EventBus
//! - Engine configuration loading and validation
//! - Common error type
//! - Shared domain vocabulary (tiers, score kinds, source systems)

pub mod config;
pub mod error;
pub mod events;
pub mod types;

pub use error::{Error, Result};
pub use types::{ScoreKind, SourceSystem, Tier};
