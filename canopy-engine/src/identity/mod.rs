//! Identity Resolution
//!
//! Matching of source records against unified accounts, and the
//! registry holding the (system, source id) to unified id mappings.

pub mod matcher;
pub mod registry;

pub use matcher::{AccountMatcher, MatchCandidate, MatchDisposition};
pub use registry::{IdentityRegistry, Registration, SourceKey};
