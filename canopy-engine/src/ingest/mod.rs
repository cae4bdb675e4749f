//! Source record ingestion
//!
//! Upstream systems each export their own raw record shape; every shape
//! is translated into the canonical `SourceRecord` before it reaches the
//! matcher or classifier. Translation is where identifier hygiene
//! happens: blank strings are normalized to absent so an empty id can
//! never satisfy an identifier match downstream.

mod billing;
mod crm;

pub use billing::BillingRecord;
pub use crm::CrmRecord;

use canopy_common::types::SourceSystem;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Ingest translation errors
#[derive(Debug, Error)]
pub enum IngestError {
    /// Source record id missing or blank
    #[error("missing source record id on {system} record")]
    MissingSourceId { system: SourceSystem },

    /// Account name missing or blank
    #[error("missing account name on {system} record {source_id}")]
    MissingName {
        system: SourceSystem,
        source_id: String,
    },

    /// MRR not a finite number
    #[error("non-finite MRR on {system} record {source_id}")]
    InvalidMrr {
        system: SourceSystem,
        source_id: String,
    },
}

impl From<IngestError> for canopy_common::Error {
    fn from(err: IngestError) -> Self {
        canopy_common::Error::InvalidInput(err.to_string())
    }
}

/// Canonical ingest shape shared by all upstream systems
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRecord {
    /// System the record originates from
    pub system: SourceSystem,
    /// Record id within the source system
    pub source_id: String,
    /// Account name as the source knows it
    pub name: String,
    pub address_line1: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub industry_code: Option<String>,
    /// Strong identifier into the billing system, if the source has one
    pub billing_id: Option<String>,
    /// Strong identifier into the CRM, if the source has one
    pub crm_id: Option<String>,
    /// Monthly recurring revenue ($/month); 0.0 when the source does
    /// not track revenue
    pub mrr: f64,
}

impl SourceRecord {
    /// Check the invariants every canonical record must satisfy
    ///
    /// Adapter conversions enforce these already; records constructed by
    /// hand go through the same gate in the pipeline.
    ///
    /// # Errors
    /// Returns the first violated `IngestError`.
    pub fn validate(&self) -> Result<(), IngestError> {
        if self.source_id.trim().is_empty() {
            return Err(IngestError::MissingSourceId {
                system: self.system,
            });
        }
        if self.name.trim().is_empty() {
            return Err(IngestError::MissingName {
                system: self.system,
                source_id: self.source_id.clone(),
            });
        }
        if !self.mrr.is_finite() {
            return Err(IngestError::InvalidMrr {
                system: self.system,
                source_id: self.source_id.clone(),
            });
        }
        Ok(())
    }
}

/// Normalize an optional field: trimmed content or absent
///
/// An empty or whitespace-only string must behave exactly like a
/// missing value, especially for strong identifiers.
pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value.and_then(|v| {
        let trimmed = v.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_record() -> SourceRecord {
        SourceRecord {
            system: SourceSystem::Ticketing,
            source_id: "tkt-1".to_string(),
            name: "Acme".to_string(),
            address_line1: None,
            city: None,
            state: None,
            postal_code: None,
            industry_code: None,
            billing_id: None,
            crm_id: None,
            mrr: 0.0,
        }
    }

    #[test]
    fn test_validate_accepts_minimal_record() {
        assert!(valid_record().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_blank_source_id() {
        let mut record = valid_record();
        record.source_id = "  ".to_string();
        assert!(matches!(
            record.validate(),
            Err(IngestError::MissingSourceId { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_blank_name() {
        let mut record = valid_record();
        record.name = String::new();
        assert!(matches!(
            record.validate(),
            Err(IngestError::MissingName { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_non_finite_mrr() {
        let mut record = valid_record();
        record.mrr = f64::NAN;
        assert!(matches!(
            record.validate(),
            Err(IngestError::InvalidMrr { .. })
        ));
    }

    #[test]
    fn test_non_blank_normalization() {
        assert_eq!(non_blank(None), None);
        assert_eq!(non_blank(Some(String::new())), None);
        assert_eq!(non_blank(Some("   ".to_string())), None);
        assert_eq!(non_blank(Some(" B100 ".to_string())), Some("B100".to_string()));
    }
}
