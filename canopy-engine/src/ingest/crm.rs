//! CRM record adapter
//!
//! Raw shape exported by the CRM. The CRM's own account id doubles as
//! the strong CRM identifier; a billing reference is present only when
//! sales has linked the account to an invoice history.

use super::{non_blank, IngestError, SourceRecord};
use canopy_common::types::SourceSystem;
use serde::{Deserialize, Serialize};

/// One account row as the CRM exports it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrmRecord {
    /// CRM account id (required)
    pub account_id: String,
    /// Account display name (required)
    pub account_name: String,
    pub billing_street: Option<String>,
    pub billing_city: Option<String>,
    pub billing_state: Option<String>,
    pub billing_postal_code: Option<String>,
    /// Free-form industry classification
    pub industry: Option<String>,
    /// Reference into the billing system, when sales linked one
    pub billing_account_ref: Option<String>,
    /// Sales-entered revenue estimate; billing remains authoritative
    pub monthly_recurring_revenue: Option<f64>,
}

impl TryFrom<CrmRecord> for SourceRecord {
    type Error = IngestError;

    fn try_from(raw: CrmRecord) -> Result<Self, Self::Error> {
        let source_id = raw.account_id.trim().to_string();
        if source_id.is_empty() {
            return Err(IngestError::MissingSourceId {
                system: SourceSystem::Crm,
            });
        }
        let name = raw.account_name.trim().to_string();
        if name.is_empty() {
            return Err(IngestError::MissingName {
                system: SourceSystem::Crm,
                source_id,
            });
        }
        let mrr = raw.monthly_recurring_revenue.unwrap_or(0.0);
        if !mrr.is_finite() {
            return Err(IngestError::InvalidMrr {
                system: SourceSystem::Crm,
                source_id,
            });
        }

        Ok(SourceRecord {
            system: SourceSystem::Crm,
            crm_id: Some(source_id.clone()),
            source_id,
            name,
            address_line1: non_blank(raw.billing_street),
            city: non_blank(raw.billing_city),
            state: non_blank(raw.billing_state),
            postal_code: non_blank(raw.billing_postal_code),
            industry_code: non_blank(raw.industry),
            billing_id: non_blank(raw.billing_account_ref),
            mrr,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_record() -> CrmRecord {
        CrmRecord {
            account_id: "crm-100".to_string(),
            account_name: "Acme Widgets Inc.".to_string(),
            billing_street: Some("123 Main St".to_string()),
            billing_city: Some("Springfield".to_string()),
            billing_state: Some("IL".to_string()),
            billing_postal_code: Some("62704".to_string()),
            industry: Some("5112".to_string()),
            billing_account_ref: Some("B100".to_string()),
            monthly_recurring_revenue: Some(12_000.0),
        }
    }

    #[test]
    fn test_crm_conversion_carries_both_strong_ids() {
        let record = SourceRecord::try_from(raw_record()).unwrap();

        assert_eq!(record.system, SourceSystem::Crm);
        assert_eq!(record.source_id, "crm-100");
        assert_eq!(record.crm_id.as_deref(), Some("crm-100"));
        assert_eq!(record.billing_id.as_deref(), Some("B100"));
        assert_eq!(record.mrr, 12_000.0);
    }

    #[test]
    fn test_crm_blank_billing_ref_becomes_absent() {
        let mut raw = raw_record();
        raw.billing_account_ref = Some("   ".to_string());
        let record = SourceRecord::try_from(raw).unwrap();
        assert_eq!(record.billing_id, None);
    }

    #[test]
    fn test_crm_missing_revenue_defaults_to_zero() {
        let mut raw = raw_record();
        raw.monthly_recurring_revenue = None;
        let record = SourceRecord::try_from(raw).unwrap();
        assert_eq!(record.mrr, 0.0);
    }

    #[test]
    fn test_crm_blank_account_id_rejected() {
        let mut raw = raw_record();
        raw.account_id = String::new();
        assert!(matches!(
            SourceRecord::try_from(raw),
            Err(IngestError::MissingSourceId { .. })
        ));
    }

    #[test]
    fn test_crm_deserializes_from_export_json() {
        let json = r#"{
            "account_id": "crm-7",
            "account_name": "Globex",
            "billing_postal_code": "10001",
            "monthly_recurring_revenue": 2500.0
        }"#;
        let raw: CrmRecord = serde_json::from_str(json).unwrap();
        let record = SourceRecord::try_from(raw).unwrap();
        assert_eq!(record.postal_code.as_deref(), Some("10001"));
        assert_eq!(record.billing_id, None);
    }
}
