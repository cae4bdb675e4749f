//! Billing record adapter
//!
//! Raw shape exported by the billing system. The billing account number
//! is the strong billing identifier, and billing MRR is the
//! authoritative revenue figure for any account it links to.

use super::{non_blank, IngestError, SourceRecord};
use canopy_common::types::SourceSystem;
use serde::{Deserialize, Serialize};

/// One account row as the billing system exports it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillingRecord {
    /// Billing account number (required)
    pub account_number: String,
    /// Customer name on the invoice (required)
    pub customer_name: String,
    pub service_address: Option<String>,
    pub service_city: Option<String>,
    pub service_state: Option<String>,
    pub service_postal_code: Option<String>,
    /// SIC industry code, when the invoicing profile carries one
    pub sic_code: Option<String>,
    /// Back-reference into the CRM, when provisioning recorded one
    pub crm_ref: Option<String>,
    /// Invoiced monthly recurring revenue ($/month)
    pub current_mrr: f64,
}

impl TryFrom<BillingRecord> for SourceRecord {
    type Error = IngestError;

    fn try_from(raw: BillingRecord) -> Result<Self, Self::Error> {
        let source_id = raw.account_number.trim().to_string();
        if source_id.is_empty() {
            return Err(IngestError::MissingSourceId {
                system: SourceSystem::Billing,
            });
        }
        let name = raw.customer_name.trim().to_string();
        if name.is_empty() {
            return Err(IngestError::MissingName {
                system: SourceSystem::Billing,
                source_id,
            });
        }
        if !raw.current_mrr.is_finite() {
            return Err(IngestError::InvalidMrr {
                system: SourceSystem::Billing,
                source_id,
            });
        }

        Ok(SourceRecord {
            system: SourceSystem::Billing,
            billing_id: Some(source_id.clone()),
            source_id,
            name,
            address_line1: non_blank(raw.service_address),
            city: non_blank(raw.service_city),
            state: non_blank(raw.service_state),
            postal_code: non_blank(raw.service_postal_code),
            industry_code: non_blank(raw.sic_code),
            crm_id: non_blank(raw.crm_ref),
            mrr: raw.current_mrr,
        })
    }
}
