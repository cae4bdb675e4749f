//! Core domain types for the Canopy engine
//!
//! The unified `Account`, its source links, externally supplied scoring
//! signals, and the score result/card shapes consumed by segment views.
//! Classification and scoring return new values instead of mutating
//! shared instances, so concurrent readers never observe a half-updated
//! account.

use crate::ingest::SourceRecord;
use crate::similarity;
use crate::tiers::TierSchedule;
use canopy_common::types::{ScoreKind, SourceSystem, Tier};
use canopy_common::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Account
// ============================================================================

/// Link from a unified account back to one source-system record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRef {
    /// System the record lives in
    pub system: SourceSystem,
    /// Record id within that system
    pub source_id: String,
}

impl SourceRef {
    pub fn new(system: SourceSystem, source_id: impl Into<String>) -> Self {
        Self {
            system,
            source_id: source_id.into(),
        }
    }
}

/// Canonical representation of a business customer
///
/// Tier and enterprise flag are derived state: always recomputed from
/// MRR through the tier schedule, never set independently. Accounts are
/// never deleted; merging marks the losing identity superseded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    /// Unified account identifier
    pub id: Uuid,
    /// Source records linked to this account (many-to-one)
    pub sources: Vec<SourceRef>,
    /// Display name as supplied by the richest source
    pub name: String,
    /// Cached normalized name used for matching
    pub normalized_name: String,
    /// First address line
    pub address_line1: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    /// Industry classification code
    pub industry_code: Option<String>,
    /// Strong identifier from the billing system
    pub billing_id: Option<String>,
    /// Strong identifier from the external CRM
    pub crm_id: Option<String>,
    /// Current monthly recurring revenue ($/month)
    pub mrr: f64,
    /// Revenue tier, derived from MRR
    pub tier: Tier,
    /// Whether MRR is at/above the enterprise threshold, derived
    pub is_enterprise: bool,
    /// Set when this identity was merged into another account
    pub superseded: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Build a new unified account from a source record
    ///
    /// Assigns a fresh unified id, caches the normalized name, links the
    /// originating record, and classifies tier + enterprise flag so the
    /// derived-state invariant holds from the first moment.
    ///
    /// # Errors
    /// Returns `Error::Internal` if the schedule cannot classify the
    /// record's MRR (unreachable for a validated schedule).
    pub fn from_record(record: &SourceRecord, schedule: &TierSchedule) -> Result<Self> {
        let tier = schedule.classify(record.mrr)?;
        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            sources: vec![SourceRef::new(record.system, record.source_id.clone())],
            name: record.name.clone(),
            normalized_name: similarity::normalize_name(&record.name),
            address_line1: record.address_line1.clone(),
            city: record.city.clone(),
            state: record.state.clone(),
            postal_code: record.postal_code.clone(),
            industry_code: record.industry_code.clone(),
            billing_id: record.billing_id.clone(),
            crm_id: record.crm_id.clone(),
            mrr: record.mrr,
            tier,
            is_enterprise: tier.is_enterprise(),
            superseded: false,
            created_at: now,
            updated_at: now,
        })
    }

    /// Whether this account carries a link to the given source record
    pub fn has_source(&self, system: SourceSystem, source_id: &str) -> bool {
        self.sources
            .iter()
            .any(|s| s.system == system && s.source_id == source_id)
    }

    /// The account's current fused fields, viewed as a source record
    ///
    /// Used when matching an incoming record against existing accounts:
    /// the record identity is the account's first-registered source, the
    /// field values are the account's current fused state. `None` only
    /// for an account with no source links.
    pub fn canonical_record(&self) -> Option<SourceRecord> {
        let primary = self.sources.first()?;
        Some(SourceRecord {
            system: primary.system,
            source_id: primary.source_id.clone(),
            name: self.name.clone(),
            address_line1: self.address_line1.clone(),
            city: self.city.clone(),
            state: self.state.clone(),
            postal_code: self.postal_code.clone(),
            industry_code: self.industry_code.clone(),
            billing_id: self.billing_id.clone(),
            crm_id: self.crm_id.clone(),
            mrr: self.mrr,
        })
    }

    /// Fold a newly linked record's fields into this account
    ///
    /// Fills identifiers and address fields the account is missing;
    /// never overwrites present values. MRR is refreshed only from the
    /// billing system, which is authoritative for revenue.
    pub fn absorb_record(&mut self, record: &SourceRecord) {
        if self.billing_id.is_none() {
            self.billing_id = record.billing_id.clone();
        }
        if self.crm_id.is_none() {
            self.crm_id = record.crm_id.clone();
        }
        if self.address_line1.is_none() {
            self.address_line1 = record.address_line1.clone();
        }
        if self.city.is_none() {
            self.city = record.city.clone();
        }
        if self.state.is_none() {
            self.state = record.state.clone();
        }
        if self.postal_code.is_none() {
            self.postal_code = record.postal_code.clone();
        }
        if self.industry_code.is_none() {
            self.industry_code = record.industry_code.clone();
        }
        if record.system == SourceSystem::Billing {
            self.mrr = record.mrr;
        }
        self.updated_at = Utc::now();
    }
}

// ============================================================================
// Scoring Inputs
// ============================================================================

/// Externally supplied signals consumed by the account scorer
///
/// Every field is optional; a missing signal contributes zero to the
/// score it feeds, it never fails a calculation. Product-holding flags
/// default to "not held".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountSignals {
    /// Account holds a connectivity product
    pub has_connectivity: bool,
    /// Account holds SD-WAN
    pub has_sdwan: bool,
    /// Account holds SASE
    pub has_sase: bool,
    /// Account holds managed services
    pub has_managed_services: bool,
    /// Fraction of the tier ceiling still unrealized, in [0, 1]
    pub mrr_headroom: Option<f64>,
    /// Circuit utilization as a fraction in [0, 1]
    pub bandwidth_utilization: Option<f64>,
    /// Number of connected sites
    pub site_count: Option<u32>,
    /// Months since the account last expanded
    pub months_since_last_expansion: Option<u32>,
    /// Severity-1 incidents in the recent support window
    pub recent_sev1_incidents: Option<u32>,
    /// Relationship satisfaction score; negative values signal distress
    pub satisfaction_score: Option<f64>,
    /// Months left on the current contract term
    pub contract_months_remaining: Option<u32>,
}

// ============================================================================
// Score Results
// ============================================================================

/// One scored dimension for one account
///
/// Prior results are superseded by recomputation, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    /// Account the score belongs to
    pub account_id: Uuid,
    /// Which dimension this score measures
    pub kind: ScoreKind,
    /// Normalized score in [0, 1]
    pub score: f64,
    /// Labels for every factor that contributed
    pub factors: Vec<String>,
    /// When the score was calculated
    pub calculated_at: DateTime<Utc>,
}

impl ScoreResult {
    /// Create a score result, clamping the score into [0, 1]
    pub fn new(account_id: Uuid, kind: ScoreKind, score: f64, factors: Vec<String>) -> Self {
        Self {
            account_id,
            kind,
            score: score.clamp(0.0, 1.0),
            factors,
            calculated_at: Utc::now(),
        }
    }
}

/// The full set of scores computed for one account
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreCard {
    pub account_id: Uuid,
    pub growth: Option<ScoreResult>,
    pub churn: Option<ScoreResult>,
    pub attach: Option<ScoreResult>,
    pub priority: Option<ScoreResult>,
}

impl ScoreCard {
    pub fn new(account_id: Uuid) -> Self {
        Self {
            account_id,
            ..Default::default()
        }
    }

    /// Look up the score value for one dimension, if computed
    pub fn score(&self, kind: ScoreKind) -> Option<f64> {
        self.result(kind).map(|r| r.score)
    }

    /// Look up the full result for one dimension, if computed
    pub fn result(&self, kind: ScoreKind) -> Option<&ScoreResult> {
        match kind {
            ScoreKind::GrowthPotential => self.growth.as_ref(),
            ScoreKind::ChurnRisk => self.churn.as_ref(),
            ScoreKind::AttachPropensity => self.attach.as_ref(),
            ScoreKind::OverallPriority => self.priority.as_ref(),
        }
    }

    /// Store a result under its own dimension
    pub fn set(&mut self, result: ScoreResult) {
        match result.kind {
            ScoreKind::GrowthPotential => self.growth = Some(result),
            ScoreKind::ChurnRisk => self.churn = Some(result),
            ScoreKind::AttachPropensity => self.attach = Some(result),
            ScoreKind::OverallPriority => self.priority = Some(result),
        }
    }
}
