//! Identity Registry
//!
//! In-memory mapping from (source system, source id) to unified account
//! id, plus the account store itself. Every source key maps to at most
//! one unified id at a time; a unified account may carry many source
//! keys. Mutation happens only through explicit registration and merge,
//! never as a side effect of scoring or matching.

use crate::types::{Account, SourceRef};
use canopy_common::types::SourceSystem;
use canopy_common::{Error, Result};
use chrono::Utc;
use std::collections::HashMap;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Key identifying one record in one upstream system
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceKey {
    pub system: SourceSystem,
    pub source_id: String,
}

impl SourceKey {
    pub fn new(system: SourceSystem, source_id: impl Into<String>) -> Self {
        Self {
            system,
            source_id: source_id.into(),
        }
    }
}

/// Outcome of a registration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    /// Unified account the source key now maps to
    pub account_id: Uuid,
    /// Previous unified id when the key was re-pointed, `None` for a
    /// fresh or idempotent registration
    pub relinked_from: Option<Uuid>,
}

/// Store of unified accounts and their source mappings
///
/// Single-threaded by construction; a concurrent host wraps the whole
/// registry in one lock so lookup-then-register sequences stay atomic.
#[derive(Debug, Default)]
pub struct IdentityRegistry {
    accounts: HashMap<Uuid, Account>,
    source_index: HashMap<SourceKey, Uuid>,
}

impl IdentityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an account under a source key
    ///
    /// Stores (or overwrites) the account under its unified id, points
    /// the source key at it, and guarantees the account carries the
    /// matching source link. Registering the same key with the same
    /// unified id again is an idempotent refresh. Registering it with a
    /// different unified id re-links the key: the old account loses the
    /// source link and the change is logged as an upstream correction.
    ///
    /// # Errors
    /// Returns `Error::InvalidInput` for a blank source id or a
    /// superseded account.
    pub fn register(
        &mut self,
        mut account: Account,
        system: SourceSystem,
        source_id: &str,
    ) -> Result<Registration> {
        let source_id = source_id.trim();
        if source_id.is_empty() {
            return Err(Error::InvalidInput(
                "source id must be non-empty".to_string(),
            ));
        }
        if account.superseded {
            return Err(Error::InvalidInput(format!(
                "cannot register source {system}/{source_id} under superseded account {}",
                account.id
            )));
        }

        let key = SourceKey::new(system, source_id);
        let unified_id = account.id;
        let previous = self.source_index.get(&key).copied();

        let relinked_from = match previous {
            Some(old_id) if old_id != unified_id => {
                if let Some(old_account) = self.accounts.get_mut(&old_id) {
                    old_account
                        .sources
                        .retain(|s| !(s.system == system && s.source_id == source_id));
                    old_account.updated_at = Utc::now();
                }
                warn!(
                    system = %system,
                    source_id = %source_id,
                    old_account_id = %old_id,
                    new_account_id = %unified_id,
                    "Source record re-linked to a different unified account"
                );
                Some(old_id)
            }
            _ => None,
        };

        if !account.has_source(system, source_id) {
            account.sources.push(SourceRef::new(system, source_id));
        }

        self.source_index.insert(key, unified_id);
        self.accounts.insert(unified_id, account);

        debug!(
            system = %system,
            source_id = %source_id,
            account_id = %unified_id,
            "Source record registered"
        );

        Ok(Registration {
            account_id: unified_id,
            relinked_from,
        })
    }

    /// Unified id a source key currently maps to
    pub fn lookup(&self, system: SourceSystem, source_id: &str) -> Option<Uuid> {
        self.source_index
            .get(&SourceKey::new(system, source_id.trim()))
            .copied()
    }

    /// Account stored under a unified id
    pub fn get(&self, account_id: Uuid) -> Option<&Account> {
        self.accounts.get(&account_id)
    }

    /// Replace a stored account with an updated value
    ///
    /// Source mappings are untouched; use `register` to change them.
    ///
    /// # Errors
    /// Returns `Error::NotFound` if no account exists under the id.
    pub fn update_account(&mut self, account: Account) -> Result<()> {
        if !self.accounts.contains_key(&account.id) {
            return Err(Error::NotFound(format!(
                "account {} not in registry",
                account.id
            )));
        }
        self.accounts.insert(account.id, account);
        Ok(())
    }

    /// Merge the loser account into the winner
    ///
    /// Re-points every one of the loser's source keys at the winner,
    /// moves the source links across, and fills winner fields the
    /// winner is missing from the loser. The winner keeps its own name
    /// and MRR. The loser stays in the store, marked superseded with no
    /// source links, so historical references still resolve.
    ///
    /// Returns the number of source links re-pointed.
    ///
    /// # Errors
    /// Returns `Error::InvalidInput` when winner and loser are the same
    /// account or either is already superseded, `Error::NotFound` when
    /// either id is unknown.
    pub fn merge(&mut self, winner_id: Uuid, loser_id: Uuid) -> Result<usize> {
        if winner_id == loser_id {
            return Err(Error::InvalidInput(
                "cannot merge an account into itself".to_string(),
            ));
        }
        let loser = self
            .accounts
            .get(&loser_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("merge loser {loser_id} not in registry")))?;
        let mut winner = self
            .accounts
            .get(&winner_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("merge winner {winner_id} not in registry")))?;
        if winner.superseded || loser.superseded {
            return Err(Error::InvalidInput(format!(
                "merge of {winner_id} and {loser_id} involves a superseded account"
            )));
        }

        let now = Utc::now();
        let mut relinked = 0usize;
        for source in &loser.sources {
            self.source_index
                .insert(SourceKey::new(source.system, source.source_id.clone()), winner_id);
            if !winner.has_source(source.system, &source.source_id) {
                winner.sources.push(source.clone());
            }
            relinked += 1;
        }

        // Loser fields fill winner gaps only; the winner's own values win
        if winner.billing_id.is_none() {
            winner.billing_id = loser.billing_id.clone();
        }
        if winner.crm_id.is_none() {
            winner.crm_id = loser.crm_id.clone();
        }
        if winner.address_line1.is_none() {
            winner.address_line1 = loser.address_line1.clone();
        }
        if winner.city.is_none() {
            winner.city = loser.city.clone();
        }
        if winner.state.is_none() {
            winner.state = loser.state.clone();
        }
        if winner.postal_code.is_none() {
            winner.postal_code = loser.postal_code.clone();
        }
        if winner.industry_code.is_none() {
            winner.industry_code = loser.industry_code.clone();
        }
        winner.updated_at = now;

        let mut retired = loser;
        retired.superseded = true;
        retired.sources.clear();
        retired.updated_at = now;

        self.accounts.insert(winner_id, winner);
        self.accounts.insert(loser_id, retired);

        info!(
            winner_id = %winner_id,
            loser_id = %loser_id,
            relinked,
            "Accounts merged"
        );

        Ok(relinked)
    }

    /// Snapshot of every non-superseded account
    ///
    /// Returned by value so callers aggregate over a frozen copy;
    /// registry mutation after the call is invisible to them.
    pub fn live_accounts(&self) -> Vec<Account> {
        self.accounts
            .values()
            .filter(|a| !a.superseded)
            .cloned()
            .collect()
    }

    /// Total stored accounts, superseded included
    pub fn account_count(&self) -> usize {
        self.accounts.len()
    }

    /// Number of source keys currently mapped
    pub fn source_count(&self) -> usize {
        self.source_index.len()
    }
}
