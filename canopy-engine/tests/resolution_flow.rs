//! End-to-end identity resolution flows
//!
//! **Test Coverage:**
//! - CRM and billing exports resolved through one pipeline
//! - Strong-identifier links committed at full confidence
//! - Layered fuzzy evidence reaching the auto-accept threshold
//! - Review-band candidates adjudicated by accept and by reject
//! - Upstream correction re-linking a source to the account it proves
//! - Re-running an export refreshing instead of duplicating
//! - Event stream emitted across a full resolution cycle
//! - Events awaitable from an async subscriber

use std::collections::HashMap;

use canopy_common::config::EngineConfig;
use canopy_common::events::{CanopyEvent, EventBus};
use canopy_common::types::{SourceSystem, Tier};
use canopy_engine::ingest::{BillingRecord, CrmRecord, SourceRecord};
use canopy_engine::review::{InMemoryReviewQueue, ReviewPriority};
use canopy_engine::{RecordOutcome, ResolutionPipeline};

fn pipeline() -> ResolutionPipeline {
    ResolutionPipeline::new(
        &EngineConfig::default(),
        Box::new(InMemoryReviewQueue::new()),
        EventBus::new(256),
    )
    .unwrap()
}

/// Four CRM accounts: one carrying a billing reference, two with enough
/// address detail for fuzzy matching, one bare
fn crm_export() -> Vec<SourceRecord> {
    let raws = vec![
        CrmRecord {
            account_id: "crm-1".to_string(),
            account_name: "Meridian Networks".to_string(),
            billing_street: Some("400 Peachtree St NE".to_string()),
            billing_city: Some("Atlanta".to_string()),
            billing_state: Some("GA".to_string()),
            billing_postal_code: Some("30301".to_string()),
            industry: Some("5172".to_string()),
            billing_account_ref: Some("B-401".to_string()),
            monthly_recurring_revenue: Some(9_000.0),
        },
        CrmRecord {
            account_id: "crm-2".to_string(),
            account_name: "Cascade Data Systems".to_string(),
            billing_street: Some("1200 SW Alder St".to_string()),
            billing_city: Some("Portland".to_string()),
            billing_state: Some("OR".to_string()),
            billing_postal_code: Some("97201".to_string()),
            industry: Some("7372".to_string()),
            billing_account_ref: None,
            monthly_recurring_revenue: None,
        },
        CrmRecord {
            account_id: "crm-3".to_string(),
            account_name: "Bluewater Logistics".to_string(),
            billing_street: None,
            billing_city: None,
            billing_state: None,
            billing_postal_code: None,
            industry: Some("4214".to_string()),
            billing_account_ref: None,
            monthly_recurring_revenue: None,
        },
        CrmRecord {
            account_id: "crm-4".to_string(),
            account_name: "Harbor Point Media".to_string(),
            billing_street: None,
            billing_city: Some("Boston".to_string()),
            billing_state: Some("MA".to_string()),
            billing_postal_code: Some("02110".to_string()),
            industry: Some("5412".to_string()),
            billing_account_ref: None,
            monthly_recurring_revenue: Some(4_200.0),
        },
    ];
    raws.into_iter()
        .map(|raw| SourceRecord::try_from(raw).unwrap())
        .collect()
}

/// Five billing rows: a strong-id link, a fuzzy auto-accept, two
/// review-band candidates, and a genuinely new customer
fn billing_export() -> Vec<SourceRecord> {
    let raws = vec![
        BillingRecord {
            account_number: "B-401".to_string(),
            customer_name: "Meridian Networks LLC".to_string(),
            service_address: None,
            service_city: None,
            service_state: None,
            service_postal_code: None,
            sic_code: None,
            crm_ref: None,
            current_mrr: 18_000.0,
        },
        BillingRecord {
            account_number: "B-502".to_string(),
            customer_name: "Cascade Data Systems Inc".to_string(),
            service_address: Some("1200 SW Alder Street".to_string()),
            service_city: Some("Portland".to_string()),
            service_state: Some("OR".to_string()),
            service_postal_code: Some("97201".to_string()),
            sic_code: Some("7372".to_string()),
            crm_ref: None,
            current_mrr: 22_000.0,
        },
        BillingRecord {
            account_number: "B-603".to_string(),
            customer_name: "Bluewater Logistics".to_string(),
            service_address: None,
            service_city: None,
            service_state: None,
            service_postal_code: None,
            sic_code: Some("4214".to_string()),
            crm_ref: None,
            current_mrr: 900.0,
        },
        BillingRecord {
            account_number: "B-704".to_string(),
            customer_name: "Harbor Point Media LLC".to_string(),
            service_address: None,
            service_city: None,
            service_state: None,
            service_postal_code: Some("02110".to_string()),
            sic_code: Some("5412".to_string()),
            crm_ref: None,
            current_mrr: 6_800.0,
        },
        BillingRecord {
            account_number: "B-999".to_string(),
            customer_name: "Voltaic Energy Co".to_string(),
            service_address: None,
            service_city: None,
            service_state: None,
            service_postal_code: None,
            sic_code: None,
            crm_ref: None,
            current_mrr: 75_000.0,
        },
    ];
    raws.into_iter()
        .map(|raw| SourceRecord::try_from(raw).unwrap())
        .collect()
}

/// Pipeline with both exports resolved
fn swept_pipeline() -> ResolutionPipeline {
    let mut p = pipeline();
    p.resolve_batch(&crm_export()).unwrap();
    p.resolve_batch(&billing_export()).unwrap();
    p
}

#[test]
fn test_crm_export_seeds_distinct_identities() {
    let mut p = pipeline();

    let outcome = p.resolve_batch(&crm_export()).unwrap();

    assert_eq!(outcome.created, 4);
    assert_eq!(outcome.processed(), 4);
    assert_eq!(p.registry().account_count(), 4);

    let meridian = p
        .registry()
        .get(p.registry().lookup(SourceSystem::Crm, "crm-1").unwrap())
        .unwrap();
    assert_eq!(meridian.tier, Tier::E1);
    assert_eq!(meridian.billing_id.as_deref(), Some("B-401"));

    // No revenue estimate lands in the SMB bracket until billing says otherwise
    let cascade = p
        .registry()
        .get(p.registry().lookup(SourceSystem::Crm, "crm-2").unwrap())
        .unwrap();
    assert_eq!(cascade.tier, Tier::Smb);
}

#[test]
fn test_billing_sweep_outcomes() {
    let mut p = pipeline();
    p.resolve_batch(&crm_export()).unwrap();

    let outcome = p.resolve_batch(&billing_export()).unwrap();

    assert_eq!(outcome.auto_linked, 2);
    assert_eq!(outcome.queued_for_review, 2);
    assert_eq!(outcome.created, 1);
    assert_eq!(outcome.refreshed, 0);
    assert_eq!(outcome.failed, 0);

    // 4 CRM identities + 2 provisional + 1 new customer
    assert_eq!(p.registry().account_count(), 7);
    assert_eq!(p.registry().source_count(), 9);

    // Probable match triaged ahead of the possible one
    let items = p.review_items();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].priority, ReviewPriority::Probable);
    assert!((items[0].candidate.confidence - 0.70).abs() < 1e-9);
    assert_eq!(items[1].priority, ReviewPriority::Possible);
    assert!((items[1].candidate.confidence - 0.50).abs() < 1e-9);
}

#[test]
fn test_strong_identifier_link_survives_name_drift() {
    let p = swept_pipeline();

    let account_id = p.registry().lookup(SourceSystem::Billing, "B-401").unwrap();
    assert_eq!(
        p.registry().lookup(SourceSystem::Crm, "crm-1"),
        Some(account_id)
    );

    let account = p.registry().get(account_id).unwrap();
    assert!(account.has_source(SourceSystem::Crm, "crm-1"));
    assert!(account.has_source(SourceSystem::Billing, "B-401"));
    // First-registered name wins; billing revenue is authoritative
    assert_eq!(account.name, "Meridian Networks");
    assert_eq!(account.mrr, 18_000.0);
    assert_eq!(account.tier, Tier::E2);
    assert!(account.is_enterprise);
}

#[test]
fn test_fuzzy_auto_accept_requires_layered_evidence() {
    let mut p = pipeline();
    p.resolve_batch(&crm_export()).unwrap();
    let cascade_id = p.registry().lookup(SourceSystem::Crm, "crm-2").unwrap();

    // Name, postal, address, and industry together reach the threshold
    let outcome = p.resolve_record(&billing_export()[1]).unwrap();

    let RecordOutcome::AutoLinked {
        account_id,
        confidence,
    } = outcome
    else {
        panic!("expected AutoLinked, got {outcome:?}");
    };
    assert_eq!(account_id, cascade_id);
    assert!((confidence - 0.90).abs() < 1e-9);

    let account = p.registry().get(cascade_id).unwrap();
    assert_eq!(account.mrr, 22_000.0);
    assert_eq!(account.tier, Tier::E2);
}

#[test]
fn test_accepting_review_merges_identities() {
    let mut p = swept_pipeline();
    let harbor_id = p.registry().lookup(SourceSystem::Crm, "crm-4").unwrap();
    let items = p.review_items();
    let probable = &items[0];
    let provisional_id = probable.provisional_account_id;

    let winner = p.commit_match(probable.id).unwrap();

    assert_eq!(winner, harbor_id);
    assert_eq!(
        p.registry().lookup(SourceSystem::Billing, "B-704"),
        Some(harbor_id)
    );
    let account = p.registry().get(harbor_id).unwrap();
    assert!(account.has_source(SourceSystem::Crm, "crm-4"));
    assert!(account.has_source(SourceSystem::Billing, "B-704"));
    // Merge keeps the winner's name and revenue
    assert_eq!(account.name, "Harbor Point Media");
    assert_eq!(account.mrr, 4_200.0);

    assert!(p.registry().get(provisional_id).unwrap().superseded);
    assert_eq!(p.registry().live_accounts().len(), 6);
    assert_eq!(p.review_items().len(), 1);
}

#[test]
fn test_rejecting_review_keeps_identities_distinct() {
    let mut p = swept_pipeline();
    let bluewater_id = p.registry().lookup(SourceSystem::Crm, "crm-3").unwrap();
    let items = p.review_items();
    let possible = &items[1];
    let provisional_id = possible.provisional_account_id;

    p.reject_match(possible.id).unwrap();

    assert_ne!(provisional_id, bluewater_id);
    assert_eq!(
        p.registry().lookup(SourceSystem::Billing, "B-603"),
        Some(provisional_id)
    );
    assert!(!p.registry().get(provisional_id).unwrap().superseded);
    assert!(!p.registry().get(bluewater_id).unwrap().superseded);
    assert_eq!(p.review_items().len(), 1);
}

#[test]
fn test_upstream_correction_relinks_source() {
    let mut p = swept_pipeline();
    let cascade_id = p.registry().lookup(SourceSystem::Crm, "crm-2").unwrap();
    let voltaic_id = p.registry().lookup(SourceSystem::Billing, "B-999").unwrap();
    assert_ne!(cascade_id, voltaic_id);

    let mut events = p.events().subscribe();
    // Sales fixes the crm-2 linkage: the row now references Voltaic's
    // billing account instead of standing on its fuzzy Cascade match
    let corrected = SourceRecord::try_from(CrmRecord {
        account_id: "crm-2".to_string(),
        account_name: "Voltaic Energy".to_string(),
        billing_street: None,
        billing_city: None,
        billing_state: None,
        billing_postal_code: None,
        industry: None,
        billing_account_ref: Some("B-999".to_string()),
        monthly_recurring_revenue: Some(75_000.0),
    })
    .unwrap();
    let outcome = p.resolve_record(&corrected).unwrap();

    assert_eq!(
        outcome,
        RecordOutcome::Relinked {
            account_id: voltaic_id,
            previous_account_id: cascade_id,
        }
    );
    assert_eq!(
        p.registry().lookup(SourceSystem::Crm, "crm-2"),
        Some(voltaic_id)
    );
    let voltaic = p.registry().get(voltaic_id).unwrap();
    assert!(voltaic.has_source(SourceSystem::Crm, "crm-2"));
    assert!(voltaic.has_source(SourceSystem::Billing, "B-999"));
    assert_eq!(voltaic.crm_id.as_deref(), Some("crm-2"));

    // Cascade keeps its own billing link and stays live
    let cascade = p.registry().get(cascade_id).unwrap();
    assert!(!cascade.superseded);
    assert!(!cascade.has_source(SourceSystem::Crm, "crm-2"));
    assert!(cascade.has_source(SourceSystem::Billing, "B-502"));

    let event = events.try_recv().unwrap();
    let CanopyEvent::SourceRelinked {
        system,
        source_id,
        old_account_id,
        new_account_id,
        ..
    } = event
    else {
        panic!("expected SourceRelinked, got {event:?}");
    };
    assert_eq!(system, SourceSystem::Crm);
    assert_eq!(source_id, "crm-2");
    assert_eq!(old_account_id, cascade_id);
    assert_eq!(new_account_id, voltaic_id);
}

#[test]
fn test_resolving_export_twice_only_refreshes() {
    let mut p = swept_pipeline();
    let items = p.review_items();
    p.commit_match(items[0].id).unwrap();
    p.reject_match(items[1].id).unwrap();
    let accounts_before = p.registry().account_count();

    let outcome = p.resolve_batch(&billing_export()).unwrap();

    // Every billing row is linked by now, including the merged and the
    // rejected ones
    assert_eq!(outcome.refreshed, 5);
    assert_eq!(outcome.created, 0);
    assert_eq!(outcome.auto_linked, 0);
    assert_eq!(outcome.queued_for_review, 0);
    assert_eq!(p.registry().account_count(), accounts_before);
    assert!(p.review_items().is_empty());
}

#[test]
fn test_event_stream_for_full_cycle() {
    let mut p = pipeline();
    let mut events = p.events().subscribe();

    p.resolve_batch(&crm_export()).unwrap();
    p.resolve_batch(&billing_export()).unwrap();
    let items = p.review_items();
    p.commit_match(items[0].id).unwrap();
    p.reject_match(items[1].id).unwrap();
    p.resolve_batch(&billing_export()).unwrap();

    let mut counts: HashMap<String, usize> = HashMap::new();
    while let Ok(event) = events.try_recv() {
        *counts.entry(event.event_type().to_string()).or_default() += 1;
    }

    // 4 seeded + 2 provisional + 1 new customer
    assert_eq!(counts.get("AccountRegistered"), Some(&7));
    assert_eq!(counts.get("MatchAutoAccepted"), Some(&2));
    // Meridian E1 -> E2 and Cascade SMB -> E2
    assert_eq!(counts.get("AccountReclassified"), Some(&2));
    assert_eq!(counts.get("MatchQueuedForReview"), Some(&2));
    assert_eq!(counts.get("AccountsMerged"), Some(&1));
    // The idempotent second sweep emits nothing
    assert_eq!(counts.values().sum::<usize>(), 14);
}

#[tokio::test]
async fn test_async_subscriber_drains_event_stream() {
    let mut p = pipeline();
    let mut events = p.events().subscribe();

    p.resolve_batch(&crm_export()).unwrap();

    // The same broadcast stream the sync tests poll is awaitable from
    // an async host
    for _ in 0..4 {
        let event = events.recv().await.unwrap();
        assert_eq!(event.event_type(), "AccountRegistered");
    }
}
