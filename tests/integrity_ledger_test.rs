//! Integrity Ledger Tests
//!
//! Hash chain, baseline verification and tamper detection against an
//! in-memory database.

use chrono::NaiveDate;
use std::sync::Arc;

use integrity_ledger::audit::{AuditContext, AuditTrail};
use integrity_ledger::database::models::{HivStatus, IntegrityStatus, PatientUpdate};
use integrity_ledger::database::queries::Queries;
use integrity_ledger::integrity::{
    audit_chains, chain_link, verify_chain, HashLedger, IntegrityService, PatientFieldSnapshot,
    VerificationStatus, Verifier,
};
use integrity_ledger::ledger_client::{LedgerClient, SubmissionStatus};
use integrity_ledger::IntegrityError;

mod common;
use common::*;

#[tokio::test]
async fn test_end_to_end_scenario() {
    let db = setup_test_db().await;
    let patient = create_test_patient(&db).await;
    let ledger = HashLedger::new(db.clone());
    let verifier = Verifier::new(db.clone());

    let entry0 = ledger.append(patient.id).await.unwrap();
    let h0 = entry0.data_hash.clone();
    assert_eq!(entry0.sequence, 0);
    assert!(entry0.block_hash.is_none());
    assert!(entry0.verified);
    assert_eq!(h0, PatientFieldSnapshot::from_patient(&patient).canonical_hash());

    let result = verifier.verify(patient.id).await.unwrap();
    assert!(result.is_verified);
    assert!(!result.has_tampering);
    assert_eq!(result.status, VerificationStatus::Verified);

    set_hiv_status(&db, patient.id, HivStatus::Reactive).await;

    let result = verifier.verify(patient.id).await.unwrap();
    assert!(!result.is_verified);
    assert!(result.has_tampering);
    assert_eq!(result.status, VerificationStatus::Failed);
    assert_ne!(result.current_hash.as_deref(), Some(h0.as_str()));
    assert_eq!(result.baseline_hash.as_deref(), Some(h0.as_str()));

    let entry1 = ledger.append(patient.id).await.unwrap();
    assert_eq!(entry1.sequence, 1);
    assert_ne!(entry1.data_hash, h0);
    assert_eq!(entry1.block_hash, Some(chain_link(&h0, &entry1.data_hash)));
}

#[tokio::test]
async fn test_chain_links_every_entry_to_its_predecessor() {
    let db = setup_test_db().await;
    let patient = create_test_patient(&db).await;
    let ledger = HashLedger::new(db.clone());

    let statuses = [
        HivStatus::NonReactive,
        HivStatus::Reactive,
        HivStatus::Unknown,
        HivStatus::NonReactive,
    ];
    for status in statuses {
        set_hiv_status(&db, patient.id, status).await;
        ledger.append(patient.id).await.unwrap();
    }

    let entries = ledger.history(patient.id).await.unwrap();
    assert_eq!(entries.len(), 4);
    assert!(entries[0].block_hash.is_none());
    for i in 1..entries.len() {
        assert_eq!(
            entries[i].block_hash,
            Some(chain_link(&entries[i - 1].data_hash, &entries[i].data_hash))
        );
    }
    assert!(verify_chain(&entries).valid);
}

#[tokio::test]
async fn test_append_leaves_existing_entries_untouched() {
    let db = setup_test_db().await;
    let patient = create_test_patient(&db).await;
    let ledger = HashLedger::new(db.clone());

    ledger.append(patient.id).await.unwrap();
    ledger.append(patient.id).await.unwrap();
    let before = ledger.history(patient.id).await.unwrap();

    set_hiv_status(&db, patient.id, HivStatus::Reactive).await;
    ledger.append(patient.id).await.unwrap();
    let after = ledger.history(patient.id).await.unwrap();

    assert_eq!(after.len(), before.len() + 1);
    for (old, new) in before.iter().zip(after.iter()) {
        assert_eq!(old.data_hash, new.data_hash);
        assert_eq!(old.block_hash, new.block_hash);
        assert_eq!(old.created_at, new.created_at);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_appends_keep_a_single_linear_chain() {
    let db = setup_test_db().await;
    let patient = create_test_patient(&db).await;
    let ledger = HashLedger::new(db.clone());

    let handles: Vec<_> = (0..10)
        .map(|_| {
            let ledger = ledger.clone();
            let patient_id = patient.id;
            tokio::spawn(async move { ledger.append(patient_id).await })
        })
        .collect();

    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let entries = ledger.history(patient.id).await.unwrap();
    assert_eq!(entries.len(), 10);

    let sequences: Vec<i64> = entries.iter().map(|e| e.sequence).collect();
    assert_eq!(sequences, (0..10).collect::<Vec<i64>>());

    // Exactly one genesis, no duplicate branches off the same predecessor
    assert_eq!(entries.iter().filter(|e| e.block_hash.is_none()).count(), 1);
    let report = verify_chain(&entries);
    assert!(report.valid, "{}", report.summary());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_verifications_interleaved_with_appends_amend_the_current_tail() {
    let db = setup_test_db().await;
    let patient = create_test_patient(&db).await;
    let ledger = HashLedger::new(db.clone());
    let verifier = Verifier::new(db.clone());
    ledger.append(patient.id).await.unwrap();

    let mut appends = Vec::new();
    let mut verifies = Vec::new();
    for _ in 0..6 {
        let ledger = ledger.clone();
        let patient_id = patient.id;
        appends.push(tokio::spawn(async move { ledger.append(patient_id).await }));

        let verifier = verifier.clone();
        verifies.push(tokio::spawn(async move { verifier.verify(patient_id).await }));
    }

    for handle in appends {
        handle.await.unwrap().unwrap();
    }
    for handle in verifies {
        let result = handle.await.unwrap().unwrap();
        assert!(result.is_verified);
    }

    let entries = ledger.history(patient.id).await.unwrap();
    assert_eq!(entries.len(), 7);
    let report = verify_chain(&entries);
    assert!(report.valid, "{}", report.summary());

    let runs = Queries::get_verification_runs(db.pool(), patient.id).await.unwrap();
    assert_eq!(runs.len(), 6);
    assert!(runs.iter().all(|run| run.baseline_entry_id == entries[0].id));

    let last = verifier.verify(patient.id).await.unwrap();
    let tail = ledger.latest(patient.id).await.unwrap();
    assert_eq!(tail.sequence, 6);
    assert!(tail.verified);
    assert_eq!(
        tail.verified_at.map(|t| t.timestamp_millis()),
        Some(last.verification_timestamp.timestamp_millis())
    );
}

#[tokio::test]
async fn test_verification_is_idempotent() {
    let db = setup_test_db().await;
    let patient = create_test_patient(&db).await;
    HashLedger::new(db.clone()).append(patient.id).await.unwrap();
    let verifier = Verifier::new(db.clone());

    let first = verifier.verify(patient.id).await.unwrap();
    let second = verifier.verify(patient.id).await.unwrap();
    assert_eq!(first.is_verified, second.is_verified);
    assert_eq!(first.current_hash, second.current_hash);

    set_hiv_status(&db, patient.id, HivStatus::Reactive).await;
    let third = verifier.verify(patient.id).await.unwrap();
    let fourth = verifier.verify(patient.id).await.unwrap();
    assert!(!third.is_verified);
    assert_eq!(third.is_verified, fourth.is_verified);
}

#[tokio::test]
async fn test_each_monitored_field_is_tamper_evident() {
    let edits = vec![
        PatientUpdate {
            name: Some("Janet Doe".to_string()),
            ..Default::default()
        },
        PatientUpdate {
            date_of_birth: Some(NaiveDate::from_ymd_opt(1991, 1, 1).unwrap()),
            ..Default::default()
        },
        PatientUpdate {
            hiv_status: Some(HivStatus::Reactive),
            ..Default::default()
        },
        PatientUpdate {
            consent: Some(false),
            ..Default::default()
        },
    ];
    let original = jane_doe();
    let revert = PatientUpdate {
        name: Some(original.name.clone()),
        date_of_birth: Some(original.date_of_birth),
        hiv_status: Some(original.hiv_status),
        consent: Some(original.consent),
    };

    for edit in edits {
        let db = setup_test_db().await;
        let patient = create_test_patient(&db).await;
        let h0 = HashLedger::new(db.clone())
            .append(patient.id)
            .await
            .unwrap()
            .data_hash;
        let verifier = Verifier::new(db.clone());

        db.update_patient_fields(patient.id, &edit).await.unwrap();
        let tampered = verifier.verify(patient.id).await.unwrap();
        assert!(!tampered.is_verified, "edit {:?} went unnoticed", edit);
        assert!(tampered.has_tampering);
        assert_ne!(tampered.current_hash.as_deref(), Some(h0.as_str()));

        db.update_patient_fields(patient.id, &revert).await.unwrap();
        let restored = verifier.verify(patient.id).await.unwrap();
        assert!(restored.is_verified, "revert of {:?} not recognised", edit);
        assert_eq!(restored.current_hash.as_deref(), Some(h0.as_str()));
    }
}

#[tokio::test]
async fn test_empty_ledger_reports_no_hash() {
    let db = setup_test_db().await;
    let patient = create_test_patient(&db).await;

    let result = Verifier::new(db.clone()).verify(patient.id).await.unwrap();
    assert_eq!(result.status, VerificationStatus::NoHash);
    assert!(!result.is_verified);
    assert!(!result.has_tampering);
    assert!(result.baseline_hash.is_none());

    let stored = Queries::get_patient(db.pool(), patient.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.integrity_status, IntegrityStatus::Pending);
}

#[tokio::test]
async fn test_unknown_patient_is_not_found() {
    let db = setup_test_db().await;

    let err = HashLedger::new(db.clone()).append(404).await.unwrap_err();
    assert!(err.is_not_found());

    let err = Verifier::new(db.clone()).verify(404).await.unwrap_err();
    assert!(err.is_not_found());
    assert!(err.to_string().contains("404"));
}

#[tokio::test]
async fn test_verify_amends_only_the_latest_entry() {
    let db = setup_test_db().await;
    let patient = create_test_patient(&db).await;
    let ledger = HashLedger::new(db.clone());
    ledger.append(patient.id).await.unwrap();
    ledger.append(patient.id).await.unwrap();

    set_hiv_status(&db, patient.id, HivStatus::Reactive).await;
    let result = Verifier::new(db.clone()).verify(patient.id).await.unwrap();
    assert!(!result.is_verified);

    let entries = ledger.history(patient.id).await.unwrap();
    assert!(entries[0].verified, "baseline flag must not change");
    assert!(!entries[1].verified);
    assert_eq!(
        entries[1].verified_at.map(|t| t.timestamp_millis()),
        Some(result.verification_timestamp.timestamp_millis())
    );

    let stored = Queries::get_patient(db.pool(), patient.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.integrity_status, IntegrityStatus::Failed);

    let runs = Queries::get_verification_runs(db.pool(), patient.id)
        .await
        .unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].baseline_entry_id, entries[0].id);
    assert!(!runs[0].is_verified);
}

#[tokio::test]
async fn test_reappend_does_not_rebaseline() {
    let db = setup_test_db().await;
    let patient = create_test_patient(&db).await;
    let ledger = HashLedger::new(db.clone());
    let verifier = Verifier::new(db.clone());
    let baseline = ledger.append(patient.id).await.unwrap();

    set_hiv_status(&db, patient.id, HivStatus::Reactive).await;
    ledger.append(patient.id).await.unwrap();

    // Monitored fields are expected to be immutable after enrollment; a new
    // entry records the change but the original snapshot stays the reference.
    let result = verifier.verify(patient.id).await.unwrap();
    assert!(result.has_tampering);
    assert_eq!(result.baseline_hash, Some(baseline.data_hash));
    assert_eq!(
        result.baseline_timestamp.map(|t| t.timestamp_millis()),
        Some(baseline.created_at.timestamp_millis())
    );
}

#[tokio::test]
async fn test_admin_listing_filters_and_paginates() {
    let db = setup_test_db().await;
    let ledger = HashLedger::new(db.clone());

    let first = create_test_patient(&db).await;
    let second = create_test_patient(&db).await;
    for _ in 0..3 {
        ledger.append(first.id).await.unwrap();
    }
    ledger.append(second.id).await.unwrap();

    set_hiv_status(&db, second.id, HivStatus::Reactive).await;
    Verifier::new(db.clone()).verify(second.id).await.unwrap();

    let all = ledger.list(1, 3, None).await.unwrap();
    assert_eq!(all.total, 4);
    assert_eq!(all.entries.len(), 3);
    assert_eq!(all.total_pages, 2);

    let page_two = ledger.list(2, 3, None).await.unwrap();
    assert_eq!(page_two.entries.len(), 1);

    let unverified = ledger.list(1, 20, Some(false)).await.unwrap();
    assert_eq!(unverified.total, 1);
    assert_eq!(unverified.entries[0].patient_id, second.id);

    let verified = ledger.list(1, 20, Some(true)).await.unwrap();
    assert_eq!(verified.total, 3);

    let clamped = ledger.list(0, 1000, None).await.unwrap();
    assert_eq!(clamped.page, 1);
    assert_eq!(clamped.per_page, 100);

    let overflow = ledger.list(i64::MAX, 100, None).await;
    assert!(matches!(overflow, Err(IntegrityError::ValidationError(_))));
}

#[tokio::test]
async fn test_service_reports_simulated_submission_and_audits() {
    let db = setup_test_db().await;
    let patient = create_test_patient(&db).await;
    let service = test_service(&db);
    let context = AuditContext {
        actor_id: Some(7),
        source_ip: Some("10.1.2.3".to_string()),
    };

    let record = service.record_hash(patient.id, &context).await.unwrap();
    assert_eq!(record.external_submission.status, SubmissionStatus::Simulated);
    assert_eq!(record.external_submission.hash, record.entry.data_hash);

    let report = service.verify(patient.id, &context).await.unwrap();
    assert!(report.result.is_verified);
    assert!(report.external_verification.is_some());

    let history = service.history(patient.id, &context).await.unwrap();
    assert_eq!(history.entries.len(), 1);
    assert!(history.chain.valid);

    let events = wait_for_audit_events(&db, patient.id, 3).await;
    let mut actions: Vec<&str> = events.iter().map(|e| e.action_type.as_str()).collect();
    actions.sort_unstable();
    assert_eq!(
        actions,
        vec![
            "integrity_hash_recorded",
            "integrity_history_viewed",
            "integrity_verified"
        ]
    );
    assert!(events.iter().all(|e| e.actor_id == Some(7)));
    assert!(events.iter().all(|e| e.source_ip == "10.1.2.3"));
}

#[tokio::test]
async fn test_audit_failure_does_not_abort_hashing() {
    let db = setup_test_db().await;
    let patient = create_test_patient(&db).await;
    let service = test_service(&db);

    sqlx::raw_sql("DROP TABLE audit_events")
        .execute(db.pool())
        .await
        .unwrap();

    let record = service
        .record_hash(patient.id, &AuditContext::default())
        .await
        .unwrap();
    assert_eq!(record.entry.sequence, 0);

    let report = service
        .verify(patient.id, &AuditContext::default())
        .await
        .unwrap();
    assert!(report.result.is_verified);
}

#[tokio::test]
async fn test_chain_audit_flags_only_the_rewritten_chain() {
    let db = setup_test_db().await;
    let intact = create_test_patient(&db).await;
    let rewritten = create_test_patient(&db).await;
    let ledger = HashLedger::new(db.clone());
    for patient_id in [intact.id, rewritten.id] {
        ledger.append(patient_id).await.unwrap();
        set_hiv_status(&db, patient_id, HivStatus::Reactive).await;
        ledger.append(patient_id).await.unwrap();
    }

    sqlx::query(
        r#"
        UPDATE hash_ledger SET block_hash = ?
        WHERE patient_id = ? AND sequence = 1
        "#,
    )
    .bind("0".repeat(64))
    .bind(rewritten.id)
    .execute(db.pool())
    .await
    .unwrap();

    let reports = audit_chains(&db, None).await.unwrap();
    assert_eq!(reports.len(), 2);
    let intact_report = reports.iter().find(|r| r.patient_id == Some(intact.id)).unwrap();
    let broken_report = reports.iter().find(|r| r.patient_id == Some(rewritten.id)).unwrap();
    assert!(intact_report.valid);
    assert!(!broken_report.valid);
    assert_eq!(broken_report.broken_at, Some(1));

    let only = audit_chains(&db, Some(intact.id)).await.unwrap();
    assert_eq!(only.len(), 1);
    assert!(only[0].valid);
}

#[tokio::test]
async fn test_disabled_audit_trail_records_nothing() {
    let db = setup_test_db().await;
    let patient = create_test_patient(&db).await;
    let service = IntegrityService::new(
        db.clone(),
        Arc::new(LedgerClient::mock()),
        AuditTrail::new(db.clone(), false),
    );

    service
        .record_hash(patient.id, &AuditContext::default())
        .await
        .unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    let events = Queries::get_audit_events(db.pool(), patient.id).await.unwrap();
    assert!(events.is_empty());
}
