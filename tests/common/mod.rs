#![allow(dead_code)]

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use std::sync::Arc;
use std::time::Duration;

use integrity_ledger::audit::AuditTrail;
use integrity_ledger::database::models::{
    AuditEvent, HivStatus, NewPatient, Patient, PatientUpdate,
};
use integrity_ledger::database::queries::Queries;
use integrity_ledger::database::Database;
use integrity_ledger::integrity::IntegrityService;
use integrity_ledger::ledger_client::LedgerClient;

/// Setup an in-memory SQLite database for testing
pub async fn setup_test_db() -> Database {
    Database::new_in_memory()
        .await
        .expect("Failed to create test database")
}

/// Enrollment time used by every fixture patient
pub fn enrollment_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 15, 8, 0, 0).unwrap()
}

pub fn jane_doe() -> NewPatient {
    NewPatient {
        name: "Jane Doe".to_string(),
        date_of_birth: NaiveDate::from_ymd_opt(1990, 1, 1).unwrap(),
        hiv_status: HivStatus::NonReactive,
        consent: true,
        created_at: enrollment_time(),
    }
}

pub async fn create_test_patient(db: &Database) -> Patient {
    db.create_patient(&jane_doe())
        .await
        .expect("Failed to create test patient")
}

pub async fn set_hiv_status(db: &Database, patient_id: i64, status: HivStatus) {
    let update = PatientUpdate {
        hiv_status: Some(status),
        ..Default::default()
    };
    assert!(db.update_patient_fields(patient_id, &update).await.unwrap());
}

/// Service wired to the in-process mock ledger with auditing enabled
pub fn test_service(db: &Database) -> IntegrityService {
    IntegrityService::new(
        db.clone(),
        Arc::new(LedgerClient::mock()),
        AuditTrail::new(db.clone(), true),
    )
}

/// Poll until `expected` audit events exist for the patient; inserts run on
/// their own tasks.
pub async fn wait_for_audit_events(
    db: &Database,
    patient_id: i64,
    expected: usize,
) -> Vec<AuditEvent> {
    for _ in 0..100 {
        let events = Queries::get_audit_events(db.pool(), patient_id).await.unwrap();
        if events.len() >= expected {
            return events;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("Timed out waiting for {} audit events", expected);
}
