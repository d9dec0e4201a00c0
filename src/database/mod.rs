pub mod models;
pub mod queries;
pub mod schema;

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use tracing::debug;

use crate::database::models::*;

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn new(database_url: &str) -> Result<Self, sqlx::Error> {
        let pool = SqlitePool::connect(database_url).await?;
        Ok(Database { pool })
    }

    /// Single-connection in-memory store. The connection is never recycled,
    /// otherwise the database would vanish with it.
    pub async fn new_in_memory() -> Result<Self, sqlx::Error> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;
        let database = Database { pool };
        database.run_migrations().await?;
        Ok(database)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::raw_sql(schema::INITIAL_SCHEMA)
            .execute(&self.pool)
            .await?;

        sqlx::raw_sql(schema::VERIFICATION_RUNS_SCHEMA)
            .execute(&self.pool)
            .await?;

        sqlx::raw_sql(schema::AUDIT_EVENTS_SCHEMA)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    pub async fn create_patient(&self, patient: &NewPatient) -> Result<Patient, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO patients (name, date_of_birth, hiv_status, consent, integrity_status, created_at, updated_at)
            VALUES (?, ?, ?, ?, 'pending', ?, ?)
            "#,
        )
        .bind(&patient.name)
        .bind(patient.date_of_birth)
        .bind(patient.hiv_status.as_str())
        .bind(patient.consent)
        .bind(patient.created_at)
        .bind(patient.created_at)
        .execute(&self.pool)
        .await?;

        Ok(Patient {
            id: result.last_insert_rowid(),
            name: patient.name.clone(),
            date_of_birth: patient.date_of_birth,
            hiv_status: patient.hiv_status,
            consent: patient.consent,
            integrity_status: IntegrityStatus::Pending,
            created_at: patient.created_at,
            updated_at: patient.created_at,
        })
    }

    /// Apply an edit to the monitored fields. Returns false when the patient
    /// does not exist.
    pub async fn update_patient_fields(
        &self,
        patient_id: i64,
        update: &PatientUpdate,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE patients SET
                name = COALESCE(?, name),
                date_of_birth = COALESCE(?, date_of_birth),
                hiv_status = COALESCE(?, hiv_status),
                consent = COALESCE(?, consent),
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(update.name.as_deref())
        .bind(update.date_of_birth)
        .bind(update.hiv_status.map(|s| s.as_str()))
        .bind(update.consent)
        .bind(Utc::now())
        .bind(patient_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Insert a new chain entry. Fails with a unique violation when another
    /// writer already claimed `entry.sequence` for this patient.
    pub async fn insert_ledger_entry(
        &self,
        entry: &NewLedgerEntry,
    ) -> Result<HashLedgerEntry, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO hash_ledger
                (patient_id, sequence, data_hash, block_hash, hash_version, snapshot_timestamp, verified, created_at, verified_at)
            VALUES (?, ?, ?, ?, ?, ?, 1, ?, ?)
            "#,
        )
        .bind(entry.patient_id)
        .bind(entry.sequence)
        .bind(&entry.data_hash)
        .bind(entry.block_hash.as_deref())
        .bind(entry.hash_version)
        .bind(entry.snapshot_timestamp)
        .bind(entry.created_at)
        .bind(entry.created_at)
        .execute(&self.pool)
        .await?;

        Ok(HashLedgerEntry {
            id: result.last_insert_rowid(),
            patient_id: entry.patient_id,
            sequence: entry.sequence,
            data_hash: entry.data_hash.clone(),
            block_hash: entry.block_hash.clone(),
            hash_version: entry.hash_version,
            snapshot_timestamp: entry.snapshot_timestamp,
            verified: true,
            created_at: entry.created_at,
            verified_at: Some(entry.created_at),
        })
    }

    /// Persist the outcome of one verification pass atomically: amend the
    /// chain tail's verified flag, set the patient's derived status and
    /// append a verification run.
    pub async fn record_verification(
        &self,
        patient_id: i64,
        baseline_entry_id: i64,
        current_hash: &str,
        is_verified: bool,
        verified_at: DateTime<Utc>,
    ) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        // Tail is resolved inside the statement so a concurrent append cannot
        // slip between the read and the write.
        sqlx::query(
            r#"
            UPDATE hash_ledger SET verified = ?, verified_at = ?
            WHERE id = (
                SELECT id FROM hash_ledger WHERE patient_id = ?
                ORDER BY sequence DESC LIMIT 1
            )
            "#,
        )
        .bind(is_verified)
        .bind(verified_at)
        .bind(patient_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE patients SET integrity_status = ? WHERE id = ?")
            .bind(IntegrityStatus::from_outcome(is_verified).as_str())
            .bind(patient_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            INSERT INTO verification_runs (patient_id, baseline_entry_id, current_hash, is_verified, verified_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(patient_id)
        .bind(baseline_entry_id)
        .bind(current_hash)
        .bind(is_verified)
        .bind(verified_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        debug!(
            "Recorded verification for patient {}: verified={}",
            patient_id, is_verified
        );
        Ok(())
    }

    pub async fn log_audit_event(&self, event: &AuditEvent) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO audit_events (actor_id, action_type, patient_id, description, source_ip, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(event.actor_id)
        .bind(&event.action_type)
        .bind(event.patient_id)
        .bind(&event.description)
        .bind(&event.source_ip)
        .bind(event.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
