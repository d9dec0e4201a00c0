use sqlx::SqlitePool;

use crate::database::models::*;

const LEDGER_COLUMNS: &str = "id, patient_id, sequence, data_hash, block_hash, hash_version, \
     snapshot_timestamp, verified, created_at, verified_at";

pub struct Queries;

impl Queries {
    pub async fn get_patient(
        pool: &SqlitePool,
        patient_id: i64,
    ) -> Result<Option<Patient>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT id, name, date_of_birth, hiv_status, consent, integrity_status, created_at, updated_at
            FROM patients
            WHERE id = ?
            "#,
        )
        .bind(patient_id)
        .fetch_optional(pool)
        .await?;

        row.as_ref().map(Patient::from_row).transpose()
    }

    /// Ids of every patient with at least one ledger entry.
    pub async fn get_ledger_patient_ids(pool: &SqlitePool) -> Result<Vec<i64>, sqlx::Error> {
        sqlx::query_scalar("SELECT DISTINCT patient_id FROM hash_ledger ORDER BY patient_id")
            .fetch_all(pool)
            .await
    }

    /// Full chain for a patient, oldest first.
    pub async fn get_ledger_entries(
        pool: &SqlitePool,
        patient_id: i64,
    ) -> Result<Vec<HashLedgerEntry>, sqlx::Error> {
        let sql = format!(
            "SELECT {} FROM hash_ledger WHERE patient_id = ? ORDER BY sequence ASC",
            LEDGER_COLUMNS
        );
        let rows = sqlx::query(&sql).bind(patient_id).fetch_all(pool).await?;

        rows.iter().map(HashLedgerEntry::from_row).collect()
    }

    pub async fn get_earliest_entry(
        pool: &SqlitePool,
        patient_id: i64,
    ) -> Result<Option<HashLedgerEntry>, sqlx::Error> {
        Self::get_edge_entry(pool, patient_id, "ASC").await
    }

    pub async fn get_latest_entry(
        pool: &SqlitePool,
        patient_id: i64,
    ) -> Result<Option<HashLedgerEntry>, sqlx::Error> {
        Self::get_edge_entry(pool, patient_id, "DESC").await
    }

    async fn get_edge_entry(
        pool: &SqlitePool,
        patient_id: i64,
        direction: &str,
    ) -> Result<Option<HashLedgerEntry>, sqlx::Error> {
        let sql = format!(
            "SELECT {} FROM hash_ledger WHERE patient_id = ? ORDER BY sequence {} LIMIT 1",
            LEDGER_COLUMNS, direction
        );
        let row = sqlx::query(&sql).bind(patient_id).fetch_optional(pool).await?;

        row.as_ref().map(HashLedgerEntry::from_row).transpose()
    }

    /// Page through entries across all patients, newest first.
    pub async fn list_ledger_entries(
        pool: &SqlitePool,
        verified: Option<bool>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<HashLedgerEntry>, sqlx::Error> {
        let rows = match verified {
            Some(flag) => {
                let sql = format!(
                    "SELECT {} FROM hash_ledger WHERE verified = ? ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
                    LEDGER_COLUMNS
                );
                sqlx::query(&sql)
                    .bind(flag)
                    .bind(limit)
                    .bind(offset)
                    .fetch_all(pool)
                    .await?
            }
            None => {
                let sql = format!(
                    "SELECT {} FROM hash_ledger ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
                    LEDGER_COLUMNS
                );
                sqlx::query(&sql)
                    .bind(limit)
                    .bind(offset)
                    .fetch_all(pool)
                    .await?
            }
        };

        rows.iter().map(HashLedgerEntry::from_row).collect()
    }

    pub async fn count_ledger_entries(
        pool: &SqlitePool,
        verified: Option<bool>,
    ) -> Result<i64, sqlx::Error> {
        match verified {
            Some(flag) => {
                sqlx::query_scalar("SELECT COUNT(*) FROM hash_ledger WHERE verified = ?")
                    .bind(flag)
                    .fetch_one(pool)
                    .await
            }
            None => {
                sqlx::query_scalar("SELECT COUNT(*) FROM hash_ledger")
                    .fetch_one(pool)
                    .await
            }
        }
    }

    pub async fn get_verification_runs(
        pool: &SqlitePool,
        patient_id: i64,
    ) -> Result<Vec<VerificationRun>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT id, patient_id, baseline_entry_id, current_hash, is_verified, verified_at
            FROM verification_runs
            WHERE patient_id = ?
            ORDER BY id ASC
            "#,
        )
        .bind(patient_id)
        .fetch_all(pool)
        .await?;

        rows.iter().map(VerificationRun::from_row).collect()
    }

    pub async fn get_audit_events(
        pool: &SqlitePool,
        patient_id: i64,
    ) -> Result<Vec<AuditEvent>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT actor_id, action_type, patient_id, description, source_ip, created_at
            FROM audit_events
            WHERE patient_id = ?
            ORDER BY id ASC
            "#,
        )
        .bind(patient_id)
        .fetch_all(pool)
        .await?;

        rows.iter().map(AuditEvent::from_row).collect()
    }
}
