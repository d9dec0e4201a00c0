//! Hash Ledger
//!
//! Append-only, chain-linked store of hash events, one chain per patient.
//! Each entry's `sequence` doubles as an optimistic version token for the
//! chain tail: two writers racing on the same tail collide on the
//! `UNIQUE(patient_id, sequence)` constraint and the loser retries.

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::database::models::{HashLedgerEntry, NewLedgerEntry};
use crate::database::queries::Queries;
use crate::database::Database;
use crate::error::IntegrityError;
use crate::integrity::canonical::{chain_link, PatientFieldSnapshot, CANONICAL_FORMAT_VERSION};

pub const MAX_APPEND_ATTEMPTS: u32 = 16;

#[derive(Clone)]
pub struct HashLedger {
    database: Database,
}

/// One page of entries across all patients.
#[derive(Debug, Clone, serde::Serialize)]
pub struct LedgerPage {
    pub entries: Vec<HashLedgerEntry>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
    pub total_pages: i64,
}

impl HashLedger {
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    /// Hash the patient's current fields and append them to the chain.
    pub async fn append(&self, patient_id: i64) -> Result<HashLedgerEntry, IntegrityError> {
        for attempt in 1..=MAX_APPEND_ATTEMPTS {
            let patient = Queries::get_patient(self.database.pool(), patient_id)
                .await?
                .ok_or_else(|| IntegrityError::patient_not_found(patient_id))?;

            let snapshot = PatientFieldSnapshot::from_patient(&patient);
            let data_hash = snapshot.canonical_hash();

            let tail = Queries::get_latest_entry(self.database.pool(), patient_id).await?;
            let (sequence, block_hash) = match &tail {
                Some(previous) => (
                    previous.sequence + 1,
                    Some(chain_link(&previous.data_hash, &data_hash)),
                ),
                None => (0, None),
            };

            let new_entry = NewLedgerEntry {
                patient_id,
                sequence,
                data_hash,
                block_hash,
                hash_version: CANONICAL_FORMAT_VERSION,
                snapshot_timestamp: snapshot.original_creation_timestamp,
                created_at: Utc::now(),
            };

            match self.database.insert_ledger_entry(&new_entry).await {
                Ok(entry) => {
                    info!(
                        "Appended ledger entry #{} for patient {} (hash {})",
                        entry.sequence, patient_id, entry.data_hash
                    );
                    return Ok(entry);
                }
                Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                    debug!(
                        "Chain tail for patient {} moved during append (attempt {}), retrying",
                        patient_id, attempt
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }

        warn!(
            "Giving up on append for patient {} after {} attempts",
            patient_id, MAX_APPEND_ATTEMPTS
        );
        Err(IntegrityError::append_conflict(patient_id, MAX_APPEND_ATTEMPTS))
    }

    /// All entries for a patient, oldest first.
    pub async fn history(&self, patient_id: i64) -> Result<Vec<HashLedgerEntry>, IntegrityError> {
        Ok(Queries::get_ledger_entries(self.database.pool(), patient_id).await?)
    }

    /// The verification baseline.
    pub async fn earliest(
        &self,
        patient_id: i64,
    ) -> Result<Option<HashLedgerEntry>, IntegrityError> {
        Ok(Queries::get_earliest_entry(self.database.pool(), patient_id).await?)
    }

    pub async fn latest(&self, patient_id: i64) -> Result<HashLedgerEntry, IntegrityError> {
        Queries::get_latest_entry(self.database.pool(), patient_id)
            .await?
            .ok_or(IntegrityError::LedgerEntryNotFound { patient_id })
    }

    pub async fn list(
        &self,
        page: i64,
        per_page: i64,
        verified: Option<bool>,
    ) -> Result<LedgerPage, IntegrityError> {
        let page = page.max(1);
        let per_page = per_page.clamp(1, 100);
        let offset = (page - 1).checked_mul(per_page).ok_or_else(|| {
            IntegrityError::ValidationError(format!("page {} is out of range", page))
        })?;

        let entries =
            Queries::list_ledger_entries(self.database.pool(), verified, per_page, offset).await?;
        let total = Queries::count_ledger_entries(self.database.pool(), verified).await?;

        Ok(LedgerPage {
            entries,
            total,
            page,
            per_page,
            total_pages: (total + per_page - 1) / per_page,
        })
    }
}
