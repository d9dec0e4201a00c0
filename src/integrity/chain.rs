//! Chain Verification
//!
//! Offline checks over a patient's stored chain: link hashes, sequence
//! contiguity and creation-time ordering.

use serde::Serialize;
use tracing::{debug, info};

use crate::database::models::HashLedgerEntry;
use crate::database::queries::Queries;
use crate::database::Database;
use crate::error::IntegrityError;
use crate::integrity::canonical::chain_link;

#[derive(Debug, Clone, Serialize)]
pub struct ChainReport {
    pub patient_id: Option<i64>,
    pub entry_count: usize,
    pub valid: bool,
    pub broken_at: Option<usize>,
    pub error_message: Option<String>,
}

impl ChainReport {
    pub fn summary(&self) -> String {
        let who = self
            .patient_id
            .map(|id| format!("patient {}", id))
            .unwrap_or_else(|| "empty chain".to_string());
        if self.valid {
            format!("{}: valid ({} entries)", who, self.entry_count)
        } else {
            format!(
                "{}: BROKEN ({} entries): {}",
                who,
                self.entry_count,
                self.error_message.as_deref().unwrap_or("Unknown error")
            )
        }
    }

    fn broken(entries: &[HashLedgerEntry], index: usize, message: String) -> Self {
        Self {
            patient_id: entries.first().map(|e| e.patient_id),
            entry_count: entries.len(),
            valid: false,
            broken_at: Some(index),
            error_message: Some(message),
        }
    }
}

/// Check one patient's entries, ordered oldest first.
pub fn verify_chain(entries: &[HashLedgerEntry]) -> ChainReport {
    for (i, entry) in entries.iter().enumerate() {
        if entry.sequence != i as i64 {
            return ChainReport::broken(
                entries,
                i,
                format!("Sequence gap at entry {}: found sequence {}", i, entry.sequence),
            );
        }

        if i == 0 {
            if entry.block_hash.is_some() {
                return ChainReport::broken(
                    entries,
                    0,
                    "First entry must not carry a block hash".to_string(),
                );
            }
            continue;
        }

        let previous = &entries[i - 1];
        if previous.patient_id != entry.patient_id {
            return ChainReport::broken(
                entries,
                i,
                format!(
                    "Entry {} belongs to patient {}, chain is for patient {}",
                    i, entry.patient_id, previous.patient_id
                ),
            );
        }

        let expected = chain_link(&previous.data_hash, &entry.data_hash);
        if entry.block_hash.as_deref() != Some(expected.as_str()) {
            return ChainReport::broken(
                entries,
                i,
                format!(
                    "Block hash mismatch at entry {}: expected {}, got {}",
                    i,
                    expected,
                    entry.block_hash.as_deref().unwrap_or("none")
                ),
            );
        }

        if entry.created_at < previous.created_at {
            return ChainReport::broken(
                entries,
                i,
                format!(
                    "Non-monotonic timestamp at entry {}: {} < {}",
                    i, entry.created_at, previous.created_at
                ),
            );
        }
    }

    debug!("Chain verified: {} entries", entries.len());
    ChainReport {
        patient_id: entries.first().map(|e| e.patient_id),
        entry_count: entries.len(),
        valid: true,
        broken_at: None,
        error_message: None,
    }
}

/// Check every stored chain, or only `only_patient`'s. A requested patient
/// with no entries still gets a report under its id.
pub async fn audit_chains(
    database: &Database,
    only_patient: Option<i64>,
) -> Result<Vec<ChainReport>, IntegrityError> {
    let patient_ids = match only_patient {
        Some(id) => vec![id],
        None => Queries::get_ledger_patient_ids(database.pool()).await?,
    };
    info!("Verifying {} patient chains", patient_ids.len());

    let mut reports = Vec::with_capacity(patient_ids.len());
    for patient_id in patient_ids {
        let entries = Queries::get_ledger_entries(database.pool(), patient_id).await?;
        let mut report = verify_chain(&entries);
        report.patient_id.get_or_insert(patient_id);
        reports.push(report);
    }

    Ok(reports)
}
