//! Integrity Service
//!
//! Ties the hash ledger, verifier, external ledger client and audit trail
//! together for the request handlers.

use std::sync::Arc;
use tracing::info;

use crate::audit::trail::{ACTION_HASH_RECORDED, ACTION_HISTORY_VIEWED, ACTION_VERIFIED};
use crate::audit::{AuditContext, AuditTrail};
use crate::database::models::HashLedgerEntry;
use crate::database::queries::Queries;
use crate::database::Database;
use crate::error::IntegrityError;
use crate::integrity::chain::{verify_chain, ChainReport};
use crate::integrity::ledger::{HashLedger, LedgerPage};
use crate::integrity::verifier::{VerificationResult, Verifier};
use crate::ledger_client::{
    ConnectionMode, LedgerClient, LedgerHistory, LedgerReceipt, LedgerVerification,
};

#[derive(Debug, Clone)]
pub struct HashRecord {
    pub entry: HashLedgerEntry,
    pub external_submission: LedgerReceipt,
}

#[derive(Debug, Clone)]
pub struct VerificationReport {
    pub result: VerificationResult,
    pub external_verification: Option<LedgerVerification>,
}

#[derive(Debug, Clone)]
pub struct PatientHistory {
    pub patient_id: i64,
    pub entries: Vec<HashLedgerEntry>,
    pub chain: ChainReport,
    pub external: LedgerHistory,
}

#[derive(Clone)]
pub struct IntegrityService {
    database: Database,
    ledger: HashLedger,
    verifier: Verifier,
    ledger_client: Arc<LedgerClient>,
    audit: AuditTrail,
}

impl IntegrityService {
    pub fn new(database: Database, ledger_client: Arc<LedgerClient>, audit: AuditTrail) -> Self {
        Self {
            ledger: HashLedger::new(database.clone()),
            verifier: Verifier::new(database.clone()),
            database,
            ledger_client,
            audit,
        }
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    pub fn ledger_mode(&self) -> ConnectionMode {
        self.ledger_client.mode()
    }

    /// Append the patient's current hash and forward it to the external ledger.
    pub async fn record_hash(
        &self,
        patient_id: i64,
        context: &AuditContext,
    ) -> Result<HashRecord, IntegrityError> {
        let entry = self.ledger.append(patient_id).await?;

        let external_submission = self
            .ledger_client
            .store_hash(patient_id, &entry.data_hash, entry.created_at)
            .await;

        self.audit.record(
            context,
            ACTION_HASH_RECORDED,
            patient_id,
            format!(
                "Recorded integrity hash #{} ({:?} on external ledger)",
                entry.sequence, external_submission.status
            ),
        );

        Ok(HashRecord {
            entry,
            external_submission,
        })
    }

    pub async fn verify(
        &self,
        patient_id: i64,
        context: &AuditContext,
    ) -> Result<VerificationReport, IntegrityError> {
        let result = self.verifier.verify(patient_id).await?;

        let external_verification = match &result.current_hash {
            Some(hash) => Some(self.ledger_client.verify_hash(patient_id, hash).await),
            None => None,
        };

        self.audit.record(
            context,
            ACTION_VERIFIED,
            patient_id,
            format!("Integrity verification: {}", result.status.as_str()),
        );

        Ok(VerificationReport {
            result,
            external_verification,
        })
    }

    pub async fn history(
        &self,
        patient_id: i64,
        context: &AuditContext,
    ) -> Result<PatientHistory, IntegrityError> {
        if Queries::get_patient(self.database.pool(), patient_id)
            .await?
            .is_none()
        {
            return Err(IntegrityError::patient_not_found(patient_id));
        }

        let entries = self.ledger.history(patient_id).await?;
        let chain = verify_chain(&entries);
        let external = self.ledger_client.get_history(patient_id).await;

        self.audit.record(
            context,
            ACTION_HISTORY_VIEWED,
            patient_id,
            format!("Viewed {} integrity hashes", entries.len()),
        );

        info!(
            "History for patient {}: {} entries, chain valid: {}",
            patient_id,
            entries.len(),
            chain.valid
        );

        Ok(PatientHistory {
            patient_id,
            entries,
            chain,
            external,
        })
    }

    pub async fn latest(&self, patient_id: i64) -> Result<HashLedgerEntry, IntegrityError> {
        self.ledger.latest(patient_id).await
    }

    pub async fn list(
        &self,
        page: i64,
        per_page: i64,
        verified: Option<bool>,
    ) -> Result<LedgerPage, IntegrityError> {
        self.ledger.list(page, per_page, verified).await
    }
}
