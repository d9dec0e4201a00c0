//! In-process ledger simulation
//!
//! Produces plausible transaction ids and verdicts without any external call
//! or persistence.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::RngCore;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::ledger_client::types::*;
use crate::ledger_client::LedgerGateway;

#[derive(Debug, Clone, Default)]
pub struct MockClient;

impl MockClient {
    pub fn new() -> Self {
        Self
    }

    /// 64 hex chars, the shape of a real network transaction id.
    fn transaction_id(patient_id: i64, hash: &str, timestamp: DateTime<Utc>) -> String {
        let mut nonce = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut nonce);

        let mut hasher = Sha256::new();
        hasher.update(patient_id.to_be_bytes());
        hasher.update(hash.as_bytes());
        hasher.update(timestamp.timestamp_micros().to_be_bytes());
        hasher.update(nonce);
        hex::encode(hasher.finalize())
    }

    pub fn simulate_store(
        &self,
        patient_id: i64,
        hash: &str,
        timestamp: DateTime<Utc>,
    ) -> LedgerReceipt {
        let transaction_id = Self::transaction_id(patient_id, hash, timestamp);
        debug!(
            "Simulated ledger storeHash for patient {}: tx {}",
            patient_id, transaction_id
        );

        LedgerReceipt {
            transaction_id,
            patient_id,
            hash: hash.to_string(),
            timestamp,
            status: SubmissionStatus::Simulated,
        }
    }

    pub fn simulate_verify(&self, patient_id: i64, hash: &str) -> LedgerVerification {
        debug!("Simulated ledger verifyHash for patient {}", patient_id);

        // Nothing is persisted, so any well-formed digest is accepted.
        let well_formed = hash.len() == 64 && hash.chars().all(|c| c.is_ascii_hexdigit());

        LedgerVerification {
            patient_id,
            hash: hash.to_string(),
            verified: well_formed,
            status: SubmissionStatus::Simulated,
        }
    }

    pub fn simulate_history(&self, patient_id: i64) -> LedgerHistory {
        debug!("Simulated ledger getHistory for patient {}", patient_id);

        LedgerHistory {
            patient_id,
            records: Vec::new(),
            status: SubmissionStatus::Simulated,
        }
    }
}

#[async_trait]
impl LedgerGateway for MockClient {
    async fn store_hash(
        &self,
        patient_id: i64,
        hash: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<LedgerReceipt> {
        Ok(self.simulate_store(patient_id, hash, timestamp))
    }

    async fn verify_hash(&self, patient_id: i64, hash: &str) -> Result<LedgerVerification> {
        Ok(self.simulate_verify(patient_id, hash))
    }

    async fn get_history(&self, patient_id: i64) -> Result<LedgerHistory> {
        Ok(self.simulate_history(patient_id))
    }
}
