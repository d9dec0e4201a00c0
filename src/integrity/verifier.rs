//! Tamper Verification
//!
//! Recomputes a patient's canonical hash from current data and compares it
//! with the baseline, the earliest ledger entry. Monitored fields are assumed
//! immutable after enrollment: any change since the baseline, legitimate or
//! not, is reported as tampering. Later appends never replace the baseline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::database::queries::Queries;
use crate::database::Database;
use crate::error::IntegrityError;
use crate::integrity::canonical::PatientFieldSnapshot;
use crate::integrity::ledger::HashLedger;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    Verified,
    Failed,
    NoHash,
}

impl VerificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationStatus::Verified => "verified",
            VerificationStatus::Failed => "failed",
            VerificationStatus::NoHash => "no_hash",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationResult {
    pub patient_id: i64,
    pub status: VerificationStatus,
    pub current_hash: Option<String>,
    pub baseline_hash: Option<String>,
    pub is_verified: bool,
    pub has_tampering: bool,
    pub baseline_timestamp: Option<DateTime<Utc>>,
    pub verification_timestamp: DateTime<Utc>,
}

impl VerificationResult {
    pub fn message(&self) -> &'static str {
        match self.status {
            VerificationStatus::Verified => "Patient data matches the original snapshot",
            VerificationStatus::Failed => {
                "Patient data differs from the original snapshot; possible tampering"
            }
            VerificationStatus::NoHash => "No hash recorded for this patient",
        }
    }
}

#[derive(Clone)]
pub struct Verifier {
    database: Database,
    ledger: HashLedger,
}

impl Verifier {
    pub fn new(database: Database) -> Self {
        let ledger = HashLedger::new(database.clone());
        Self { database, ledger }
    }

    pub async fn verify(&self, patient_id: i64) -> Result<VerificationResult, IntegrityError> {
        let patient = Queries::get_patient(self.database.pool(), patient_id)
            .await?
            .ok_or_else(|| IntegrityError::patient_not_found(patient_id))?;

        let verification_timestamp = Utc::now();

        let baseline = match self.ledger.earliest(patient_id).await? {
            Some(baseline) => baseline,
            None => {
                info!("No baseline hash for patient {}", patient_id);
                return Ok(VerificationResult {
                    patient_id,
                    status: VerificationStatus::NoHash,
                    current_hash: None,
                    baseline_hash: None,
                    is_verified: false,
                    has_tampering: false,
                    baseline_timestamp: None,
                    verification_timestamp,
                });
            }
        };

        let current_hash = PatientFieldSnapshot::from_patient(&patient)
            .with_timestamp(baseline.snapshot_timestamp)
            .canonical_hash();
        let is_verified = current_hash == baseline.data_hash;

        self.database
            .record_verification(
                patient_id,
                baseline.id,
                &current_hash,
                is_verified,
                verification_timestamp,
            )
            .await?;

        if is_verified {
            info!("Patient {} verified against baseline", patient_id);
        } else {
            warn!(
                "Patient {} failed verification: current {} != baseline {}",
                patient_id, current_hash, baseline.data_hash
            );
        }

        Ok(VerificationResult {
            patient_id,
            status: if is_verified {
                VerificationStatus::Verified
            } else {
                VerificationStatus::Failed
            },
            current_hash: Some(current_hash),
            baseline_hash: Some(baseline.data_hash),
            is_verified,
            has_tampering: !is_verified,
            baseline_timestamp: Some(baseline.created_at),
            verification_timestamp,
        })
    }
}
