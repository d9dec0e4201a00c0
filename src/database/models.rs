use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use std::fmt;
use std::str::FromStr;

use crate::error::IntegrityError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HivStatus {
    #[serde(rename = "Reactive")]
    Reactive,
    #[serde(rename = "Non-Reactive")]
    NonReactive,
    #[serde(rename = "Unknown")]
    Unknown,
}

impl HivStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HivStatus::Reactive => "Reactive",
            HivStatus::NonReactive => "Non-Reactive",
            HivStatus::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for HivStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HivStatus {
    type Err = IntegrityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Reactive" => Ok(HivStatus::Reactive),
            "Non-Reactive" => Ok(HivStatus::NonReactive),
            "Unknown" => Ok(HivStatus::Unknown),
            other => Err(IntegrityError::ValidationError(format!(
                "Unknown HIV status: {}",
                other
            ))),
        }
    }
}

/// Derived integrity status owned by the patient record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntegrityStatus {
    Pending,
    Verified,
    Failed,
}

impl IntegrityStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntegrityStatus::Pending => "pending",
            IntegrityStatus::Verified => "verified",
            IntegrityStatus::Failed => "failed",
        }
    }

    pub fn from_outcome(is_verified: bool) -> Self {
        if is_verified {
            IntegrityStatus::Verified
        } else {
            IntegrityStatus::Failed
        }
    }
}

impl FromStr for IntegrityStatus {
    type Err = IntegrityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(IntegrityStatus::Pending),
            "verified" => Ok(IntegrityStatus::Verified),
            "failed" => Ok(IntegrityStatus::Failed),
            other => Err(IntegrityError::ValidationError(format!(
                "Unknown integrity status: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patient {
    pub id: i64,
    pub name: String,
    pub date_of_birth: NaiveDate,
    pub hiv_status: HivStatus,
    pub consent: bool,
    pub integrity_status: IntegrityStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPatient {
    pub name: String,
    pub date_of_birth: NaiveDate,
    pub hiv_status: HivStatus,
    pub consent: bool,
    pub created_at: DateTime<Utc>,
}

/// Partial edit of the monitored fields. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PatientUpdate {
    pub name: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub hiv_status: Option<HivStatus>,
    pub consent: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashLedgerEntry {
    pub id: i64,
    pub patient_id: i64,
    pub sequence: i64,
    pub data_hash: String,
    pub block_hash: Option<String>,
    pub hash_version: i64,
    pub snapshot_timestamp: DateTime<Utc>,
    pub verified: bool,
    pub created_at: DateTime<Utc>,
    pub verified_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct NewLedgerEntry {
    pub patient_id: i64,
    pub sequence: i64,
    pub data_hash: String,
    pub block_hash: Option<String>,
    pub hash_version: i64,
    pub snapshot_timestamp: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationRun {
    pub id: i64,
    pub patient_id: i64,
    pub baseline_entry_id: i64,
    pub current_hash: String,
    pub is_verified: bool,
    pub verified_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub actor_id: Option<i64>,
    pub action_type: String,
    pub patient_id: Option<i64>,
    pub description: String,
    pub source_ip: String,
    pub created_at: DateTime<Utc>,
}

fn decode_err(err: IntegrityError) -> sqlx::Error {
    sqlx::Error::Decode(Box::new(err))
}

impl Patient {
    pub(crate) fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        let hiv_status: String = row.try_get("hiv_status")?;
        let integrity_status: String = row.try_get("integrity_status")?;

        Ok(Patient {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            date_of_birth: row.try_get("date_of_birth")?,
            hiv_status: hiv_status.parse().map_err(decode_err)?,
            consent: row.try_get("consent")?,
            integrity_status: integrity_status.parse().map_err(decode_err)?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl HashLedgerEntry {
    pub(crate) fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(HashLedgerEntry {
            id: row.try_get("id")?,
            patient_id: row.try_get("patient_id")?,
            sequence: row.try_get("sequence")?,
            data_hash: row.try_get("data_hash")?,
            block_hash: row.try_get("block_hash")?,
            hash_version: row.try_get("hash_version")?,
            snapshot_timestamp: row.try_get("snapshot_timestamp")?,
            verified: row.try_get("verified")?,
            created_at: row.try_get("created_at")?,
            verified_at: row.try_get("verified_at")?,
        })
    }
}

impl VerificationRun {
    pub(crate) fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(VerificationRun {
            id: row.try_get("id")?,
            patient_id: row.try_get("patient_id")?,
            baseline_entry_id: row.try_get("baseline_entry_id")?,
            current_hash: row.try_get("current_hash")?,
            is_verified: row.try_get("is_verified")?,
            verified_at: row.try_get("verified_at")?,
        })
    }
}

impl AuditEvent {
    pub(crate) fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(AuditEvent {
            actor_id: row.try_get("actor_id")?,
            action_type: row.try_get("action_type")?,
            patient_id: row.try_get("patient_id")?,
            description: row.try_get("description")?,
            source_ip: row.try_get("source_ip")?,
            created_at: row.try_get("created_at")?,
        })
    }
}
