//! Canonical Patient Hashing
//!
//! Encodes the monitored patient fields as compact JSON with lexicographically
//! sorted keys and digests the result with SHA-256.
//!
//! Format version 1 field map:
//!
//! | key             | encoding                          |
//! |-----------------|-----------------------------------|
//! | `consent`       | JSON boolean                      |
//! | `created_at`    | RFC 3339 UTC, second precision    |
//! | `date_of_birth` | `YYYY-MM-DD`                      |
//! | `hiv_status`    | `Reactive`/`Non-Reactive`/`Unknown` |
//! | `name`          | JSON string                       |
//! | `patient_id`    | JSON integer                      |

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

use crate::database::models::{HivStatus, Patient};

/// Bump when the field map or its encoding changes.
pub const CANONICAL_FORMAT_VERSION: i64 = 1;

/// Monitored fields of a patient at one point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatientFieldSnapshot {
    pub patient_id: i64,
    pub name: String,
    pub date_of_birth: NaiveDate,
    pub hiv_status: HivStatus,
    pub consent: bool,
    pub original_creation_timestamp: DateTime<Utc>,
}

impl PatientFieldSnapshot {
    pub fn from_patient(patient: &Patient) -> Self {
        Self {
            patient_id: patient.id,
            name: patient.name.clone(),
            date_of_birth: patient.date_of_birth,
            hiv_status: patient.hiv_status,
            consent: patient.consent,
            original_creation_timestamp: patient.created_at,
        }
    }

    /// Pin the timestamp to the one recorded with a baseline entry.
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.original_creation_timestamp = timestamp;
        self
    }

    pub fn field_map(&self) -> Map<String, Value> {
        let mut fields = Map::new();
        fields.insert("patient_id".to_string(), Value::from(self.patient_id));
        fields.insert("name".to_string(), Value::from(self.name.clone()));
        fields.insert(
            "date_of_birth".to_string(),
            Value::from(self.date_of_birth.format("%Y-%m-%d").to_string()),
        );
        fields.insert("hiv_status".to_string(), Value::from(self.hiv_status.as_str()));
        fields.insert("consent".to_string(), Value::Bool(self.consent));
        fields.insert(
            "created_at".to_string(),
            Value::from(
                self.original_creation_timestamp
                    .to_rfc3339_opts(SecondsFormat::Secs, true),
            ),
        );
        fields
    }

    pub fn canonical_string(&self) -> String {
        to_canonical_json(&Value::Object(self.field_map()))
    }

    pub fn canonical_hash(&self) -> String {
        sha256_hex(self.canonical_string().as_bytes())
    }
}

/// Compact JSON with object keys sorted at every depth.
pub fn to_canonical_json(value: &Value) -> String {
    match value {
        Value::Array(items) => {
            let items: Vec<String> = items.iter().map(to_canonical_json).collect();
            format!("[{}]", items.join(","))
        }
        Value::Object(map) => {
            let sorted: BTreeMap<&String, &Value> = map.iter().collect();
            let items: Vec<String> = sorted
                .into_iter()
                .map(|(k, v)| format!("{}:{}", Value::String(k.clone()), to_canonical_json(v)))
                .collect();
            format!("{{{}}}", items.join(","))
        }
        scalar => scalar.to_string(),
    }
}

/// Hash an arbitrary field map the same way snapshots are hashed.
pub fn hash_field_map(fields: &Map<String, Value>) -> String {
    sha256_hex(to_canonical_json(&Value::Object(fields.clone())).as_bytes())
}

pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Block hash linking an entry to its predecessor: `H(prev ++ current)` over
/// the hex digests.
pub fn chain_link(previous_hash: &str, current_hash: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(previous_hash.as_bytes());
    hasher.update(current_hash.as_bytes());
    hex::encode(hasher.finalize())
}
