use thiserror::Error;

impl From<sqlx::Error> for IntegrityError {
    fn from(err: sqlx::Error) -> Self {
        Self::DatabaseError(format!("Database error: {}", err))
    }
}

#[derive(Error, Debug)]
pub enum IntegrityError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Patient {patient_id} not found")]
    PatientNotFound { patient_id: i64 },

    #[error("No ledger entries for patient {patient_id}")]
    LedgerEntryNotFound { patient_id: i64 },

    #[error("Concurrent ledger write conflict: {0}")]
    Conflict(String),

    #[error("Invalid value: {0}")]
    ValidationError(String),
}

impl IntegrityError {
    pub fn patient_not_found(patient_id: i64) -> Self {
        Self::PatientNotFound { patient_id }
    }

    pub fn append_conflict(patient_id: i64, attempts: u32) -> Self {
        Self::Conflict(format!(
            "patient {} chain tail kept moving after {} attempts",
            patient_id, attempts
        ))
    }

    /// True for both patient and ledger-entry absence.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::PatientNotFound { .. } | Self::LedgerEntryNotFound { .. }
        )
    }
}
