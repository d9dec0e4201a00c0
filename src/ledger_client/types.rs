use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of the external ledger connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionMode {
    Disconnected,
    Connecting,
    Connected,
    Mock,
}

impl ConnectionMode {
    pub(crate) fn as_u8(self) -> u8 {
        match self {
            ConnectionMode::Disconnected => 0,
            ConnectionMode::Connecting => 1,
            ConnectionMode::Connected => 2,
            ConnectionMode::Mock => 3,
        }
    }

    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            1 => ConnectionMode::Connecting,
            2 => ConnectionMode::Connected,
            3 => ConnectionMode::Mock,
            _ => ConnectionMode::Disconnected,
        }
    }
}

impl fmt::Display for ConnectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionMode::Disconnected => "disconnected",
            ConnectionMode::Connecting => "connecting",
            ConnectionMode::Connected => "connected",
            ConnectionMode::Mock => "mock",
        };
        f.write_str(name)
    }
}

/// Where a ledger result came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionStatus {
    /// Accepted by the external network.
    Submitted,
    /// Produced by the in-process simulation because the client is in mock mode.
    Simulated,
    /// Client is connected but this call failed and was simulated instead.
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerReceipt {
    pub transaction_id: String,
    pub patient_id: i64,
    pub hash: String,
    pub timestamp: DateTime<Utc>,
    pub status: SubmissionStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerVerification {
    pub patient_id: i64,
    pub hash: String,
    pub verified: bool,
    pub status: SubmissionStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerHistoryRecord {
    pub transaction_id: String,
    pub hash: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerHistory {
    pub patient_id: i64,
    pub records: Vec<LedgerHistoryRecord>,
    pub status: SubmissionStatus,
}

impl LedgerReceipt {
    pub(crate) fn with_status(mut self, status: SubmissionStatus) -> Self {
        self.status = status;
        self
    }
}

impl LedgerVerification {
    pub(crate) fn with_status(mut self, status: SubmissionStatus) -> Self {
        self.status = status;
        self
    }
}

impl LedgerHistory {
    pub(crate) fn with_status(mut self, status: SubmissionStatus) -> Self {
        self.status = status;
        self
    }
}
