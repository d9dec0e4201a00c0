//! External Ledger Client
//!
//! Best-effort forwarding of patient hashes to an external distributed-ledger
//! network. The connection is attempted once, lazily, on first use:
//!
//! `Disconnected -> Connecting -> Connected | Mock`
//!
//! A failed connection attempt leaves the client in mock mode for the rest of
//! the process. While connected, a failing call is answered by the simulation
//! for that call only and the mode is kept. Callers never see ledger errors;
//! the `status` field on every result says where it came from. No timeout is
//! applied here.

pub mod mock;
pub mod real;
pub mod types;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU8, Ordering};
use tokio::sync::OnceCell;
use tracing::{info, warn};

use crate::config::LedgerConfig;

pub use mock::MockClient;
pub use real::RealClient;
pub use types::*;

/// Contract operations exposed by the ledger network.
#[async_trait]
pub trait LedgerGateway: Send + Sync {
    async fn store_hash(
        &self,
        patient_id: i64,
        hash: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<LedgerReceipt>;

    async fn verify_hash(&self, patient_id: i64, hash: &str) -> Result<LedgerVerification>;

    async fn get_history(&self, patient_id: i64) -> Result<LedgerHistory>;
}

pub struct LedgerClient {
    config: LedgerConfig,
    mode: AtomicU8,
    // `None` once resolved means mock mode.
    gateway: OnceCell<Option<Box<dyn LedgerGateway>>>,
    mock: MockClient,
}

impl LedgerClient {
    pub fn new(config: LedgerConfig) -> Self {
        Self {
            config,
            mode: AtomicU8::new(ConnectionMode::Disconnected.as_u8()),
            gateway: OnceCell::new(),
            mock: MockClient::new(),
        }
    }

    /// A client that never attempts a connection.
    pub fn mock() -> Self {
        Self {
            config: LedgerConfig::default(),
            mode: AtomicU8::new(ConnectionMode::Mock.as_u8()),
            gateway: OnceCell::new_with(Some(None)),
            mock: MockClient::new(),
        }
    }

    /// A client already connected through the given gateway.
    pub fn with_gateway(gateway: Box<dyn LedgerGateway>) -> Self {
        Self {
            config: LedgerConfig::default(),
            mode: AtomicU8::new(ConnectionMode::Connected.as_u8()),
            gateway: OnceCell::new_with(Some(Some(gateway))),
            mock: MockClient::new(),
        }
    }

    pub fn mode(&self) -> ConnectionMode {
        ConnectionMode::from_u8(self.mode.load(Ordering::Acquire))
    }

    fn set_mode(&self, mode: ConnectionMode) {
        self.mode.store(mode.as_u8(), Ordering::Release);
    }

    /// Resolve the connection, running the one-time connect if needed.
    pub async fn ensure_connected(&self) -> ConnectionMode {
        self.gateway().await;
        self.mode()
    }

    async fn gateway(&self) -> Option<&dyn LedgerGateway> {
        self.gateway
            .get_or_init(|| self.connect())
            .await
            .as_deref()
    }

    async fn connect(&self) -> Option<Box<dyn LedgerGateway>> {
        self.set_mode(ConnectionMode::Connecting);

        if !self.config.enabled {
            info!("Ledger network disabled, using mock ledger");
            self.set_mode(ConnectionMode::Mock);
            return None;
        }

        match RealClient::connect(&self.config).await {
            Ok(client) => {
                self.set_mode(ConnectionMode::Connected);
                Some(Box::new(client))
            }
            Err(e) => {
                warn!(
                    "Ledger network connection failed, switching to mock mode for this process: {:#}",
                    e
                );
                self.set_mode(ConnectionMode::Mock);
                None
            }
        }
    }

    pub async fn store_hash(
        &self,
        patient_id: i64,
        hash: &str,
        timestamp: DateTime<Utc>,
    ) -> LedgerReceipt {
        let Some(gateway) = self.gateway().await else {
            return self.mock.simulate_store(patient_id, hash, timestamp);
        };

        match gateway.store_hash(patient_id, hash, timestamp).await {
            Ok(receipt) => {
                info!(
                    "Hash for patient {} stored on ledger (tx {})",
                    patient_id, receipt.transaction_id
                );
                receipt
            }
            Err(e) => {
                warn!("Ledger storeHash failed for patient {}: {:#}", patient_id, e);
                self.mock
                    .simulate_store(patient_id, hash, timestamp)
                    .with_status(SubmissionStatus::Fallback)
            }
        }
    }

    pub async fn verify_hash(&self, patient_id: i64, hash: &str) -> LedgerVerification {
        let Some(gateway) = self.gateway().await else {
            return self.mock.simulate_verify(patient_id, hash);
        };

        match gateway.verify_hash(patient_id, hash).await {
            Ok(verification) => verification,
            Err(e) => {
                warn!("Ledger verifyHash failed for patient {}: {:#}", patient_id, e);
                self.mock
                    .simulate_verify(patient_id, hash)
                    .with_status(SubmissionStatus::Fallback)
            }
        }
    }

    pub async fn get_history(&self, patient_id: i64) -> LedgerHistory {
        let Some(gateway) = self.gateway().await else {
            return self.mock.simulate_history(patient_id);
        };

        match gateway.get_history(patient_id).await {
            Ok(history) => history,
            Err(e) => {
                warn!("Ledger getHistory failed for patient {}: {:#}", patient_id, e);
                self.mock
                    .simulate_history(patient_id)
                    .with_status(SubmissionStatus::Fallback)
            }
        }
    }
}
