//! Ledger network gateway client
//!
//! Talks to the external distributed-ledger network through its HTTP
//! gateway, using a connection profile and a pre-enrolled wallet identity.
//! The deployed contract exposes `storeHash`, `verifyHash` and `getHistory`.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io::ErrorKind;
use std::path::Path;
use tracing::{debug, info};

use crate::config::LedgerConfig;
use crate::ledger_client::types::*;
use crate::ledger_client::LedgerGateway;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionProfile {
    pub name: String,
    pub gateway_url: String,
    pub channel: String,
    pub chaincode: String,
}

/// Enrolled identity as stored in the wallet. The private key stays on disk;
/// only the public certificate travels with requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletIdentity {
    pub msp_id: String,
    pub certificate: String,
}

#[derive(Debug, Serialize)]
struct TransactionRequest<'a> {
    function: &'a str,
    args: Vec<String>,
    identity: &'a WalletIdentity,
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    transaction_id: String,
}

#[derive(Debug, Deserialize)]
struct EvaluateResponse {
    payload: Value,
}

#[derive(Debug, Deserialize)]
struct VerifyPayload {
    verified: bool,
}

pub struct RealClient {
    profile: ConnectionProfile,
    identity: WalletIdentity,
    http_client: Client,
}

impl RealClient {
    /// Load profile and identity, then probe the gateway. Any failure here
    /// means the network is unusable for this process.
    pub async fn connect(config: &LedgerConfig) -> Result<Self> {
        let profile = load_connection_profile(&config.connection_profile_path).await?;
        let identity_path = config
            .wallet_path
            .join(format!("{}.id", config.identity_label));
        let identity = load_identity(&identity_path).await?;

        let client = Self {
            profile,
            identity,
            http_client: Client::new(),
        };
        client.probe().await?;

        info!(
            "Connected to ledger network '{}' (channel {}, contract {}) as {}",
            client.profile.name,
            client.profile.channel,
            client.profile.chaincode,
            client.identity.msp_id
        );
        Ok(client)
    }

    async fn probe(&self) -> Result<()> {
        let url = format!("{}/api/v1/health", self.base_url());
        self.http_client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Ledger gateway unreachable at {}", url))?
            .error_for_status()
            .map_err(|e| anyhow!("Ledger gateway health check failed: {}", e))?;
        Ok(())
    }

    fn base_url(&self) -> &str {
        self.profile.gateway_url.trim_end_matches('/')
    }

    fn contract_url(&self, action: &str) -> String {
        format!(
            "{}/api/v1/channels/{}/chaincodes/{}/{}",
            self.base_url(),
            self.profile.channel,
            self.profile.chaincode,
            action
        )
    }

    async fn submit(&self, function: &str, args: Vec<String>) -> Result<SubmitResponse> {
        debug!("Submitting {} to ledger network", function);
        let request = TransactionRequest {
            function,
            args,
            identity: &self.identity,
        };

        let response = self
            .http_client
            .post(self.contract_url("transactions"))
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json::<SubmitResponse>()
            .await?;
        Ok(response)
    }

    async fn evaluate(&self, function: &str, args: Vec<String>) -> Result<Value> {
        debug!("Evaluating {} on ledger network", function);
        let request = TransactionRequest {
            function,
            args,
            identity: &self.identity,
        };

        let response = self
            .http_client
            .post(self.contract_url("query"))
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json::<EvaluateResponse>()
            .await?;
        Ok(response.payload)
    }
}

#[async_trait]
impl LedgerGateway for RealClient {
    async fn store_hash(
        &self,
        patient_id: i64,
        hash: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<LedgerReceipt> {
        let response = self
            .submit(
                "storeHash",
                vec![patient_id.to_string(), hash.to_string(), timestamp.to_rfc3339()],
            )
            .await?;

        Ok(LedgerReceipt {
            transaction_id: response.transaction_id,
            patient_id,
            hash: hash.to_string(),
            timestamp,
            status: SubmissionStatus::Submitted,
        })
    }

    async fn verify_hash(&self, patient_id: i64, hash: &str) -> Result<LedgerVerification> {
        let payload = self
            .evaluate("verifyHash", vec![patient_id.to_string(), hash.to_string()])
            .await?;
        let verdict: VerifyPayload = serde_json::from_value(payload)?;

        Ok(LedgerVerification {
            patient_id,
            hash: hash.to_string(),
            verified: verdict.verified,
            status: SubmissionStatus::Submitted,
        })
    }

    async fn get_history(&self, patient_id: i64) -> Result<LedgerHistory> {
        let payload = self
            .evaluate("getHistory", vec![patient_id.to_string()])
            .await?;
        let records: Vec<LedgerHistoryRecord> = serde_json::from_value(payload)?;

        Ok(LedgerHistory {
            patient_id,
            records,
            status: SubmissionStatus::Submitted,
        })
    }
}

pub async fn load_connection_profile(path: &Path) -> Result<ConnectionProfile> {
    let contents = match tokio::fs::read_to_string(path).await {
        Ok(contents) => contents,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(anyhow!("Connection profile not found: {}", path.display()));
        }
        Err(e) => {
            return Err(e)
                .with_context(|| format!("Failed to read connection profile {}", path.display()));
        }
    };
    serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse connection profile {}", path.display()))
}

pub async fn load_identity(path: &Path) -> Result<WalletIdentity> {
    let contents = match tokio::fs::read_to_string(path).await {
        Ok(contents) => contents,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(anyhow!(
                "Identity not found in wallet: {} (enroll it first)",
                path.display()
            ));
        }
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to read identity {}", path.display()));
        }
    };
    serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse identity {}", path.display()))
}
