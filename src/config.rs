use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

use crate::error::IntegrityError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub server_host: String,
    pub server_port: u16,
    pub ledger: LedgerConfig,
    pub audit: AuditConfig,
}

/// External ledger network settings. Any missing piece puts the client
/// into mock mode at first use.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    pub enabled: bool,
    pub connection_profile_path: PathBuf,
    pub wallet_path: PathBuf,
    pub identity_label: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    pub enabled: bool,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            connection_profile_path: PathBuf::from("ledger/connection-profile.json"),
            wallet_path: PathBuf::from("ledger/wallet"),
            identity_label: "integrity-service".to_string(),
        }
    }
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, IntegrityError> {
        let database_url = env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://integrity.db?mode=rwc".to_string());

        let server_host = env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());

        let server_port = env::var("SERVER_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .map_err(|e| IntegrityError::ConfigError(format!("Invalid SERVER_PORT: {}", e)))?;

        let defaults = LedgerConfig::default();
        let ledger = LedgerConfig {
            enabled: parse_flag("LEDGER_ENABLED", defaults.enabled)?,
            connection_profile_path: env::var("LEDGER_CONNECTION_PROFILE")
                .map(PathBuf::from)
                .unwrap_or(defaults.connection_profile_path),
            wallet_path: env::var("LEDGER_WALLET_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.wallet_path),
            identity_label: env::var("LEDGER_IDENTITY").unwrap_or(defaults.identity_label),
        };

        let audit = AuditConfig {
            enabled: parse_flag("AUDIT_ENABLED", AuditConfig::default().enabled)?,
        };

        Ok(AppConfig {
            database_url,
            server_host,
            server_port,
            ledger,
            audit,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}

fn parse_flag(name: &str, default: bool) -> Result<bool, IntegrityError> {
    match env::var(name) {
        Ok(value) => match value.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            other => Err(IntegrityError::ConfigError(format!(
                "Invalid boolean for {}: {}",
                name, other
            ))),
        },
        Err(_) => Ok(default),
    }
}
