//! Audit Trail Sink
//!
//! Records who triggered which integrity action from where. Recording is
//! fire-and-forget: a failed insert is logged and never reaches the caller.

use chrono::Utc;
use tracing::{debug, warn};

use crate::database::models::AuditEvent;
use crate::database::Database;

pub const ACTION_HASH_RECORDED: &str = "integrity_hash_recorded";
pub const ACTION_VERIFIED: &str = "integrity_verified";
pub const ACTION_HISTORY_VIEWED: &str = "integrity_history_viewed";

/// Request context attached to every audit event.
#[derive(Debug, Clone, Default)]
pub struct AuditContext {
    pub actor_id: Option<i64>,
    pub source_ip: Option<String>,
}

#[derive(Clone)]
pub struct AuditTrail {
    database: Option<Database>,
}

impl AuditTrail {
    pub fn new(database: Database, enabled: bool) -> Self {
        Self {
            database: enabled.then_some(database),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.database.is_some()
    }

    /// Queue an audit event on its own task; the caller never waits on the
    /// insert.
    pub fn record(
        &self,
        context: &AuditContext,
        action_type: &str,
        patient_id: i64,
        description: String,
    ) {
        let Some(database) = self.database.clone() else {
            return;
        };

        let event = AuditEvent {
            actor_id: context.actor_id,
            action_type: action_type.to_string(),
            patient_id: Some(patient_id),
            description,
            source_ip: context
                .source_ip
                .clone()
                .unwrap_or_else(|| "unknown".to_string()),
            created_at: Utc::now(),
        };

        tokio::spawn(async move {
            match database.log_audit_event(&event).await {
                Ok(()) => debug!("Audit event {} for patient {}", event.action_type, patient_id),
                Err(e) => warn!(
                    "Failed to record audit event {} for patient {}: {}",
                    event.action_type, patient_id, e
                ),
            }
        });
    }
}
