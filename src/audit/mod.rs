//! Audit Trail
//!
//! Actor-attributed record of integrity operations, kept alongside the
//! hash ledger.

pub mod trail;

pub use trail::{AuditContext, AuditTrail};
