//! Record Integrity Ledger
//!
//! Canonical hashing of monitored patient fields, the per-patient hash
//! chain, baseline verification and offline chain checks.

pub mod canonical;
pub mod chain;
pub mod ledger;
pub mod service;
pub mod verifier;

pub use canonical::{chain_link, PatientFieldSnapshot, CANONICAL_FORMAT_VERSION};
pub use chain::{audit_chains, verify_chain, ChainReport};
pub use ledger::{HashLedger, LedgerPage};
pub use service::{HashRecord, IntegrityService, PatientHistory, VerificationReport};
pub use verifier::{VerificationResult, VerificationStatus, Verifier};
