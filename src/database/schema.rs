// SQL schema for the integrity ledger database, applied in order by
// `Database::run_migrations`.

pub const INITIAL_SCHEMA: &str = include_str!("../../migrations/001_initial_schema.sql");
pub const VERIFICATION_RUNS_SCHEMA: &str = include_str!("../../migrations/002_verification_runs.sql");
pub const AUDIT_EVENTS_SCHEMA: &str = include_str!("../../migrations/003_audit_events.sql");
