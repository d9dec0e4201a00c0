pub mod api;
pub mod audit;
pub mod config;
pub mod database;
pub mod error;
pub mod integrity;
pub mod ledger_client;

pub use error::IntegrityError;
