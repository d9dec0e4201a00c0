use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use integrity_ledger::api::{self, AppState};
use integrity_ledger::audit::AuditTrail;
use integrity_ledger::config::AppConfig;
use integrity_ledger::database::Database;
use integrity_ledger::integrity::IntegrityService;
use integrity_ledger::ledger_client::LedgerClient;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "integrity_ledger=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting record integrity ledger");

    // Load configuration
    let config = AppConfig::load()?;
    info!("Configuration loaded");

    // Initialize database
    let database = Database::new(&config.database_url).await?;
    info!("Database connected");

    database.run_migrations().await?;
    info!("Database migrations completed");

    let audit = AuditTrail::new(database.clone(), config.audit.enabled);
    info!("Audit trail enabled: {}", audit.is_enabled());

    // Connection to the ledger network is made on first use
    let ledger_client = Arc::new(LedgerClient::new(config.ledger.clone()));
    info!(
        "Ledger client created (network enabled: {})",
        config.ledger.enabled
    );

    let service = IntegrityService::new(database, ledger_client, audit);
    let app = api::router(AppState { service });

    let addr = config.bind_address();
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
