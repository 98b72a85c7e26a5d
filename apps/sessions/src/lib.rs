pub mod config;
pub mod error;
pub mod services;
pub mod store;

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::store::PgDocumentStore;

pub use crate::services::sessions::{
    ActiveSession, ReconcilerSettings, SessionReconciler, SkipReason, WriteOutcome,
};

/// Install the global tracing subscriber. Later calls are no-ops.
pub fn init_tracing(filter: &str) {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(filter))
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .ok();
}

/// Load configuration, connect the PostgreSQL store and run migrations.
pub async fn run() -> anyhow::Result<SessionReconciler> {
    let config = Config::from_env()?;
    init_tracing(&config.log_filter);

    tracing::info!("Connecting to database...");
    let store = PgDocumentStore::connect(&config.database_url, config.max_connections).await?;

    tracing::info!("Running migrations...");
    store.run_migrations().await?;

    tracing::info!(
        "Session store ready, collection {}",
        config.sessions_collection
    );
    Ok(SessionReconciler::new(
        Arc::new(store),
        config.reconciler_settings(),
    ))
}
