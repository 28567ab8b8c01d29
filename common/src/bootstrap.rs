// Bootstrap utilities for binary initialization
// Wires configuration into the persistence layer, the gateway and the services on top.

use crate::config::Settings;
use crate::db::repositories::{ReminderRepository, UserRepository};
use crate::db::{DbPool, ReminderStore, UserStore};
use crate::dispatch::NotificationDispatcher;
use crate::gateway::{NotificationGateway, WahaGateway};
use crate::lifecycle::ReminderLifecycleManager;
use crate::scheduler::JobRegistry;
use crate::users::OwnerRegistry;
use anyhow::{anyhow, Context, Result};
use std::sync::Arc;
use tracing::info;

/// Initialize database pool, applying migrations when enabled
///
/// # Errors
/// Returns error if the pool cannot connect or a migration fails
#[tracing::instrument(skip(settings))]
pub async fn init_database_pool(settings: &Settings) -> Result<DbPool> {
    info!("Initializing database pool");

    let db_pool = DbPool::new(&settings.database)
        .await
        .context("Failed to initialize database pool")?;

    if settings.database.run_migrations {
        db_pool
            .run_migrations()
            .await
            .context("Failed to apply database migrations")?;
    } else {
        info!("Database migrations skipped (disabled by configuration)");
    }

    info!("Database pool initialized");
    Ok(db_pool)
}

/// Initialize the WAHA notification gateway
///
/// # Errors
/// Returns error if the HTTP client cannot be built
pub fn init_gateway(settings: &Settings) -> Result<Arc<dyn NotificationGateway>> {
    let gateway = WahaGateway::new(&settings.gateway).context("Failed to build WAHA gateway")?;

    info!(
        base_url = %settings.gateway.base_url,
        session = %settings.gateway.session,
        "Notification gateway initialized"
    );
    Ok(Arc::new(gateway))
}

/// Build the job registry for the configured process timezone
///
/// # Errors
/// Returns error if the timezone is not a known IANA name
pub fn init_job_registry(settings: &Settings) -> Result<Arc<JobRegistry>> {
    let timezone = settings
        .scheduler
        .timezone()
        .map_err(|e| anyhow!(e))
        .context("Invalid scheduler timezone")?;

    info!(timezone = %timezone, "Job registry initialized");
    Ok(Arc::new(JobRegistry::new(timezone)))
}

/// Assemble the lifecycle manager from an arbitrary store and gateway
pub fn build_lifecycle_manager(
    store: Arc<dyn ReminderStore>,
    registry: Arc<JobRegistry>,
    gateway: Arc<dyn NotificationGateway>,
) -> Arc<ReminderLifecycleManager> {
    Arc::new(ReminderLifecycleManager::new(
        store,
        registry,
        NotificationDispatcher::new(gateway),
    ))
}

/// Postgres-backed lifecycle manager
///
/// # Errors
/// Returns error if the job registry cannot be initialized
pub fn init_lifecycle_manager(
    settings: &Settings,
    db_pool: DbPool,
    gateway: Arc<dyn NotificationGateway>,
) -> Result<Arc<ReminderLifecycleManager>> {
    let store = Arc::new(ReminderRepository::new(db_pool)) as Arc<dyn ReminderStore>;
    let registry = init_job_registry(settings)?;

    Ok(build_lifecycle_manager(store, registry, gateway))
}

/// Postgres-backed owner registration, naming new owners through the gateway
pub fn init_owner_registry(
    db_pool: DbPool,
    gateway: Arc<dyn NotificationGateway>,
) -> Arc<OwnerRegistry> {
    let users = Arc::new(UserRepository::new(db_pool)) as Arc<dyn UserStore>;
    Arc::new(OwnerRegistry::new(users, gateway))
}
