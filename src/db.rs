use std::fmt;
use std::time::Duration;

use dashmap::DashMap;
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use tracing::{debug, error, info, warn};

use crate::config::{AppConfig, StoreDbConfig};
use crate::errors::ServiceError;

/// Type alias for a database connection pool
pub type DbPool = DatabaseConnection;

/// Logical database a statement is addressed to.
///
/// `Cloud` is the warehouse-wide authoritative mirror, `Local` the per-site
/// operational store, `Store` a dedicated per-store database used only by the
/// dispatch mirror sync.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DatabaseTarget {
    Cloud,
    Local,
    Store(String),
}

impl fmt::Display for DatabaseTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatabaseTarget::Cloud => write!(f, "cloud"),
            DatabaseTarget::Local => write!(f, "local"),
            DatabaseTarget::Store(name) => write!(f, "store:{name}"),
        }
    }
}

/// Configuration for one database connection pool
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout: Duration,
    pub idle_timeout: Duration,
    pub acquire_timeout: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: 10,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
            acquire_timeout: Duration::from_secs(8),
        }
    }
}

impl DbConfig {
    fn from_app_config(cfg: &AppConfig, url: String) -> Self {
        Self {
            url,
            max_connections: cfg.db_max_connections,
            min_connections: cfg.db_min_connections,
            connect_timeout: Duration::from_secs(cfg.db_connect_timeout_secs),
            idle_timeout: Duration::from_secs(cfg.db_idle_timeout_secs),
            acquire_timeout: Duration::from_secs(cfg.db_acquire_timeout_secs),
        }
    }
}

/// Establishes a bounded connection pool to one database.
///
/// # Errors
/// Returns a `ServiceError::PersistenceError` naming `target` if the
/// connection cannot be established.
pub async fn establish_connection_with_config(
    config: &DbConfig,
    target: &DatabaseTarget,
) -> Result<DbPool, ServiceError> {
    debug!(%target, "configuring database connection pool");

    let mut opt = ConnectOptions::new(config.url.clone());
    opt.max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .connect_timeout(config.connect_timeout)
        .acquire_timeout(config.acquire_timeout)
        .idle_timeout(config.idle_timeout)
        .sqlx_logging(true);

    let pool = Database::connect(opt)
        .await
        .map_err(|e| ServiceError::persistence(target, e))?;

    info!(
        %target,
        max_connections = config.max_connections,
        "database connection pool established"
    );

    Ok(pool)
}

/// Resolves logical database targets to pooled connections.
///
/// One registry is constructed at startup and passed into every component;
/// `init` connects the cloud and local pools, per-store pools are registered
/// lazily from the store registry, and `shutdown` closes everything.
pub struct PoolRegistry {
    cloud: DbPool,
    local: DbPool,
    stores: DashMap<String, DbPool>,
    store_pool_config: DbConfig,
    store_db: StoreDbConfig,
}

impl PoolRegistry {
    /// Connects the cloud and local pools from application configuration.
    pub async fn init(cfg: &AppConfig) -> Result<Self, ServiceError> {
        let cloud = establish_connection_with_config(
            &DbConfig::from_app_config(cfg, cfg.cloud_database_url.clone()),
            &DatabaseTarget::Cloud,
        )
        .await?;
        let local = establish_connection_with_config(
            &DbConfig::from_app_config(cfg, cfg.local_database_url.clone()),
            &DatabaseTarget::Local,
        )
        .await?;

        Ok(Self {
            cloud,
            local,
            stores: DashMap::new(),
            store_pool_config: DbConfig::from_app_config(cfg, String::new()),
            store_db: cfg.store_db.clone(),
        })
    }

    /// Builds a registry from already-connected pools. Used by tests and
    /// tooling that manage their own connections.
    pub fn from_pools(cloud: DbPool, local: DbPool) -> Self {
        Self {
            cloud,
            local,
            stores: DashMap::new(),
            store_pool_config: DbConfig::default(),
            store_db: StoreDbConfig::default(),
        }
    }

    /// Builds the connection URL for a store's dedicated database from its
    /// registered host/port and the shared credentials template.
    pub fn store_url(&self, host: &str, port: u16) -> String {
        self.store_db.url(host, port)
    }

    pub fn cloud(&self) -> DbPool {
        self.cloud.clone()
    }

    pub fn local(&self) -> DbPool {
        self.local.clone()
    }

    /// Hands out the pool for a logical target. A `Store` target must have
    /// been registered (or connected via `ensure_store`) first.
    pub fn resolve(&self, target: &DatabaseTarget) -> Result<DbPool, ServiceError> {
        match target {
            DatabaseTarget::Cloud => Ok(self.cloud.clone()),
            DatabaseTarget::Local => Ok(self.local.clone()),
            DatabaseTarget::Store(name) => self
                .stores
                .get(name)
                .map(|entry| entry.value().clone())
                .ok_or_else(|| {
                    ServiceError::NotFound(format!("no registered database for store {name}"))
                }),
        }
    }

    /// Registers an already-connected pool for a store. Replaces any previous
    /// registration for the same store name.
    pub fn register_store_pool(&self, store_name: &str, pool: DbPool) {
        self.stores.insert(store_name.to_string(), pool);
    }

    /// Returns the dedicated pool for a store, connecting and caching it on
    /// first use from the store's registered host/port.
    pub async fn ensure_store(
        &self,
        store_name: &str,
        url: String,
    ) -> Result<DbPool, ServiceError> {
        if let Some(entry) = self.stores.get(store_name) {
            return Ok(entry.value().clone());
        }

        let target = DatabaseTarget::Store(store_name.to_string());
        let pool = establish_connection_with_config(
            &DbConfig {
                url,
                ..self.store_pool_config.clone()
            },
            &target,
        )
        .await?;

        self.stores.insert(store_name.to_string(), pool.clone());
        Ok(pool)
    }

    /// Closes every pool. Called once at process shutdown.
    pub async fn shutdown(&self) {
        info!("closing database connection pools");

        if let Err(e) = self.cloud.clone().close().await {
            error!("failed to close cloud pool: {e}");
        }
        if let Err(e) = self.local.clone().close().await {
            error!("failed to close local pool: {e}");
        }
        for entry in self.stores.iter() {
            if let Err(e) = entry.value().clone().close().await {
                warn!(store = %entry.key(), "failed to close store pool: {e}");
            }
        }
    }
}

/// Checks that a pool still answers.
pub async fn check_connection(pool: &DbPool, target: &DatabaseTarget) -> Result<(), ServiceError> {
    pool.ping()
        .await
        .map_err(|e| ServiceError::persistence(target, e))
}
