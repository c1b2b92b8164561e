use crate::config::AppConfig;
use crate::errors::ServiceError;
use metrics::gauge;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection};
use sea_orm_migration::MigratorTrait;
use std::time::Duration;
use tracing::{debug, error, info};

/// Type alias for a database connection pool
pub type DbPool = DatabaseConnection;

/// Configuration for database connection
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Database connection URL
    pub url: String,
    /// Maximum number of connections
    pub max_connections: u32,
    /// Minimum number of connections
    pub min_connections: u32,
    /// Connection timeout duration
    pub connect_timeout: Duration,
    /// Idle timeout duration
    pub idle_timeout: Duration,
    /// Acquire connection timeout
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

impl From<&AppConfig> for DbConfig {
    fn from(cfg: &AppConfig) -> Self {
        Self {
            url: cfg.database_url.clone(),
            max_connections: cfg.db_max_connections,
            min_connections: cfg.db_min_connections,
            connect_timeout: Duration::from_secs(cfg.db_connect_timeout_secs),
            idle_timeout: Duration::from_secs(cfg.db_idle_timeout_secs),
            acquire_timeout: Duration::from_secs(cfg.db_acquire_timeout_secs),
        }
    }
}

/// Establishes a connection pool to the database with custom configuration
///
/// # Errors
/// Returns a `ServiceError` if the connection cannot be established
pub async fn establish_connection_with_config(config: &DbConfig) -> Result<DbPool, ServiceError> {
    debug!(
        max_connections = config.max_connections,
        min_connections = config.min_connections,
        "configuring database connection"
    );

    let mut opt = ConnectOptions::new(config.url.clone());
    opt.max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .connect_timeout(config.connect_timeout)
        .acquire_timeout(config.acquire_timeout)
        .idle_timeout(config.idle_timeout)
        .sqlx_logging(false);

    gauge!("academy_order_db.max_connections", config.max_connections as f64);

    let pool = Database::connect(opt).await.map_err(|e| {
        error!(error = %e, "database connection establishment failed");
        ServiceError::DatabaseError(e)
    })?;

    info!("Database connection pool established successfully");
    Ok(pool)
}

/// Establish DB pool using AppConfig tuning
pub async fn establish_connection_from_app_config(cfg: &AppConfig) -> Result<DbPool, ServiceError> {
    let db_cfg: DbConfig = cfg.into();
    establish_connection_with_config(&db_cfg).await
}

/// Applies all pending migrations of the embedded migrator.
pub async fn run_migrations(pool: &DbPool) -> Result<(), ServiceError> {
    info!("Running database migrations");
    crate::migrator::Migrator::up(pool, None).await.map_err(|e| {
        error!(error = %e, "database migration failed");
        ServiceError::DatabaseError(e)
    })?;
    info!("Database migrations completed");
    Ok(())
}

/// Round-trips a trivial statement to verify the pool is usable.
pub async fn check_connection(pool: &DbPool) -> Result<(), ServiceError> {
    let backend = pool.get_database_backend();
    pool.execute(sea_orm::Statement::from_string(backend, "SELECT 1".to_owned()))
        .await
        .map_err(ServiceError::DatabaseError)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sqlite_memory_pool_migrates_and_answers() {
        let config = DbConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
            min_connections: 1,
            ..Default::default()
        };
        let pool = establish_connection_with_config(&config).await.unwrap();
        run_migrations(&pool).await.unwrap();
        check_connection(&pool).await.unwrap();
    }

    #[test]
    fn app_config_tuning_flows_into_db_config() {
        let mut app = AppConfig::new(
            "postgres://localhost/orders".into(),
            "redis://localhost".into(),
            "test".into(),
        );
        app.db_max_connections = 42;
        let cfg = DbConfig::from(&app);
        assert_eq!(cfg.url, "postgres://localhost/orders");
        assert_eq!(cfg.max_connections, 42);
    }
}
