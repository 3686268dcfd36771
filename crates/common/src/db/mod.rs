//! Database layer for PaperVault
//!
//! Provides:
//! - SeaORM entity models
//! - Repository pattern for data access (the paper catalog)
//! - Connection pool management
//! - Idempotent schema bootstrap

pub mod models;
mod repository;

pub use repository::{MetadataStore, Repository};

use crate::config::DatabaseConfig;
use crate::errors::{AppError, Result};
use models::{PaperEntity, UserEntity};
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, EntityTrait, Schema,
};
use std::time::Duration;
use tracing::info;

/// Database connection pool wrapper.
///
/// Reads and writes share one pool, so a committed insert is visible to
/// the next query.
#[derive(Clone)]
pub struct DbPool {
    conn: DatabaseConnection,
}

impl DbPool {
    /// Create a new database pool from configuration
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        info!("Connecting to database...");

        let conn = Database::connect(connect_options(config))
            .await
            .map_err(|e| AppError::Configuration {
                message: format!("Failed to connect to database: {}", e),
            })?;

        info!("Database connection established");

        Ok(Self { conn })
    }

    /// Connection used for all catalog reads and writes
    pub fn connection(&self) -> &DatabaseConnection {
        &self.conn
    }

    /// Create the `papers` and `users` tables if they do not exist yet.
    ///
    /// The `filename` unique constraint comes from the entity definition.
    pub async fn ensure_schema(&self) -> Result<()> {
        create_table(&self.conn, PaperEntity).await?;
        create_table(&self.conn, UserEntity).await?;
        info!("Database schema ready");
        Ok(())
    }

    /// Ping the database to check connectivity
    pub async fn ping(&self) -> Result<()> {
        self.conn.ping().await?;
        Ok(())
    }
}

fn connect_options(config: &DatabaseConfig) -> ConnectOptions {
    let mut opts = ConnectOptions::new(&config.url);
    opts.max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
        .sqlx_logging(true);
    opts
}

async fn create_table<E>(conn: &DatabaseConnection, entity: E) -> Result<()>
where
    E: EntityTrait,
{
    let backend = conn.get_database_backend();
    let mut stmt = Schema::new(backend).create_table_from_entity(entity);
    stmt.if_not_exists();
    conn.execute(backend.build(&stmt)).await?;
    Ok(())
}
