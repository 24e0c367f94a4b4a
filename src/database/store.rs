//! Product store backed by a Postgres connection pool.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions, PgSslMode};
use sqlx::PgExecutor;
use thiserror::Error;
use tokio::time::timeout;

use crate::config::DatabaseConfig;
use crate::database::marshal::{marshal_rows, MarshalError, ProductRow};

/// Most recent products first; `id` breaks ties between equal timestamps.
pub const RECENT_PRODUCTS_SQL: &str =
    "SELECT * FROM products ORDER BY created_at DESC, id DESC LIMIT 100";

/// Upper bound on rows returned by [`ProductStore::recent_products`].
pub const MAX_PRODUCTS: usize = 100;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Marshal(#[from] MarshalError),

    #[error("database call timed out after {0:?}")]
    Timeout(Duration),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Read access to the relational store.
#[async_trait]
pub trait ProductStore: Send + Sync {
    /// Check the store is reachable within `limit`.
    async fn ping(&self, limit: Duration) -> Result<(), StoreError>;

    /// Fetch at most [`MAX_PRODUCTS`] rows, newest first, within `limit`.
    async fn recent_products(&self, limit: Duration) -> Result<Vec<ProductRow>, StoreError>;
}

/// [`ProductStore`] over a shared `sqlx` pool.
#[derive(Clone)]
pub struct PgProductStore {
    pool: PgPool,
}

impl PgProductStore {
    /// Build the pool without connecting; connections open on first use so
    /// an unreachable database does not block startup.
    pub fn connect_lazy(config: &DatabaseConfig) -> Result<Self, StoreError> {
        let ssl_mode = PgSslMode::from_str(&config.ssl_mode)?;
        let options = PgConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .username(&config.user)
            .password(&config.password)
            .database(&config.name)
            .ssl_mode(ssl_mode);

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_millis(config.acquire_timeout_ms))
            .connect_lazy_with(options);

        tracing::info!(
            host = %config.host,
            port = config.port,
            database = %config.name,
            max_connections = config.max_connections,
            "Database pool configured"
        );

        Ok(Self { pool })
    }

}

/// Run [`RECENT_PRODUCTS_SQL`] on `executor` and marshal the result.
///
/// The statement goes over the simple query protocol so every column
/// arrives in text form, whatever its type.
pub async fn fetch_recent_products<'e, E>(executor: E) -> Result<Vec<ProductRow>, MarshalError>
where
    E: PgExecutor<'e>,
{
    marshal_rows(sqlx::raw_sql(RECENT_PRODUCTS_SQL).fetch(executor)).await
}

#[async_trait]
impl ProductStore for PgProductStore {
    async fn ping(&self, limit: Duration) -> Result<(), StoreError> {
        let check = async {
            let mut conn = self.pool.acquire().await?;
            sqlx::Connection::ping(&mut *conn).await
        };
        match timeout(limit, check).await {
            Ok(result) => result.map_err(StoreError::from),
            Err(_) => Err(StoreError::Timeout(limit)),
        }
    }

    async fn recent_products(&self, limit: Duration) -> Result<Vec<ProductRow>, StoreError> {
        match timeout(limit, fetch_recent_products(&self.pool)).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(StoreError::Timeout(limit)),
        }
    }
}
