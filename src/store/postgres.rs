use super::backend::{StateBackend, StoreFuture};
use crate::error::StoreError;
use log::info;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::collections::HashMap;

/// Default name of the monitor state table
pub const DEFAULT_TABLE: &str = "monitor_state";

/// Postgres-backed state table
///
/// Layout: `(state_key VARCHAR(255) PRIMARY KEY, state_value VARCHAR(255) NOT NULL)`.
pub struct PgStateBackend {
    pool: PgPool,
    table: String,
}

/// Create a small connection pool for the state table
pub async fn create_pool(url: &str, max_connections: u32) -> Result<PgPool, StoreError> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(url)
        .await?;
    Ok(pool)
}

impl PgStateBackend {
    pub fn new(pool: PgPool, table: &str) -> Result<Self, StoreError> {
        validate_table_name(table)?;
        Ok(Self {
            pool,
            table: table.to_string(),
        })
    }

    /// Connect to `url` and use `table` for state
    pub async fn connect(url: &str, table: &str) -> Result<Self, StoreError> {
        validate_table_name(table)?;
        let pool = create_pool(url, 2).await?;
        info!("Connected to state database, table '{}'", table);
        Self::new(pool, table)
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Table names are interpolated into SQL, so only plain identifiers are allowed
fn validate_table_name(table: &str) -> Result<(), StoreError> {
    let mut chars = table.chars();
    let valid_start = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_');
    let valid_rest = chars.all(|c| c.is_ascii_alphanumeric() || c == '_');

    if valid_start && valid_rest && table.len() <= 63 {
        Ok(())
    } else {
        Err(StoreError::InvalidTableName(table.to_string()))
    }
}

impl StateBackend for PgStateBackend {
    fn ensure_table<'a>(&'a self) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let sql = format!(
                "CREATE TABLE IF NOT EXISTS {} (
                    state_key VARCHAR(255) PRIMARY KEY,
                    state_value VARCHAR(255) NOT NULL
                )",
                self.table
            );
            sqlx::query(&sql).execute(&self.pool).await?;
            Ok(())
        })
    }

    fn load_all<'a>(&'a self) -> StoreFuture<'a, HashMap<String, String>> {
        Box::pin(async move {
            let sql = format!("SELECT state_key, state_value FROM {}", self.table);
            let rows: Vec<(String, String)> =
                sqlx::query_as(&sql).fetch_all(&self.pool).await?;
            Ok(rows.into_iter().collect())
        })
    }

    fn upsert<'a>(&'a self, key: &'a str, value: &'a str) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let sql = format!(
                "INSERT INTO {} (state_key, state_value) VALUES ($1, $2)
                 ON CONFLICT (state_key) DO UPDATE SET state_value = EXCLUDED.state_value",
                self.table
            );

            let mut tx = self.pool.begin().await?;
            sqlx::query(&sql)
                .bind(key)
                .bind(value)
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;
            Ok(())
        })
    }
}
