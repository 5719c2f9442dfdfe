//! SQLite store backed by a sqlx connection pool

use std::marker::PhantomData;
use std::path::Path;
use std::str::FromStr;

use anyhow::Context;
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};

use super::Store;
use crate::error::Result;
use crate::orm::{Entity, QueryDescription};

/// Database wrapper providing connection pool access
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Create a new database wrapper from an existing pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open (creating if needed) the database file at `path`
    pub async fn connect(path: &Path, max_connections: u32) -> anyhow::Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create database directory {}", parent.display())
            })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to open database at {}", path.display()))?;

        Ok(Self { pool })
    }

    /// A private in-memory database. One connection, so every query sees the same data.
    pub async fn in_memory() -> anyhow::Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .context("Failed to open in-memory database")?;

        Ok(Self { pool })
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// A store for one entity type on this database
    pub fn store<E: Entity>(&self) -> SqliteStore<E> {
        SqliteStore::new(self.pool.clone())
    }
}

pub struct SqliteStore<E> {
    pool: SqlitePool,
    _phantom: PhantomData<fn() -> E>,
}

impl<E: Entity> SqliteStore<E> {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            _phantom: PhantomData,
        }
    }

    /// Create the entity's table from its metadata if it doesn't exist.
    pub async fn create_table(&self) -> Result<()> {
        let sql = E::metadata().create_table_sql();
        tracing::debug!(sql = %sql, "Creating table");
        sqlx::query(&sql).execute(&self.pool).await?;
        Ok(())
    }

    /// Insert one entity with all its columns.
    pub async fn insert(&self, entity: &E) -> Result<()> {
        let meta = E::metadata();
        let columns = meta.column_names();
        let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{}", i)).collect();

        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            meta.table,
            columns.join(", "),
            placeholders.join(", ")
        );
        tracing::debug!(sql = %sql, id = entity.id(), "Inserting entity");

        let values = entity.to_sql_values();
        let mut query = sqlx::query(&sql);
        for value in &values {
            query = value.bind_to_query(query);
        }
        query.execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl<E: Entity> Store<E> for SqliteStore<E> {
    async fn fetch(&self, query: &QueryDescription) -> Result<Vec<E>> {
        let (sql, values) = query.to_sql(E::metadata());
        tracing::debug!(sql = %sql, "Executing entity query");

        let mut q = sqlx::query(&sql);
        for value in &values {
            q = value.bind_to_query(q);
        }

        let rows = q.fetch_all(&self.pool).await?;
        Ok(rows.iter().map(E::from_row).collect::<std::result::Result<Vec<_>, _>>()?)
    }

    async fn count(&self, query: &QueryDescription) -> Result<i64> {
        let (sql, values) = query.to_count_sql(E::metadata());
        tracing::debug!(sql = %sql, "Executing count query");

        let mut q = sqlx::query(&sql);
        for value in &values {
            q = value.bind_to_query(q);
        }

        let row = q.fetch_one(&self.pool).await?;
        Ok(row.try_get::<i64, _>(0)?)
    }
}
