//! PostgreSQL Store
//!
//! One `tokio-postgres` client per pooled connection, operating on the
//! `kv_pairs` table.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio_postgres::{Client, NoTls};
use tracing::{debug, warn};

use super::{ConnectionSource, Store, StoreError, StoreResult};

const CREATE_TABLE: &str =
    "CREATE TABLE IF NOT EXISTS kv_pairs (key TEXT PRIMARY KEY, value TEXT NOT NULL)";
const UPSERT: &str = "INSERT INTO kv_pairs (key, value) VALUES ($1, $2) \
                      ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value";
const SELECT: &str = "SELECT value FROM kv_pairs WHERE key = $1";
const DELETE: &str = "DELETE FROM kv_pairs WHERE key = $1";

// == Postgres Source ==
/// Connection source for a PostgreSQL database.
#[derive(Debug)]
pub struct PostgresSource {
    url: String,
    schema_ready: AtomicBool,
}

impl PostgresSource {
    /// Creates a source for the given libpq-style connection string.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            schema_ready: AtomicBool::new(false),
        }
    }

    async fn connect(&self) -> StoreResult<Client> {
        let (client, connection) = tokio_postgres::connect(&self.url, NoTls)
            .await
            .map_err(|e| StoreError::Connect(e.to_string()))?;

        // The connection object drives the socket; it ends when the client is dropped.
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                warn!("PostgreSQL connection closed with error: {}", e);
            }
        });

        if !self.schema_ready.load(Ordering::Acquire) {
            client
                .batch_execute(CREATE_TABLE)
                .await
                .map_err(|e| StoreError::Connect(e.to_string()))?;
            self.schema_ready.store(true, Ordering::Release);
        }

        Ok(client)
    }
}

#[async_trait]
impl ConnectionSource for PostgresSource {
    async fn open(&self) -> StoreResult<Box<dyn Store>> {
        let client = self.connect().await?;
        debug!("Opened PostgreSQL connection");
        Ok(Box::new(PostgresConnection { client }))
    }

    async fn reset(&self, conn: &mut Box<dyn Store>) -> StoreResult<()> {
        *conn = self.open().await?;
        Ok(())
    }

    fn describe(&self) -> &str {
        "postgres"
    }
}

// == Postgres Connection ==
struct PostgresConnection {
    client: Client,
}

fn backend(e: tokio_postgres::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}

#[async_trait]
impl Store for PostgresConnection {
    async fn put(&mut self, key: &str, value: &str) -> StoreResult<()> {
        self.client
            .execute(UPSERT, &[&key, &value])
            .await
            .map_err(backend)?;
        Ok(())
    }

    async fn get(&mut self, key: &str) -> StoreResult<Option<String>> {
        let row = self
            .client
            .query_opt(SELECT, &[&key])
            .await
            .map_err(backend)?;
        Ok(row.map(|r| r.get::<_, String>(0)))
    }

    async fn delete(&mut self, key: &str) -> StoreResult<()> {
        self.client.execute(DELETE, &[&key]).await.map_err(backend)?;
        Ok(())
    }

    async fn ping(&mut self) -> bool {
        !self.client.is_closed() && self.client.simple_query("SELECT 1").await.is_ok()
    }
}
