//! SQLite pool construction and schema setup.
//!
//! [`create_pool`] is the single entry point: it opens (or creates) the
//! database behind a bounded connection pool and makes sure the
//! `devices` table exists before handing the pool out.

use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;

use crate::registry::RegistryError;

/// Upper bound on pooled connections for file-backed databases.
pub const MAX_CONNECTIONS: u32 = 4;

/// How long a writer waits on a locked database before failing.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const CREATE_DEVICES_TABLE: &str = "CREATE TABLE IF NOT EXISTS devices (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    city TEXT NOT NULL,
    county TEXT NOT NULL,
    street TEXT NOT NULL,
    street_number INTEGER NOT NULL,
    is_full INTEGER NOT NULL DEFAULT 0,
    use_number INTEGER NOT NULL DEFAULT 0
)";

/// Open a pool for `database_url` and apply the schema.
///
/// `sqlite::memory:` gets exactly one connection that is never recycled:
/// every pooled connection to `:memory:` would otherwise see its own
/// empty database.
pub async fn create_pool(database_url: &str) -> Result<SqlitePool, RegistryError> {
    let in_memory = database_url.contains(":memory:");

    let mut options = SqliteConnectOptions::from_str(database_url)
        .map_err(|err| RegistryError::connection(format!("{}: {}", database_url, err)))?
        .create_if_missing(true)
        .busy_timeout(BUSY_TIMEOUT);
    if !in_memory {
        options = options.journal_mode(SqliteJournalMode::Wal);
    }

    let pool_options = if in_memory {
        SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None::<Duration>)
            .max_lifetime(None::<Duration>)
    } else {
        SqlitePoolOptions::new().max_connections(MAX_CONNECTIONS)
    };

    let pool = pool_options
        .connect_with(options)
        .await
        .map_err(|err| RegistryError::connection(format!("{}: {}", database_url, err)))?;

    setup_schema(&pool).await?;

    tracing::debug!(database_url, "Device store ready");
    Ok(pool)
}

/// Create the `devices` table if it does not exist yet.
pub async fn setup_schema(pool: &SqlitePool) -> Result<(), RegistryError> {
    sqlx::query(CREATE_DEVICES_TABLE)
        .execute(pool)
        .await
        .map_err(|err| RegistryError::schema(err.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_pool_has_devices_table() {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        let row: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'devices'",
        )
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(row.0, 1);
    }

    #[tokio::test]
    async fn setup_schema_is_idempotent() {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        assert!(setup_schema(&pool).await.is_ok());
        assert!(setup_schema(&pool).await.is_ok());
    }

    #[tokio::test]
    async fn unreachable_path_is_a_connection_error() {
        let err = create_pool("sqlite:///nonexistent-dir/fleet.db").await.unwrap_err();
        assert!(matches!(err, RegistryError::Connection { .. }));
    }
}
