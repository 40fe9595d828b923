//! Durable device registry.
//!
//! All SQLite read/write logic for device records lives here. Monitors
//! share one [`DeviceRegistry`] behind an `Arc` and only ever call
//! [`DeviceRegistry::set_full_state`] or its time-bounded twin
//! [`DeviceRegistry::set_full_state_within`]; everything else is for
//! callers that manage or report on the fleet.
//!
//! Each write is a single statement (or a single-statement transaction),
//! so a record is never seen half-written. Concurrent callers are serialised by the underlying
//! [`SqlitePool`].

pub mod error;
pub mod types;

use std::time::Duration;

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

pub use error::{RegistryError, RegistryResult};
pub use types::{DeviceId, DeviceRecord, FullState};

const SELECT_DEVICE: &str =
    "SELECT id, city, county, street, street_number, is_full, use_number FROM devices";

/// Repository for reading and writing device records to SQLite.
pub struct DeviceRegistry {
    pool: SqlitePool,
}

impl DeviceRegistry {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open the database at `database_url` and wrap it in a registry.
    pub async fn connect(database_url: &str) -> RegistryResult<Self> {
        let pool = crate::db::create_pool(database_url).await?;
        Ok(Self::new(pool))
    }

    /// Insert a new device. It starts not full with a zero use counter.
    /// Returns the new row id.
    pub async fn register(
        &self,
        city: &str,
        county: &str,
        street: &str,
        street_number: i64,
    ) -> RegistryResult<DeviceId> {
        let result = sqlx::query(
            "INSERT INTO devices (city, county, street, street_number, is_full, use_number)
             VALUES (?, ?, ?, ?, 0, 0)",
        )
        .bind(city)
        .bind(county)
        .bind(street)
        .bind(street_number)
        .execute(&self.pool)
        .await
        .map_err(RegistryError::from_write)?;

        let id = result.last_insert_rowid();
        tracing::debug!(device_id = id, city, street, "Device registered");
        Ok(id)
    }

    /// Delete a device. `NotFound` if no row had this id.
    pub async fn remove(&self, id: DeviceId) -> RegistryResult<()> {
        let result = sqlx::query("DELETE FROM devices WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(RegistryError::from_write)?;

        if result.rows_affected() == 0 {
            return Err(RegistryError::not_found(id));
        }
        tracing::debug!(device_id = id, "Device removed");
        Ok(())
    }

    /// Replace the address fields of a device. `is_full` and `use_number`
    /// are left alone.
    pub async fn update(
        &self,
        id: DeviceId,
        city: &str,
        county: &str,
        street: &str,
        street_number: i64,
    ) -> RegistryResult<()> {
        let result = sqlx::query(
            "UPDATE devices SET city = ?, county = ?, street = ?, street_number = ? WHERE id = ?",
        )
        .bind(city)
        .bind(county)
        .bind(street)
        .bind(street_number)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(RegistryError::from_write)?;

        // SQLite counts matched rows, so an identical update still reports 1.
        if result.rows_affected() == 0 {
            return Err(RegistryError::not_found(id));
        }
        Ok(())
    }

    pub async fn get_by_id(&self, id: DeviceId) -> RegistryResult<DeviceRecord> {
        let sql = format!("{} WHERE id = ?", SELECT_DEVICE);
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(RegistryError::from_read)?
            .ok_or_else(|| RegistryError::not_found(id))?;

        device_from_row(&row).map_err(RegistryError::from_read)
    }

    /// Devices in `city`, ordered by street.
    pub async fn query_by_city(&self, city: &str) -> RegistryResult<Vec<DeviceRecord>> {
        self.fetch_filtered("city = ?", city, "street ASC, street_number ASC, id ASC")
            .await
    }

    /// Devices on `street`, ordered by street number.
    pub async fn query_by_street(&self, street: &str) -> RegistryResult<Vec<DeviceRecord>> {
        self.fetch_filtered("street = ?", street, "street_number ASC, id ASC")
            .await
    }

    /// Devices in `county`, ordered by city.
    pub async fn query_by_county(&self, county: &str) -> RegistryResult<Vec<DeviceRecord>> {
        self.fetch_filtered(
            "county = ?",
            county,
            "city ASC, street ASC, street_number ASC, id ASC",
        )
        .await
    }

    /// Persist the full/not-full flag of a device. Writing the value it
    /// already has is a successful no-op.
    pub async fn set_full_state(&self, id: DeviceId, is_full: bool) -> RegistryResult<()> {
        let is_full_int: i64 = if is_full { 1 } else { 0 };

        let result = sqlx::query("UPDATE devices SET is_full = ? WHERE id = ?")
            .bind(is_full_int)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(RegistryError::from_write)?;

        if result.rows_affected() == 0 {
            return Err(RegistryError::not_found(id));
        }
        Ok(())
    }

    /// Like [`set_full_state`](Self::set_full_state), but give up after
    /// `limit`.
    ///
    /// The UPDATE runs inside a transaction and only the part before
    /// COMMIT is bounded. When the limit hits, the transaction is dropped
    /// and rolled back, so an abandoned write never lands later; once
    /// this returns the write has either committed or never will.
    pub async fn set_full_state_within(
        &self,
        id: DeviceId,
        is_full: bool,
        limit: Duration,
    ) -> RegistryResult<()> {
        let is_full_int: i64 = if is_full { 1 } else { 0 };

        let staged = tokio::time::timeout(limit, async {
            let mut tx = self.pool.begin().await.map_err(RegistryError::from_write)?;
            let result = sqlx::query("UPDATE devices SET is_full = ? WHERE id = ?")
                .bind(is_full_int)
                .bind(id)
                .execute(&mut *tx)
                .await
                .map_err(RegistryError::from_write)?;
            Ok::<_, RegistryError>((tx, result.rows_affected()))
        })
        .await;

        let (tx, rows_affected) = match staged {
            Ok(staged) => staged?,
            Err(_) => {
                return Err(RegistryError::Timeout {
                    id,
                    waited_ms: limit.as_millis(),
                })
            }
        };

        if rows_affected == 0 {
            return Err(RegistryError::not_found(id));
        }
        tx.commit().await.map_err(RegistryError::from_write)?;
        Ok(())
    }

    /// Read the persisted classification. A missing device is `NotFound`,
    /// not `NotFull`.
    pub async fn is_full(&self, id: DeviceId) -> RegistryResult<FullState> {
        let row = sqlx::query("SELECT is_full FROM devices WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(RegistryError::from_read)?
            .ok_or_else(|| RegistryError::not_found(id))?;

        let is_full: i64 = row.try_get("is_full").map_err(RegistryError::from_read)?;
        Ok(FullState::from(is_full != 0))
    }

    /// Number of registered devices.
    pub async fn count(&self) -> RegistryResult<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS cnt FROM devices")
            .fetch_one(&self.pool)
            .await
            .map_err(RegistryError::from_read)?;

        row.try_get("cnt").map_err(RegistryError::from_read)
    }

    async fn fetch_filtered(
        &self,
        condition: &str,
        value: &str,
        order_by: &str,
    ) -> RegistryResult<Vec<DeviceRecord>> {
        let sql = format!("{} WHERE {} ORDER BY {}", SELECT_DEVICE, condition, order_by);

        let rows = sqlx::query(&sql)
            .bind(value)
            .fetch_all(&self.pool)
            .await
            .map_err(RegistryError::from_read)?;

        rows.iter()
            .map(device_from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(RegistryError::from_read)
    }
}

fn device_from_row(row: &SqliteRow) -> Result<DeviceRecord, sqlx::Error> {
    let is_full: i64 = row.try_get("is_full")?;

    Ok(DeviceRecord {
        id: row.try_get("id")?,
        city: row.try_get("city")?,
        county: row.try_get("county")?,
        street: row.try_get("street")?,
        street_number: row.try_get("street_number")?,
        is_full: is_full != 0,
        use_number: row.try_get("use_number")?,
    })
}
