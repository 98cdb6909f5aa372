// Repository layer for database operations
//
// Layout:
// - devices: one row per device, keyed by device id
// - device_events: one row per event, keyed by (device_id, occurred_at)

use anyhow::Result;
use sqlx::PgPool;

use crate::models::*;

#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create database connection from URL
    pub async fn from_url(database_url: &str) -> Result<Self> {
        let pool = PgPool::connect(database_url).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create the registry and partition tables if they do not exist yet
    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS devices (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                device_type TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS device_events (
                device_id TEXT NOT NULL,
                occurred_at TIMESTAMPTZ NOT NULL,
                PRIMARY KEY (device_id, occurred_at)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // ============================================
    // Devices (registry)
    // ============================================

    pub async fn upsert_device(&self, input: UpsertDevice) -> Result<DeviceRow> {
        let row = sqlx::query_as::<_, DeviceRow>(
            r#"
            INSERT INTO devices (id, name, device_type)
            VALUES ($1, $2, $3)
            ON CONFLICT (id) DO UPDATE
            SET name = EXCLUDED.name, device_type = EXCLUDED.device_type
            RETURNING id, name, device_type
            "#,
        )
        .bind(&input.id)
        .bind(&input.name)
        .bind(&input.device_type)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn get_device(&self, id: &str) -> Result<Option<DeviceRow>> {
        let row = sqlx::query_as::<_, DeviceRow>(
            r#"
            SELECT id, name, device_type
            FROM devices
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn list_devices(&self) -> Result<Vec<DeviceRow>> {
        let rows = sqlx::query_as::<_, DeviceRow>(
            r#"
            SELECT id, name, device_type
            FROM devices
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    // ============================================
    // Device events (partitions)
    // ============================================

    pub async fn insert_event(&self, input: DeviceEventRow) -> Result<()> {
        // Same key means same record: a collision replaces the earlier row
        sqlx::query(
            r#"
            INSERT INTO device_events (device_id, occurred_at)
            VALUES ($1, $2)
            ON CONFLICT (device_id, occurred_at) DO UPDATE
            SET occurred_at = EXCLUDED.occurred_at
            "#,
        )
        .bind(&input.device_id)
        .bind(input.occurred_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn list_events_in_range(
        &self,
        device_id: &str,
        range: &EventRange,
    ) -> Result<Vec<DeviceEventRow>> {
        let rows = sqlx::query_as::<_, DeviceEventRow>(
            r#"
            SELECT device_id, occurred_at
            FROM device_events
            WHERE device_id = $1
              AND occurred_at >= $2
              AND occurred_at <= $3
            ORDER BY occurred_at ASC
            OFFSET $4
            LIMIT $5
            "#,
        )
        .bind(device_id)
        .bind(range.start)
        .bind(range.end)
        .bind(range.offset)
        .bind(range.limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    pub async fn count_events_in_range(&self, device_id: &str, range: &EventRange) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM device_events
            WHERE device_id = $1
              AND occurred_at >= $2
              AND occurred_at <= $3
            "#,
        )
        .bind(device_id)
        .bind(range.start)
        .bind(range.end)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }
}
