use crate::cache::TtlCache;
use crate::db::DbPool;
use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct NewReading {
    pub time: DateTime<Utc>,
    pub device_id: i64,
    pub location_id: Option<i64>,
    pub temperature_c: Option<f64>,
    pub humidity: Option<f64>,
    pub battery_level: Option<f64>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Reading {
    pub time: DateTime<Utc>,
    pub device_id: i64,
    pub location_id: Option<i64>,
    pub temperature_c: Option<f64>,
    pub humidity: Option<f64>,
    pub battery_level: Option<f64>,
    pub status: Option<String>,
}

/// Latest reading per active device, joined with its registry entries.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct CurrentReading {
    pub device_id: i64,
    pub device_name: String,
    pub mqtt_topic: String,
    pub location_id: Option<i64>,
    pub location_name: Option<String>,
    pub time: DateTime<Utc>,
    pub temperature_c: Option<f64>,
    pub humidity: Option<f64>,
    pub battery_level: Option<f64>,
    pub status: Option<String>,
}

pub struct ReadingsRepository {
    pool: DbPool,
    current: TtlCache<(), Vec<CurrentReading>>,
}

impl ReadingsRepository {
    pub fn new(pool: DbPool, current_ttl: Duration) -> Self {
        Self {
            pool,
            current: TtlCache::new(current_ttl),
        }
    }

    /// Append one reading. No de-duplication: duplicate messages produce
    /// duplicate rows.
    pub async fn insert(&self, r: &NewReading) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO temperature_readings
                (time, device_id, location_id, temperature_c, humidity, battery_level, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(r.time)
        .bind(r.device_id)
        .bind(r.location_id)
        .bind(r.temperature_c)
        .bind(r.humidity)
        .bind(r.battery_level)
        .bind(r.status.as_deref())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Most recent reading per non-retired device, served from the TTL cache.
    /// Concurrent callers during a miss share a single recompute.
    pub async fn current(&self) -> Result<Vec<CurrentReading>> {
        let pool = self.pool.clone();
        self.current
            .get_or_compute((), || async move { Self::query_current(&pool).await })
            .await
    }

    /// Drop the cached current readings; used when the active device set
    /// changes (retire/delete), not on ingest.
    pub async fn invalidate_current(&self) {
        self.current.invalidate(&()).await;
    }

    async fn query_current(pool: &DbPool) -> Result<Vec<CurrentReading>> {
        let readings = sqlx::query_as::<_, CurrentReading>(
            r#"
            SELECT DISTINCT ON (d.id)
                d.id AS device_id,
                d.name AS device_name,
                d.mqtt_topic,
                l.id AS location_id,
                l.name AS location_name,
                r.time,
                r.temperature_c,
                r.humidity,
                r.battery_level,
                r.status
            FROM temperature_devices d
            JOIN temperature_readings r ON r.device_id = d.id
            LEFT JOIN temperature_locations l ON l.id = d.location_id
            WHERE NOT d.is_retired
            ORDER BY d.id, r.time DESC
            "#,
        )
        .fetch_all(pool)
        .await?;

        Ok(readings)
    }

    pub async fn history(
        &self,
        device_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Reading>> {
        let readings = sqlx::query_as::<_, Reading>(
            r#"
            SELECT time, device_id, location_id, temperature_c, humidity, battery_level, status
            FROM temperature_readings
            WHERE device_id = $1 AND time >= $2 AND time <= $3
            ORDER BY time ASC
            "#,
        )
        .bind(device_id)
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;

        Ok(readings)
    }
}
