use crate::db::DbPool;
use crate::error::{AppError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct TemperatureDevice {
    pub id: i64,
    pub name: String,
    pub mqtt_topic: String,
    pub is_retired: bool,
    pub exclude_from_inactive_alerts: bool,
    pub location_id: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeviceCreate {
    pub name: String,
    pub mqtt_topic: String,
    pub location_id: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeviceUpdate {
    pub name: Option<String>,
    pub is_retired: Option<bool>,
    pub exclude_from_inactive_alerts: Option<bool>,
    /// Absent = leave unchanged, `null` = clear, value = move.
    #[serde(default, deserialize_with = "double_option")]
    pub location_id: Option<Option<i64>>,
}

/// Distinguishes an absent JSON field (outer `None`) from an explicit `null`
/// (inner `None`).
fn double_option<'de, D>(d: D) -> std::result::Result<Option<Option<i64>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Option::<i64>::deserialize(d).map(Some)
}

/// Per-device activity snapshot used by the alert sweep.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DeviceActivity {
    pub id: i64,
    pub name: String,
    pub exclude_from_inactive_alerts: bool,
    pub last_seen: Option<DateTime<Utc>>,
    pub battery_level: Option<f64>,
}

const DEVICE_COLUMNS: &str =
    "id, name, mqtt_topic, is_retired, exclude_from_inactive_alerts, location_id";

pub struct DevicesRepository {
    pool: DbPool,
}

impl DevicesRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn get_all(&self) -> Result<Vec<TemperatureDevice>> {
        let devices = sqlx::query_as::<_, TemperatureDevice>(&format!(
            "SELECT {DEVICE_COLUMNS} FROM temperature_devices ORDER BY name"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(devices)
    }

    pub async fn get_by_id(&self, id: i64) -> Result<TemperatureDevice> {
        let device = sqlx::query_as::<_, TemperatureDevice>(&format!(
            "SELECT {DEVICE_COLUMNS} FROM temperature_devices WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Device {} not found", id)))?;

        Ok(device)
    }

    pub async fn create(&self, create: &DeviceCreate) -> Result<TemperatureDevice> {
        if create.name.trim().is_empty() {
            return Err(AppError::Validation("device name must not be empty".into()));
        }
        if create.mqtt_topic.trim().is_empty() {
            return Err(AppError::Validation("device topic must not be empty".into()));
        }

        let device = sqlx::query_as::<_, TemperatureDevice>(&format!(
            r#"
            INSERT INTO temperature_devices (name, mqtt_topic, location_id)
            VALUES ($1, $2, $3)
            RETURNING {DEVICE_COLUMNS}
            "#
        ))
        .bind(create.name.trim())
        .bind(create.mqtt_topic.trim())
        .bind(create.location_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => AppError::Conflict(format!(
                "a device with topic {} already exists",
                create.mqtt_topic
            )),
            _ => AppError::Database(e),
        })?;

        Ok(device)
    }

    /// Upsert by topic, used by discovery. Returns the device and whether the
    /// row was just created.
    pub async fn resolve_or_create(
        &self,
        mqtt_topic: &str,
        name: &str,
    ) -> Result<(TemperatureDevice, bool)> {
        let row = sqlx::query_as::<_, DeviceWithIsNew>(&format!(
            r#"
            INSERT INTO temperature_devices (name, mqtt_topic)
            VALUES ($1, $2)
            ON CONFLICT (mqtt_topic) DO UPDATE SET mqtt_topic = EXCLUDED.mqtt_topic
            RETURNING {DEVICE_COLUMNS}, (xmax = 0) AS is_new
            "#
        ))
        .bind(name)
        .bind(mqtt_topic)
        .fetch_one(&self.pool)
        .await?;

        Ok((row.device, row.is_new))
    }

    pub async fn update(&self, id: i64, update: &DeviceUpdate) -> Result<TemperatureDevice> {
        let mut device = self.get_by_id(id).await?;

        if let Some(name) = &update.name {
            if name.trim().is_empty() {
                return Err(AppError::Validation("device name must not be empty".into()));
            }
            device.name = name.trim().to_string();
        }
        if let Some(retired) = update.is_retired {
            device.is_retired = retired;
        }
        if let Some(exclude) = update.exclude_from_inactive_alerts {
            device.exclude_from_inactive_alerts = exclude;
        }

        let location_change = update.location_id.filter(|l| *l != device.location_id);
        if let Some(new_location) = location_change {
            device.location_id = new_location;
        }

        let mut tx = self.pool.begin().await?;
        sqlx::query(
            r#"
            UPDATE temperature_devices
            SET name = $2, is_retired = $3, exclude_from_inactive_alerts = $4, location_id = $5
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&device.name)
        .bind(device.is_retired)
        .bind(device.exclude_from_inactive_alerts)
        .bind(device.location_id)
        .execute(&mut *tx)
        .await?;

        // Location changes are history, not mutation of past readings.
        if let Some(Some(location_id)) = location_change {
            sqlx::query(
                "INSERT INTO device_location_history (device_id, location_id) VALUES ($1, $2)",
            )
            .bind(id)
            .bind(location_id)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        Ok(device)
    }

    /// Assign a discovered device to a location, recording the history row.
    /// No-op when the device already has a location.
    pub async fn assign_location_if_unset(&self, id: i64, location_id: i64) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        let updated = sqlx::query(
            "UPDATE temperature_devices SET location_id = $2 WHERE id = $1 AND location_id IS NULL",
        )
        .bind(id)
        .bind(location_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if updated > 0 {
            sqlx::query(
                "INSERT INTO device_location_history (device_id, location_id) VALUES ($1, $2)",
            )
            .bind(id)
            .bind(location_id)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        Ok(updated > 0)
    }

    pub async fn delete(&self, id: i64) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM temperature_readings WHERE device_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let deleted = sqlx::query("DELETE FROM temperature_devices WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        tx.commit().await?;

        if deleted == 0 {
            return Err(AppError::NotFound(format!("Device {} not found", id)));
        }
        Ok(())
    }

    /// Last-seen time and latest battery level per non-retired device.
    pub async fn activity(&self) -> Result<Vec<DeviceActivity>> {
        let rows = sqlx::query_as::<_, DeviceActivity>(
            r#"
            SELECT
                d.id,
                d.name,
                d.exclude_from_inactive_alerts,
                MAX(r.time) AS last_seen,
                (SELECT battery_level FROM temperature_readings
                 WHERE device_id = d.id ORDER BY time DESC LIMIT 1) AS battery_level
            FROM temperature_devices d
            LEFT JOIN temperature_readings r ON r.device_id = d.id
            WHERE NOT d.is_retired
            GROUP BY d.id
            ORDER BY d.name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}

struct DeviceWithIsNew {
    device: TemperatureDevice,
    is_new: bool,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for DeviceWithIsNew {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> std::result::Result<Self, sqlx::Error> {
        use sqlx::{FromRow, Row};
        Ok(Self {
            device: TemperatureDevice::from_row(row)?,
            is_new: row.try_get("is_new")?,
        })
    }
}
