use crate::db::DbPool;
use crate::error::{AppError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct WaterLeakDevice {
    pub id: i64,
    pub name: String,
    pub mqtt_topic: String,
    pub inactive_limit_minutes: i32,
    pub last_seen: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WaterLeakCreate {
    pub name: String,
    pub mqtt_topic: String,
    #[serde(default = "default_inactive_limit")]
    pub inactive_limit_minutes: i32,
}

fn default_inactive_limit() -> i32 {
    240
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WaterLeakUpdate {
    pub name: Option<String>,
    pub inactive_limit_minutes: Option<i32>,
}

const LEAK_COLUMNS: &str = "id, name, mqtt_topic, inactive_limit_minutes, last_seen";

pub struct WaterLeakRepository {
    pool: DbPool,
}

impl WaterLeakRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn get_all(&self) -> Result<Vec<WaterLeakDevice>> {
        let devices = sqlx::query_as::<_, WaterLeakDevice>(&format!(
            "SELECT {LEAK_COLUMNS} FROM water_leak_devices ORDER BY name"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(devices)
    }

    pub async fn create(&self, create: &WaterLeakCreate) -> Result<WaterLeakDevice> {
        if create.name.trim().is_empty() || create.mqtt_topic.trim().is_empty() {
            return Err(AppError::Validation(
                "leak sensor name and topic must not be empty".into(),
            ));
        }
        if create.inactive_limit_minutes <= 0 {
            return Err(AppError::Validation(
                "inactive limit must be positive".into(),
            ));
        }

        let device = sqlx::query_as::<_, WaterLeakDevice>(&format!(
            r#"
            INSERT INTO water_leak_devices (name, mqtt_topic, inactive_limit_minutes)
            VALUES ($1, $2, $3)
            RETURNING {LEAK_COLUMNS}
            "#
        ))
        .bind(create.name.trim())
        .bind(create.mqtt_topic.trim())
        .bind(create.inactive_limit_minutes)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => AppError::Conflict(format!(
                "a leak sensor with topic {} already exists",
                create.mqtt_topic
            )),
            _ => AppError::Database(e),
        })?;

        Ok(device)
    }

    pub async fn update(&self, id: i64, update: &WaterLeakUpdate) -> Result<WaterLeakDevice> {
        let existing = sqlx::query_as::<_, WaterLeakDevice>(&format!(
            "SELECT {LEAK_COLUMNS} FROM water_leak_devices WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Leak sensor {} not found", id)))?;

        let name = match &update.name {
            Some(n) if n.trim().is_empty() => {
                return Err(AppError::Validation(
                    "leak sensor name must not be empty".into(),
                ))
            }
            Some(n) => n.trim().to_string(),
            None => existing.name,
        };
        let limit = update
            .inactive_limit_minutes
            .unwrap_or(existing.inactive_limit_minutes);
        if limit <= 0 {
            return Err(AppError::Validation(
                "inactive limit must be positive".into(),
            ));
        }

        let device = sqlx::query_as::<_, WaterLeakDevice>(&format!(
            r#"
            UPDATE water_leak_devices SET name = $2, inactive_limit_minutes = $3
            WHERE id = $1
            RETURNING {LEAK_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&name)
        .bind(limit)
        .fetch_one(&self.pool)
        .await?;

        Ok(device)
    }

    pub async fn delete(&self, id: i64) -> Result<()> {
        let deleted = sqlx::query("DELETE FROM water_leak_devices WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        if deleted == 0 {
            return Err(AppError::NotFound(format!("Leak sensor {} not found", id)));
        }
        Ok(())
    }

    /// Record a heartbeat for the leak sensor registered on `topic`.
    /// Returns false when no leak sensor uses that topic.
    pub async fn touch(&self, topic: &str, seen_at: DateTime<Utc>) -> Result<bool> {
        let updated = sqlx::query(
            "UPDATE water_leak_devices SET last_seen = GREATEST(last_seen, $2) WHERE mqtt_topic = $1",
        )
        .bind(topic)
        .bind(seen_at)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(updated > 0)
    }
}
