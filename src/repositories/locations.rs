use crate::db::DbPool;
use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct TemperatureLocation {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LocationCreate {
    pub name: String,
}

pub struct LocationsRepository {
    pool: DbPool,
}

impl LocationsRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn get_all(&self) -> Result<Vec<TemperatureLocation>> {
        let locations = sqlx::query_as::<_, TemperatureLocation>(
            "SELECT id, name FROM temperature_locations ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(locations)
    }

    pub async fn create(&self, create: &LocationCreate) -> Result<TemperatureLocation> {
        let name = valid_name(&create.name)?;

        let location = sqlx::query_as::<_, TemperatureLocation>(
            "INSERT INTO temperature_locations (name) VALUES ($1) RETURNING id, name",
        )
        .bind(name)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                AppError::Conflict(format!("a location named {} already exists", name))
            }
            _ => AppError::Database(e),
        })?;

        Ok(location)
    }

    /// Upsert by unique name, used by discovery.
    pub async fn resolve_or_create(&self, name: &str) -> Result<TemperatureLocation> {
        let name = valid_name(name)?;

        let location = sqlx::query_as::<_, TemperatureLocation>(
            r#"
            INSERT INTO temperature_locations (name) VALUES ($1)
            ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
            RETURNING id, name
            "#,
        )
        .bind(name)
        .fetch_one(&self.pool)
        .await?;

        Ok(location)
    }

    pub async fn rename(&self, id: i64, new_name: &str) -> Result<TemperatureLocation> {
        let name = valid_name(new_name)?;

        let location = sqlx::query_as::<_, TemperatureLocation>(
            "UPDATE temperature_locations SET name = $2 WHERE id = $1 RETURNING id, name",
        )
        .bind(id)
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                AppError::Conflict(format!("a location named {} already exists", name))
            }
            _ => AppError::Database(e),
        })?
        .ok_or_else(|| AppError::NotFound(format!("Location {} not found", id)))?;

        Ok(location)
    }

    pub async fn delete(&self, id: i64) -> Result<()> {
        let in_use: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM temperature_devices WHERE location_id = $1",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await?;
        if in_use > 0 {
            return Err(AppError::Conflict(format!(
                "location {} is still assigned to {} device(s)",
                id, in_use
            )));
        }

        let deleted = sqlx::query("DELETE FROM temperature_locations WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        if deleted == 0 {
            return Err(AppError::NotFound(format!("Location {} not found", id)));
        }
        Ok(())
    }
}

fn valid_name(name: &str) -> Result<&str> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(AppError::Validation(
            "location name must not be empty".into(),
        ));
    }
    Ok(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_and_blank_names_are_rejected() {
        assert!(matches!(valid_name(""), Err(AppError::Validation(_))));
        assert!(matches!(valid_name("   "), Err(AppError::Validation(_))));
        assert_eq!(valid_name("  Kitchen ").unwrap(), "Kitchen");
    }
}
