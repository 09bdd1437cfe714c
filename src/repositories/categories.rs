use crate::db::DbPool;
use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};

/// Ordering/grouping label for locations on the dashboard.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub ordinal: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryWithLocations {
    #[serde(flatten)]
    pub category: Category,
    pub location_ids: Vec<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CategoryCreate {
    pub name: String,
    #[serde(default)]
    pub ordinal: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CategoryUpdate {
    pub name: Option<String>,
    pub ordinal: Option<i32>,
}

pub struct CategoriesRepository {
    pool: DbPool,
}

impl CategoriesRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn get_all(&self) -> Result<Vec<CategoryWithLocations>> {
        let categories = sqlx::query_as::<_, Category>(
            "SELECT id, name, ordinal FROM categories ORDER BY ordinal, name",
        )
        .fetch_all(&self.pool)
        .await?;

        let links: Vec<(i64, i64)> = sqlx::query_as(
            "SELECT category_id, location_id FROM category_locations ORDER BY location_id",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(categories
            .into_iter()
            .map(|category| {
                let location_ids = links
                    .iter()
                    .filter(|(cat, _)| *cat == category.id)
                    .map(|(_, loc)| *loc)
                    .collect();
                CategoryWithLocations {
                    category,
                    location_ids,
                }
            })
            .collect())
    }

    pub async fn create(&self, create: &CategoryCreate) -> Result<Category> {
        let name = create.name.trim();
        if name.is_empty() {
            return Err(AppError::Validation(
                "category name must not be empty".into(),
            ));
        }

        let category = sqlx::query_as::<_, Category>(
            "INSERT INTO categories (name, ordinal) VALUES ($1, $2) RETURNING id, name, ordinal",
        )
        .bind(name)
        .bind(create.ordinal)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                AppError::Conflict(format!("a category named {} already exists", name))
            }
            _ => AppError::Database(e),
        })?;

        Ok(category)
    }

    pub async fn update(&self, id: i64, update: &CategoryUpdate) -> Result<Category> {
        let existing = sqlx::query_as::<_, Category>(
            "SELECT id, name, ordinal FROM categories WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Category {} not found", id)))?;

        let name = match &update.name {
            Some(n) if n.trim().is_empty() => {
                return Err(AppError::Validation(
                    "category name must not be empty".into(),
                ))
            }
            Some(n) => n.trim().to_string(),
            None => existing.name,
        };
        let ordinal = update.ordinal.unwrap_or(existing.ordinal);

        let category = sqlx::query_as::<_, Category>(
            "UPDATE categories SET name = $2, ordinal = $3 WHERE id = $1 RETURNING id, name, ordinal",
        )
        .bind(id)
        .bind(&name)
        .bind(ordinal)
        .fetch_one(&self.pool)
        .await?;

        Ok(category)
    }

    /// Replace the set of locations grouped under a category.
    pub async fn set_locations(&self, id: i64, location_ids: &[i64]) -> Result<()> {
        let exists: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM categories WHERE id = $1")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        if exists == 0 {
            return Err(AppError::NotFound(format!("Category {} not found", id)));
        }

        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM category_locations WHERE category_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        for location_id in location_ids {
            sqlx::query(
                "INSERT INTO category_locations (category_id, location_id) VALUES ($1, $2)",
            )
            .bind(id)
            .bind(location_id)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        Ok(())
    }

    pub async fn delete(&self, id: i64) -> Result<()> {
        let deleted = sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        if deleted == 0 {
            return Err(AppError::NotFound(format!("Category {} not found", id)));
        }
        Ok(())
    }
}
