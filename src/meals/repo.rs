use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use super::{
    dto::MealRecord,
    repo_types::{MealRow, NewMeal},
};
use crate::error::MealError;

#[async_trait]
pub trait MealStore: Send + Sync {
    /// Inserts one row and returns it as stored.
    async fn insert(&self, meal: NewMeal) -> Result<MealRecord, MealError>;

    /// The user's meals with `from <= created_at < to`, newest first.
    async fn list_between(
        &self,
        user_id: Uuid,
        from: OffsetDateTime,
        to: OffsetDateTime,
    ) -> Result<Vec<MealRecord>, MealError>;
}

#[derive(Clone)]
pub struct PgMealStore {
    db: PgPool,
}

impl PgMealStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl MealStore for PgMealStore {
    async fn insert(&self, meal: NewMeal) -> Result<MealRecord, MealError> {
        let row = sqlx::query_as::<_, MealRow>(
            r#"
            INSERT INTO meals (user_id, meal_type, text_entry, calories, protein, fat, fibre, sugar)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, user_id, meal_type, text_entry, calories, protein, fat, fibre, sugar, created_at
            "#,
        )
        .bind(meal.user_id)
        .bind(meal.meal_type.as_str())
        .bind(&meal.text_entry)
        .bind(meal.macros.calories)
        .bind(meal.macros.protein)
        .bind(meal.macros.fat)
        .bind(meal.macros.fibre)
        .bind(meal.macros.sugar)
        .fetch_one(&self.db)
        .await?;

        Ok(MealRecord::try_from(row)?)
    }

    async fn list_between(
        &self,
        user_id: Uuid,
        from: OffsetDateTime,
        to: OffsetDateTime,
    ) -> Result<Vec<MealRecord>, MealError> {
        let rows = sqlx::query_as::<_, MealRow>(
            r#"
            SELECT id, user_id, meal_type, text_entry, calories, protein, fat, fibre, sugar, created_at
            FROM meals
            WHERE user_id = $1 AND created_at >= $2 AND created_at < $3
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .bind(from)
        .bind(to)
        .fetch_all(&self.db)
        .await?;

        rows.into_iter()
            .map(|r| MealRecord::try_from(r).map_err(MealError::from))
            .collect()
    }
}
