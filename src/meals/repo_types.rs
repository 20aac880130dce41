use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use super::dto::{MacroEstimate, MealRecord, MealType};

/// Everything the insert needs; id and timestamp come from the database.
#[derive(Debug, Clone)]
pub struct NewMeal {
    pub user_id: Uuid,
    pub meal_type: MealType,
    pub text_entry: String,
    pub macros: MacroEstimate,
}

#[derive(Debug, FromRow)]
pub struct MealRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub meal_type: String,
    pub text_entry: String,
    pub calories: f64,
    pub protein: f64,
    pub fat: f64,
    pub fibre: f64,
    pub sugar: f64,
    pub created_at: OffsetDateTime,
}

impl TryFrom<MealRow> for MealRecord {
    type Error = anyhow::Error;

    fn try_from(r: MealRow) -> Result<Self, Self::Error> {
        let meal_type = r
            .meal_type
            .parse::<MealType>()
            .map_err(|e| anyhow::anyhow!("meal {}: {e}", r.id))?;
        Ok(Self {
            id: r.id,
            user_id: r.user_id,
            meal_type,
            text_entry: r.text_entry,
            calories: r.calories,
            protein: r.protein,
            fat: r.fat,
            fibre: r.fibre,
            sugar: r.sugar,
            created_at: r.created_at,
        })
    }
}
