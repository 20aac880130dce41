use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// Meal category chosen by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MealType {
    Breakfast,
    Lunch,
    Dinner,
    Snack,
}

impl MealType {
    pub const ALL: [MealType; 4] = [
        MealType::Breakfast,
        MealType::Lunch,
        MealType::Dinner,
        MealType::Snack,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MealType::Breakfast => "Breakfast",
            MealType::Lunch => "Lunch",
            MealType::Dinner => "Dinner",
            MealType::Snack => "Snack",
        }
    }
}

impl fmt::Display for MealType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MealType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown meal type {s:?}"))
    }
}

/// Body of `POST /meals`. Both fields are optional at the wire level so that
/// absence is reported by the validator rather than by the JSON extractor.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitMealRequest {
    pub meal_text: Option<String>,
    pub meal_type: Option<String>,
}

/// The five-number estimate produced for one description.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MacroEstimate {
    pub calories: f64,
    pub protein: f64,
    pub fat: f64,
    pub fibre: f64,
    pub sugar: f64,
}

impl std::ops::AddAssign for MacroEstimate {
    fn add_assign(&mut self, rhs: Self) {
        self.calories += rhs.calories;
        self.protein += rhs.protein;
        self.fat += rhs.fat;
        self.fibre += rhs.fibre;
        self.sugar += rhs.sugar;
    }
}

/// A stored meal, exactly as returned by the insert.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MealRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub meal_type: MealType,
    pub text_entry: String,
    pub calories: f64,
    pub protein: f64,
    pub fat: f64,
    pub fibre: f64,
    pub sugar: f64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl MealRecord {
    pub fn macros(&self) -> MacroEstimate {
        MacroEstimate {
            calories: self.calories,
            protein: self.protein,
            fat: self.fat,
            fibre: self.fibre,
            sugar: self.sugar,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct DayQuery {
    pub date: Option<String>,
    pub utc_offset_minutes: Option<i32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct WeekQuery {
    pub end: Option<String>,
    pub utc_offset_minutes: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct DayMeals {
    pub date: String,
    pub meals: Vec<MealRecord>,
    pub totals: MacroEstimate,
    pub meal_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayTotals {
    pub date: String,
    #[serde(flatten)]
    pub totals: MacroEstimate,
    pub meal_count: usize,
}
