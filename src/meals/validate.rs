use crate::error::MealError;

use super::dto::{MealType, SubmitMealRequest};

pub const MAX_DESCRIPTION_CHARS: usize = 500;

/// A submission that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidMeal {
    pub description: String,
    pub category: MealType,
}

/// Presence and length checks only. Empty strings are allowed through for
/// the description; the category must name one of the four meal types.
pub fn validate(req: SubmitMealRequest) -> Result<ValidMeal, MealError> {
    let (Some(description), Some(category)) = (req.meal_text, req.meal_type) else {
        return Err(MealError::invalid("Missing mealText or mealType"));
    };

    if description.chars().count() > MAX_DESCRIPTION_CHARS {
        return Err(MealError::invalid(format!(
            "Meal description too long (max {MAX_DESCRIPTION_CHARS} characters)"
        )));
    }

    let category = category.parse::<MealType>().map_err(|_| {
        MealError::invalid("mealType must be one of Breakfast, Lunch, Dinner, Snack")
    })?;

    Ok(ValidMeal {
        description,
        category,
    })
}
