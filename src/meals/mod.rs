pub mod dto;
pub mod estimator;
pub mod handlers;
mod normalize;
pub mod repo;
mod repo_types;
mod services;
mod validate;

use crate::state::AppState;
use axum::Router;

pub use estimator::{ChatCompletionEstimator, MacroEstimator};
pub use repo::{MealStore, PgMealStore};

pub fn router() -> Router<AppState> {
    handlers::routes()
}
