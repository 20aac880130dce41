use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        DefaultBodyLimit, Query, State,
    },
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::{instrument, warn};

use super::{
    dto::{DayMeals, DayQuery, DayTotals, MealRecord, SubmitMealRequest, WeekQuery},
    services,
};
use crate::{auth::AuthUser, error::MealError, state::AppState};

/// A 500-character description plus envelope fits comfortably.
const MAX_BODY_BYTES: usize = 16 * 1024;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/meals", get(list_meals).post(submit_meal))
        .route("/meals/weekly", get(weekly_meals))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
}

/// POST /meals { mealText, mealType }
#[instrument(skip(state, payload))]
pub async fn submit_meal(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    payload: Result<Json<SubmitMealRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<MealRecord>), MealError> {
    let Json(req) = payload.map_err(|e| {
        warn!(error = %e, "unreadable meal body");
        MealError::invalid("Request body must be JSON with mealText and mealType")
    })?;

    let record = services::ingest_meal(&state, user_id, req).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// GET /meals?date=YYYY-MM-DD&utc_offset_minutes=N
#[instrument(skip(state))]
pub async fn list_meals(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    query: Result<Query<DayQuery>, QueryRejection>,
) -> Result<Json<DayMeals>, MealError> {
    let Query(q) = query.map_err(|e| MealError::invalid(e.body_text()))?;
    Ok(Json(services::meals_for_day(&state, user_id, q).await?))
}

/// GET /meals/weekly?end=YYYY-MM-DD&utc_offset_minutes=N
#[instrument(skip(state))]
pub async fn weekly_meals(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    query: Result<Query<WeekQuery>, QueryRejection>,
) -> Result<Json<Vec<DayTotals>>, MealError> {
    let Query(q) = query.map_err(|e| MealError::invalid(e.body_text()))?;
    Ok(Json(services::weekly_totals(&state, user_id, q).await?))
}
