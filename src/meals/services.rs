use time::{macros::format_description, Date, Duration, OffsetDateTime, UtcOffset};
use tracing::{info, instrument};
use uuid::Uuid;

use super::{
    dto::{DayMeals, DayQuery, DayTotals, MacroEstimate, MealRecord, SubmitMealRequest, WeekQuery},
    normalize::normalize,
    repo_types::NewMeal,
    validate::validate,
};
use crate::{error::MealError, state::AppState};

const MAX_OFFSET_MINUTES: i32 = 14 * 60;
const WEEK_DAYS: i64 = 7;

/// Validate, estimate, normalize, persist. Each stage short-circuits the
/// rest; nothing is written unless every earlier stage succeeded.
#[instrument(skip(state, req))]
pub async fn ingest_meal(
    state: &AppState,
    user_id: Uuid,
    req: SubmitMealRequest,
) -> Result<MealRecord, MealError> {
    let meal = validate(req)?;

    let raw = state.estimator.complete(&meal.description).await?;
    let macros = normalize(&raw)?;

    let record = state
        .meals
        .insert(NewMeal {
            user_id,
            meal_type: meal.category,
            text_entry: meal.description,
            macros,
        })
        .await?;

    info!(meal_id = %record.id, meal_type = %record.meal_type, calories = record.calories, "meal logged");
    Ok(record)
}

#[instrument(skip(state))]
pub async fn meals_for_day(
    state: &AppState,
    user_id: Uuid,
    q: DayQuery,
) -> Result<DayMeals, MealError> {
    let offset = parse_offset(q.utc_offset_minutes)?;
    let date = parse_date(q.date.as_deref(), "date", offset)?;
    let (from, to) = day_window(date, offset, 1)?;

    let meals = state.meals.list_between(user_id, from, to).await?;
    let totals = sum_macros(&meals);
    Ok(DayMeals {
        date: date.to_string(),
        meal_count: meals.len(),
        totals,
        meals,
    })
}

#[instrument(skip(state))]
pub async fn weekly_totals(
    state: &AppState,
    user_id: Uuid,
    q: WeekQuery,
) -> Result<Vec<DayTotals>, MealError> {
    let offset = parse_offset(q.utc_offset_minutes)?;
    let end = parse_date(q.end.as_deref(), "end", offset)?;
    let first = end
        .checked_sub(Duration::days(WEEK_DAYS - 1))
        .ok_or_else(out_of_range)?;
    let (from, to) = day_window(first, offset, WEEK_DAYS)?;

    let meals = state.meals.list_between(user_id, from, to).await?;
    Ok(bucket_by_day(&meals, first, WEEK_DAYS, offset))
}

fn parse_offset(minutes: Option<i32>) -> Result<UtcOffset, MealError> {
    let minutes = minutes.unwrap_or(0);
    if minutes.abs() > MAX_OFFSET_MINUTES {
        return Err(MealError::invalid(
            "utc_offset_minutes must be between -840 and 840",
        ));
    }
    UtcOffset::from_whole_seconds(minutes * 60)
        .map_err(|_| MealError::invalid("utc_offset_minutes is out of range"))
}

/// `None` means today in the caller's offset.
fn parse_date(raw: Option<&str>, name: &str, offset: UtcOffset) -> Result<Date, MealError> {
    match raw {
        Some(s) => Date::parse(s.trim(), format_description!("[year]-[month]-[day]"))
            .map_err(|_| MealError::invalid(format!("{name} must be formatted YYYY-MM-DD"))),
        None => Ok(OffsetDateTime::now_utc().to_offset(offset).date()),
    }
}

fn out_of_range() -> MealError {
    MealError::invalid("date is out of range")
}

/// Half-open `[first midnight, first midnight + days)` in `offset`, returned
/// in UTC. Both ends must be representable.
fn day_window(
    first: Date,
    offset: UtcOffset,
    days: i64,
) -> Result<(OffsetDateTime, OffsetDateTime), MealError> {
    let from = first
        .midnight()
        .assume_offset(offset)
        .checked_to_offset(UtcOffset::UTC)
        .ok_or_else(out_of_range)?;
    let to = from
        .checked_add(Duration::days(days))
        .ok_or_else(out_of_range)?;
    Ok((from, to))
}

fn sum_macros(meals: &[MealRecord]) -> MacroEstimate {
    let mut totals = MacroEstimate::default();
    for m in meals {
        totals += m.macros();
    }
    totals
}

/// One row per calendar day starting at `first`, oldest first; days with no
/// meals are zero.
fn bucket_by_day(meals: &[MealRecord], first: Date, days: i64, offset: UtcOffset) -> Vec<DayTotals> {
    std::iter::successors(Some(first), |d| d.next_day())
        .take(days as usize)
        .map(|date| {
            let today: Vec<MealRecord> = meals
                .iter()
                .filter(|m| m.created_at.to_offset(offset).date() == date)
                .cloned()
                .collect();
            DayTotals {
                date: date.to_string(),
                totals: sum_macros(&today),
                meal_count: today.len(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use time::macros::{date, datetime, offset};

    use super::*;
    use crate::meals::{
        dto::MealType,
        estimator::scripted::{Reply, ScriptedEstimator},
        repo::memory::MemoryMealStore,
    };

    const SCENARIO_A: &str = r#"{"calories":220,"protein":14,"fat":15,"fibre":0,"sugar":1}"#;

    fn submission(text: &str, kind: &str) -> SubmitMealRequest {
        SubmitMealRequest {
            meal_text: Some(text.into()),
            meal_type: Some(kind.into()),
        }
    }

    fn record(user_id: Uuid, at: OffsetDateTime, calories: f64) -> MealRecord {
        MealRecord {
            id: Uuid::new_v4(),
            user_id,
            meal_type: MealType::Snack,
            text_entry: "x".into(),
            calories,
            protein: 1.0,
            fat: 2.0,
            fibre: 0.5,
            sugar: 3.0,
            created_at: at,
        }
    }

    #[tokio::test]
    async fn scenario_a_persists_the_estimate() {
        let estimator = Arc::new(ScriptedEstimator::always(SCENARIO_A));
        let store = Arc::new(MemoryMealStore::default());
        let state = AppState::fake_with(estimator.clone(), store.clone());
        let user = Uuid::new_v4();

        let before = OffsetDateTime::now_utc();
        let rec = ingest_meal(&state, user, submission("2 eggs and black coffee", "Breakfast"))
            .await
            .unwrap();

        assert_eq!(rec.user_id, user);
        assert_eq!(rec.meal_type, MealType::Breakfast);
        assert_eq!(rec.text_entry, "2 eggs and black coffee");
        assert_eq!(
            rec.macros(),
            MacroEstimate {
                calories: 220.0,
                protein: 14.0,
                fat: 15.0,
                fibre: 0.0,
                sugar: 1.0
            }
        );
        assert!(rec.created_at >= before);
        assert_eq!(store.len(), 1);
        assert_eq!(
            estimator.seen.lock().unwrap().as_slice(),
            ["2 eggs and black coffee".to_string()]
        );
    }

    #[tokio::test]
    async fn invalid_input_never_reaches_the_estimator() {
        let estimator = Arc::new(ScriptedEstimator::always(SCENARIO_A));
        let store = Arc::new(MemoryMealStore::default());
        let state = AppState::fake_with(estimator.clone(), store.clone());

        let req = SubmitMealRequest {
            meal_text: None,
            meal_type: Some("Lunch".into()),
        };
        let err = ingest_meal(&state, Uuid::new_v4(), req).await.unwrap_err();
        assert!(matches!(err, MealError::InvalidInput(_)));
        assert_eq!(estimator.calls(), 0);
        assert_eq!(store.len(), 0);
    }

    #[tokio::test]
    async fn failures_after_validation_persist_nothing() {
        let estimator = Arc::new(
            ScriptedEstimator::always(SCENARIO_A)
                .then(Reply::Upstream("status 503".into()))
                .then(Reply::Text("about 300 calories".into())),
        );
        let store = Arc::new(MemoryMealStore::default());
        let state = AppState::fake_with(estimator.clone(), store.clone());
        let user = Uuid::new_v4();

        let err = ingest_meal(&state, user, submission("toast", "Snack")).await.unwrap_err();
        assert!(matches!(err, MealError::UpstreamUnavailable(_)));
        let err = ingest_meal(&state, user, submission("toast", "Snack")).await.unwrap_err();
        assert!(matches!(err, MealError::MalformedEstimate(_)));
        assert_eq!(store.len(), 0);
    }

    #[tokio::test]
    async fn storage_fault_is_persistence_error() {
        let estimator = Arc::new(ScriptedEstimator::always(SCENARIO_A));
        let state = AppState::fake_with(estimator, Arc::new(MemoryMealStore::failing()));
        let err = ingest_meal(&state, Uuid::new_v4(), submission("toast", "Snack"))
            .await
            .unwrap_err();
        assert!(matches!(err, MealError::Persistence(_)));
    }

    #[tokio::test]
    async fn identical_submissions_are_not_deduplicated() {
        let estimator = Arc::new(ScriptedEstimator::always(SCENARIO_A));
        let store = Arc::new(MemoryMealStore::default());
        let state = AppState::fake_with(estimator.clone(), store.clone());
        let user = Uuid::new_v4();

        let a = ingest_meal(&state, user, submission("toast", "Snack")).await.unwrap();
        let b = ingest_meal(&state, user, submission("toast", "Snack")).await.unwrap();
        assert_ne!(a.id, b.id);
        assert_eq!(estimator.calls(), 2);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn day_window_respects_offset() {
        let (from, to) = day_window(date!(2026 - 10 - 16), offset!(+2), 1).unwrap();
        assert_eq!(from, datetime!(2026-10-15 22:00 UTC));
        assert_eq!(to, datetime!(2026-10-16 22:00 UTC));
    }

    #[test]
    fn windows_past_the_calendar_edge_are_invalid_input() {
        for (first, offset) in [
            (Date::MAX, UtcOffset::UTC),
            (Date::MIN, offset!(+14)),
        ] {
            let err = day_window(first, offset, 1).unwrap_err();
            assert!(matches!(err, MealError::InvalidInput(ref m) if m.contains("out of range")));
        }
    }

    #[tokio::test]
    async fn edge_dates_are_rejected_not_panicking() {
        let state = AppState::fake();
        let user = Uuid::new_v4();

        let err = meals_for_day(
            &state,
            user,
            DayQuery {
                date: Some("9999-12-31".into()),
                utc_offset_minutes: None,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, MealError::InvalidInput(_)));

        let err = weekly_totals(
            &state,
            user,
            WeekQuery {
                end: Some("-9999-01-03".into()),
                utc_offset_minutes: None,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, MealError::InvalidInput(_)));
    }

    #[test]
    fn offset_and_date_are_validated() {
        assert!(parse_offset(Some(841)).is_err());
        assert!(parse_offset(Some(-841)).is_err());
        assert_eq!(parse_offset(Some(-300)).unwrap(), offset!(-5));
        assert_eq!(parse_offset(None).unwrap(), UtcOffset::UTC);

        assert_eq!(
            parse_date(Some("2026-02-28"), "date", UtcOffset::UTC).unwrap(),
            date!(2026 - 02 - 28)
        );
        assert!(parse_date(Some("2026-02-30"), "date", UtcOffset::UTC).is_err());
        assert!(parse_date(Some("16/10/2026"), "date", UtcOffset::UTC).is_err());
    }

    #[test]
    fn buckets_are_zero_filled_and_ordered() {
        let user = Uuid::new_v4();
        let meals = vec![
            record(user, datetime!(2026-10-16 12:00 UTC), 500.0),
            record(user, datetime!(2026-10-16 08:00 UTC), 300.0),
            record(user, datetime!(2026-10-12 19:00 UTC), 700.0),
        ];
        let rows = bucket_by_day(&meals, date!(2026 - 10 - 10), 7, UtcOffset::UTC);

        assert_eq!(rows.len(), 7);
        assert_eq!(rows[0].date, "2026-10-10");
        assert_eq!(rows[6].date, "2026-10-16");
        assert_eq!(rows[2].totals.calories, 700.0);
        assert_eq!(rows[6].totals.calories, 800.0);
        assert_eq!(rows[6].meal_count, 2);
        assert_eq!(rows[1].totals, MacroEstimate::default());
        assert_eq!(rows[1].meal_count, 0);
    }

    #[test]
    fn buckets_use_local_calendar_day() {
        let user = Uuid::new_v4();
        // 23:30 UTC is already the next day at +01:00
        let meals = vec![record(user, datetime!(2026-10-15 23:30 UTC), 100.0)];
        let rows = bucket_by_day(&meals, date!(2026 - 10 - 15), 2, offset!(+1));
        assert_eq!(rows[0].meal_count, 0);
        assert_eq!(rows[1].meal_count, 1);
    }

    #[tokio::test]
    async fn day_listing_totals_only_that_day() {
        let store = Arc::new(MemoryMealStore::default());
        let state = AppState::fake_with(Arc::new(ScriptedEstimator::always(SCENARIO_A)), store.clone());
        let user = Uuid::new_v4();
        store.seed(record(user, datetime!(2026-10-16 07:00 UTC), 250.0));
        store.seed(record(user, datetime!(2026-10-16 13:00 UTC), 650.0));
        store.seed(record(user, datetime!(2026-10-17 00:00 UTC), 999.0));
        store.seed(record(Uuid::new_v4(), datetime!(2026-10-16 09:00 UTC), 111.0));

        let day = meals_for_day(
            &state,
            user,
            DayQuery {
                date: Some("2026-10-16".into()),
                utc_offset_minutes: None,
            },
        )
        .await
        .unwrap();

        assert_eq!(day.date, "2026-10-16");
        assert_eq!(day.meal_count, 2);
        assert_eq!(day.totals.calories, 900.0);
        assert_eq!(day.totals.sugar, 6.0);
        assert_eq!(day.meals[0].calories, 650.0);
    }

    #[tokio::test]
    async fn weekly_totals_cover_seven_days_ending_on_end() {
        let store = Arc::new(MemoryMealStore::default());
        let state = AppState::fake_with(Arc::new(ScriptedEstimator::always(SCENARIO_A)), store.clone());
        let user = Uuid::new_v4();
        store.seed(record(user, datetime!(2026-10-09 23:59 UTC), 1.0));
        store.seed(record(user, datetime!(2026-10-10 00:00 UTC), 10.0));
        store.seed(record(user, datetime!(2026-10-16 23:59 UTC), 20.0));

        let rows = weekly_totals(
            &state,
            user,
            WeekQuery {
                end: Some("2026-10-16".into()),
                utc_offset_minutes: Some(0),
            },
        )
        .await
        .unwrap();

        assert_eq!(rows.len(), 7);
        assert_eq!(rows[0].date, "2026-10-10");
        assert_eq!(rows[0].totals.calories, 10.0);
        assert_eq!(rows[6].totals.calories, 20.0);
        let total: f64 = rows.iter().map(|r| r.totals.calories).sum();
        assert_eq!(total, 30.0);
    }
}
