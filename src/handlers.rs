use crate::dates::resolve_date;
use crate::errors::AppError;
use crate::models::{
    DateQuery, DayView, Habit, NewHabitRequest, Section, StatsQuery, StatsResponse,
    ToggleRequest, UpdateHabitRequest, UserId,
};
use crate::state::AppState;
use crate::stats::build_stats_at;
use axum::{
    async_trait,
    body::Bytes,
    extract::{FromRequestParts, Path, Query, State},
    http::{header, request::Parts, StatusCode},
    response::IntoResponse,
    Json,
};

pub const USER_HEADER: &str = "x-user-id";

/// Identity of the caller, taken from the already authenticated `X-User-Id` header.
pub struct CurrentUser(pub UserId);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(USER_HEADER)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default();
        Ok(Self(UserId::parse(raw)?))
    }
}

pub async fn health() -> &'static str {
    "ok"
}

pub async fn list_sections() -> Json<Vec<&'static str>> {
    Json(Section::ALL.into_iter().map(Section::as_str).collect())
}

pub async fn list_habits(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<impl IntoResponse, AppError> {
    let store = state.store_for(&user).await?;
    let body = serde_json::to_vec(store.lock().await.habits()).map_err(AppError::internal)?;
    Ok(([(header::CONTENT_TYPE, "application/json")], body))
}

pub async fn create_habit(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(payload): Json<NewHabitRequest>,
) -> Result<(StatusCode, Json<Habit>), AppError> {
    let section: Section = payload.section.parse()?;
    let store = state.store_for(&user).await?;

    // spawned so a dropped request cannot interrupt the store mid-write
    let habit = tokio::spawn(async move {
        let mut store = store.lock().await;
        store.add(&payload.name, section).await
    })
    .await??;

    Ok((StatusCode::CREATED, Json(habit)))
}

pub async fn update_habit(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(habit_id): Path<String>,
    Json(payload): Json<UpdateHabitRequest>,
) -> Result<Json<Habit>, AppError> {
    let patch = payload.into_patch()?;
    let store = state.store_for(&user).await?;

    let habit = tokio::spawn(async move {
        let mut store = store.lock().await;
        store.update(&habit_id, patch).await
    })
    .await??;

    Ok(Json(habit))
}

pub async fn delete_habit(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(habit_id): Path<String>,
) -> Result<StatusCode, AppError> {
    let store = state.store_for(&user).await?;

    tokio::spawn(async move {
        let mut store = store.lock().await;
        store.remove(&habit_id).await
    })
    .await??;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn toggle_habit(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(habit_id): Path<String>,
    body: Bytes,
) -> Result<Json<Habit>, AppError> {
    let request = ToggleRequest::from_body(&body)?;
    let date = resolve_date(request.date.as_deref())?;
    let store = state.store_for(&user).await?;

    let habit = tokio::spawn(async move {
        let mut store = store.lock().await;
        store.toggle(&habit_id, date).await
    })
    .await??;

    Ok(Json(habit))
}

pub async fn get_day(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<DateQuery>,
) -> Result<Json<DayView>, AppError> {
    let date = resolve_date(query.date.as_deref())?;
    let store = state.store_for(&user).await?;
    let view = store.lock().await.day_view(date);
    Ok(Json(view))
}

pub async fn get_stats(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<StatsQuery>,
) -> Result<Json<StatsResponse>, AppError> {
    let today = resolve_date(query.today.as_deref())?;
    let store = state.store_for(&user).await?;
    let stats = build_stats_at(today, store.lock().await.habits());
    Ok(Json(stats))
}
