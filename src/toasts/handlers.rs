use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use crate::{
    auth::jwt::AuthUser,
    error::AppResult,
    state::AppState,
    toasts::{dto::ToastStatus, services::ToastTracker},
};

pub fn toast_routes() -> Router<AppState> {
    Router::new()
        .route("/connections/:id/toast", get(toast_status))
        .route("/connections/:id/toast-seen", post(toast_seen))
}

#[instrument(skip(tracker))]
pub async fn toast_status(
    State(tracker): State<ToastTracker>,
    AuthUser(user_id): AuthUser,
    Path(connection_id): Path<Uuid>,
) -> AppResult<Json<ToastStatus>> {
    let should_show = tracker.should_show(connection_id, user_id).await?;
    Ok(Json(ToastStatus { should_show }))
}

#[instrument(skip(tracker))]
pub async fn toast_seen(
    State(tracker): State<ToastTracker>,
    AuthUser(user_id): AuthUser,
    Path(connection_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    tracker.mark_seen(connection_id, user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
