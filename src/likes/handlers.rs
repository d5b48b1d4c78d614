use axum::{extract::State, routing::post, Json, Router};
use tracing::instrument;

use crate::{
    auth::jwt::{AdminUser, AuthUser},
    error::AppResult,
    likes::{
        dto::{LikeOutcome, LikeRequest, ReconcileReport},
        reconcile::Reconciler,
        services::LikeRecorder,
    },
    state::AppState,
};

pub fn like_routes() -> Router<AppState> {
    Router::new()
        .route("/matches/like", post(like))
        .route("/admin/reconcile", post(reconcile))
}

#[instrument(skip(recorder, payload))]
pub async fn like(
    State(recorder): State<LikeRecorder>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<LikeRequest>,
) -> AppResult<Json<LikeOutcome>> {
    let outcome = recorder
        .record(user_id, payload.target_user_id, payload.action)
        .await?;
    Ok(Json(outcome))
}

#[instrument(skip(reconciler))]
pub async fn reconcile(
    State(reconciler): State<Reconciler>,
    AdminUser(_admin_id): AdminUser,
) -> AppResult<Json<ReconcileReport>> {
    Ok(Json(reconciler.run().await?))
}
