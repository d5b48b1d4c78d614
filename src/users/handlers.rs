use axum::{
    extract::{Path, State},
    routing::{get, post, put},
    Json, Router,
};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    auth::{dto::PublicUser, jwt::{AdminUser, AuthUser}},
    error::{AppError, AppResult},
    state::AppState,
    users::{
        dto::{MeResponse, UpdateProfileRequest},
        services::{change_status, prepare_profile, AdminAction},
    },
};

pub fn me_routes() -> Router<AppState> {
    Router::new()
        .route("/me", get(me))
        .route("/me/profile", put(update_profile))
}

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/admin/users/:id/pause", post(pause))
        .route("/admin/users/:id/resume", post(resume))
        .route("/admin/users/:id/approve", post(approve))
}

#[instrument(skip(state))]
pub async fn me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> AppResult<Json<MeResponse>> {
    let user = state
        .accounts
        .find_account(user_id)
        .await?
        .ok_or(AppError::NotFound("user"))?;
    Ok(Json(MeResponse::from(&user)))
}

#[instrument(skip(state, payload))]
pub async fn update_profile(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<UpdateProfileRequest>,
) -> AppResult<Json<MeResponse>> {
    let profile = prepare_profile(payload.profile)?;
    let user = state
        .accounts
        .update_account_profile(user_id, &profile)
        .await?
        .ok_or(AppError::NotFound("user"))?;
    info!(%user_id, completeness = profile.completeness, "profile updated");
    Ok(Json(MeResponse::from(&user)))
}

#[instrument(skip(state))]
pub async fn pause(
    State(state): State<AppState>,
    AdminUser(admin_id): AdminUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<PublicUser>> {
    let user = change_status(state.accounts.as_ref(), id, AdminAction::Pause).await?;
    Ok(Json(PublicUser::from(&user)))
}

#[instrument(skip(state))]
pub async fn resume(
    State(state): State<AppState>,
    AdminUser(admin_id): AdminUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<PublicUser>> {
    let user = change_status(state.accounts.as_ref(), id, AdminAction::Resume).await?;
    Ok(Json(PublicUser::from(&user)))
}

#[instrument(skip(state))]
pub async fn approve(
    State(state): State<AppState>,
    AdminUser(admin_id): AdminUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<PublicUser>> {
    let user = state
        .accounts
        .approve_account(id)
        .await?
        .ok_or(AppError::NotFound("user"))?;
    info!(user_id = %id, "user approved");
    Ok(Json(PublicUser::from(&user)))
}
