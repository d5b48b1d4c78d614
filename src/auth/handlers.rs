use axum::{
    extract::{FromRef, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use tracing::{instrument, warn};

use crate::{
    auth::{
        dto::{AuthResponse, OtpRequest, OtpVerifyRequest, RefreshRequest},
        jwt::JwtKeys,
        services::{issue_tokens, request_otp, verify_otp},
    },
    error::{AppError, AppResult},
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/otp/request", post(request_code))
        .route("/auth/otp/verify", post(verify_code))
        .route("/auth/refresh", post(refresh))
}

#[instrument(skip(state, payload))]
pub async fn request_code(
    State(state): State<AppState>,
    Json(payload): Json<OtpRequest>,
) -> AppResult<StatusCode> {
    request_otp(&state, &payload.email).await?;
    Ok(StatusCode::ACCEPTED)
}

#[instrument(skip(state, payload))]
pub async fn verify_code(
    State(state): State<AppState>,
    Json(payload): Json<OtpVerifyRequest>,
) -> AppResult<Json<AuthResponse>> {
    let response = verify_otp(&state, &payload.email, &payload.code).await?;
    Ok(Json(response))
}

#[instrument(skip(state, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> AppResult<Json<AuthResponse>> {
    let keys = JwtKeys::from_ref(&state);
    let claims = keys.verify_refresh(&payload.refresh_token).map_err(|e| {
        warn!(error = %e, "refresh rejected");
        AppError::Unauthorized("Invalid refresh token".into())
    })?;

    // Re-read the user so a role change takes effect on refresh.
    let user = state
        .accounts
        .find_account(claims.sub)
        .await?
        .ok_or_else(|| AppError::Unauthorized("User not found".into()))?;

    Ok(Json(issue_tokens(&keys, &user)?))
}
