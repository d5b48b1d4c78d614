use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use tracing::instrument;

use crate::{
    auth::jwt::AdminUser,
    error::AppResult,
    invitations::{
        dto::{CreateInvitationRequest, InvitationResponse},
        services::create_invitation,
    },
    state::AppState,
};

pub fn admin_routes() -> Router<AppState> {
    Router::new().route("/admin/invitations", post(invite))
}

#[instrument(skip(state, payload))]
pub async fn invite(
    State(state): State<AppState>,
    AdminUser(admin_id): AdminUser,
    Json(payload): Json<CreateInvitationRequest>,
) -> AppResult<(StatusCode, Json<InvitationResponse>)> {
    let response = create_invitation(&state, admin_id, &payload.email).await?;
    Ok((StatusCode::CREATED, Json(response)))
}
