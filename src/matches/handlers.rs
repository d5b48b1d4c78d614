use axum::{extract::State, routing::get, Json, Router};
use tracing::instrument;

use crate::{
    auth::jwt::AuthUser,
    error::AppResult,
    matches::{dto::MutualMatchItem, services::list_mutual},
    state::AppState,
};

pub fn match_routes() -> Router<AppState> {
    Router::new().route("/matches/mutual", get(mutual_matches))
}

#[instrument(skip(state))]
pub async fn mutual_matches(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> AppResult<Json<Vec<MutualMatchItem>>> {
    let items = list_mutual(state.store.as_ref(), user_id).await?;
    Ok(Json(items))
}
