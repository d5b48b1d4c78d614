use crate::state::AppState;
use axum::Router;

pub mod compatibility;
pub mod dto;
pub mod handlers;
pub mod repo_types;
pub mod services;

pub fn router() -> Router<AppState> {
    handlers::match_routes()
}
