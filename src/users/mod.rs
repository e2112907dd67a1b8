use crate::state::AppState;
use axum::Router;

pub mod dto;
pub mod handlers;
mod mapper;
pub mod password;
pub mod repo;
pub mod repo_types;
pub mod services;

pub fn router() -> Router<AppState> {
    handlers::user_routes()
}
