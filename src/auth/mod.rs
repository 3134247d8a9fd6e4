use axum::Router;

use crate::state::AppState;

mod dto;
pub mod handlers;
pub mod jwt;
pub mod password;
pub mod repo;
pub mod service;
pub mod tokens;

pub fn router() -> Router<AppState> {
    handlers::routes()
}
