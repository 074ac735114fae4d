pub mod access;
mod dto;
pub mod guard;
pub mod handlers;
pub mod password;
pub mod repo;
pub mod revocation;
pub mod tokens;

use crate::state::AppState;
use axum::Router;

pub fn router() -> Router<AppState> {
    handlers::routes()
}
