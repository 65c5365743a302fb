//! API route definitions

use crate::{AppState, middleware::csrf_middleware};
use axum::{Router, middleware::from_fn_with_state, routing::get};

pub mod auth;
pub mod health;

/// Routes without state or layers applied
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health_check))
        .nest("/api/auth", auth::router())
}

/// Routes with the CSRF check applied, ready to serve
pub fn app(state: AppState) -> Router {
    let csrf = state.csrf.clone();
    router()
        .layer(from_fn_with_state(csrf, csrf_middleware))
        .with_state(state)
}
