//! Route tree for the API.
//!
//! Everything except the health probe sits behind the authentication guard.

pub mod enrollments;
pub mod health;

use axum::{Router, middleware::from_fn};

use crate::auth::guards::allow_authenticated;
use crate::state::AppState;

pub fn routes(app_state: AppState) -> Router {
    Router::new()
        .nest("/health", health::health_routes())
        .nest(
            "/enrollments",
            enrollments::enrollment_routes().layer(from_fn(allow_authenticated)),
        )
        .with_state(app_state)
}
