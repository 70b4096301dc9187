//! Users-related HTTP API.

use axum::routing::get;
use axum::{Extension, Json, Router, middleware};

use crate::AppState;
use crate::auth::ensure_authenticated;
use crate::user::User;

/// Current user.
pub async fn me(Extension(user): Extension<User>) -> Json<User> {
    Json(user)
}

pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        // `GET /users/@me` goes to `me`. Session required.
        .route("/@me", get(me))
        .route_layer(middleware::from_fn_with_state(state, ensure_authenticated))
}
