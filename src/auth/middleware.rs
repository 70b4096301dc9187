//! Gate routes behind an authenticated session.

use axum::extract::{OriginalUri, Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::Response;
use tower_sessions::Session;

use super::session::deserialize_user;
use super::view::LoginView;
use crate::AppState;
use crate::error::Result;
use crate::user::{User, UserRepository};

/// Whether a session-bound identity is attached to the request.
pub async fn is_authenticated(
    session: &Session,
    users: &dyn UserRepository,
) -> Result<Option<User>> {
    deserialize_user(session, users).await
}

/// Let the request through when the session carries a user, otherwise
/// render the login prompt with the originally requested URL.
///
/// The [`User`] is available to handlers as an `Extension`.
pub async fn ensure_authenticated(
    State(state): State<AppState>,
    session: Session,
    OriginalUri(uri): OriginalUri,
    mut req: Request,
    next: Next,
) -> Result<Response> {
    match is_authenticated(&session, state.users.as_ref()).await? {
        Some(user) => {
            req.extensions_mut().insert::<User>(user);
            Ok(next.run(req).await)
        },
        None => {
            let requested = uri
                .path_and_query()
                .map(|path| path.as_str())
                .unwrap_or_else(|| uri.path());
            tracing::debug!(%requested, "login required");

            Ok(LoginView::new(requested)
                .providers(state.authenticator.providers())
                .render(req.headers(), StatusCode::UNAUTHORIZED))
        },
    }
}
