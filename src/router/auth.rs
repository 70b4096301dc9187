//! Login flow: prompt, provider redirect, callback and logout.

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{Redirect, Response};
use serde::Deserialize;
use tower_sessions::Session;
use url::form_urlencoded;

use crate::AppState;
use crate::auth::{
    LoginView, OAUTH_STATE_KEY, RETURN_TO_KEY, sanitize_redirect, serialize_user,
};
use crate::error::{Result, ServerError};

const LOGIN_ROUTE: &str = "/login";

#[derive(Debug, Default, Deserialize)]
pub struct LoginQuery {
    pub redirect: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// `GET /login`.
pub async fn login(
    State(state): State<AppState>,
    Query(query): Query<LoginQuery>,
    headers: HeaderMap,
) -> Response {
    LoginView::new(&sanitize_redirect(query.redirect.as_deref()))
        .providers(state.authenticator.providers())
        .render(&headers, StatusCode::OK)
}

/// `GET /auth/{provider}`, send the browser to the provider.
pub async fn authorize(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    Query(query): Query<LoginQuery>,
    session: Session,
) -> Result<Redirect> {
    let authorization = state.authenticator.authorize(&provider)?;

    session.insert(OAUTH_STATE_KEY, &authorization.state).await?;
    session
        .insert(RETURN_TO_KEY, sanitize_redirect(query.redirect.as_deref()))
        .await?;

    Ok(Redirect::to(authorization.url.as_str()))
}

/// `GET /auth/{provider}/callback`, back from the provider.
pub async fn callback(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    Query(query): Query<CallbackQuery>,
    session: Session,
) -> Result<Redirect> {
    state.authenticator.strategy(&provider)?;

    // A state is only valid once.
    let expected = session.remove::<String>(OAUTH_STATE_KEY).await?;

    if let Some(error) = query.error {
        tracing::warn!(
            %provider,
            %error,
            description = query.error_description.as_deref().unwrap_or_default(),
            "provider refused login"
        );
        metrics::counter!("oauth_logins_total", "provider" => provider, "outcome" => "denied")
            .increment(1);

        // Retrying from the prompt still lands on the requested page.
        let return_to = session
            .remove::<String>(RETURN_TO_KEY)
            .await?
            .unwrap_or_else(|| sanitize_redirect(None));
        let return_to: String =
            form_urlencoded::byte_serialize(return_to.as_bytes()).collect();
        return Ok(Redirect::to(&format!("{LOGIN_ROUTE}?redirect={return_to}")));
    }

    let (Some(code), Some(returned)) = (query.code, query.state) else {
        return Err(ServerError::InvalidState);
    };
    if expected.as_deref() != Some(returned.as_str()) {
        tracing::warn!(%provider, "OAuth state mismatch");
        return Err(ServerError::InvalidState);
    }

    let return_to = session
        .remove::<String>(RETURN_TO_KEY)
        .await?
        .unwrap_or_else(|| sanitize_redirect(None));

    let user = match state.authenticator.authenticate(&provider, &code).await {
        Ok(user) => user,
        Err(err) => {
            metrics::counter!("oauth_logins_total", "provider" => provider, "outcome" => "failure")
                .increment(1);
            return Err(err);
        },
    };

    serialize_user(&session, &user).await?;

    metrics::counter!("oauth_logins_total", "provider" => provider, "outcome" => "success")
        .increment(1);
    tracing::info!(user_id = user.id, "user logged in");

    Ok(Redirect::to(&return_to))
}

/// `GET|POST /logout`.
pub async fn logout(session: Session) -> Result<Redirect> {
    crate::auth::logout(&session).await?;
    Ok(Redirect::to("/"))
}
