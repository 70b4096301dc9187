//! Social login: third-party OAuth login, session identity and route
//! gating for web applications.

#![forbid(unsafe_code)]

pub mod auth;
pub mod config;
pub mod database;
pub mod error;
mod router;
pub mod telemetry;
pub mod user;

use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::http::{StatusCode, header};
use axum::routing::get;
use axum::{Router, middleware as AxumMiddleware};
use metrics_exporter_prometheus::PrometheusHandle;
use tower::ServiceBuilder;
use tower_http::LatencyUnit;
use tower_http::sensitive_headers::SetSensitiveHeadersLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{
    DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer,
};
use tower_sessions::cookie::SameSite;
use tower_sessions::{Expiry, SessionManagerLayer, SessionStore};

pub use error::ServerError;

const SESSION_COOKIE: &str = "sid";

/// State sharing between routes.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<config::Configuration>,
    pub users: Arc<dyn user::UserRepository>,
    pub authenticator: Arc<auth::Authenticator>,
    pub metrics: Option<PrometheusHandle>,
}

/// Session cookie layer.
pub fn session_layer<S: SessionStore + Clone>(
    config: &config::Session,
    store: S,
) -> SessionManagerLayer<S> {
    SessionManagerLayer::new(store)
        .with_name(SESSION_COOKIE)
        .with_secure(config.secure)
        // `Lax` so the cookie comes back with the provider redirect.
        .with_same_site(SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(time::Duration::days(
            config.expiry_days(),
        )))
}

/// Create router.
pub fn app<S: SessionStore + Clone>(state: AppState, store: S) -> Router {
    let middleware = ServiceBuilder::new()
        // Remove sensitive headers from trace.
        .layer(SetSensitiveHeadersLayer::new([
            header::AUTHORIZATION,
            header::COOKIE,
            header::SET_COOKIE,
        ]))
        // Add high level tracing/logging to all requests.
        .layer(
            TraceLayer::new_for_http()
                .on_body_chunk(|chunk: &Bytes, latency: Duration, _span: &tracing::Span| {
                    tracing::trace!(size_bytes = chunk.len(), latency = ?latency, "sending body chunk")
                })
                .make_span_with(DefaultMakeSpan::new().include_headers(true).level(tracing::Level::INFO))
                .on_request(DefaultOnRequest::new())
                .on_response(DefaultOnResponse::new().include_headers(true).latency_unit(LatencyUnit::Micros)),
        )
        // Set a timeout.
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(10),
        ));

    let sessions = session_layer(&state.config.session, store);

    Router::new()
        // `GET /status.json` goes to `status`.
        .route("/status.json", get(router::status::status))
        .route("/metrics", get(router::status::metrics))
        // Login prompt, provider redirect and callback.
        .route("/login", get(router::auth::login))
        .route("/logout", get(router::auth::logout).post(router::auth::logout))
        .route("/auth/{provider}", get(router::auth::authorize))
        .route("/auth/{provider}/callback", get(router::auth::callback))
        .nest("/users", router::users::router(state.clone()))
        .with_state(state)
        .route_layer(AxumMiddleware::from_fn(telemetry::track))
        .layer(sessions)
        .layer(middleware)
}

/// Initialize the application state.
pub async fn initialize_state()
-> Result<(AppState, database::Database), Box<dyn std::error::Error>> {
    let environment = std::env::var("ENVIRONMENT").unwrap_or_default();
    let config = config::Configuration::default()
        .environment(&environment)
        .read()?;

    let Some(postgres) = &config.postgres else {
        tracing::error!("missing `postgres` entry on configuration file");
        return Err(ServerError::Config("missing `postgres` entry".into()).into());
    };
    let db = database::Database::from_config(postgres).await?;

    // execute migrations scripts on start.
    db.migrate().await?;

    let users: Arc<dyn user::UserRepository> =
        Arc::new(user::PgUserRepository::new(db.postgres.clone()));
    let authenticator = Arc::new(auth::init_auth(&config, Arc::clone(&users))?);

    let metrics = if config.metrics {
        Some(telemetry::setup_metrics_recorder().map_err(|err| err as Box<dyn std::error::Error>)?)
    } else {
        None
    };

    Ok((
        AppState {
            config,
            users,
            authenticator,
            metrics,
        },
        db,
    ))
}

/// State backed by memory, with a provider answering without network.
#[cfg(test)]
pub(crate) fn test_state(users: Arc<user::MemoryUserRepository>) -> AppState {
    let authenticator = auth::Authenticator::new(users.clone())
        .with_strategy(auth::StaticStrategy::facebook("42", "Ada Lovelace"));

    AppState {
        config: Arc::new(config::Configuration::default()),
        users,
        authenticator: Arc::new(authenticator),
        metrics: None,
    }
}

#[cfg(test)]
pub(crate) fn test_app(state: AppState) -> Router {
    app(state, tower_sessions::MemoryStore::default())
}

/// MUST NEVER be used in production.
#[cfg(test)]
pub(crate) async fn make_request(
    app: Router,
    method: axum::http::Method,
    path: &str,
    headers: &[(header::HeaderName, &str)],
) -> axum::http::Response<axum::body::Body> {
    use axum::extract::Request;
    use tower::util::ServiceExt;

    let mut request = Request::builder().method(method).uri(path);
    for (name, value) in headers {
        request = request.header(name, *value);
    }

    app.oneshot(request.body(axum::body::Body::empty()).unwrap())
        .await
        .unwrap()
}

/// `name=value` of the session cookie set by `response`.
#[cfg(test)]
pub(crate) fn session_cookie(
    response: &axum::http::Response<axum::body::Body>,
) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find(|value| value.starts_with(SESSION_COOKIE))
        .and_then(|value| value.split(';').next())
        .map(str::to_owned)
}
