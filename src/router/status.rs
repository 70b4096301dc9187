//! Public configuration page for front-end identification.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use crate::AppState;

/// Structured configuration.
#[derive(Debug, Serialize, Deserialize)]
pub struct Status {
    pub version: String,
    pub name: String,
    pub providers: Vec<String>,
}

/// Public server status (configuration).
pub async fn status(State(state): State<AppState>) -> Json<Status> {
    Json(Status {
        version: state.config.version().to_owned(),
        name: if state.config.name.is_empty() {
            env!("CARGO_CRATE_NAME").into()
        } else {
            state.config.name.clone()
        },
        providers: state
            .authenticator
            .providers()
            .into_iter()
            .map(String::from)
            .collect(),
    })
}

/// Prometheus metrics, when enabled.
pub async fn metrics(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => handle.render().into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::http::Method;
    use http_body_util::BodyExt;

    use super::*;
    use crate::user::MemoryUserRepository;
    use crate::*;

    #[tokio::test]
    async fn test_status_handler() {
        let state = test_state(Arc::new(MemoryUserRepository::default()));
        let app = test_app(state);

        let response = make_request(app, Method::GET, "/status.json", &[]).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let body: Status = serde_json::from_slice(&body).unwrap();
        assert_eq!(body.name, "social_login");
        assert_eq!(body.providers, vec!["facebook".to_owned()]);
    }

    #[tokio::test]
    async fn test_metrics_disabled() {
        let state = test_state(Arc::new(MemoryUserRepository::default()));
        let app = test_app(state);

        let response = make_request(app, Method::GET, "/metrics", &[]).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
