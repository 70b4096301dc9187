//! Error handler for social login.

use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;
use validator::ValidationErrors;

use crate::user::AuthIdError;

pub type Result<T> = std::result::Result<T, ServerError>;

/// Enum representing server-side errors.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("validation error occurred, {0}")]
    Validation(#[from] ValidationErrors),

    #[error("invalid configuration, {0}")]
    Config(String),

    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("SQL request failed: {0}")]
    Sql(#[from] sqlx::Error),

    #[error("session storage failed: {0}")]
    Session(#[from] tower_sessions::session::Error),

    #[error("OAuth handshake failed: {0}")]
    OAuth(String),

    #[error("cannot fetch provider profile: {0}")]
    Profile(#[from] reqwest::Error),

    #[error(transparent)]
    AuthId(#[from] AuthIdError),

    #[error("unknown authentication provider `{0}`")]
    UnknownProvider(String),

    #[error("OAuth state is missing or does not match")]
    InvalidState,

    #[error("internal server error, {details}")]
    Internal {
        details: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

/// Structure for detailed error responses.
#[derive(Debug, Serialize)]
pub struct ResponseError {
    r#type: Option<String>,
    title: String,
    status: u16,
    detail: String,
    instance: Option<String>,
}

impl ResponseError {
    /// Update error status code.
    pub fn status(mut self, code: StatusCode) -> Self {
        self.status = code.as_u16();
        self
    }

    /// Update `title` field.
    pub fn title(mut self, title: &str) -> Self {
        self.title = title.into();
        self
    }

    /// Add detailed error.
    pub fn details(mut self, description: &str) -> Self {
        self.detail = description.into();
        self
    }

    /// Reference the resource the error relates to.
    pub fn instance(mut self, instance: &str) -> Self {
        self.instance = Some(instance.into());
        self
    }

    /// Transform [`ResponseError`] into axum [`Response`].
    pub fn into_response(
        self,
    ) -> std::result::Result<Response, axum::http::Error> {
        if let Ok(body) = serde_json::to_string(&self) {
            Response::builder()
                .status(self.status)
                .header(header::CONTENT_TYPE, "application/problem+json")
                .body(body.into())
        } else {
            Ok(internal_server_error())
        }
    }
}

impl Default for ResponseError {
    fn default() -> Self {
        Self {
            r#type: None,
            title: "Internal server error.".to_owned(),
            status: StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
            detail: String::default(),
            instance: None,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let response = match &self {
            ServerError::UnknownProvider(_) => ResponseError::default()
                .title("Authentication provider not found.")
                .details(&self.to_string())
                .status(StatusCode::NOT_FOUND),

            ServerError::InvalidState => ResponseError::default()
                .title("Login request could not be verified.")
                .details(&self.to_string())
                .status(StatusCode::BAD_REQUEST),

            ServerError::Internal { details, source } => {
                tracing::error!(err = ?source, %details, "server returned 500 status");
                ResponseError::default()
            },

            // Lookup, creation and handshake failures halt the login flow
            // with a generic failure.
            err => {
                tracing::error!(error = %err, "request failed");
                ResponseError::default()
                    .details("Authentication could not be completed.")
            },
        };

        response
            .into_response()
            .unwrap_or_else(|_| internal_server_error())
    }
}

fn internal_server_error() -> Response {
    Response::builder()
        .status(StatusCode::INTERNAL_SERVER_ERROR)
        .header(header::CONTENT_TYPE, "application/problem+json")
        .body(
            serde_json::json!({
                "type": null,
                "title": "Internal server error.",
                "status": StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
                "detail": null,
                "instance": null,
            })
            .to_string()
            .into(),
        )
        .unwrap_or_else(|_| Response::new("Internal server error".into()))
}

#[cfg(test)]
mod tests {
    use http_body_util::BodyExt;

    use super::*;

    async fn body_json(response: Response) -> serde_json::Value {
        let body = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_storage_failure_is_generic() {
        let response =
            ServerError::Sql(sqlx::Error::PoolTimedOut).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = body_json(response).await;
        assert_eq!(body["title"], "Internal server error.");
        assert!(!body["detail"].as_str().unwrap().contains("pool"));
    }

    #[tokio::test]
    async fn test_configuration_failure_is_generic() {
        let response =
            ServerError::Config("cannot build HTTP client".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = body_json(response).await;
        assert!(body.get("errors").is_none());
        assert!(!body["detail"].as_str().unwrap().contains("HTTP client"));
    }

    #[tokio::test]
    async fn test_client_errors_keep_status() {
        let response =
            ServerError::UnknownProvider("myspace".into()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = ServerError::InvalidState.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/problem+json"
        );
    }
}
