//! Login prompt.

use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{Html, IntoResponse, Response};
use url::form_urlencoded;

use crate::error::ResponseError;

const DEFAULT_REDIRECT: &str = "/";

/// Login page, remembering the URL that was originally requested.
#[derive(Clone, Debug, PartialEq)]
pub struct LoginView {
    pub auth_redirect_url: String,
    providers: Vec<&'static str>,
}

impl LoginView {
    /// Create a new [`LoginView`]. `auth_redirect_url` is sanitized.
    pub fn new(auth_redirect_url: &str) -> Self {
        Self {
            auth_redirect_url: sanitize_redirect(Some(auth_redirect_url)),
            providers: Vec::new(),
        }
    }

    /// Offer a button for each of these providers.
    pub fn providers(mut self, providers: Vec<&'static str>) -> Self {
        self.providers = providers;
        self
    }

    /// Link starting the login with `provider`.
    pub fn login_href(&self, provider: &str) -> String {
        let redirect: String =
            form_urlencoded::byte_serialize(self.auth_redirect_url.as_bytes())
                .collect();
        format!("/auth/{provider}?redirect={redirect}")
    }

    /// HTML page, or problem details when the client asks for JSON.
    pub fn render(&self, headers: &HeaderMap, status: StatusCode) -> Response {
        let wants_json = headers
            .get(header::ACCEPT)
            .and_then(|accept| accept.to_str().ok())
            .is_some_and(|accept| accept.contains("json"));

        if wants_json {
            return ResponseError::default()
                .status(status)
                .title("Authentication required.")
                .details("Log in to access this resource.")
                .instance(&self.auth_redirect_url)
                .into_response()
                .unwrap_or_else(|_| status.into_response());
        }

        (status, Html(self.html())).into_response()
    }

    fn html(&self) -> String {
        let buttons: String = self
            .providers
            .iter()
            .map(|provider| {
                format!(
                    r#"<li><a href="{}">Log in with {}</a></li>"#,
                    self.login_href(provider),
                    capitalize(provider),
                )
            })
            .collect();

        format!(
            r#"<!DOCTYPE html>
<html lang="en">
<head><meta charset="utf-8"><title>Log in</title></head>
<body>
<main>
<h1>Log in or sign up</h1>
<ul>{buttons}</ul>
</main>
</body>
</html>"#
        )
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Keep local paths only, so the login cannot be turned into an open
/// redirect. The result is always a valid `Location` header value.
pub fn sanitize_redirect(url: Option<&str>) -> String {
    match url {
        Some(url)
            if url.starts_with('/')
                && !url.starts_with("//")
                && !url.contains('\\')
                && !url.chars().any(char::is_control)
                && HeaderValue::from_str(url).is_ok() =>
        {
            url.to_owned()
        },
        _ => DEFAULT_REDIRECT.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use http_body_util::BodyExt;

    use super::*;

    #[test]
    fn test_sanitize_redirect() {
        assert_eq!(sanitize_redirect(Some("/orders?page=2")), "/orders?page=2");
        assert_eq!(sanitize_redirect(Some("https://evil.test")), "/");
        assert_eq!(sanitize_redirect(Some("//evil.test")), "/");
        assert_eq!(sanitize_redirect(Some("/\\evil.test")), "/");
        assert_eq!(sanitize_redirect(None), "/");
    }

    #[test]
    fn test_sanitize_redirect_control_characters() {
        assert_eq!(sanitize_redirect(Some("/foo\nbar")), "/");
        assert_eq!(sanitize_redirect(Some("/foo\r\nSet-Cookie: a=b")), "/");
        assert_eq!(sanitize_redirect(Some("/foo\tbar")), "/");
    }

    #[test]
    fn test_login_href_encodes_redirect() {
        let view = LoginView::new("/orders?page=2&sort=desc");
        assert_eq!(
            view.login_href("facebook"),
            "/auth/facebook?redirect=%2Forders%3Fpage%3D2%26sort%3Ddesc"
        );
    }

    #[tokio::test]
    async fn test_render_html() {
        let view = LoginView::new("/cart").providers(vec!["facebook"]);
        let response = view.render(&HeaderMap::new(), StatusCode::UNAUTHORIZED);

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let body = String::from_utf8(body.to_vec()).unwrap();
        assert!(body.contains(r#"href="/auth/facebook?redirect=%2Fcart""#));
        assert!(body.contains("Log in with Facebook"));
    }

    #[tokio::test]
    async fn test_render_json() {
        let mut headers = HeaderMap::new();
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));

        let response =
            LoginView::new("/cart").render(&headers, StatusCode::UNAUTHORIZED);
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["instance"], "/cart");
        assert_eq!(body["status"], 401);
    }
}
