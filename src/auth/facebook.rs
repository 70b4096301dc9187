//! Facebook login, through the Graph API.

use async_trait::async_trait;
use oauth2::basic::BasicClient;
use oauth2::{
    AuthType, AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken,
    EndpointNotSet, EndpointSet, RedirectUrl, Scope, TokenResponse, TokenUrl,
};
use serde::Deserialize;
use url::Url;
use validator::Validate;

use super::strategy::{Authorization, Profile, Strategy};
use crate::config;
use crate::error::{Result, ServerError};

pub const NAME: &str = "facebook";

const DEFAULT_GRAPH_VERSION: &str = "v19.0";
const DEFAULT_SCOPE: &str = "public_profile";
const PROFILE_FIELDS: &str = "id,name";

/// OAuth client type with auth URL and token URL set.
type ConfiguredClient = oauth2::Client<
    oauth2::basic::BasicErrorResponse,
    oauth2::basic::BasicTokenResponse,
    oauth2::basic::BasicTokenIntrospectionResponse,
    oauth2::StandardRevocableToken,
    oauth2::basic::BasicRevocationErrorResponse,
    EndpointSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointSet,
>;

/// `GET /me` response.
#[derive(Debug, Deserialize)]
struct GraphUser {
    id: String,
    name: Option<String>,
}

impl From<GraphUser> for Profile {
    fn from(user: GraphUser) -> Self {
        Profile {
            provider: NAME.to_owned(),
            id: user.id,
            display_name: user.name.unwrap_or_default(),
        }
    }
}

/// Facebook OAuth strategy.
pub struct FacebookStrategy {
    client: ConfiguredClient,
    http: reqwest::Client,
    profile_url: Url,
    scopes: Vec<Scope>,
}

impl FacebookStrategy {
    /// Create a new [`FacebookStrategy`] from static credentials.
    pub fn new(config: &config::Facebook) -> Result<Self> {
        config.validate()?;

        let version = config
            .graph_version
            .as_deref()
            .unwrap_or(DEFAULT_GRAPH_VERSION);
        let auth_url = config.authorize_url.clone().unwrap_or_else(|| {
            format!("https://www.facebook.com/{version}/dialog/oauth")
        });
        let token_url = config.token_url.clone().unwrap_or_else(|| {
            format!("https://graph.facebook.com/{version}/oauth/access_token")
        });
        let profile_url = config
            .profile_url
            .clone()
            .unwrap_or_else(|| format!("https://graph.facebook.com/{version}/me"));

        let client = BasicClient::new(ClientId::new(config.app_id.clone()))
            .set_client_secret(ClientSecret::new(config.app_secret.clone()))
            .set_auth_uri(AuthUrl::new(auth_url)?)
            .set_token_uri(TokenUrl::new(token_url)?)
            .set_redirect_uri(RedirectUrl::new(config.callback_url.clone())?)
            // Facebook expects credentials as form parameters.
            .set_auth_type(AuthType::RequestBody);

        // No redirects, against SSRF.
        let http = reqwest::ClientBuilder::new()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|err| {
                ServerError::Config(format!("cannot build HTTP client, {err}"))
            })?;

        let scopes = if config.scopes.is_empty() {
            vec![Scope::new(DEFAULT_SCOPE.to_owned())]
        } else {
            config.scopes.iter().cloned().map(Scope::new).collect()
        };

        Ok(Self {
            client,
            http,
            profile_url: Url::parse(&profile_url)?,
            scopes,
        })
    }
}

#[async_trait]
impl Strategy for FacebookStrategy {
    fn name(&self) -> &'static str {
        NAME
    }

    fn authorize(&self) -> Authorization {
        let (url, state) = self
            .client
            .authorize_url(CsrfToken::new_random)
            .add_scopes(self.scopes.clone())
            .url();

        Authorization {
            url,
            state: state.secret().to_owned(),
        }
    }

    async fn profile(&self, code: &str) -> Result<Profile> {
        let token = self
            .client
            .exchange_code(AuthorizationCode::new(code.to_owned()))
            .request_async(&self.http)
            .await
            .map_err(|err| ServerError::OAuth(err.to_string()))?;

        let user: GraphUser = self
            .http
            .get(self.profile_url.clone())
            .query(&[("fields", PROFILE_FIELDS)])
            .bearer_auth(token.access_token().secret())
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        tracing::debug!(provider = NAME, id = %user.id, "provider profile fetched");

        Ok(user.into())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use axum::extract::{Query, State};
    use axum::http::{HeaderMap, StatusCode, header};
    use axum::response::{IntoResponse, Response};
    use axum::routing::{get, post};
    use axum::{Form, Json, Router};
    use serde_json::json;

    use super::*;

    type TokenRequests = Arc<Mutex<Vec<(HeaderMap, HashMap<String, String>)>>>;

    async fn access_token(
        State(requests): State<TokenRequests>,
        headers: HeaderMap,
        Form(form): Form<HashMap<String, String>>,
    ) -> Response {
        let code = form.get("code").cloned().unwrap_or_default();
        requests.lock().unwrap().push((headers, form));

        match code.as_str() {
            "good-code" | "revoked-code" => Json(json!({
                "access_token": code.replace("-code", "-token"),
                "token_type": "bearer",
                "expires_in": 5183944,
            }))
            .into_response(),
            _ => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "invalid_grant" })),
            )
                .into_response(),
        }
    }

    async fn me(
        headers: HeaderMap,
        Query(query): Query<HashMap<String, String>>,
    ) -> Response {
        let authorized = headers
            .get(header::AUTHORIZATION)
            .is_some_and(|value| value.as_bytes() == b"Bearer good-token");

        if !authorized || query.get("fields").map(String::as_str) != Some("id,name") {
            return (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": { "message": "Invalid OAuth access token." } })),
            )
                .into_response();
        }

        Json(json!({ "id": "10220", "name": "Ada Lovelace" })).into_response()
    }

    /// Local Graph API answering the token exchange and `/me`.
    async fn graph_api() -> (String, TokenRequests) {
        let requests = TokenRequests::default();
        let app = Router::new()
            .route("/oauth/access_token", post(access_token))
            .route("/me", get(me))
            .with_state(Arc::clone(&requests));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

        (format!("http://{addr}"), requests)
    }

    fn local_config(base: &str) -> config::Facebook {
        config::Facebook {
            token_url: Some(format!("{base}/oauth/access_token")),
            profile_url: Some(format!("{base}/me")),
            ..config()
        }
    }

    fn config() -> config::Facebook {
        config::Facebook {
            app_id: "1234".into(),
            app_secret: "secret".into(),
            callback_url: "https://shop.example.com/auth/facebook/callback".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_authorize_url() {
        let strategy = FacebookStrategy::new(&config()).unwrap();
        let authorization = strategy.authorize();
        let url = authorization.url;

        assert_eq!(url.host_str(), Some("www.facebook.com"));
        assert_eq!(url.path(), "/v19.0/dialog/oauth");

        let query: std::collections::HashMap<_, _> =
            url.query_pairs().into_owned().collect();
        assert_eq!(query["client_id"], "1234");
        assert_eq!(query["response_type"], "code");
        assert_eq!(
            query["redirect_uri"],
            "https://shop.example.com/auth/facebook/callback"
        );
        assert_eq!(query["scope"], "public_profile");
        assert_eq!(query["state"], authorization.state);
        assert!(!query.contains_key("client_secret"));
    }

    #[test]
    fn test_fresh_state_every_time() {
        let strategy = FacebookStrategy::new(&config()).unwrap();
        assert_ne!(strategy.authorize().state, strategy.authorize().state);
    }

    #[test]
    fn test_custom_scopes_and_version() {
        let strategy = FacebookStrategy::new(&config::Facebook {
            scopes: vec!["public_profile".into(), "email".into()],
            graph_version: Some("v21.0".into()),
            ..config()
        })
        .unwrap();
        let url = strategy.authorize().url;

        assert_eq!(url.path(), "/v21.0/dialog/oauth");
        assert!(url.query_pairs().any(|(k, v)| k == "scope" && v == "public_profile email"));
        assert_eq!(strategy.profile_url.as_str(), "https://graph.facebook.com/v21.0/me");
    }

    #[test]
    fn test_missing_credentials() {
        let result = FacebookStrategy::new(&config::Facebook {
            app_secret: String::default(),
            ..config()
        });
        assert!(matches!(result, Err(ServerError::Validation(_))));
    }

    #[test]
    fn test_graph_user_to_profile() {
        let user: GraphUser =
            serde_json::from_str(r#"{"id":"10220","name":"Ada Lovelace"}"#).unwrap();
        let profile = Profile::from(user);

        assert_eq!(profile.provider, "facebook");
        assert_eq!(profile.auth_id().to_string(), "facebook:10220");
        assert_eq!(profile.display_name, "Ada Lovelace");

        let user: GraphUser = serde_json::from_str(r#"{"id":"1"}"#).unwrap();
        assert!(Profile::from(user).display_name.is_empty());
    }

    #[tokio::test]
    async fn test_code_exchange_and_profile() {
        let (base, requests) = graph_api().await;
        let strategy = FacebookStrategy::new(&local_config(&base)).unwrap();

        let profile = strategy.profile("good-code").await.unwrap();
        assert_eq!(profile.provider, "facebook");
        assert_eq!(profile.id, "10220");
        assert_eq!(profile.display_name, "Ada Lovelace");

        let requests = requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        let (headers, form) = &requests[0];
        // Credentials travel in the form body, not in a basic auth header.
        assert!(headers.get(header::AUTHORIZATION).is_none());
        assert_eq!(form["grant_type"], "authorization_code");
        assert_eq!(form["code"], "good-code");
        assert_eq!(form["client_id"], "1234");
        assert_eq!(form["client_secret"], "secret");
        assert_eq!(
            form["redirect_uri"],
            "https://shop.example.com/auth/facebook/callback"
        );
    }

    #[tokio::test]
    async fn test_rejected_code() {
        let (base, _) = graph_api().await;
        let strategy = FacebookStrategy::new(&local_config(&base)).unwrap();

        let result = strategy.profile("expired-code").await;
        assert!(matches!(result, Err(ServerError::OAuth(_))));
    }

    #[tokio::test]
    async fn test_profile_error_status() {
        let (base, _) = graph_api().await;
        let strategy = FacebookStrategy::new(&local_config(&base)).unwrap();

        let result = strategy.profile("revoked-code").await;
        assert!(matches!(result, Err(ServerError::Profile(_))));
    }
}
