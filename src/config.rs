//! Configuration manager for social login.
//!
//! The configuration is environment specific: `ENVIRONMENT` (default
//! `development`) selects `config.<environment>.yaml`, falling back to
//! `config.yaml`. Provider secrets may be overridden by environment
//! variables so they never have to be written on disk.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::extract::FromRef;
use serde::{Deserialize, Serialize};
use url::Url;
use validator::Validate;

use crate::AppState;

const DEFAULT_CONFIG_PATH: &str = "config.yaml";
const DEFAULT_ENVIRONMENT: &str = "development";
const VERSION: &str = env!("CARGO_PKG_VERSION");

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_SESSION_EXPIRY_DAYS: i64 = 7;
/// Browsers cap cookie lifetime at 400 days.
pub const MAX_SESSION_EXPIRY_DAYS: i64 = 400;

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    /// Instance name.
    pub name: String,
    /// Domain name of current instance.
    pub url: String,
    /// Listening port.
    pub port: Option<u16>,
    /// Expose Prometheus metrics on `/metrics`.
    #[serde(default)]
    pub metrics: bool,
    #[serde(default)]
    version: String,
    #[serde(skip)]
    path: PathBuf,
    #[serde(skip)]
    environment: String,
    /// Related to PostgreSQL configuration.
    #[serde(skip_serializing)]
    pub postgres: Option<Postgres>,
    /// Related to session cookies.
    #[serde(default)]
    pub session: Session,
    /// Related to third-party login providers.
    #[serde(default, skip_serializing)]
    pub auth: Auth,
}

/// PostgreSQL configuration.
#[derive(Debug, Default, PartialEq, Clone, Serialize, Deserialize)]
pub struct Postgres {
    /// Hostname:(?port) for PostgreSQL instance.
    pub address: String,
    /// Database name.
    pub database: Option<String>,
    /// Username credential to connect.
    pub username: Option<String>,
    /// Password credential to connect.
    pub password: Option<String>,
    /// Maximum pool connections.
    pub pool_size: Option<u32>,
}

/// Where session records are kept.
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStore {
    #[default]
    Memory,
    Postgres,
}

/// Session cookie configuration.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Only send the cookie over HTTPS.
    #[serde(default)]
    pub secure: bool,
    /// Days of inactivity before a session expires.
    pub expiry_days: Option<i64>,
    #[serde(default)]
    pub store: SessionStore,
}

impl Session {
    pub fn expiry_days(&self) -> i64 {
        self.expiry_days
            .filter(|days| *days > 0)
            .unwrap_or(DEFAULT_SESSION_EXPIRY_DAYS)
            .min(MAX_SESSION_EXPIRY_DAYS)
    }
}

/// Third-party providers.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Auth {
    pub facebook: Option<Facebook>,
}

/// Facebook application credentials.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct Facebook {
    #[validate(length(min = 1, message = "Facebook application ID is required."))]
    pub app_id: String,
    #[validate(length(min = 1, message = "Facebook application secret is required."))]
    pub app_secret: String,
    #[validate(url(message = "Callback URL must be an absolute URL."))]
    pub callback_url: String,
    /// Requested permissions. Default is `public_profile`.
    #[serde(default)]
    pub scopes: Vec<String>,
    /// Graph API version, such as `v19.0`.
    pub graph_version: Option<String>,
    #[validate(url)]
    pub authorize_url: Option<String>,
    #[validate(url)]
    pub token_url: Option<String>,
    #[validate(url)]
    pub profile_url: Option<String>,
}

impl FromRef<AppState> for Arc<Configuration> {
    fn from_ref(state: &AppState) -> Arc<Configuration> {
        Arc::clone(&state.config)
    }
}

impl Configuration {
    /// Set a configuration file, or a directory holding configuration files.
    pub fn path(mut self, path: PathBuf) -> Self {
        self.path = path;
        self
    }

    /// Set the deployment environment used to pick the configuration file.
    pub fn environment(mut self, environment: &str) -> Self {
        self.environment = environment.to_owned();
        self
    }

    /// Current environment name.
    pub fn current_environment(&self) -> &str {
        if self.environment.is_empty() {
            DEFAULT_ENVIRONMENT
        } else {
            &self.environment
        }
    }

    /// Application version.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Normalizes a URL string by ensuring it starts with a valid scheme
    /// (`http` or `https`).
    fn normalize_url(&self, url: &str) -> Result<String, url::ParseError> {
        let url_with_scheme =
            if url.starts_with("http://") || url.starts_with("https://") {
                url.to_string()
            } else {
                format!("https://{url}")
            };

        let parsed_url = Url::parse(&url_with_scheme)?;
        Ok(parsed_url.to_string())
    }

    /// Find the file to read, in order: explicit file,
    /// `config.<environment>.yaml`, `config.yaml`.
    fn locate(&self) -> PathBuf {
        if self.path.is_file() {
            return self.path.clone();
        }

        let directory = if self.path.is_dir() {
            self.path.as_path()
        } else {
            Path::new(".")
        };

        let specific =
            directory.join(format!("config.{}.yaml", self.current_environment()));
        if specific.is_file() {
            specific
        } else {
            directory.join(DEFAULT_CONFIG_PATH)
        }
    }

    /// Reads the configuration file matching the current environment.
    pub fn read(self) -> Result<Arc<Self>, url::ParseError> {
        self.read_with(|key| std::env::var(key).ok())
    }

    /// Same as [`Configuration::read`] with a custom environment lookup.
    pub fn read_with(
        self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Arc<Self>, url::ParseError> {
        let file_path = self.locate();

        let mut config = match File::open(&file_path) {
            Ok(file) => match serde_yaml::from_reader::<_, Configuration>(file) {
                Ok(config) => config,
                Err(err) => self.error(&file_path, err),
            },
            Err(err) => self.error(&file_path, err),
        };

        tracing::debug!(path = %file_path.display(), environment = self.current_environment(), "configuration loaded");

        config.version = VERSION.to_owned();
        config.environment = self.environment.clone();
        config.path = file_path;

        if !config.url.is_empty() {
            config.url = self.normalize_url(&config.url)?;
        }

        Ok(Arc::new(config.override_with(lookup)))
    }

    /// Apply secrets from environment variables.
    pub fn override_with(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Self {
        let app_id = lookup("FACEBOOK_APP_ID");
        let app_secret = lookup("FACEBOOK_APP_SECRET");
        let callback_url = lookup("FACEBOOK_CALLBACK_URL");

        if app_id.is_some() || app_secret.is_some() || callback_url.is_some() {
            let facebook = self.auth.facebook.get_or_insert_with(Facebook::default);
            if let Some(app_id) = app_id {
                facebook.app_id = app_id;
            }
            if let Some(app_secret) = app_secret {
                facebook.app_secret = app_secret;
            }
            if let Some(callback_url) = callback_url {
                facebook.callback_url = callback_url;
            }
        }

        self
    }

    /// Return a default configuration as fallback.
    fn error(&self, path: &Path, err: impl std::error::Error) -> Self {
        tracing::error!(error = %err, path = %path.display(), "configuration file not readable");
        Self {
            version: VERSION.to_owned(),
            ..Default::default()
        }
    }
}
