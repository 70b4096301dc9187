//! Third-party login.
//!
//! [`init_auth`] registers the configured OAuth strategies into an
//! [`Authenticator`]. Once a provider handshake succeeds, the provider
//! profile is mapped to a local user (found or created), whose identifier
//! is then bound to the session. [`ensure_authenticated`] gates routes
//! behind that session identity.

pub mod facebook;
mod middleware;
mod session;
mod strategy;
pub mod verify;
mod view;

pub use facebook::FacebookStrategy;
pub use middleware::{ensure_authenticated, is_authenticated};
pub use session::{SESSION_USER_KEY, deserialize_user, logout, serialize_user};
pub(crate) use session::{OAUTH_STATE_KEY, RETURN_TO_KEY};
pub use strategy::{Authorization, Profile, Strategy};
pub use view::{LoginView, sanitize_redirect};

#[cfg(test)]
pub(crate) use strategy::StaticStrategy;

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::Configuration;
use crate::error::{Result, ServerError};
use crate::user::{User, UserRepository};

/// Registered strategies, and the user store profiles are mapped to.
pub struct Authenticator {
    strategies: BTreeMap<&'static str, Arc<dyn Strategy>>,
    users: Arc<dyn UserRepository>,
}

impl Authenticator {
    /// Create a new [`Authenticator`] without any strategy.
    pub fn new(users: Arc<dyn UserRepository>) -> Self {
        Self {
            strategies: BTreeMap::new(),
            users,
        }
    }

    /// Register a strategy, replacing any with the same name.
    pub fn with_strategy(mut self, strategy: impl Strategy + 'static) -> Self {
        tracing::info!(provider = strategy.name(), "login strategy registered");
        self.strategies.insert(strategy.name(), Arc::new(strategy));
        self
    }

    /// Names of registered providers.
    pub fn providers(&self) -> Vec<&'static str> {
        self.strategies.keys().copied().collect()
    }

    /// Find a registered strategy.
    pub fn strategy(&self, provider: &str) -> Result<&Arc<dyn Strategy>> {
        self.strategies
            .get(provider)
            .ok_or_else(|| ServerError::UnknownProvider(provider.to_owned()))
    }

    /// Start a login with `provider`.
    pub fn authorize(&self, provider: &str) -> Result<Authorization> {
        Ok(self.strategy(provider)?.authorize())
    }

    /// Finish a login with `provider`: exchange `code`, then find or create
    /// the matching local user.
    pub async fn authenticate(&self, provider: &str, code: &str) -> Result<User> {
        let profile = self.strategy(provider)?.profile(code).await?;
        verify::find_or_create(self.users.as_ref(), &profile).await
    }
}

/// Register the configured login strategies.
pub fn init_auth(
    config: &Configuration,
    users: Arc<dyn UserRepository>,
) -> Result<Authenticator> {
    let Some(facebook) = &config.auth.facebook else {
        return Err(ServerError::Config(
            "missing `auth.facebook` entry".to_owned(),
        ));
    };

    Ok(Authenticator::new(users).with_strategy(FacebookStrategy::new(facebook)?))
}
