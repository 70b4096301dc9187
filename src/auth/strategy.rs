//! Pluggable third-party login protocols.

use async_trait::async_trait;
use url::Url;

use crate::error::Result;

/// Provider profile, normalized.
#[derive(Clone, Debug, PartialEq)]
pub struct Profile {
    /// Provider name, such as `facebook`.
    pub provider: String,
    /// Provider specific identifier.
    pub id: String,
    pub display_name: String,
}

impl Profile {
    /// Synthesized authentication identifier, `<provider>:<id>`.
    pub fn auth_id(&self) -> crate::user::AuthId {
        crate::user::AuthId::new(&self.provider, &self.id)
    }
}

/// Where to send the browser to log in, and the state it must come back
/// with.
#[derive(Clone, Debug)]
pub struct Authorization {
    pub url: Url,
    pub state: String,
}

/// An OAuth strategy: a pluggable handler implementing a specific
/// third-party login protocol.
#[async_trait]
pub trait Strategy: Send + Sync {
    /// Name used in routes, and as authentication identifier prefix.
    fn name(&self) -> &'static str;

    /// Build the provider authorization URL with a fresh CSRF state.
    fn authorize(&self) -> Authorization;

    /// Complete the handshake with the authorization `code` and fetch the
    /// user profile.
    async fn profile(&self, code: &str) -> Result<Profile>;
}

/// Strategy answering without any network call.
#[cfg(test)]
pub(crate) struct StaticStrategy {
    pub name: &'static str,
    pub state: String,
    pub profile: Profile,
}

#[cfg(test)]
impl StaticStrategy {
    pub const CODE: &'static str = "valid-code";

    pub fn facebook(id: &str, display_name: &str) -> Self {
        Self {
            name: "facebook",
            state: "csrf-state".into(),
            profile: Profile {
                provider: "facebook".into(),
                id: id.into(),
                display_name: display_name.into(),
            },
        }
    }
}

#[cfg(test)]
#[async_trait]
impl Strategy for StaticStrategy {
    fn name(&self) -> &'static str {
        self.name
    }

    fn authorize(&self) -> Authorization {
        let mut url = Url::parse("https://provider.test/dialog/oauth").unwrap();
        url.query_pairs_mut().append_pair("state", &self.state);
        Authorization {
            url,
            state: self.state.clone(),
        }
    }

    async fn profile(&self, code: &str) -> Result<Profile> {
        if code == Self::CODE {
            Ok(self.profile.clone())
        } else {
            Err(crate::error::ServerError::OAuth("invalid code".into()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_auth_id() {
        let profile = Profile {
            provider: "facebook".into(),
            id: "10220".into(),
            display_name: "Ada".into(),
        };
        assert_eq!(profile.auth_id().to_string(), "facebook:10220");
    }
}
