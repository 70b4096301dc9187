//! Authentication identifier, `<provider>:<provider-specific-id>`.
//!
//! The provider prefix keeps identities from different providers apart,
//! `facebook:1` and `google:1` being two distinct users.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

const SEPARATOR: char = ':';

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthIdError {
    #[error("authentication identifier `{0}` has no provider prefix")]
    MissingSeparator(String),
    #[error("authentication identifier `{0}` has an empty provider or id")]
    Empty(String),
}

/// Identity of a user within a provider namespace.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AuthId {
    provider: String,
    id: String,
}

impl AuthId {
    /// Create a new [`AuthId`].
    /// `provider` must not contain `:`, `id` may.
    pub fn new(provider: &str, id: &str) -> Self {
        Self {
            provider: provider.to_owned(),
            id: id.to_owned(),
        }
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for AuthId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{SEPARATOR}{}", self.provider, self.id)
    }
}

impl FromStr for AuthId {
    type Err = AuthIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (provider, id) = s
            .split_once(SEPARATOR)
            .ok_or_else(|| AuthIdError::MissingSeparator(s.to_owned()))?;

        if provider.is_empty() || id.is_empty() {
            return Err(AuthIdError::Empty(s.to_owned()));
        }

        Ok(Self::new(provider, id))
    }
}

impl TryFrom<String> for AuthId {
    type Error = AuthIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<AuthId> for String {
    fn from(value: AuthId) -> Self {
        value.to_string()
    }
}
