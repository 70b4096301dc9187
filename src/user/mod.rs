mod auth_id;
mod repository;

pub use auth_id::*;
pub use repository::*;

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ServerError;

/// Local user, as saved on database.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub auth_id: AuthId,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub role: Role,
}

/// User waiting to be inserted.
#[derive(Clone, Debug, PartialEq)]
pub struct NewUser {
    pub auth_id: AuthId,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub role: Role,
}

impl NewUser {
    /// Create a [`NewUser`] with the [`Role::Customer`] role, created now.
    pub fn customer(auth_id: AuthId, name: &str) -> Self {
        Self {
            auth_id,
            name: name.to_owned(),
            created_at: Utc::now(),
            role: Role::Customer,
        }
    }

    /// Attach the identifier assigned by storage.
    pub fn with_id(self, id: i64) -> User {
        User {
            id,
            auth_id: self.auth_id,
            name: self.name,
            created_at: self.created_at,
            role: self.role,
        }
    }
}

/// Permissions of a [`User`].
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Every account created through a third-party login.
    #[default]
    Customer,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Customer => "customer",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ServerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "customer" => Ok(Role::Customer),
            "admin" => Ok(Role::Admin),
            other => Err(ServerError::Internal {
                details: format!("unknown role `{other}`"),
                source: None,
            }),
        }
    }
}
