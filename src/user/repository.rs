//! Handle database requests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres};

use crate::error::Result;
use crate::user::{AuthId, NewUser, User};

/// Port for user persistence.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Find a user by its local identifier.
    async fn find_by_id(&self, id: i64) -> Result<Option<User>>;

    /// Find a user by its authentication identifier.
    async fn find_by_auth_id(&self, auth_id: &AuthId) -> Result<Option<User>>;

    /// Save a new user and return it with its assigned identifier.
    async fn insert(&self, user: NewUser) -> Result<User>;
}

/// Row of the `users` table.
#[derive(Debug, sqlx::FromRow)]
struct UserRecord {
    id: i64,
    auth_id: String,
    name: String,
    created_at: DateTime<Utc>,
    role: String,
}

impl TryFrom<UserRecord> for User {
    type Error = crate::error::ServerError;

    fn try_from(record: UserRecord) -> Result<Self> {
        Ok(User {
            id: record.id,
            auth_id: record.auth_id.parse()?,
            name: record.name,
            created_at: record.created_at,
            role: record.role.parse()?,
        })
    }
}

/// PostgreSQL user repository.
#[derive(Clone, Debug)]
pub struct PgUserRepository {
    pool: Pool<Postgres>,
}

impl PgUserRepository {
    /// Create a new [`PgUserRepository`].
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn find_by_id(&self, id: i64) -> Result<Option<User>> {
        sqlx::query_as::<_, UserRecord>(
            r#"SELECT id, auth_id, name, created_at, role FROM users WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .map(User::try_from)
        .transpose()
    }

    async fn find_by_auth_id(&self, auth_id: &AuthId) -> Result<Option<User>> {
        sqlx::query_as::<_, UserRecord>(
            r#"SELECT id, auth_id, name, created_at, role FROM users
                WHERE auth_id = $1
                ORDER BY id
                LIMIT 1"#,
        )
        .bind(auth_id.to_string())
        .fetch_optional(&self.pool)
        .await?
        .map(User::try_from)
        .transpose()
    }

    async fn insert(&self, user: NewUser) -> Result<User> {
        let (id,): (i64,) = sqlx::query_as(
            r#"INSERT INTO users (auth_id, name, created_at, role)
                VALUES ($1, $2, $3, $4)
                RETURNING id"#,
        )
        .bind(user.auth_id.to_string())
        .bind(&user.name)
        .bind(user.created_at)
        .bind(user.role.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(user.with_id(id))
    }
}

/// In-memory repository for tests.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct MemoryUserRepository {
    users: std::sync::Mutex<Vec<User>>,
    unavailable: bool,
}

#[cfg(test)]
impl MemoryUserRepository {
    /// Every call fails as if the database was down.
    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Default::default()
        }
    }

    pub fn len(&self) -> usize {
        self.users.lock().unwrap().len()
    }

    pub fn all(&self) -> Vec<User> {
        self.users.lock().unwrap().clone()
    }

    fn check(&self) -> Result<()> {
        if self.unavailable {
            Err(sqlx::Error::PoolTimedOut.into())
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
#[async_trait]
impl UserRepository for MemoryUserRepository {
    async fn find_by_id(&self, id: i64) -> Result<Option<User>> {
        self.check()?;
        Ok(self.users.lock().unwrap().iter().find(|u| u.id == id).cloned())
    }

    async fn find_by_auth_id(&self, auth_id: &AuthId) -> Result<Option<User>> {
        self.check()?;
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|u| &u.auth_id == auth_id)
            .cloned())
    }

    async fn insert(&self, user: NewUser) -> Result<User> {
        self.check()?;
        let mut users = self.users.lock().unwrap();
        let user = user.with_id(users.len() as i64 + 1);
        users.push(user.clone());
        Ok(user)
    }
}
