//! Session identity.
//!
//! Only the user identifier goes into the session; the user itself is
//! loaded again on every request.

use tower_sessions::Session;

use crate::error::Result;
use crate::user::{User, UserRepository};

/// Key for storing user ID in session.
pub const SESSION_USER_KEY: &str = "user_id";
/// CSRF state of a pending login.
pub(crate) const OAUTH_STATE_KEY: &str = "oauth_state";
/// Where to go once logged in.
pub(crate) const RETURN_TO_KEY: &str = "return_to";

/// Bind `user` to the session.
pub async fn serialize_user(session: &Session, user: &User) -> Result<()> {
    tracing::debug!(user_id = user.id, "serializing user");

    // Against session fixation.
    session.cycle_id().await?;
    session.insert(SESSION_USER_KEY, user.id).await?;
    Ok(())
}

/// Load the user bound to the session, if any.
pub async fn deserialize_user(
    session: &Session,
    users: &dyn UserRepository,
) -> Result<Option<User>> {
    let Some(id) = session.get::<i64>(SESSION_USER_KEY).await? else {
        return Ok(None);
    };

    match users.find_by_id(id).await? {
        Some(user) => {
            tracing::trace!(user_id = user.id, "de-serializing user");
            Ok(Some(user))
        },
        None => {
            tracing::warn!(user_id = id, "session bound to a missing user");
            session.remove::<i64>(SESSION_USER_KEY).await?;
            Ok(None)
        },
    }
}

/// Forget everything about the session.
pub async fn logout(session: &Session) -> Result<()> {
    session.flush().await?;
    Ok(())
}
