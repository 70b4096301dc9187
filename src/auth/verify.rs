//! Map provider profiles to local users.

use super::strategy::Profile;
use crate::error::Result;
use crate::user::{NewUser, User, UserRepository};

/// Find the user owning `profile`, or create it as a customer.
///
/// Lookup then insert, without locking: two first logins of the same
/// identity at once may both create a record.
pub async fn find_or_create(
    users: &dyn UserRepository,
    profile: &Profile,
) -> Result<User> {
    let auth_id = profile.auth_id();

    if let Some(user) = users.find_by_auth_id(&auth_id).await? {
        tracing::debug!(user_id = user.id, %auth_id, "known user logged in");
        return Ok(user);
    }

    let user = users
        .insert(NewUser::customer(auth_id, &profile.display_name))
        .await?;

    metrics::counter!("users_created_total", "provider" => profile.provider.clone())
        .increment(1);
    tracing::info!(user_id = user.id, auth_id = %user.auth_id, "user created");

    Ok(user)
}
