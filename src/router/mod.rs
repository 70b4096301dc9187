//! HTTP routes.
pub mod auth;
pub mod status;
pub mod users;
