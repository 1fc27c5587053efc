//! Passkey (WebAuthn) authentication core for the minibar catalogue.
//!
//! Two parallel authentication variants share one engine: a singleton admin
//! subject (cookie `session`, no expiry) and multi-user accounts (cookie
//! `user_session`, 7-day expiry). Ceremony flows and sessions live in the
//! cache store (in-memory or redis); credentials and users live in the data
//! store (SQLite or Postgres).
//!
//! HTTP handlers live in the companion `minibar-auth-axum` crate and call the
//! operations in [`coordination`].

mod coordination;
mod passkey;
mod session;
mod storage;
mod userdb;
mod utils;

#[cfg(test)]
mod test_utils;

pub use coordination::{
    CoordinationError, admin_logout, current_user, finish_admin_authentication,
    finish_admin_registration, finish_user_authentication, finish_user_registration,
    is_admin_authenticated, start_admin_authentication, start_admin_registration,
    start_user_authentication, start_user_registration, user_logout,
};
pub use passkey::{
    AuthVariant, AuthenticationOptions, AuthenticatorResponse, CredentialId, PasskeyCredential,
    PasskeyError, RegisterCredential, RegistrationOptions, RpContext, Subject,
};
pub use session::{
    ADMIN_SESSION_COOKIE_NAME, SessionError, USER_SESSION_COOKIE_NAME, delete_session,
    get_session_id_from_headers, session_cookie_name, validate_session,
};
pub use storage::StorageError;
pub use userdb::{User, UserError};
pub use utils::gen_random_string;

/// Initialise the storage layer: connect the cache store and create the
/// credential and user tables if they do not exist. Call once at startup.
pub async fn init() -> Result<(), CoordinationError> {
    storage::GENERIC_CACHE_STORE.lock().await.init().await?;
    userdb::UserStore::init().await.map_err(CoordinationError::from)?;
    passkey::CredentialStore::init()
        .await
        .map_err(CoordinationError::from)?;
    Ok(())
}
