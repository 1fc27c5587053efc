use thiserror::Error;

#[derive(Debug, Error)]
pub enum UserError {
    /// Registration in the multi-user variant needs a username.
    #[error("Username is required")]
    UsernameRequired,

    /// The requested username already belongs to another account.
    #[error("Username is taken: {0}")]
    UsernameTaken(String),

    #[error("Storage error: {0}")]
    Storage(String),
}
