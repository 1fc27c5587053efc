use thiserror::Error;

use crate::passkey::PasskeyError;
use crate::session::SessionError;
use crate::storage::StorageError;
use crate::userdb::UserError;

/// Error surface of the operation layer. Wraps the per-module errors so the
/// HTTP boundary has one type to map to status codes.
#[derive(Debug, Error)]
pub enum CoordinationError {
    #[error(transparent)]
    Passkey(#[from] PasskeyError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    User(#[from] UserError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Unauthorized")]
    Unauthorized,
}
