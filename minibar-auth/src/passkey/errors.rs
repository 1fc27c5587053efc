use thiserror::Error;

use crate::storage::StorageError;
use crate::utils::UtilError;

/// Errors that can occur during WebAuthn/Passkey ceremony handling.
///
/// The first group mirrors the failure modes surfaced to HTTP callers;
/// the rest are internal parsing/storage conditions.
#[derive(Debug, Error)]
pub enum PasskeyError {
    /// The client response carried no credential identifier in any known field
    #[error("Missing credential id in authenticator response")]
    MissingCredentialId,

    /// The flow record is absent, or its ceremony type does not match the operation
    #[error("Invalid or expired ceremony flow: {0}")]
    InvalidFlow(String),

    /// The registration attestation was rejected by verification
    #[error("Registration not verified: {0}")]
    RegistrationNotVerified(String),

    /// No stored credential matches the asserted identifier under any interpretation
    #[error("Unknown credential: {0}")]
    UnknownCredential(String),

    /// The authentication assertion was rejected by verification
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// No credential exists yet (admin login requires at least one registration)
    #[error("No credentials registered")]
    NoCredentials,

    /// Error validating the client data JSON from the browser
    #[error("Invalid client data: {0}")]
    ClientData(String),

    /// Error parsing or validating the authenticator data structure
    #[error("Invalid authenticator data: {0}")]
    AuthenticatorData(String),

    /// Error accessing or modifying stored passkey data
    #[error("Storage error: {0}")]
    Storage(String),

    /// Error with improperly formatted data
    #[error("Invalid format: {0}")]
    Format(String),

    /// Error in cryptographic operations
    #[error("Crypto error: {0}")]
    Crypto(String),

    /// Error from utility operations
    #[error("Utils error: {0}")]
    Utils(#[from] UtilError),

    /// Error from JSON serialization/deserialization
    #[error("Serde error: {0}")]
    SerdeJson(#[from] serde_json::Error),
}

impl From<StorageError> for PasskeyError {
    fn from(err: StorageError) -> Self {
        PasskeyError::Storage(err.to_string())
    }
}
