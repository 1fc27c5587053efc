use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::PasskeyError;

/// The principal a credential, flow, or session belongs to.
///
/// The admin is a distinguished constant subject with no backing row; user
/// subjects reference a row in the users table. Representing both with one
/// type keeps the credential/flow store interfaces uniform across the two
/// authentication variants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Subject {
    Admin,
    User(String),
}

impl Subject {
    pub fn variant(&self) -> AuthVariant {
        match self {
            Subject::Admin => AuthVariant::Admin,
            Subject::User(_) => AuthVariant::User,
        }
    }

    pub fn user_id(&self) -> Option<&str> {
        match self {
            Subject::Admin => None,
            Subject::User(id) => Some(id),
        }
    }

    /// The storage key: `admin` for the singleton admin, `user:<id>` otherwise.
    pub(crate) fn storage_key(&self) -> String {
        match self {
            Subject::Admin => "admin".to_string(),
            Subject::User(id) => format!("user:{id}"),
        }
    }

    pub(crate) fn from_storage_key(key: &str) -> Result<Self, PasskeyError> {
        if key == "admin" {
            Ok(Subject::Admin)
        } else if let Some(id) = key.strip_prefix("user:") {
            Ok(Subject::User(id.to_string()))
        } else {
            Err(PasskeyError::Format(format!("Invalid subject key: {key}")))
        }
    }
}

/// The two parallel authentication variants served by this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthVariant {
    Admin,
    User,
}

impl AuthVariant {
    pub(crate) fn flow_prefix(&self) -> &'static str {
        match self {
            AuthVariant::Admin => "admin_flow",
            AuthVariant::User => "user_flow",
        }
    }

    pub(crate) fn session_prefix(&self) -> &'static str {
        match self {
            AuthVariant::Admin => "admin_session",
            AuthVariant::User => "user_session",
        }
    }
}

/// A stored passkey credential: one registered authenticator for a subject.
///
/// `credential_id` is always the canonical base64url form with padding
/// stripped; lookups normalize incoming wire identifiers the same way before
/// comparison. Credentials are never deleted in normal operation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PasskeyCredential {
    /// Canonical base64url credential id (primary key)
    pub credential_id: String,
    /// Owning subject, in storage-key form
    pub subject: String,
    /// Credential public key, base64url-encoded uncompressed P-256 point
    pub public_key: String,
    /// Authenticator signature counter (clone-detection signal, not enforced)
    pub counter: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PasskeyCredential {
    pub fn subject(&self) -> Result<Subject, PasskeyError> {
        Subject::from_storage_key(&self.subject)
    }
}
