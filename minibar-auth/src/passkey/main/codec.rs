//! Credential identifier codec.
//!
//! Browsers hand back credential ids in wire form (base64url over an
//! ArrayBuffer), but historical clients have stored the same ids as standard
//! base64 or even double-encoded (the UTF-8 text of a base64url id encoded as
//! base64 again). Everything written to the credential store goes through
//! [`CredentialId`], which holds the canonical base64url form with padding
//! stripped, so the codec boundary is enforced by the type system.

use std::fmt;

use base64::{
    Engine as _,
    engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD},
};
use serde::{Deserialize, Serialize};

use crate::passkey::errors::PasskeyError;

/// A credential id in canonical form: base64url alphabet, no padding.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CredentialId(String);

impl CredentialId {
    /// Normalize a wire-format identifier string to canonical form.
    ///
    /// Three interpretations are attempted in order:
    /// 1. already base64url (contains `-` or `_`): strip trailing padding;
    /// 2. standard base64 whose decoded bytes are the UTF-8 text of another
    ///    base64url-looking string: recurse on that text (repairs
    ///    double-encoded ids produced by inconsistent clients);
    /// 3. fallback: substitute `+`/`/` with `-`/`_` and strip padding.
    pub fn canonicalize(wire: &str) -> Self {
        if wire.contains('-') || wire.contains('_') {
            return Self(wire.trim_end_matches('=').to_string());
        }

        if let Ok(bytes) = decode_base64_lenient(wire) {
            if let Ok(text) = String::from_utf8(bytes) {
                if looks_like_base64url(&text) {
                    tracing::debug!(
                        "Repairing double-encoded credential id: {} -> {}",
                        wire,
                        text
                    );
                    return Self::canonicalize(&text);
                }
            }
        }

        Self(
            wire.replace('+', "-")
                .replace('/', "_")
                .trim_end_matches('=')
                .to_string(),
        )
    }

    /// Encode raw credential id bytes to canonical form.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(URL_SAFE_NO_PAD.encode(bytes))
    }

    /// Decode the canonical id back to raw bytes.
    pub fn decode(&self) -> Result<Vec<u8>, PasskeyError> {
        decode_base64url(&self.0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for CredentialId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn looks_like_base64url(s: &str) -> bool {
    !s.is_empty()
        && s.bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

/// Decode a base64url string, tolerating missing padding.
pub(crate) fn decode_base64url(input: &str) -> Result<Vec<u8>, PasskeyError> {
    let standard = input.replace('-', "+").replace('_', "/");
    decode_base64_lenient(&standard)
}

/// Decode a standard-alphabet base64 string, re-padding to a multiple of
/// four. Strings in the base64url alphabet are rejected by the engine.
pub(crate) fn decode_base64_lenient(input: &str) -> Result<Vec<u8>, PasskeyError> {
    let unpadded = input.trim_end_matches('=');
    let mut padded = unpadded.to_string();
    match unpadded.len() % 4 {
        0 => {}
        1 => {
            return Err(PasskeyError::Format(format!(
                "Invalid base64 length: {}",
                input.len()
            )));
        }
        n => padded.push_str(&"=".repeat(4 - n)),
    }

    STANDARD
        .decode(padded)
        .map_err(|e| PasskeyError::Format(format!("Failed to decode base64: {e}")))
}
