use ring::digest;
use serde::{Deserialize, Serialize};

use super::codec::decode_base64url;
use super::rp::RpContext;
use crate::passkey::config::PASSKEY_USER_VERIFICATION;
use crate::passkey::errors::PasskeyError;

/// Options for initiating a WebAuthn registration request.
///
/// Serialized in the camelCase shape `navigator.credentials.create()` expects.
/// `flow_id` is not part of the WebAuthn dictionary; the client echoes it back
/// with the verification call so the server can find the pending flow.
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationOptions {
    pub(crate) challenge: String,
    pub(super) rp: RelyingParty,
    pub(super) user: PublicKeyCredentialUserEntity,
    pub(super) pub_key_cred_params: Vec<PubKeyCredParam>,
    pub(super) exclude_credentials: Vec<CredentialDescriptor>,
    pub(super) authenticator_selection: AuthenticatorSelection,
    pub(super) timeout: u32,
    pub(super) attestation: String,
    pub(crate) flow_id: String,
}

impl RegistrationOptions {
    pub fn flow_id(&self) -> &str {
        &self.flow_id
    }
}

/// Options for initiating a WebAuthn authentication request, in the shape
/// `navigator.credentials.get()` expects.
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticationOptions {
    pub(crate) challenge: String,
    pub(super) timeout: u32,
    pub(super) rp_id: String,
    pub(super) allow_credentials: Vec<CredentialDescriptor>,
    pub(super) user_verification: String,
    pub(crate) flow_id: String,
}

impl AuthenticationOptions {
    pub fn flow_id(&self) -> &str {
        &self.flow_id
    }
}

#[derive(Serialize, Debug)]
pub(super) struct RelyingParty {
    pub(super) name: String,
    pub(super) id: String,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub(super) struct PublicKeyCredentialUserEntity {
    pub(super) id: String,
    pub(super) name: String,
    pub(super) display_name: String,
}

#[derive(Serialize, Debug)]
pub(super) struct PubKeyCredParam {
    #[serde(rename = "type")]
    pub(super) type_: String,
    pub(super) alg: i32,
}

#[derive(Serialize, Debug)]
pub(super) struct CredentialDescriptor {
    #[serde(rename = "type")]
    pub(super) type_: String,
    pub(super) id: String,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub(super) struct AuthenticatorSelection {
    pub(super) resident_key: String,
    pub(super) user_verification: String,
}

/// Credential data returned by the browser after a successful
/// `navigator.credentials.create()` call.
#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct RegisterCredential {
    pub(super) id: Option<String>,
    pub(super) raw_id: Option<String>,
    pub(super) response: AuthenticatorAttestationResponse,
    pub(super) flow_id: String,
}

impl RegisterCredential {
    /// The wire credential id, preferring `rawId` over `id`.
    pub(super) fn wire_credential_id(&self) -> Result<&str, PasskeyError> {
        self.raw_id
            .as_deref()
            .or(self.id.as_deref())
            .filter(|s| !s.is_empty())
            .ok_or(PasskeyError::MissingCredentialId)
    }
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub(super) struct AuthenticatorAttestationResponse {
    // WebAuthn spells out the acronym: clientDataJSON, not clientDataJson
    #[serde(rename = "clientDataJSON")]
    pub(super) client_data_json: String,
    pub(super) attestation_object: String,
}

/// Assertion returned by the browser after a successful
/// `navigator.credentials.get()` call.
#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticatorResponse {
    pub(super) id: Option<String>,
    pub(super) raw_id: Option<String>,
    pub(super) response: AuthenticatorAssertionResponse,
    pub(super) flow_id: String,
}

impl AuthenticatorResponse {
    pub(super) fn wire_credential_id(&self) -> Result<&str, PasskeyError> {
        self.raw_id
            .as_deref()
            .or(self.id.as_deref())
            .filter(|s| !s.is_empty())
            .ok_or(PasskeyError::MissingCredentialId)
    }
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub(super) struct AuthenticatorAssertionResponse {
    #[serde(rename = "clientDataJSON")]
    pub(super) client_data_json: String,
    pub(super) authenticator_data: String,
    pub(super) signature: String,
}

/// Attestation object fields this crate consumes. The attestation statement
/// is parsed but never verified; only the `none` format is accepted.
#[derive(Debug)]
pub(super) struct AttestationObject {
    pub(super) fmt: String,
    pub(super) auth_data: Vec<u8>,
}

/// Decoded clientDataJSON from either ceremony.
#[derive(Debug)]
pub(super) struct ParsedClientData {
    pub(super) challenge: String,
    pub(super) origin: String,
    pub(super) type_: String,
    pub(super) raw_data: Vec<u8>,
}

impl ParsedClientData {
    pub(super) fn from_base64(client_data_json: &str) -> Result<Self, PasskeyError> {
        let raw_data = decode_base64url(client_data_json)?;

        let data_str = String::from_utf8(raw_data.clone())
            .map_err(|e| PasskeyError::Format(format!("Invalid UTF-8: {e}")))?;

        let data: serde_json::Value = serde_json::from_str(&data_str)
            .map_err(|e| PasskeyError::Format(format!("Invalid JSON: {e}")))?;

        let challenge = data["challenge"]
            .as_str()
            .ok_or_else(|| PasskeyError::ClientData("Missing challenge".into()))?;

        Ok(Self {
            challenge: challenge.to_string(),
            origin: data["origin"]
                .as_str()
                .ok_or_else(|| PasskeyError::ClientData("Missing origin".into()))?
                .to_string(),
            type_: data["type"]
                .as_str()
                .ok_or_else(|| PasskeyError::ClientData("Missing type".into()))?
                .to_string(),
            raw_data,
        })
    }

    /// Check type, challenge, and origin against the pending flow and the
    /// relying-party context resolved from the request.
    pub(super) fn verify(
        &self,
        expected_type: &str,
        stored_challenge: &str,
        rp: &RpContext,
    ) -> Result<(), PasskeyError> {
        if self.type_ != expected_type {
            return Err(PasskeyError::ClientData(format!(
                "Invalid type. Expected '{expected_type}', Got: {}",
                self.type_
            )));
        }

        if self.challenge != stored_challenge {
            return Err(PasskeyError::ClientData("Challenge mismatch".into()));
        }

        if self.origin != rp.origin {
            return Err(PasskeyError::ClientData(format!(
                "Invalid origin. Expected: {}, Got: {}",
                rp.origin, self.origin
            )));
        }

        Ok(())
    }
}

/// Flags for authenticator data as defined in WebAuthn Level 2.
mod auth_data_flags {
    /// User Present (UP) - Bit 0
    pub(super) const UP: u8 = 1 << 0;
    /// User Verified (UV) - Bit 2
    pub(super) const UV: u8 = 1 << 2;
    /// Backup Eligibility (BE) - Bit 3
    pub(super) const BE: u8 = 1 << 3;
    /// Backup State (BS) - Bit 4
    pub(super) const BS: u8 = 1 << 4;
    /// Attested Credential Data Present - Bit 6
    pub(super) const AT: u8 = 1 << 6;
    /// Extension Data Present - Bit 7
    pub(super) const ED: u8 = 1 << 7;
}

/// Authenticator data as defined in WebAuthn Level 2.
/// <https://www.w3.org/TR/webauthn-2/#sctn-authenticator-data>
#[derive(Debug)]
pub(super) struct AuthenticatorData {
    /// SHA-256 hash of the RP ID (32 bytes)
    pub(super) rp_id_hash: Vec<u8>,
    /// Flags byte (UP bit 0, UV bit 2, AT bit 6)
    pub(super) flags: u8,
    /// Signature counter, 32-bit unsigned big-endian
    pub(super) counter: u32,
    /// Raw bytes, kept for signature verification
    pub(super) raw_data: Vec<u8>,
}

impl AuthenticatorData {
    /// Parse base64url-encoded authenticator data.
    /// Minimum 37 bytes: RP ID hash (32) + flags (1) + counter (4).
    pub(super) fn from_base64(auth_data: &str) -> Result<Self, PasskeyError> {
        let data = decode_base64url(auth_data)?;

        if data.len() < 37 {
            return Err(PasskeyError::AuthenticatorData(
                "Authenticator data too short".into(),
            ));
        }

        Ok(Self {
            rp_id_hash: data[..32].to_vec(),
            flags: data[32],
            counter: u32::from_be_bytes([data[33], data[34], data[35], data[36]]),
            raw_data: data,
        })
    }

    pub(super) fn is_user_present(&self) -> bool {
        (self.flags & auth_data_flags::UP) != 0
    }

    pub(super) fn is_user_verified(&self) -> bool {
        (self.flags & auth_data_flags::UV) != 0
    }

    pub(super) fn has_attested_credential_data(&self) -> bool {
        (self.flags & auth_data_flags::AT) != 0
    }

    pub(super) fn is_backup_eligible(&self) -> bool {
        (self.flags & auth_data_flags::BE) != 0
    }

    pub(super) fn is_backed_up(&self) -> bool {
        (self.flags & auth_data_flags::BS) != 0
    }

    pub(super) fn has_extension_data(&self) -> bool {
        (self.flags & auth_data_flags::ED) != 0
    }

    /// Verify the RP ID hash and the presence/verification flags.
    pub(super) fn verify(&self, rp: &RpContext) -> Result<(), PasskeyError> {
        tracing::debug!(
            "Authenticator data: UP={} UV={} BE={} BS={} AT={} ED={} counter={}",
            self.is_user_present(),
            self.is_user_verified(),
            self.is_backup_eligible(),
            self.is_backed_up(),
            self.has_attested_credential_data(),
            self.has_extension_data(),
            self.counter
        );

        let expected_hash = digest::digest(&digest::SHA256, rp.rp_id.as_bytes());
        if self.rp_id_hash != expected_hash.as_ref() {
            return Err(PasskeyError::AuthenticatorData(format!(
                "RP ID hash mismatch for rpId: {}",
                rp.rp_id
            )));
        }

        if !self.is_user_present() {
            return Err(PasskeyError::AuthenticatorData("User not present".into()));
        }

        if *PASSKEY_USER_VERIFICATION == "required" && !self.is_user_verified() {
            return Err(PasskeyError::AuthenticatorData(format!(
                "User verification required but flag not set. Flags: {:02x}",
                self.flags
            )));
        }

        Ok(())
    }
}
