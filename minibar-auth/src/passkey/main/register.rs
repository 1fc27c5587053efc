use ciborium::value::{Integer, Value as CborValue};

use super::codec::{CredentialId, decode_base64url};
use super::flow::{FlowKind, create_flow, get_flow, remove_flow};
use super::rp::RpContext;
use super::types::{
    AttestationObject, AuthenticatorSelection, CredentialDescriptor, ParsedClientData,
    PubKeyCredParam, PublicKeyCredentialUserEntity, RegisterCredential, RegistrationOptions,
    RelyingParty,
};
use crate::passkey::config::{PASSKEY_RP_NAME, PASSKEY_TIMEOUT, PASSKEY_USER_VERIFICATION};
use crate::passkey::errors::PasskeyError;
use crate::passkey::storage::CredentialStore;
use crate::passkey::types::{AuthVariant, PasskeyCredential, Subject};
use crate::utils::gen_random_string;

/// Issue registration options for a subject and persist the pending flow.
///
/// Already-registered credential ids are listed in `excludeCredentials` so the
/// authenticator refuses to create a duplicate.
pub(crate) async fn start_registration(
    subject: Subject,
    username: &str,
    rp: &RpContext,
) -> Result<RegistrationOptions, PasskeyError> {
    let variant = subject.variant();
    let challenge = gen_random_string(32)?;

    let exclude_credentials = CredentialStore::get_credentials_for(&subject)
        .await?
        .into_iter()
        .map(|c| CredentialDescriptor {
            type_: "public-key".to_string(),
            id: c.credential_id,
        })
        .collect();

    let flow_id = create_flow(
        variant,
        FlowKind::Register,
        challenge.clone(),
        Some(subject.clone()),
    )
    .await?;

    let options = RegistrationOptions {
        challenge,
        rp: RelyingParty {
            name: PASSKEY_RP_NAME.to_string(),
            id: rp.rp_id.clone(),
        },
        user: PublicKeyCredentialUserEntity {
            id: subject.storage_key(),
            name: username.to_string(),
            display_name: username.to_string(),
        },
        pub_key_cred_params: vec![
            PubKeyCredParam {
                type_: "public-key".to_string(),
                alg: -7,
            },
            PubKeyCredParam {
                type_: "public-key".to_string(),
                alg: -257,
            },
        ],
        exclude_credentials,
        authenticator_selection: AuthenticatorSelection {
            resident_key: "preferred".to_string(),
            user_verification: PASSKEY_USER_VERIFICATION.to_string(),
        },
        timeout: (*PASSKEY_TIMEOUT) * 1000, // seconds to milliseconds
        attestation: "none".to_string(),
        flow_id,
    };

    tracing::debug!("Registration options: {:?}", options);

    Ok(options)
}

/// Verify an attestation response and store the new credential.
///
/// Registration never creates a session; the client authenticates with the
/// new credential afterwards. Returns the owning subject.
pub(crate) async fn finish_registration(
    reg_data: &RegisterCredential,
    rp: &RpContext,
    variant: AuthVariant,
) -> Result<Subject, PasskeyError> {
    let flow = get_flow(variant, FlowKind::Register, &reg_data.flow_id).await?;
    let subject = flow
        .subject
        .clone()
        .ok_or_else(|| PasskeyError::InvalidFlow("Flow has no subject".to_string()))?;

    let wire_id = reg_data.wire_credential_id()?;

    let client_data = ParsedClientData::from_base64(&reg_data.response.client_data_json)
        .map_err(|e| PasskeyError::RegistrationNotVerified(e.to_string()))?;
    client_data
        .verify("webauthn.create", &flow.challenge, rp)
        .map_err(|e| PasskeyError::RegistrationNotVerified(e.to_string()))?;

    let attestation = parse_attestation_object(&reg_data.response.attestation_object)
        .map_err(|e| PasskeyError::RegistrationNotVerified(e.to_string()))?;

    if attestation.fmt != "none" {
        return Err(PasskeyError::RegistrationNotVerified(format!(
            "Unsupported attestation format: {}",
            attestation.fmt
        )));
    }

    let public_key = extract_public_key_from_auth_data(&attestation.auth_data)
        .map_err(|e| PasskeyError::RegistrationNotVerified(e.to_string()))?;

    let counter = u32::from_be_bytes([
        attestation.auth_data[33],
        attestation.auth_data[34],
        attestation.auth_data[35],
        attestation.auth_data[36],
    ]);

    let credential_id = CredentialId::canonicalize(wire_id);

    let now = chrono::Utc::now();
    let credential = PasskeyCredential {
        credential_id: credential_id.into_string(),
        subject: subject.storage_key(),
        public_key,
        counter,
        created_at: now,
        updated_at: now,
    };

    CredentialStore::upsert_credential(&credential).await?;

    remove_flow(variant, &reg_data.flow_id).await?;

    tracing::info!(
        "Registered credential {} for {}",
        credential.credential_id,
        credential.subject
    );

    Ok(subject)
}

/// Decode the CBOR attestation object into the fields this crate uses.
fn parse_attestation_object(attestation_base64: &str) -> Result<AttestationObject, PasskeyError> {
    let attestation_bytes = decode_base64url(attestation_base64)?;

    let attestation_cbor: CborValue = ciborium::de::from_reader(&attestation_bytes[..])
        .map_err(|e| PasskeyError::Format(format!("Invalid CBOR data: {e}")))?;

    if let CborValue::Map(map) = attestation_cbor {
        let mut fmt = None;
        let mut auth_data = None;

        for (key, value) in map {
            if let CborValue::Text(k) = key {
                match k.as_str() {
                    "fmt" => {
                        if let CborValue::Text(f) = value {
                            fmt = Some(f);
                        }
                    }
                    "authData" => {
                        if let CborValue::Bytes(data) = value {
                            auth_data = Some(data);
                        }
                    }
                    _ => {}
                }
            }
        }

        match (fmt, auth_data) {
            (Some(f), Some(d)) if d.len() >= 37 => Ok(AttestationObject {
                fmt: f,
                auth_data: d,
            }),
            (Some(_), Some(_)) => Err(PasskeyError::Format(
                "Authenticator data too short".to_string(),
            )),
            _ => Err(PasskeyError::Format(
                "Missing required attestation data".to_string(),
            )),
        }
    } else {
        Err(PasskeyError::Format(
            "Invalid attestation format".to_string(),
        ))
    }
}

/// Extract the credential public key from the attested credential data and
/// return it as a base64url-encoded uncompressed P-256 point.
fn extract_public_key_from_auth_data(auth_data: &[u8]) -> Result<String, PasskeyError> {
    let flags = auth_data[32];
    let has_attested_cred_data = (flags & 0x40) != 0;
    if !has_attested_cred_data {
        return Err(PasskeyError::AuthenticatorData(
            "No attested credential data present".to_string(),
        ));
    }

    let credential_data = parse_credential_data(auth_data)?;

    let (x_coord, y_coord) = extract_key_coordinates(credential_data)?;

    // 0x04 prefix marks an uncompressed point
    let mut public_key = Vec::with_capacity(65);
    public_key.push(0x04);
    public_key.extend_from_slice(&x_coord);
    public_key.extend_from_slice(&y_coord);

    Ok(CredentialId::from_bytes(&public_key).into_string())
}

/// Skip to the COSE key inside attested credential data.
fn parse_credential_data(auth_data: &[u8]) -> Result<&[u8], PasskeyError> {
    let mut pos = 37; // RP ID hash (32) + flags (1) + counter (4)

    if auth_data.len() < pos + 18 {
        return Err(PasskeyError::Format(
            "Authenticator data too short".to_string(),
        ));
    }

    pos += 16; // AAGUID

    let cred_id_len = ((auth_data[pos] as usize) << 8) | (auth_data[pos + 1] as usize);
    pos += 2;

    if cred_id_len == 0 || cred_id_len > 1024 {
        return Err(PasskeyError::Format(
            "Invalid credential ID length".to_string(),
        ));
    }

    if auth_data.len() < pos + cred_id_len {
        return Err(PasskeyError::Format(
            "Authenticator data too short for credential ID".to_string(),
        ));
    }

    pos += cred_id_len;

    Ok(&auth_data[pos..])
}

/// Pull the x/y coordinates out of a COSE EC2 key (labels -2 and -3).
fn extract_key_coordinates(credential_data: &[u8]) -> Result<(Vec<u8>, Vec<u8>), PasskeyError> {
    let public_key_cbor: CborValue = ciborium::de::from_reader(credential_data)
        .map_err(|e| PasskeyError::Format(format!("Invalid public key CBOR: {e}")))?;

    if let CborValue::Map(map) = public_key_cbor {
        let mut x_coord = None;
        let mut y_coord = None;

        for (key, value) in map {
            if let CborValue::Integer(i) = key {
                if i == Integer::from(-2) {
                    if let CborValue::Bytes(x) = value {
                        x_coord = Some(x);
                    }
                } else if i == Integer::from(-3) {
                    if let CborValue::Bytes(y) = value {
                        y_coord = Some(y);
                    }
                }
            }
        }

        match (x_coord, y_coord) {
            (Some(x), Some(y)) => Ok((x, y)),
            _ => Err(PasskeyError::Format(
                "Missing or invalid key coordinates".to_string(),
            )),
        }
    } else {
        Err(PasskeyError::Format(
            "Invalid public key format".to_string(),
        ))
    }
}
