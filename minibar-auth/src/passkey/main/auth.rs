use ring::{digest, signature::UnparsedPublicKey};

use super::codec::{CredentialId, decode_base64url};
use super::flow::{FlowKind, create_flow, get_flow, remove_flow};
use super::rp::RpContext;
use super::types::{
    AuthenticationOptions, AuthenticatorData, AuthenticatorResponse, CredentialDescriptor,
    ParsedClientData,
};
use crate::passkey::config::{
    PASSKEY_LIST_ALLOW_CREDENTIALS, PASSKEY_TIMEOUT, PASSKEY_USER_VERIFICATION,
};
use crate::passkey::errors::PasskeyError;
use crate::passkey::storage::CredentialStore;
use crate::passkey::types::{AuthVariant, PasskeyCredential, Subject};
use crate::utils::gen_random_string;

/// Issue authentication options and persist the pending flow.
///
/// The admin variant refuses to start when no admin credential exists, so the
/// client can fall back to its registration screen. `allowCredentials` is left
/// empty by default; platform authenticators then offer any resident
/// credential for the RP.
pub(crate) async fn start_authentication(
    variant: AuthVariant,
    rp: &RpContext,
) -> Result<AuthenticationOptions, PasskeyError> {
    let mut allow_credentials = Vec::new();

    if variant == AuthVariant::Admin {
        let credentials = CredentialStore::get_credentials_for(&Subject::Admin).await?;
        if credentials.is_empty() {
            return Err(PasskeyError::NoCredentials);
        }

        if *PASSKEY_LIST_ALLOW_CREDENTIALS {
            for credential in credentials {
                allow_credentials.push(CredentialDescriptor {
                    type_: "public-key".to_string(),
                    id: credential.credential_id,
                });
            }
        }
    }

    let challenge = gen_random_string(32)?;
    let flow_id = create_flow(variant, FlowKind::Login, challenge.clone(), None).await?;

    let options = AuthenticationOptions {
        challenge,
        timeout: (*PASSKEY_TIMEOUT) * 1000, // seconds to milliseconds
        rp_id: rp.rp_id.clone(),
        allow_credentials,
        user_verification: PASSKEY_USER_VERIFICATION.to_string(),
        flow_id,
    };

    tracing::debug!("Authentication options: {:?}", options);

    Ok(options)
}

/// Verify an assertion and return the subject the matched credential belongs to.
///
/// The caller creates the session; this function only proves possession of
/// the private key and consumes the flow.
pub(crate) async fn finish_authentication(
    auth_response: &AuthenticatorResponse,
    rp: &RpContext,
    variant: AuthVariant,
) -> Result<Subject, PasskeyError> {
    let flow = get_flow(variant, FlowKind::Login, &auth_response.flow_id).await?;

    let wire_id = auth_response.wire_credential_id()?;

    let client_data = ParsedClientData::from_base64(&auth_response.response.client_data_json)
        .map_err(|e| PasskeyError::AuthenticationFailed(e.to_string()))?;
    client_data
        .verify("webauthn.get", &flow.challenge, rp)
        .map_err(|e| PasskeyError::AuthenticationFailed(e.to_string()))?;

    let auth_data = AuthenticatorData::from_base64(&auth_response.response.authenticator_data)
        .map_err(|e| PasskeyError::AuthenticationFailed(e.to_string()))?;
    auth_data
        .verify(rp)
        .map_err(|e| PasskeyError::AuthenticationFailed(e.to_string()))?;

    let stored_credential = find_credential_tolerant(wire_id).await?;

    let subject = stored_credential.subject()?;
    if subject.variant() != variant {
        tracing::warn!(
            "Credential {} belongs to the other authentication variant",
            stored_credential.credential_id
        );
        return Err(PasskeyError::UnknownCredential(wire_id.to_string()));
    }

    verify_signature(auth_response, &client_data, &auth_data, &stored_credential)?;

    update_counter(&stored_credential, &auth_data).await?;

    remove_flow(variant, &auth_response.flow_id).await?;

    tracing::info!(
        "Authenticated {} with credential {}",
        stored_credential.subject,
        stored_credential.credential_id
    );

    Ok(subject)
}

/// Look up a credential under the three historical encodings of its id.
///
/// 1. the wire string exactly as the client sent it;
/// 2. the canonical base64url form of the wire string;
/// 3. any stored row whose id canonicalizes to the same form (covers rows
///    written by old clients in standard base64 or double-encoded).
///
/// A match under anything but the stored spelling rewrites the row to the
/// canonical form, so each credential is repaired at most once.
async fn find_credential_tolerant(wire_id: &str) -> Result<PasskeyCredential, PasskeyError> {
    if let Some(credential) = CredentialStore::get_credential(wire_id).await? {
        return Ok(credential);
    }

    let canonical = CredentialId::canonicalize(wire_id);

    if canonical.as_str() != wire_id {
        if let Some(credential) = CredentialStore::get_credential(canonical.as_str()).await? {
            return Ok(credential);
        }
    }

    // Slow path: the stored id itself may be in a legacy encoding
    for mut credential in CredentialStore::get_all_credentials().await? {
        let stored_canonical = CredentialId::canonicalize(&credential.credential_id);
        if stored_canonical == canonical {
            tracing::warn!(
                "Rewriting legacy credential id {} -> {}",
                credential.credential_id,
                stored_canonical
            );
            CredentialStore::rewrite_credential_id(
                &credential.credential_id,
                stored_canonical.as_str(),
            )
            .await?;
            credential.credential_id = stored_canonical.into_string();
            return Ok(credential);
        }
    }

    Err(PasskeyError::UnknownCredential(wire_id.to_string()))
}

/// Verify the assertion signature: ECDSA P-256 over
/// `authenticatorData || SHA-256(clientDataJSON)`.
fn verify_signature(
    auth_response: &AuthenticatorResponse,
    client_data: &ParsedClientData,
    auth_data: &AuthenticatorData,
    stored_credential: &PasskeyCredential,
) -> Result<(), PasskeyError> {
    let public_key = decode_base64url(&stored_credential.public_key)
        .map_err(|e| PasskeyError::AuthenticationFailed(format!("Invalid public key: {e}")))?;

    let signature = decode_base64url(&auth_response.response.signature)
        .map_err(|e| PasskeyError::AuthenticationFailed(format!("Invalid signature: {e}")))?;

    let client_data_hash = digest::digest(&digest::SHA256, &client_data.raw_data);

    let mut signed_data = Vec::with_capacity(auth_data.raw_data.len() + 32);
    signed_data.extend_from_slice(&auth_data.raw_data);
    signed_data.extend_from_slice(client_data_hash.as_ref());

    UnparsedPublicKey::new(&ring::signature::ECDSA_P256_SHA256_ASN1, &public_key)
        .verify(&signed_data, &signature)
        .map_err(|_| PasskeyError::AuthenticationFailed("Signature verification failed".into()))
}

/// Record the authenticator's counter. A regression is a cloning signal but
/// is logged rather than enforced: widely used platform authenticators report
/// a constant zero, and credentials synced across devices legitimately go
/// backwards.
async fn update_counter(
    stored_credential: &PasskeyCredential,
    auth_data: &AuthenticatorData,
) -> Result<(), PasskeyError> {
    if auth_data.counter == 0 && stored_credential.counter == 0 {
        return Ok(());
    }

    if auth_data.counter <= stored_credential.counter {
        tracing::warn!(
            "Counter did not increase for credential {} (stored: {}, received: {})",
            stored_credential.credential_id,
            stored_credential.counter,
            auth_data.counter
        );
    }

    CredentialStore::update_credential_counter(
        &stored_credential.credential_id,
        auth_data.counter,
    )
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::passkey::main::register::{finish_registration, start_registration};
    use crate::test_utils::{init_test_environment, test_authenticator::TestAuthenticator};

    async fn register(
        authenticator: &TestAuthenticator,
        subject: Subject,
        rp: &RpContext,
    ) {
        let variant = subject.variant();
        let options = start_registration(subject, "tester", rp).await.unwrap();
        let reg_data = authenticator.create_credential(&options.challenge, &options.flow_id);
        finish_registration(&reg_data, rp, variant).await.unwrap();
    }

    #[tokio::test]
    async fn test_register_then_authenticate() {
        init_test_environment().await;

        let rp = RpContext::resolve(Some("localhost:3000"));
        let subject = Subject::User("auth-user-1".to_string());
        let authenticator = TestAuthenticator::new(&rp);
        register(&authenticator, subject.clone(), &rp).await;

        let options = start_authentication(AuthVariant::User, &rp).await.unwrap();
        let assertion = authenticator.sign_assertion(&options.challenge, &options.flow_id, 1);

        let authenticated = finish_authentication(&assertion, &rp, AuthVariant::User)
            .await
            .unwrap();
        assert_eq!(authenticated, subject);

        // The flow is consumed
        let replay = finish_authentication(&assertion, &rp, AuthVariant::User).await;
        assert!(matches!(replay, Err(PasskeyError::InvalidFlow(_))));
    }

    #[tokio::test]
    async fn test_authenticate_with_tampered_signature() {
        init_test_environment().await;

        let rp = RpContext::resolve(Some("localhost:3000"));
        let authenticator = TestAuthenticator::new(&rp);
        register(
            &authenticator,
            Subject::User("auth-user-2".to_string()),
            &rp,
        )
        .await;

        let options = start_authentication(AuthVariant::User, &rp).await.unwrap();
        let mut assertion = authenticator.sign_assertion(&options.challenge, &options.flow_id, 1);
        assertion.response.signature = CredentialId::from_bytes(&[0u8; 70]).into_string();

        let result = finish_authentication(&assertion, &rp, AuthVariant::User).await;
        assert!(matches!(
            result,
            Err(PasskeyError::AuthenticationFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_authenticate_unknown_credential() {
        init_test_environment().await;

        let rp = RpContext::resolve(Some("localhost:3000"));
        let authenticator = TestAuthenticator::new(&rp);
        register(
            &authenticator,
            Subject::User("auth-user-3".to_string()),
            &rp,
        )
        .await;

        let options = start_authentication(AuthVariant::User, &rp).await.unwrap();
        // An authenticator whose credential was never registered
        let stranger = TestAuthenticator::new(&rp);
        let assertion = stranger.sign_assertion(&options.challenge, &options.flow_id, 1);

        let result = finish_authentication(&assertion, &rp, AuthVariant::User).await;
        assert!(matches!(result, Err(PasskeyError::UnknownCredential(_))));
    }

    #[tokio::test]
    #[serial_test::serial(admin_credentials)]
    async fn test_admin_start_without_credentials() {
        init_test_environment().await;

        let rp = RpContext::resolve(Some("localhost:3000"));
        CredentialStore::delete_credentials_for(&Subject::Admin)
            .await
            .unwrap();

        let result = start_authentication(AuthVariant::Admin, &rp).await;
        assert!(matches!(result, Err(PasskeyError::NoCredentials)));
    }

    #[tokio::test]
    async fn test_tolerant_lookup_heals_legacy_stored_id() {
        init_test_environment().await;

        let rp = RpContext::resolve(Some("localhost:3000"));
        let subject = Subject::User("auth-user-4".to_string());
        let authenticator = TestAuthenticator::new(&rp);
        register(&authenticator, subject.clone(), &rp).await;

        // Rewrite the stored row to the standard-base64 spelling an old
        // client would have produced
        let canonical = authenticator.credential_id();
        let legacy = canonical
            .as_str()
            .replace('-', "+")
            .replace('_', "/");
        if legacy == canonical.as_str() {
            // Random id happened to use neither - nor _; nothing to heal
            return;
        }
        CredentialStore::rewrite_credential_id(canonical.as_str(), &legacy)
            .await
            .unwrap();
        assert!(
            CredentialStore::get_credential(canonical.as_str())
                .await
                .unwrap()
                .is_none()
        );

        let options = start_authentication(AuthVariant::User, &rp).await.unwrap();
        let assertion = authenticator.sign_assertion(&options.challenge, &options.flow_id, 1);

        let authenticated = finish_authentication(&assertion, &rp, AuthVariant::User)
            .await
            .unwrap();
        assert_eq!(authenticated, subject);

        // The row has been rewritten to the canonical spelling
        assert!(
            CredentialStore::get_credential(canonical.as_str())
                .await
                .unwrap()
                .is_some()
        );
        assert!(
            CredentialStore::get_credential(&legacy)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_tolerant_lookup_heals_double_encoded_stored_id() {
        init_test_environment().await;

        let rp = RpContext::resolve(Some("localhost:3000"));
        let subject = Subject::User("auth-user-6".to_string());
        // An id without -/_ would itself be eligible for repair; pick one
        // where the double-encoded spelling is unambiguous
        let authenticator = loop {
            let a = TestAuthenticator::new(&rp);
            let id = a.credential_id();
            if id.as_str().contains('-') || id.as_str().contains('_') {
                break a;
            }
        };
        register(&authenticator, subject.clone(), &rp).await;

        // Rewrite the stored row to the double-encoded spelling: the UTF-8
        // text of the canonical id, base64-encoded again
        use base64::{Engine as _, engine::general_purpose::STANDARD};
        let canonical = authenticator.credential_id();
        let double_encoded = STANDARD.encode(canonical.as_str().as_bytes());
        CredentialStore::rewrite_credential_id(canonical.as_str(), &double_encoded)
            .await
            .unwrap();
        assert!(
            CredentialStore::get_credential(canonical.as_str())
                .await
                .unwrap()
                .is_none()
        );

        let options = start_authentication(AuthVariant::User, &rp).await.unwrap();
        let assertion = authenticator.sign_assertion(&options.challenge, &options.flow_id, 1);

        let authenticated = finish_authentication(&assertion, &rp, AuthVariant::User)
            .await
            .unwrap();
        assert_eq!(authenticated, subject);

        // The row has been healed back to the canonical spelling
        assert!(
            CredentialStore::get_credential(canonical.as_str())
                .await
                .unwrap()
                .is_some()
        );
        assert!(
            CredentialStore::get_credential(&double_encoded)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_counter_regression_is_tolerated() {
        init_test_environment().await;

        let rp = RpContext::resolve(Some("localhost:3000"));
        let subject = Subject::User("auth-user-5".to_string());
        let authenticator = TestAuthenticator::new(&rp);
        register(&authenticator, subject.clone(), &rp).await;

        let options = start_authentication(AuthVariant::User, &rp).await.unwrap();
        let assertion = authenticator.sign_assertion(&options.challenge, &options.flow_id, 5);
        finish_authentication(&assertion, &rp, AuthVariant::User)
            .await
            .unwrap();

        // A second assertion with a lower counter still authenticates
        let options = start_authentication(AuthVariant::User, &rp).await.unwrap();
        let assertion = authenticator.sign_assertion(&options.challenge, &options.flow_id, 2);
        let authenticated = finish_authentication(&assertion, &rp, AuthVariant::User)
            .await
            .unwrap();
        assert_eq!(authenticated, subject);

        let stored = CredentialStore::get_credential(authenticator.credential_id().as_str())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.counter, 2);
    }

    #[tokio::test]
    #[serial_test::serial(admin_credentials)]
    async fn test_variant_mismatch_is_unknown_credential() {
        init_test_environment().await;

        let rp = RpContext::resolve(Some("localhost:3000"));
        let authenticator = TestAuthenticator::new(&rp);
        register(&authenticator, Subject::Admin, &rp).await;

        // An admin credential cannot answer a user-variant login
        let options = start_authentication(AuthVariant::User, &rp).await.unwrap();
        let assertion = authenticator.sign_assertion(&options.challenge, &options.flow_id, 1);

        let result = finish_authentication(&assertion, &rp, AuthVariant::User).await;
        assert!(matches!(result, Err(PasskeyError::UnknownCredential(_))));
    }
}
