//! Shared test initialization and a simulated authenticator.
//!
//! `init_test_environment` loads `.env_test` (in-memory cache store, in-memory
//! SQLite) once and makes sure the tables exist. Table creation is idempotent,
//! so every test can call it unconditionally.

use std::sync::Once;

pub(crate) async fn init_test_environment() {
    static ENV_INIT: Once = Once::new();
    ENV_INIT.call_once(|| {
        if dotenvy::from_filename(".env_test").is_err() {
            dotenvy::dotenv().ok();
        }
    });

    if let Err(e) = crate::userdb::UserStore::init().await {
        eprintln!("Warning: Failed to initialize UserStore: {e}");
    }
    if let Err(e) = crate::passkey::CredentialStore::init().await {
        eprintln!("Warning: Failed to initialize CredentialStore: {e}");
    }
}

pub(crate) mod test_authenticator {
    use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
    use ciborium::value::Value as CborValue;
    use ring::digest;
    use ring::rand::SystemRandom;
    use ring::signature::{ECDSA_P256_SHA256_ASN1_SIGNING, EcdsaKeyPair, KeyPair};
    use serde_json::json;

    use crate::passkey::{AuthenticatorResponse, CredentialId, RegisterCredential, RpContext};

    const FLAG_UP: u8 = 1 << 0;
    const FLAG_UV: u8 = 1 << 2;
    const FLAG_AT: u8 = 1 << 6;

    /// A software authenticator for exercising both ceremonies end to end:
    /// one P-256 key pair and one random credential id, bound to an RP.
    pub(crate) struct TestAuthenticator {
        key_pair: EcdsaKeyPair,
        credential_id: Vec<u8>,
        rp_id: String,
        origin: String,
        rng: SystemRandom,
    }

    impl TestAuthenticator {
        pub(crate) fn new(rp: &RpContext) -> Self {
            let rng = SystemRandom::new();
            let pkcs8 = EcdsaKeyPair::generate_pkcs8(&ECDSA_P256_SHA256_ASN1_SIGNING, &rng)
                .expect("generate key");
            let key_pair =
                EcdsaKeyPair::from_pkcs8(&ECDSA_P256_SHA256_ASN1_SIGNING, pkcs8.as_ref(), &rng)
                    .expect("parse key");

            let mut credential_id = vec![0u8; 16];
            ring::rand::SecureRandom::fill(&rng, &mut credential_id).expect("random id");

            Self {
                key_pair,
                credential_id,
                rp_id: rp.rp_id.clone(),
                origin: rp.origin.clone(),
                rng,
            }
        }

        pub(crate) fn credential_id(&self) -> CredentialId {
            CredentialId::from_bytes(&self.credential_id)
        }

        /// Produce the browser-side result of `navigator.credentials.create()`.
        pub(crate) fn create_credential(
            &self,
            challenge: &str,
            flow_id: &str,
        ) -> RegisterCredential {
            let client_data = self.client_data("webauthn.create", challenge);
            let auth_data = self.attested_auth_data();

            let attestation = CborValue::Map(vec![
                (
                    CborValue::Text("fmt".to_string()),
                    CborValue::Text("none".to_string()),
                ),
                (
                    CborValue::Text("attStmt".to_string()),
                    CborValue::Map(vec![]),
                ),
                (
                    CborValue::Text("authData".to_string()),
                    CborValue::Bytes(auth_data),
                ),
            ]);
            let mut attestation_bytes = Vec::new();
            ciborium::ser::into_writer(&attestation, &mut attestation_bytes)
                .expect("serialize attestation");

            let id = self.credential_id().into_string();
            serde_json::from_value(json!({
                "id": id,
                "rawId": id,
                "response": {
                    "clientDataJSON": URL_SAFE_NO_PAD.encode(&client_data),
                    "attestationObject": URL_SAFE_NO_PAD.encode(&attestation_bytes),
                },
                "flowId": flow_id,
            }))
            .expect("build RegisterCredential")
        }

        /// Produce the browser-side result of `navigator.credentials.get()`.
        pub(crate) fn sign_assertion(
            &self,
            challenge: &str,
            flow_id: &str,
            counter: u32,
        ) -> AuthenticatorResponse {
            let client_data = self.client_data("webauthn.get", challenge);
            let auth_data = self.assertion_auth_data(counter);

            let client_data_hash = digest::digest(&digest::SHA256, &client_data);
            let mut signed_data = auth_data.clone();
            signed_data.extend_from_slice(client_data_hash.as_ref());

            let signature = self
                .key_pair
                .sign(&self.rng, &signed_data)
                .expect("sign assertion");

            let id = self.credential_id().into_string();
            serde_json::from_value(json!({
                "id": id,
                "rawId": id,
                "response": {
                    "clientDataJSON": URL_SAFE_NO_PAD.encode(&client_data),
                    "authenticatorData": URL_SAFE_NO_PAD.encode(&auth_data),
                    "signature": URL_SAFE_NO_PAD.encode(signature.as_ref()),
                },
                "flowId": flow_id,
            }))
            .expect("build AuthenticatorResponse")
        }

        fn client_data(&self, type_: &str, challenge: &str) -> Vec<u8> {
            json!({
                "type": type_,
                "challenge": challenge,
                "origin": self.origin,
            })
            .to_string()
            .into_bytes()
        }

        fn assertion_auth_data(&self, counter: u32) -> Vec<u8> {
            let rp_id_hash = digest::digest(&digest::SHA256, self.rp_id.as_bytes());
            let mut data = Vec::with_capacity(37);
            data.extend_from_slice(rp_id_hash.as_ref());
            data.push(FLAG_UP | FLAG_UV);
            data.extend_from_slice(&counter.to_be_bytes());
            data
        }

        fn attested_auth_data(&self) -> Vec<u8> {
            // Uncompressed point: 0x04 || x || y
            let public_key = self.key_pair.public_key().as_ref();
            let x = &public_key[1..33];
            let y = &public_key[33..65];

            let cose_key = CborValue::Map(vec![
                (CborValue::Integer(1.into()), CborValue::Integer(2.into())), // kty: EC2
                (CborValue::Integer(3.into()), CborValue::Integer((-7).into())), // alg: ES256
                (
                    CborValue::Integer((-1).into()),
                    CborValue::Integer(1.into()),
                ), // crv: P-256
                (
                    CborValue::Integer((-2).into()),
                    CborValue::Bytes(x.to_vec()),
                ),
                (
                    CborValue::Integer((-3).into()),
                    CborValue::Bytes(y.to_vec()),
                ),
            ]);
            let mut cose_bytes = Vec::new();
            ciborium::ser::into_writer(&cose_key, &mut cose_bytes).expect("serialize COSE key");

            let rp_id_hash = digest::digest(&digest::SHA256, self.rp_id.as_bytes());
            let mut data = Vec::new();
            data.extend_from_slice(rp_id_hash.as_ref());
            data.push(FLAG_UP | FLAG_UV | FLAG_AT);
            data.extend_from_slice(&0u32.to_be_bytes());
            data.extend_from_slice(&[0u8; 16]); // AAGUID
            data.extend_from_slice(&(self.credential_id.len() as u16).to_be_bytes());
            data.extend_from_slice(&self.credential_id);
            data.extend_from_slice(&cose_bytes);
            data
        }
    }
}
