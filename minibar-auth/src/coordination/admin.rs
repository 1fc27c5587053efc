use http::HeaderMap;

use super::errors::CoordinationError;
use crate::passkey::{
    AuthVariant, AuthenticationOptions, AuthenticatorResponse, CredentialStore, RegisterCredential,
    RegistrationOptions, RpContext, Subject, finish_authentication, finish_registration,
    start_authentication, start_registration,
};
use crate::session::{
    append_session_cookie, append_session_removal_cookie, create_session, delete_session,
    get_session_id_from_headers, validate_session,
};

/// Issue admin registration options.
///
/// Open while the admin credential table is empty (first-run setup). Once a
/// credential exists, only a logged-in admin can add another one.
pub async fn start_admin_registration(
    headers: &HeaderMap,
    rp: &RpContext,
) -> Result<RegistrationOptions, CoordinationError> {
    let existing = CredentialStore::get_credentials_for(&Subject::Admin).await?;

    if !existing.is_empty() && !is_admin_authenticated(headers).await? {
        tracing::warn!("Refusing admin registration without a session");
        return Err(CoordinationError::Unauthorized);
    }

    let options = start_registration(Subject::Admin, "admin", rp).await?;
    Ok(options)
}

/// Verify an admin attestation and store the credential. No session is
/// created; the client logs in with the new passkey.
pub async fn finish_admin_registration(
    reg_data: &RegisterCredential,
    rp: &RpContext,
) -> Result<(), CoordinationError> {
    finish_registration(reg_data, rp, AuthVariant::Admin).await?;
    Ok(())
}

pub async fn start_admin_authentication(
    rp: &RpContext,
) -> Result<AuthenticationOptions, CoordinationError> {
    let options = start_authentication(AuthVariant::Admin, rp).await?;
    Ok(options)
}

/// Verify an admin assertion, create the admin session, and append its
/// Set-Cookie header.
pub async fn finish_admin_authentication(
    auth_response: &AuthenticatorResponse,
    rp: &RpContext,
    headers: &mut HeaderMap,
) -> Result<(), CoordinationError> {
    let subject = finish_authentication(auth_response, rp, AuthVariant::Admin).await?;
    let session_id = create_session(&subject).await?;
    append_session_cookie(headers, AuthVariant::Admin, &session_id)?;
    Ok(())
}

/// Whether the request carries a valid admin session cookie.
pub async fn is_admin_authenticated(headers: &HeaderMap) -> Result<bool, CoordinationError> {
    let Some(session_id) = get_session_id_from_headers(AuthVariant::Admin, headers) else {
        return Ok(false);
    };

    let subject = validate_session(AuthVariant::Admin, &session_id).await?;
    Ok(subject == Some(Subject::Admin))
}

/// Delete the admin session and append a cookie-clearing header. Idempotent.
pub async fn admin_logout(
    headers: &HeaderMap,
    response_headers: &mut HeaderMap,
) -> Result<(), CoordinationError> {
    if let Some(session_id) = get_session_id_from_headers(AuthVariant::Admin, headers) {
        delete_session(AuthVariant::Admin, &session_id).await?;
    }
    append_session_removal_cookie(response_headers, AuthVariant::Admin)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{init_test_environment, test_authenticator::TestAuthenticator};
    use http::header::{COOKIE, SET_COOKIE};

    fn cookie_headers(set_cookie: &str) -> HeaderMap {
        // Turn "session=abc; Path=/; ..." into a request Cookie header
        let pair = set_cookie.split(';').next().unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, pair.parse().unwrap());
        headers
    }

    #[tokio::test]
    #[serial_test::serial(admin_credentials)]
    async fn test_admin_first_run_register_then_login() {
        init_test_environment().await;

        let rp = RpContext::resolve(Some("localhost:3000"));
        CredentialStore::delete_credentials_for(&Subject::Admin)
            .await
            .unwrap();

        // First run: no credentials, no session needed
        let no_session = HeaderMap::new();
        let options = start_admin_registration(&no_session, &rp).await.unwrap();

        let authenticator = TestAuthenticator::new(&rp);
        let reg_data = authenticator.create_credential(&options.challenge, &options.flow_id);
        finish_admin_registration(&reg_data, &rp).await.unwrap();

        // A second unauthenticated registration attempt is refused
        let refused = start_admin_registration(&no_session, &rp).await;
        assert!(matches!(refused, Err(CoordinationError::Unauthorized)));

        // Log in with the new credential
        let options = start_admin_authentication(&rp).await.unwrap();
        let assertion = authenticator.sign_assertion(&options.challenge, &options.flow_id, 1);

        let mut response_headers = HeaderMap::new();
        finish_admin_authentication(&assertion, &rp, &mut response_headers)
            .await
            .unwrap();

        let set_cookie = response_headers
            .get(SET_COOKIE)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        assert!(set_cookie.starts_with("session="));

        let request_headers = cookie_headers(&set_cookie);
        assert!(is_admin_authenticated(&request_headers).await.unwrap());

        // With a session, another registration is allowed
        assert!(
            start_admin_registration(&request_headers, &rp)
                .await
                .is_ok()
        );

        // Logout clears the cookie and the server record
        let mut logout_headers = HeaderMap::new();
        admin_logout(&request_headers, &mut logout_headers)
            .await
            .unwrap();
        let cleared = logout_headers.get(SET_COOKIE).unwrap().to_str().unwrap();
        assert!(cleared.contains("Max-Age=0"));
        assert!(!is_admin_authenticated(&request_headers).await.unwrap());
    }
}
