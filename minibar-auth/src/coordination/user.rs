use http::HeaderMap;

use super::errors::CoordinationError;
use crate::passkey::{
    AuthVariant, AuthenticationOptions, AuthenticatorResponse, RegisterCredential,
    RegistrationOptions, RpContext, Subject, finish_authentication, finish_registration,
    start_authentication, start_registration,
};
use crate::session::{
    append_session_cookie, append_session_removal_cookie, create_session, delete_session,
    get_session_id_from_headers, validate_session,
};
use crate::userdb::{User, UserError, UserStore};

/// Issue user registration options.
///
/// A logged-in user adds a credential to their own account and may omit the
/// username. Otherwise a username is required and must be free; the account
/// row is created here, so the subject is fixed before the authenticator
/// round-trip.
pub async fn start_user_registration(
    username: Option<&str>,
    headers: &HeaderMap,
    rp: &RpContext,
) -> Result<RegistrationOptions, CoordinationError> {
    if let Some(user) = current_user(headers).await? {
        let options = start_registration(Subject::User(user.id), &user.username, rp).await?;
        return Ok(options);
    }

    let username = username
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or(UserError::UsernameRequired)?;

    if UserStore::get_user_by_username(username).await?.is_some() {
        return Err(UserError::UsernameTaken(username.to_string()).into());
    }

    let user = User::new(username);
    UserStore::upsert_user(&user).await?;

    let options = start_registration(Subject::User(user.id), username, rp).await?;
    Ok(options)
}

/// Verify a user attestation and store the credential. No session is created.
pub async fn finish_user_registration(
    reg_data: &RegisterCredential,
    rp: &RpContext,
) -> Result<(), CoordinationError> {
    finish_registration(reg_data, rp, AuthVariant::User).await?;
    Ok(())
}

pub async fn start_user_authentication(
    rp: &RpContext,
) -> Result<AuthenticationOptions, CoordinationError> {
    let options = start_authentication(AuthVariant::User, rp).await?;
    Ok(options)
}

/// Verify a user assertion, create a 7-day session, and append its
/// Set-Cookie header. Returns the authenticated user id.
pub async fn finish_user_authentication(
    auth_response: &AuthenticatorResponse,
    rp: &RpContext,
    headers: &mut HeaderMap,
) -> Result<String, CoordinationError> {
    let subject = finish_authentication(auth_response, rp, AuthVariant::User).await?;
    let session_id = create_session(&subject).await?;
    append_session_cookie(headers, AuthVariant::User, &session_id)?;

    let user_id = subject
        .user_id()
        .map(str::to_string)
        .unwrap_or_default();
    Ok(user_id)
}

/// Resolve the request's user session cookie to the account it belongs to.
pub async fn current_user(headers: &HeaderMap) -> Result<Option<User>, CoordinationError> {
    let Some(session_id) = get_session_id_from_headers(AuthVariant::User, headers) else {
        return Ok(None);
    };

    let Some(subject) = validate_session(AuthVariant::User, &session_id).await? else {
        return Ok(None);
    };

    let Some(user_id) = subject.user_id() else {
        return Ok(None);
    };

    Ok(UserStore::get_user(user_id).await?)
}

/// Delete the user session and append a cookie-clearing header. Idempotent.
pub async fn user_logout(
    headers: &HeaderMap,
    response_headers: &mut HeaderMap,
) -> Result<(), CoordinationError> {
    if let Some(session_id) = get_session_id_from_headers(AuthVariant::User, headers) {
        delete_session(AuthVariant::User, &session_id).await?;
    }
    append_session_removal_cookie(response_headers, AuthVariant::User)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{init_test_environment, test_authenticator::TestAuthenticator};
    use http::header::{COOKIE, SET_COOKIE};

    fn cookie_headers(set_cookie: &str) -> HeaderMap {
        let pair = set_cookie.split(';').next().unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, pair.parse().unwrap());
        headers
    }

    #[tokio::test]
    async fn test_username_required() {
        init_test_environment().await;

        let rp = RpContext::resolve(Some("localhost:3000"));
        let headers = HeaderMap::new();

        for username in [None, Some(""), Some("   ")] {
            let result = start_user_registration(username, &headers, &rp).await;
            assert!(matches!(
                result,
                Err(CoordinationError::User(UserError::UsernameRequired))
            ));
        }
    }

    #[tokio::test]
    async fn test_username_taken() {
        init_test_environment().await;

        let rp = RpContext::resolve(Some("localhost:3000"));
        let headers = HeaderMap::new();

        start_user_registration(Some("dave"), &headers, &rp)
            .await
            .unwrap();

        let result = start_user_registration(Some("dave"), &headers, &rp).await;
        assert!(matches!(
            result,
            Err(CoordinationError::User(UserError::UsernameTaken(_)))
        ));
    }

    #[tokio::test]
    async fn test_register_login_session_logout() {
        init_test_environment().await;

        let rp = RpContext::resolve(Some("localhost:3000"));
        let no_session = HeaderMap::new();

        let options = start_user_registration(Some("erin"), &no_session, &rp)
            .await
            .unwrap();

        let authenticator = TestAuthenticator::new(&rp);
        let reg_data = authenticator.create_credential(&options.challenge, &options.flow_id);
        finish_user_registration(&reg_data, &rp).await.unwrap();

        let options = start_user_authentication(&rp).await.unwrap();
        let assertion = authenticator.sign_assertion(&options.challenge, &options.flow_id, 1);

        let mut response_headers = HeaderMap::new();
        let user_id = finish_user_authentication(&assertion, &rp, &mut response_headers)
            .await
            .unwrap();
        assert!(!user_id.is_empty());

        let set_cookie = response_headers
            .get(SET_COOKIE)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        assert!(set_cookie.starts_with("user_session="));
        assert!(set_cookie.contains("Max-Age=604800"));

        let request_headers = cookie_headers(&set_cookie);
        let user = current_user(&request_headers).await.unwrap().unwrap();
        assert_eq!(user.username, "erin");
        assert_eq!(user.id, user_id);

        // A logged-in user can add another credential without a username
        assert!(
            start_user_registration(None, &request_headers, &rp)
                .await
                .is_ok()
        );

        let mut logout_headers = HeaderMap::new();
        user_logout(&request_headers, &mut logout_headers)
            .await
            .unwrap();
        assert!(current_user(&request_headers).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_concurrent_registrations_both_persist() {
        init_test_environment().await;

        let rp = RpContext::resolve(Some("localhost:3000"));
        let no_session = HeaderMap::new();

        let (a, b) = tokio::join!(
            start_user_registration(Some("frank"), &no_session, &rp),
            start_user_registration(Some("grace"), &no_session, &rp),
        );
        let options_a = a.unwrap();
        let options_b = b.unwrap();

        let auth_a = TestAuthenticator::new(&rp);
        let auth_b = TestAuthenticator::new(&rp);
        let reg_a = auth_a.create_credential(&options_a.challenge, &options_a.flow_id);
        let reg_b = auth_b.create_credential(&options_b.challenge, &options_b.flow_id);

        let (ra, rb) = tokio::join!(
            finish_user_registration(&reg_a, &rp),
            finish_user_registration(&reg_b, &rp),
        );
        ra.unwrap();
        rb.unwrap();

        let user_a = UserStore::get_user_by_username("frank")
            .await
            .unwrap()
            .unwrap();
        let user_b = UserStore::get_user_by_username("grace")
            .await
            .unwrap()
            .unwrap();

        use crate::passkey::CredentialStore;
        let creds_a = CredentialStore::get_credentials_for(&Subject::User(user_a.id))
            .await
            .unwrap();
        let creds_b = CredentialStore::get_credentials_for(&Subject::User(user_b.id))
            .await
            .unwrap();
        assert_eq!(creds_a.len(), 1);
        assert_eq!(creds_b.len(), 1);
    }
}
