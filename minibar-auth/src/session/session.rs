use chrono::{Duration, Utc};
use http::HeaderMap;
use http::header::{COOKIE, SET_COOKIE};

use super::config::{
    ADMIN_SESSION_COOKIE_NAME, SESSION_COOKIE_SECURE, USER_SESSION_COOKIE_NAME,
    USER_SESSION_MAX_AGE,
};
use super::errors::SessionError;
use super::types::StoredSession;
use crate::passkey::{AuthVariant, Subject};
use crate::storage::{CacheData, GENERIC_CACHE_STORE};
use crate::utils::gen_random_string;

/// Cookie name for a variant's session.
pub fn session_cookie_name(variant: AuthVariant) -> &'static str {
    match variant {
        AuthVariant::Admin => ADMIN_SESSION_COOKIE_NAME.as_str(),
        AuthVariant::User => USER_SESSION_COOKIE_NAME.as_str(),
    }
}

/// Create a session for an authenticated subject and return its id.
///
/// User sessions carry an expiry and a matching cache TTL; the admin session
/// is unbounded and lives until logout.
pub(crate) async fn create_session(subject: &Subject) -> Result<String, SessionError> {
    let session_id = gen_random_string(32)?;
    let variant = subject.variant();
    let now = Utc::now();

    let session = StoredSession {
        subject: subject.clone(),
        created_at: now,
        expires_at: match variant {
            AuthVariant::Admin => None,
            AuthVariant::User => Some(now + Duration::seconds(*USER_SESSION_MAX_AGE as i64)),
        },
    };

    let data = CacheData {
        value: serde_json::to_string(&session)?,
    };

    let mut store = GENERIC_CACHE_STORE.lock().await;
    match variant {
        AuthVariant::Admin => {
            store
                .put(variant.session_prefix(), &session_id, data)
                .await?
        }
        AuthVariant::User => {
            store
                .put_with_ttl(
                    variant.session_prefix(),
                    &session_id,
                    data,
                    *USER_SESSION_MAX_AGE as usize,
                )
                .await?
        }
    }

    tracing::debug!("Created {:?} session for {:?}", variant, subject);

    Ok(session_id)
}

/// Resolve a session id to its subject.
///
/// Returns `None` for unknown and expired sessions. Expiry is validated here
/// rather than trusted to the cache backend, and an expired record is deleted
/// on sight.
pub async fn validate_session(
    variant: AuthVariant,
    session_id: &str,
) -> Result<Option<Subject>, SessionError> {
    let cached = GENERIC_CACHE_STORE
        .lock()
        .await
        .get(variant.session_prefix(), session_id)
        .await?;

    let Some(cached) = cached else {
        return Ok(None);
    };

    let session: StoredSession = serde_json::from_str(&cached.value)?;

    if let Some(expires_at) = session.expires_at {
        if expires_at < Utc::now() {
            tracing::debug!("Session expired at {}, removing", expires_at);
            GENERIC_CACHE_STORE
                .lock()
                .await
                .remove(variant.session_prefix(), session_id)
                .await?;
            return Ok(None);
        }
    }

    Ok(Some(session.subject))
}

/// Delete a session. Deleting an unknown id is not an error, so logout is
/// idempotent.
pub async fn delete_session(variant: AuthVariant, session_id: &str) -> Result<(), SessionError> {
    GENERIC_CACHE_STORE
        .lock()
        .await
        .remove(variant.session_prefix(), session_id)
        .await?;

    Ok(())
}

/// Extract a variant's session id from the request's Cookie header.
pub fn get_session_id_from_headers(
    variant: AuthVariant,
    headers: &HeaderMap,
) -> Option<String> {
    let cookie_name = session_cookie_name(variant);

    for value in headers.get_all(COOKIE) {
        let Ok(cookies) = value.to_str() else {
            continue;
        };
        for pair in cookies.split(';') {
            let mut parts = pair.trim().splitn(2, '=');
            if parts.next() == Some(cookie_name) {
                if let Some(v) = parts.next() {
                    return Some(v.to_string());
                }
            }
        }
    }

    None
}

/// Append a Set-Cookie header for a freshly created session.
pub(crate) fn append_session_cookie(
    headers: &mut HeaderMap,
    variant: AuthVariant,
    session_id: &str,
) -> Result<(), SessionError> {
    let max_age = match variant {
        AuthVariant::Admin => None,
        AuthVariant::User => Some(*USER_SESSION_MAX_AGE as i64),
    };
    append_cookie(headers, session_cookie_name(variant), session_id, max_age)
}

/// Append a Set-Cookie header that clears the variant's session cookie.
pub fn append_session_removal_cookie(
    headers: &mut HeaderMap,
    variant: AuthVariant,
) -> Result<(), SessionError> {
    append_cookie(headers, session_cookie_name(variant), "", Some(0))
}

fn append_cookie(
    headers: &mut HeaderMap,
    name: &str,
    value: &str,
    max_age: Option<i64>,
) -> Result<(), SessionError> {
    let mut cookie = format!("{name}={value}; Path=/; HttpOnly; SameSite=Lax");
    if *SESSION_COOKIE_SECURE {
        cookie.push_str("; Secure");
    }
    if let Some(age) = max_age {
        cookie.push_str(&format!("; Max-Age={age}"));
    }

    headers.append(
        SET_COOKIE,
        cookie
            .parse()
            .map_err(|_| SessionError::Cookie("Invalid cookie value".to_string()))?,
    );

    Ok(())
}
