use std::{env, sync::LazyLock};

/// Cookie carrying the singleton admin session.
pub static ADMIN_SESSION_COOKIE_NAME: LazyLock<String> = LazyLock::new(|| {
    env::var("ADMIN_SESSION_COOKIE_NAME").unwrap_or_else(|_| "session".to_string())
});

/// Cookie carrying a user session.
pub static USER_SESSION_COOKIE_NAME: LazyLock<String> = LazyLock::new(|| {
    env::var("USER_SESSION_COOKIE_NAME").unwrap_or_else(|_| "user_session".to_string())
});

/// User sessions expire after this many seconds. Admin sessions never expire.
pub(super) static USER_SESSION_MAX_AGE: LazyLock<u64> = LazyLock::new(|| {
    env::var("USER_SESSION_MAX_AGE")
        .map(|v| v.parse::<u64>().unwrap_or(604800))
        .unwrap_or(604800) // 7 days
});

/// Mark session cookies Secure. Off by default so local http development works.
pub(super) static SESSION_COOKIE_SECURE: LazyLock<bool> = LazyLock::new(|| {
    env::var("SESSION_COOKIE_SECURE")
        .map(|v| v.parse::<bool>().unwrap_or(false))
        .unwrap_or(false)
});
