use std::{env, sync::LazyLock};

pub(super) static PASSKEY_RP_NAME: LazyLock<String> =
    LazyLock::new(|| env::var("PASSKEY_RP_NAME").unwrap_or_else(|_| "Minibar".to_string()));

pub(super) static PASSKEY_TIMEOUT: LazyLock<u32> = LazyLock::new(|| {
    env::var("PASSKEY_TIMEOUT")
        .map(|v| v.parse::<u32>().unwrap_or(60))
        .unwrap_or(60)
});

pub(super) static PASSKEY_USER_VERIFICATION: LazyLock<String> = LazyLock::new(|| {
    env::var("PASSKEY_USER_VERIFICATION").map_or(
        "preferred".to_string(), // Default to preferred
        |v| match v.to_lowercase().as_str() {
            "required" => "required".to_string(),
            "preferred" => "preferred".to_string(),
            "discouraged" => "discouraged".to_string(),
            _ => {
                tracing::warn!("Invalid user verification: {}. Using default 'preferred'", v);
                "preferred".to_string()
            }
        },
    )
});

/// When true, authentication options list the registered credential ids in
/// `allowCredentials`. The default leaves the list empty so platform
/// authenticators can offer any resident credential.
pub(super) static PASSKEY_LIST_ALLOW_CREDENTIALS: LazyLock<bool> = LazyLock::new(|| {
    env::var("PASSKEY_LIST_ALLOW_CREDENTIALS")
        .map(|v| v.parse::<bool>().unwrap_or(false))
        .unwrap_or(false)
});

/// TTL applied to flow records in cache backends that support expiry. Flows
/// are not TTL-validated on read; abandoned flows are accepted staleness.
pub(super) static PASSKEY_FLOW_TTL: LazyLock<u32> = LazyLock::new(|| {
    env::var("PASSKEY_FLOW_TTL")
        .map(|v| v.parse::<u32>().unwrap_or(86400))
        .unwrap_or(86400)
});
