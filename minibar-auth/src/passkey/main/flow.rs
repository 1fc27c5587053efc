use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::passkey::config::PASSKEY_FLOW_TTL;
use crate::passkey::errors::PasskeyError;
use crate::passkey::types::{AuthVariant, Subject};
use crate::storage::{CacheData, GENERIC_CACHE_STORE};
use crate::utils::gen_flow_id;

/// The ceremony a flow record was issued for. A flow created for one ceremony
/// type cannot be consumed by the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum FlowKind {
    Register,
    Login,
}

/// Server-side record binding a ceremony's challenge to its verification call.
///
/// Created when options are issued, deleted after successful verification.
/// Abandoned flows are left behind; they are harmless (the challenge is never
/// reused) and are not garbage-collected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct StoredFlow {
    pub(crate) kind: FlowKind,
    pub(crate) challenge: String,
    pub(crate) subject: Option<Subject>,
    pub(crate) created_at: DateTime<Utc>,
}

/// Persist a new flow record and return its random identifier.
pub(crate) async fn create_flow(
    variant: AuthVariant,
    kind: FlowKind,
    challenge: String,
    subject: Option<Subject>,
) -> Result<String, PasskeyError> {
    let flow_id = gen_flow_id()?;
    let flow = StoredFlow {
        kind,
        challenge,
        subject,
        created_at: Utc::now(),
    };

    let data = CacheData {
        value: serde_json::to_string(&flow)?,
    };

    GENERIC_CACHE_STORE
        .lock()
        .await
        .put_with_ttl(
            variant.flow_prefix(),
            &flow_id,
            data,
            *PASSKEY_FLOW_TTL as usize,
        )
        .await?;

    tracing::debug!("Created {:?} flow {} for {:?}", kind, flow_id, variant);

    Ok(flow_id)
}

/// Fetch a flow record and check it was issued for the expected ceremony.
///
/// The caller is responsible for deleting the record via [`remove_flow`]
/// after verification succeeds.
pub(crate) async fn get_flow(
    variant: AuthVariant,
    kind: FlowKind,
    flow_id: &str,
) -> Result<StoredFlow, PasskeyError> {
    let cached = GENERIC_CACHE_STORE
        .lock()
        .await
        .get(variant.flow_prefix(), flow_id)
        .await?
        .ok_or_else(|| PasskeyError::InvalidFlow(format!("Flow not found: {flow_id}")))?;

    let flow: StoredFlow = serde_json::from_str(&cached.value)?;

    if flow.kind != kind {
        tracing::warn!(
            "Flow {} is a {:?} flow but was consumed as {:?}",
            flow_id,
            flow.kind,
            kind
        );
        return Err(PasskeyError::InvalidFlow(format!(
            "Flow type mismatch for: {flow_id}"
        )));
    }

    Ok(flow)
}

/// Remove a consumed flow record. Removing a missing record is not an error.
pub(crate) async fn remove_flow(variant: AuthVariant, flow_id: &str) -> Result<(), PasskeyError> {
    GENERIC_CACHE_STORE
        .lock()
        .await
        .remove(variant.flow_prefix(), flow_id)
        .await?;
    tracing::debug!("Removed flow {}", flow_id);

    Ok(())
}
