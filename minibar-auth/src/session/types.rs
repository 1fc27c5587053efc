use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::passkey::Subject;

/// Server-side session record. `expires_at` is `None` for the admin session,
/// which lives until logout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(super) struct StoredSession {
    pub(super) subject: Subject,
    pub(super) created_at: DateTime<Utc>,
    pub(super) expires_at: Option<DateTime<Utc>>,
}
