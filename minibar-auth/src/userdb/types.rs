use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An account in the multi-user variant. The admin subject has no row here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub(crate) fn new(username: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            username: username.to_string(),
            created_at: Utc::now(),
        }
    }
}
