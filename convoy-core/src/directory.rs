use std::collections::HashMap;

use async_trait::async_trait;
use convoy_shared::Masked;
use serde::{Deserialize, Serialize};

use crate::repository::StoreError;
use crate::trip::UserId;

/// Minimal display projection of a driver or passenger.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: UserId,
    pub username: String,
    pub first_name: Option<Masked<String>>,
    pub last_name: Option<Masked<String>>,
}

impl UserSummary {
    pub fn new(id: UserId, username: impl Into<String>) -> Self {
        Self {
            id,
            username: username.into(),
            first_name: None,
            last_name: None,
        }
    }

    pub fn with_name(mut self, first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
        self.first_name = Some(Masked(first_name.into()));
        self.last_name = Some(Masked(last_name.into()));
        self
    }

    /// Placeholder for a reference the directory could not resolve.
    pub fn unresolved(id: UserId) -> Self {
        Self::new(id, "unknown")
    }
}

/// Read-only lookup of user display data, owned by the account system.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Ids that are unknown are simply absent from the returned map.
    async fn summaries(&self, ids: &[UserId]) -> Result<HashMap<UserId, UserSummary>, StoreError>;
}
