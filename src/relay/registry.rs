//! Registry of live relay sessions.

use crate::models::UserId;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;
use utoipa::ToSchema;
use uuid::Uuid;

/// Snapshot of one live relay session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RelaySessionInfo {
    /// Session identifier.
    pub session_id: Uuid,
    /// Relayed symbol.
    pub symbol: String,
    /// Authenticated caller, if any.
    pub user_id: Option<UserId>,
    /// Session start.
    pub opened_at: DateTime<Utc>,
}

/// Set of live relay sessions. Every insert and remove takes the same lock.
#[derive(Debug, Default)]
pub struct RelayRegistry {
    sessions: Mutex<HashMap<Uuid, RelaySessionInfo>>,
}

impl RelayRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a session. It stays listed until the returned guard drops.
    #[must_use]
    pub fn register(self: &Arc<Self>, symbol: String, user_id: Option<UserId>) -> RelayRegistration {
        let info = RelaySessionInfo {
            session_id: Uuid::new_v4(),
            symbol,
            user_id,
            opened_at: Utc::now(),
        };
        let session_id = info.session_id;
        self.sessions.lock().insert(session_id, info);
        debug!("Registered relay session {}", session_id);

        RelayRegistration {
            registry: Arc::clone(self),
            session_id,
        }
    }

    /// Number of live sessions.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.sessions.lock().len()
    }

    /// Live sessions, oldest first.
    #[must_use]
    pub fn snapshot(&self) -> Vec<RelaySessionInfo> {
        let mut sessions: Vec<RelaySessionInfo> = self.sessions.lock().values().cloned().collect();
        sessions.sort_by_key(|s| s.opened_at);
        sessions
    }

    fn remove(&self, session_id: &Uuid) {
        if self.sessions.lock().remove(session_id).is_some() {
            debug!("Removed relay session {}", session_id);
        }
    }
}

/// Keeps a session listed in the registry while alive.
#[derive(Debug)]
pub struct RelayRegistration {
    registry: Arc<RelayRegistry>,
    session_id: Uuid,
}

impl RelayRegistration {
    /// Identifier of the registered session.
    #[must_use]
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }
}

impl Drop for RelayRegistration {
    fn drop(&mut self) {
        self.registry.remove(&self.session_id);
    }
}
