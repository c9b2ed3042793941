//! Per-session identity injected into the engine.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Who a debate session belongs to. Attached to engine log lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionContext {
    pub session_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

impl SessionContext {
    /// New session with a fresh v4 id.
    pub fn new(user_id: Option<String>) -> Self {
        Self {
            session_id: Uuid::new_v4().to_string(),
            user_id,
        }
    }

    /// Session with no signed-in user.
    pub fn anonymous() -> Self {
        Self::new(None)
    }

    /// Session with a caller-chosen id, e.g. one restored by the host.
    pub fn with_id(session_id: impl Into<String>, user_id: Option<String>) -> Self {
        Self {
            session_id: session_id.into(),
            user_id,
        }
    }
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::anonymous()
    }
}
