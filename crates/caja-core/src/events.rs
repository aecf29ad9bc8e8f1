use crate::types::{SessionId, Strategy};
use serde::{Deserialize, Serialize};

/// Events published on the pipeline bus over the life of a scan session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SessionEvent {
    SessionStarted {
        session_id: SessionId,
        strategy: Strategy,
    },
    CodeDetected {
        session_id: SessionId,
        raw_value: String,
    },
    SessionFailed {
        session_id: SessionId,
        message: String,
    },
    SessionStopped {
        session_id: SessionId,
    },
}

impl SessionEvent {
    pub fn session_id(&self) -> &SessionId {
        match self {
            SessionEvent::SessionStarted { session_id, .. }
            | SessionEvent::CodeDetected { session_id, .. }
            | SessionEvent::SessionFailed { session_id, .. }
            | SessionEvent::SessionStopped { session_id } => session_id,
        }
    }
}
