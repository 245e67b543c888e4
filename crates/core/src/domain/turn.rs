use chrono::{DateTime, Utc};

use crate::domain::caller::CallerIdentity;

/// One user utterance within a session. Immutable once built; the
/// persistence collaborator projects it into a [`crate::TurnRecord`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Turn {
    pub session_id: String,
    pub caller: Option<CallerIdentity>,
    pub text: String,
    pub received_at: DateTime<Utc>,
}

impl Turn {
    pub fn new(
        session_id: impl Into<String>,
        caller: Option<CallerIdentity>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            caller,
            text: text.into(),
            received_at: Utc::now(),
        }
    }
}
