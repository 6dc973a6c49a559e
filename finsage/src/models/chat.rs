use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::FinsageError;

/// A user's conversation container. Soft-deleted, never hard-deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSession {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl ChatSession {
    pub fn new(user_id: &str, placeholder_title: &str) -> Self {
        let now = Utc::now();
        Self {
            id: nanoid::nanoid!(),
            user_id: user_id.to_string(),
            title: placeholder_title.to_string(),
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }
}

/// Who authored a message. Assistant serializes as `"ai"` on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sender {
    #[serde(rename = "user")]
    User,
    #[serde(rename = "ai")]
    Assistant,
}

/// Immutable once written, except for soft deletion. Ordered by creation
/// time within a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub session_id: String,
    pub sender: Sender,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl ChatMessage {
    pub fn new(session_id: &str, sender: Sender, body: &str) -> Self {
        let now = Utc::now();
        Self {
            id: nanoid::nanoid!(),
            session_id: session_id.to_string(),
            sender,
            body: body.to_string(),
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }
}

/// One rendered line of a conversation, as returned to the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSessionDetail {
    pub message_id: String,
    pub session_id: String,
    pub message: String,
    pub sender: Sender,
    pub created_at: DateTime<Utc>,
}

/// Per-request chat mode. Carried per turn, never persisted as session
/// state; a session may mix modes across turns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mode {
    #[serde(rename = "ask")]
    Ask,
    #[serde(rename = "agent")]
    Agent,
}

impl Default for Mode {
    fn default() -> Self {
        Mode::Ask
    }
}

impl Mode {
    pub fn supported() -> &'static [Mode] {
        &[Mode::Ask, Mode::Agent]
    }

    pub fn description(&self) -> &'static str {
        match self {
            Mode::Ask => "Ask mode: AI responds to questions and provides helpful information",
            Mode::Agent => {
                "Agent mode: AI proactively analyzes data and provides insights and recommendations"
            }
        }
    }
}

impl std::str::FromStr for Mode {
    type Err = FinsageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ask" => Ok(Mode::Ask),
            "agent" => Ok(Mode::Agent),
            other => Err(FinsageError::Validation(format!(
                "unsupported mode: {other}"
            ))),
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Ask => write!(f, "ask"),
            Mode::Agent => write!(f, "agent"),
        }
    }
}
