//! Port traits for the external collaborators this engine depends on.
//!
//! Everything here is implemented outside the core: the CRUD/persistence
//! layer provides the stores, and the model-provider adapter in `llm::api`
//! provides the completion and embedding ports. Components receive ports as
//! `Arc<dyn ...>` at construction time; there is no global client state.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::models::{
    Category, CategoryKind, ChatMessage, ChatSession, ChatSessionDetail, LogMessage, Receipt,
    Transaction,
};

// ---------------------------------------------------------------------------
// Model-facing wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    System,
    User,
    Assistant,
    Tool,
}

/// A tool invocation requested by the model: a declared name plus a flat
/// JSON argument payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: String,
}

/// One turn of a conversation as sent to or received from the model.
#[derive(Debug, Clone)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
    /// Tool calls carried by an assistant turn.
    pub tool_calls: Vec<ToolCall>,
    /// Set on tool turns: which call this content answers.
    pub tool_call_id: Option<String>,
}

impl ChatTurn {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn assistant(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
            tool_calls,
            tool_call_id: None,
        }
    }

    pub fn tool(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Tool,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: Some(call_id.into()),
        }
    }
}

/// A tool made available to the model: name, description, and a JSON-schema
/// object describing the flat argument payload.
#[derive(Debug, Clone)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// What came back from one completion call.
#[derive(Debug, Clone, Default)]
pub struct Completion {
    pub text: String,
    pub tool_calls: Vec<ToolCall>,
    pub input_tokens: u32,
    pub output_tokens: u32,
}

// ---------------------------------------------------------------------------
// Model ports
// ---------------------------------------------------------------------------

/// Converts text to a fixed-length numeric vector.
#[async_trait]
pub trait EmbeddingPort: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Sends a conversation (optionally with tool definitions) to a language
/// model. Tool calls requested by the model come back on the `Completion`
/// for the caller to execute.
#[async_trait]
pub trait ChatCompletionPort: Send + Sync {
    async fn complete(
        &self,
        model: &str,
        turns: Vec<ChatTurn>,
        tools: &[ToolSpec],
    ) -> Result<Completion>;
}

// ---------------------------------------------------------------------------
// Domain store ports
// ---------------------------------------------------------------------------

/// Read/write access to the user's transactions.
#[async_trait]
pub trait TransactionStore: Send + Sync {
    /// Most recent transactions first, bounded by `limit`.
    async fn list_recent(&self, user_id: &str, limit: usize) -> Result<Vec<Transaction>>;
    async fn insert(&self, transaction: &Transaction) -> Result<()>;
}

#[async_trait]
pub trait CategoryStore: Send + Sync {
    async fn list_all(&self, kind: Option<CategoryKind>) -> Result<Vec<Category>>;
}

#[async_trait]
pub trait ReceiptStore: Send + Sync {
    async fn list_by_user(&self, user_id: &str) -> Result<Vec<Receipt>>;
}

/// Session and message persistence for the orchestrator.
#[async_trait]
pub trait ChatStore: Send + Sync {
    async fn insert_session(&self, session: &ChatSession) -> Result<()>;
    async fn list_sessions(&self, user_id: &str) -> Result<Vec<ChatSession>>;
    /// Ownership lookup: only sessions belonging to `user_id` are visible.
    async fn find_session(&self, session_id: &str, user_id: &str) -> Result<Option<ChatSession>>;
    async fn rename_session(&self, session_id: &str, user_id: &str, title: &str) -> Result<()>;
    async fn soft_delete_session(&self, session_id: &str, user_id: &str) -> Result<()>;
    async fn insert_message(&self, message: &ChatMessage) -> Result<()>;
    /// Messages of a session in creation order.
    async fn session_detail(
        &self,
        session_id: &str,
        user_id: &str,
    ) -> Result<Vec<ChatSessionDetail>>;
    async fn update_session_title(
        &self,
        session_id: &str,
        user_id: &str,
        title: &str,
    ) -> Result<()>;
}

/// Write-once audit log of prompt/response exchanges.
#[async_trait]
pub trait AuditStore: Send + Sync {
    async fn record_exchange(&self, log: &LogMessage) -> Result<()>;
}
