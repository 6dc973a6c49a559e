//! In-memory port implementations shared by the integration tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;

use finsage::error::{FinsageError, Result};
use finsage::models::{
    Category, CategoryKind, ChatMessage, ChatSession, ChatSessionDetail, LogMessage, Receipt,
    Transaction,
};
use finsage::ports::{
    AuditStore, CategoryStore, ChatCompletionPort, ChatStore, ChatTurn, Completion, EmbeddingPort,
    ReceiptStore, ToolSpec, TransactionStore,
};

// ---------------------------------------------------------------------------
// Model doubles
// ---------------------------------------------------------------------------

/// Replays a fixed sequence of completions while recording every request.
#[derive(Default)]
pub struct ScriptedLlm {
    script: Mutex<Vec<Completion>>,
    pub calls: AtomicUsize,
    pub requests: Mutex<Vec<Vec<ChatTurn>>>,
}

impl ScriptedLlm {
    pub fn new(script: Vec<Completion>) -> Self {
        Self {
            script: Mutex::new(script),
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatCompletionPort for ScriptedLlm {
    async fn complete(
        &self,
        _model: &str,
        turns: Vec<ChatTurn>,
        _tools: &[ToolSpec],
    ) -> Result<Completion> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(turns);
        let mut script = self.script.lock().unwrap();
        if script.is_empty() {
            return Err(FinsageError::Llm("script exhausted".to_string()));
        }
        Ok(script.remove(0))
    }
}

/// Returns a canned vector per known text, a default otherwise.
#[derive(Default)]
pub struct MapEmbedding {
    vectors: HashMap<String, Vec<f32>>,
}

impl MapEmbedding {
    pub fn with(mut self, text: &str, vector: Vec<f32>) -> Self {
        self.vectors.insert(text.to_string(), vector);
        self
    }
}

#[async_trait]
impl EmbeddingPort for MapEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self
            .vectors
            .get(text)
            .cloned()
            .unwrap_or_else(|| vec![0.0, 1.0]))
    }
}

// ---------------------------------------------------------------------------
// Store doubles
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct InMemoryChatStore {
    pub sessions: Mutex<HashMap<String, ChatSession>>,
    pub messages: Mutex<Vec<ChatMessage>>,
}

#[async_trait]
impl ChatStore for InMemoryChatStore {
    async fn insert_session(&self, session: &ChatSession) -> Result<()> {
        self.sessions
            .lock()
            .unwrap()
            .insert(session.id.clone(), session.clone());
        Ok(())
    }

    async fn list_sessions(&self, user_id: &str) -> Result<Vec<ChatSession>> {
        Ok(self
            .sessions
            .lock()
            .unwrap()
            .values()
            .filter(|s| s.user_id == user_id && s.deleted_at.is_none())
            .cloned()
            .collect())
    }

    async fn find_session(&self, session_id: &str, user_id: &str) -> Result<Option<ChatSession>> {
        Ok(self
            .sessions
            .lock()
            .unwrap()
            .get(session_id)
            .filter(|s| s.user_id == user_id && s.deleted_at.is_none())
            .cloned())
    }

    async fn rename_session(&self, session_id: &str, _user_id: &str, title: &str) -> Result<()> {
        if let Some(session) = self.sessions.lock().unwrap().get_mut(session_id) {
            session.title = title.to_string();
        }
        Ok(())
    }

    async fn soft_delete_session(&self, session_id: &str, _user_id: &str) -> Result<()> {
        if let Some(session) = self.sessions.lock().unwrap().get_mut(session_id) {
            session.deleted_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn insert_message(&self, message: &ChatMessage) -> Result<()> {
        self.messages.lock().unwrap().push(message.clone());
        Ok(())
    }

    async fn session_detail(
        &self,
        session_id: &str,
        _user_id: &str,
    ) -> Result<Vec<ChatSessionDetail>> {
        Ok(self
            .messages
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.session_id == session_id)
            .map(|m| ChatSessionDetail {
                message_id: m.id.clone(),
                session_id: m.session_id.clone(),
                message: m.body.clone(),
                sender: m.sender,
                created_at: m.created_at,
            })
            .collect())
    }

    async fn update_session_title(
        &self,
        session_id: &str,
        user_id: &str,
        title: &str,
    ) -> Result<()> {
        self.rename_session(session_id, user_id, title).await
    }
}

impl InMemoryChatStore {
    pub fn title_of(&self, session_id: &str) -> Option<String> {
        self.sessions
            .lock()
            .unwrap()
            .get(session_id)
            .map(|s| s.title.clone())
    }
}

#[derive(Default)]
pub struct InMemoryTransactionStore {
    pub rows: Mutex<Vec<Transaction>>,
}

#[async_trait]
impl TransactionStore for InMemoryTransactionStore {
    async fn list_recent(&self, user_id: &str, limit: usize) -> Result<Vec<Transaction>> {
        let rows = self.rows.lock().unwrap();
        let mut result: Vec<Transaction> = rows
            .iter()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect();
        result.sort_by(|a, b| b.transaction_date.cmp(&a.transaction_date));
        result.truncate(limit);
        Ok(result)
    }

    async fn insert(&self, transaction: &Transaction) -> Result<()> {
        self.rows.lock().unwrap().push(transaction.clone());
        Ok(())
    }
}

pub struct FixedCategories {
    pub categories: Vec<Category>,
}

#[async_trait]
impl CategoryStore for FixedCategories {
    async fn list_all(&self, kind: Option<CategoryKind>) -> Result<Vec<Category>> {
        Ok(self
            .categories
            .iter()
            .filter(|c| kind.map(|k| c.kind == k).unwrap_or(true))
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct FixedReceipts {
    pub receipts: Vec<Receipt>,
}

#[async_trait]
impl ReceiptStore for FixedReceipts {
    async fn list_by_user(&self, user_id: &str) -> Result<Vec<Receipt>> {
        Ok(self
            .receipts
            .iter()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct InMemoryAudit {
    pub logs: Mutex<Vec<LogMessage>>,
}

#[async_trait]
impl AuditStore for InMemoryAudit {
    async fn record_exchange(&self, log: &LogMessage) -> Result<()> {
        self.logs.lock().unwrap().push(log.clone());
        Ok(())
    }
}

// Convenience constructors used across test files.

pub fn completion(text: &str) -> Completion {
    Completion {
        text: text.to_string(),
        input_tokens: 10,
        output_tokens: 5,
        ..Completion::default()
    }
}

pub fn arc<T>(value: T) -> Arc<T> {
    Arc::new(value)
}
