//! The chat orchestrator: session lifecycle, per-message mode dispatch,
//! persistence ordering, and fire-and-forget title generation.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::agent::{AgentOutcome, AgentRunner, ToolContext};
use crate::config::ChatConfig;
use crate::error::{FinsageError, Result};
use crate::llm::prompts;
use crate::models::{ChatMessage, ChatSession, ChatSessionDetail, LogMessage, Mode, Sender};
use crate::ports::{AuditStore, ChatCompletionPort, ChatStore, ChatTurn};
use crate::retrieval::context::ContextBuilder;

/// One incoming chat turn. `mode` is optional and defaults to ask.
#[derive(Debug, Clone)]
pub struct SendMessageRequest {
    pub session_id: String,
    pub user_id: String,
    pub mode: Option<String>,
    pub message: String,
}

pub struct ChatService {
    chat_store: Arc<dyn ChatStore>,
    audit: Arc<dyn AuditStore>,
    llm: Arc<dyn ChatCompletionPort>,
    context_builder: ContextBuilder,
    agent_runner: AgentRunner,
    tool_context_template: ToolContext,
    config: ChatConfig,
    shutdown: CancellationToken,
}

impl ChatService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        chat_store: Arc<dyn ChatStore>,
        audit: Arc<dyn AuditStore>,
        llm: Arc<dyn ChatCompletionPort>,
        context_builder: ContextBuilder,
        agent_runner: AgentRunner,
        tool_context_template: ToolContext,
        config: ChatConfig,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            chat_store,
            audit,
            llm,
            context_builder,
            agent_runner,
            tool_context_template,
            config,
            shutdown,
        }
    }

    // -----------------------------------------------------------------------
    // Session lifecycle
    // -----------------------------------------------------------------------

    pub async fn create_session(&self, user_id: &str) -> Result<ChatSession> {
        let session = ChatSession::new(user_id, &self.config.placeholder_title);
        self.chat_store.insert_session(&session).await?;
        tracing::info!(session_id = %session.id, user_id = %user_id, "Created chat session");
        Ok(session)
    }

    /// A user with no sessions gets an empty list, not an error.
    pub async fn list_sessions(&self, user_id: &str) -> Result<Vec<ChatSession>> {
        self.chat_store.list_sessions(user_id).await
    }

    pub async fn rename_session(
        &self,
        session_id: &str,
        user_id: &str,
        title: &str,
    ) -> Result<()> {
        self.require_session(session_id, user_id).await?;
        self.chat_store
            .rename_session(session_id, user_id, title)
            .await
    }

    pub async fn delete_session(&self, session_id: &str, user_id: &str) -> Result<()> {
        self.require_session(session_id, user_id).await?;
        self.chat_store
            .soft_delete_session(session_id, user_id)
            .await
    }

    pub async fn session_detail(
        &self,
        session_id: &str,
        user_id: &str,
    ) -> Result<Vec<ChatSessionDetail>> {
        self.require_session(session_id, user_id).await?;
        self.chat_store.session_detail(session_id, user_id).await
    }

    /// Ownership check shared by every session-scoped operation. A session
    /// that exists but belongs to someone else is indistinguishable from one
    /// that does not exist.
    async fn require_session(&self, session_id: &str, user_id: &str) -> Result<ChatSession> {
        self.chat_store
            .find_session(session_id, user_id)
            .await?
            .ok_or_else(|| FinsageError::NotFound(format!("chat session {session_id}")))
    }

    // -----------------------------------------------------------------------
    // Message flow
    // -----------------------------------------------------------------------

    /// Runs one full conversational turn and returns the updated session
    /// transcript.
    ///
    /// Ordering is deliberate: the mode is validated before anything is
    /// persisted, the user message is persisted before the model is called
    /// (so a model failure still leaves it recorded), and the assistant
    /// message is persisted best-effort after a successful completion.
    pub async fn send_message(&self, req: SendMessageRequest) -> Result<Vec<ChatSessionDetail>> {
        let mode = match &req.mode {
            Some(raw) => raw.parse::<Mode>()?,
            None => Mode::default(),
        };
        if req.message.trim().is_empty() {
            return Err(FinsageError::Validation("message must not be empty".into()));
        }

        let session = self.require_session(&req.session_id, &req.user_id).await?;

        // Sampled before the user message lands, so the very first message
        // of a session is the one that names it.
        let history = self
            .chat_store
            .session_detail(&req.session_id, &req.user_id)
            .await?;
        let is_first_message = history.is_empty();

        let user_message = ChatMessage::new(&req.session_id, Sender::User, &req.message);
        self.chat_store.insert_message(&user_message).await?;

        if is_first_message && session.title == self.config.placeholder_title {
            self.spawn_title_generation(&req.session_id, &req.user_id, &req.message);
        }

        tracing::info!(
            session_id = %req.session_id,
            user_id = %req.user_id,
            %mode,
            "Processing chat message"
        );

        let outcome = match mode {
            Mode::Ask => self.run_ask(&req).await?,
            Mode::Agent => self.run_agent(&req).await?,
        };
        // Agent turns may run on a different model than ask turns.
        let turn_model = match mode {
            Mode::Ask => self.config.chat_model.as_str(),
            Mode::Agent => self.agent_runner.model(),
        };

        let log = LogMessage::new(
            &req.user_id,
            &req.message,
            &outcome.text,
            outcome.input_tokens,
            outcome.output_tokens,
            &format!("{mode} chat"),
            turn_model,
        );
        if let Err(e) = self.audit.record_exchange(&log).await {
            tracing::warn!(error = %e, "Failed to record chat exchange");
        }

        // The answer already exists; a persistence failure here must not
        // destroy it.
        let assistant_message = ChatMessage::new(&req.session_id, Sender::Assistant, &outcome.text);
        if let Err(e) = self.chat_store.insert_message(&assistant_message).await {
            tracing::warn!(
                session_id = %req.session_id,
                error = %e,
                "Failed to persist assistant message"
            );
        }

        self.chat_store
            .session_detail(&req.session_id, &req.user_id)
            .await
    }

    async fn run_ask(&self, req: &SendMessageRequest) -> Result<AgentOutcome> {
        let system_prompt = self
            .context_builder
            .build_system_prompt(&req.user_id, &req.message, Mode::Ask)
            .await;

        let completion = self
            .llm
            .complete(
                &self.config.chat_model,
                vec![ChatTurn::system(system_prompt), ChatTurn::user(&req.message)],
                &[],
            )
            .await?;

        Ok(AgentOutcome {
            text: completion.text,
            input_tokens: completion.input_tokens,
            output_tokens: completion.output_tokens,
        })
    }

    async fn run_agent(&self, req: &SendMessageRequest) -> Result<AgentOutcome> {
        let system_prompt = self
            .context_builder
            .build_system_prompt(&req.user_id, &req.message, Mode::Agent)
            .await;

        let ctx = ToolContext {
            user_id: req.user_id.clone(),
            ..self.tool_context_template.clone()
        };
        self.agent_runner.run(&system_prompt, &req.message, &ctx).await
    }

    // -----------------------------------------------------------------------
    // Title generation
    // -----------------------------------------------------------------------

    /// Fires off title generation without awaiting it. The caller's turn
    /// never blocks on the title; a slow or failing model just leaves the
    /// truncation fallback in place.
    fn spawn_title_generation(&self, session_id: &str, user_id: &str, first_message: &str) {
        let chat_store = self.chat_store.clone();
        let audit = self.audit.clone();
        let llm = self.llm.clone();
        let config = self.config.clone();
        let shutdown = self.shutdown.clone();
        let session_id = session_id.to_string();
        let user_id = user_id.to_string();
        let first_message = first_message.to_string();

        tokio::spawn(async move {
            let title = tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!(session_id = %session_id, "Title generation cancelled");
                    return;
                }
                generated = tokio::time::timeout(
                    Duration::from_secs(config.title_timeout_secs),
                    generate_title(llm, audit, &user_id, &config, &first_message),
                ) => match generated {
                    Ok(Some(title)) => title,
                    Ok(None) | Err(_) => fallback_title(&config, &first_message),
                },
            };

            if let Err(e) = chat_store
                .update_session_title(&session_id, &user_id, &title)
                .await
            {
                tracing::warn!(session_id = %session_id, error = %e, "Failed to update session title");
            } else {
                tracing::info!(session_id = %session_id, title = %title, "Session title set");
            }
        });
    }
}

async fn generate_title(
    llm: Arc<dyn ChatCompletionPort>,
    audit: Arc<dyn AuditStore>,
    user_id: &str,
    config: &ChatConfig,
    first_message: &str,
) -> Option<String> {
    let completion = llm
        .complete(
            &config.title_model,
            vec![
                ChatTurn::system(prompts::TITLE_SYSTEM_PROMPT),
                ChatTurn::user(prompts::title_prompt(first_message)),
            ],
            &[],
        )
        .await;

    match completion {
        Ok(completion) => {
            let log = LogMessage::new(
                user_id,
                first_message,
                &completion.text,
                completion.input_tokens,
                completion.output_tokens,
                "title generation",
                &config.title_model,
            );
            if let Err(e) = audit.record_exchange(&log).await {
                tracing::warn!(error = %e, "Failed to record title exchange");
            }

            let title = completion.text.trim().trim_matches('"').to_string();
            if title.is_empty() || title.chars().count() > config.title_max_chars {
                None
            } else {
                Some(title)
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "Title generation failed");
            None
        }
    }
}

/// First message truncated to fit, with an ellipsis when it was cut.
fn fallback_title(config: &ChatConfig, first_message: &str) -> String {
    let trimmed = first_message.trim();
    if trimmed.chars().count() <= config.title_max_chars {
        return trimmed.to_string();
    }
    let truncated: String = trimmed.chars().take(config.title_truncate_at).collect();
    format!("{truncated}...")
}
