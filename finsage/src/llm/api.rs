//! OpenAI-compatible adapter implementing the chat-completion and embedding
//! ports over `async-openai`.

use std::time::Duration;

use async_openai::{
    config::OpenAIConfig,
    error::{ApiError, OpenAIError},
    types::{
        ChatCompletionMessageToolCall, ChatCompletionRequestAssistantMessageArgs,
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestToolMessageArgs, ChatCompletionRequestUserMessageArgs,
        ChatCompletionTool, ChatCompletionToolArgs, ChatCompletionToolType,
        CreateChatCompletionRequest, CreateChatCompletionRequestArgs,
        CreateChatCompletionResponse, CreateEmbeddingRequestArgs, FunctionObjectArgs,
    },
    Client,
};
use async_trait::async_trait;

use crate::config::LlmConfig;
use crate::error::{FinsageError, Result};
use crate::ports::{ChatCompletionPort, ChatRole, ChatTurn, Completion, EmbeddingPort, ToolCall, ToolSpec};

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Clone)]
pub struct LlmApiClient {
    client: Client<OpenAIConfig>,
    embedding_model: String,
    max_retries: u32,
}

impl LlmApiClient {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let Some(api_key) = config.api_key.clone() else {
            return Err(FinsageError::Llm(
                "API key required for the model provider".to_string(),
            ));
        };

        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| OPENAI_BASE_URL.to_string());

        let openai_config = OpenAIConfig::new()
            .with_api_base(base_url)
            .with_api_key(api_key);

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|error| {
                FinsageError::Llm(format!("Failed to create LLM HTTP client: {error}"))
            })?;

        // Cap async-openai's internal backoff at our timeout. Without this it
        // retries 500 errors with exponential backoff for up to 15 minutes
        // (the default max_elapsed_time), independent of our own retry loop.
        let backoff = backoff::ExponentialBackoff {
            max_elapsed_time: Some(Duration::from_secs(config.timeout_secs)),
            ..Default::default()
        };

        let client = Client::with_config(openai_config)
            .with_http_client(http_client)
            .with_backoff(backoff);

        Ok(Self {
            client,
            embedding_model: config.embedding_model.clone(),
            max_retries: config.max_retries,
        })
    }

    async fn try_complete(
        &self,
        model: &str,
        turns: &[ChatTurn],
        tools: &[ToolSpec],
    ) -> Result<Completion> {
        let mut last_error: Option<FinsageError> = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay_ms = 100 * 2_u64.pow(attempt - 1);
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }

            let request = build_request(model, turns, tools)?;

            match self.client.chat().create(request).await {
                Ok(response) => return extract_completion(response),
                Err(error) => {
                    if let Some(rate_limit_error) = rate_limit_error(&error) {
                        return Err(rate_limit_error);
                    }

                    if let Some(auth_error) = auth_error(&error) {
                        return Err(auth_error);
                    }

                    let retryable = is_retryable(&error);
                    let mapped_error = map_openai_error(error);

                    if retryable && attempt < self.max_retries {
                        last_error = Some(mapped_error);
                        continue;
                    }

                    return Err(mapped_error);
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| FinsageError::Llm("LLM completion failed after retries".to_string())))
    }
}

#[async_trait]
impl ChatCompletionPort for LlmApiClient {
    async fn complete(
        &self,
        model: &str,
        turns: Vec<ChatTurn>,
        tools: &[ToolSpec],
    ) -> Result<Completion> {
        if turns.is_empty() {
            return Err(FinsageError::Validation(
                "Conversation cannot be empty".to_string(),
            ));
        }

        self.try_complete(model, &turns, tools).await
    }
}

#[async_trait]
impl EmbeddingPort for LlmApiClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(FinsageError::Validation(
                "Embedding input cannot be empty".to_string(),
            ));
        }

        let request = CreateEmbeddingRequestArgs::default()
            .model(self.embedding_model.clone())
            .input(text)
            .build()
            .map_err(|error| {
                FinsageError::Validation(format!("Invalid embedding request: {error}"))
            })?;

        let response = self
            .client
            .embeddings()
            .create(request)
            .await
            .map_err(map_openai_error)?;

        response
            .data
            .into_iter()
            .next()
            .map(|entry| entry.embedding)
            .ok_or_else(|| FinsageError::Embedding("No embedding generated".to_string()))
    }
}

fn build_request(
    model: &str,
    turns: &[ChatTurn],
    tools: &[ToolSpec],
) -> Result<CreateChatCompletionRequest> {
    let mut messages = Vec::with_capacity(turns.len());
    for turn in turns {
        messages.push(build_message(turn)?);
    }

    let mut request = CreateChatCompletionRequestArgs::default();
    request.model(model).messages(messages);

    if !tools.is_empty() {
        let declared: Vec<ChatCompletionTool> = tools
            .iter()
            .map(build_tool)
            .collect::<Result<Vec<_>>>()?;
        request.tools(declared);
    }

    request
        .build()
        .map_err(|error| FinsageError::Validation(format!("Invalid completion request: {error}")))
}

fn build_message(turn: &ChatTurn) -> Result<ChatCompletionRequestMessage> {
    let message = match turn.role {
        ChatRole::System => ChatCompletionRequestSystemMessageArgs::default()
            .content(turn.content.clone())
            .build()
            .map_err(|error| FinsageError::Validation(format!("Invalid system turn: {error}")))?
            .into(),
        ChatRole::User => ChatCompletionRequestUserMessageArgs::default()
            .content(turn.content.clone())
            .build()
            .map_err(|error| FinsageError::Validation(format!("Invalid user turn: {error}")))?
            .into(),
        ChatRole::Assistant => {
            let mut builder = ChatCompletionRequestAssistantMessageArgs::default();
            builder.content(turn.content.clone());
            if !turn.tool_calls.is_empty() {
                let calls: Vec<ChatCompletionMessageToolCall> = turn
                    .tool_calls
                    .iter()
                    .map(|call| ChatCompletionMessageToolCall {
                        id: call.id.clone(),
                        r#type: ChatCompletionToolType::Function,
                        function: async_openai::types::FunctionCall {
                            name: call.name.clone(),
                            arguments: call.arguments.clone(),
                        },
                    })
                    .collect();
                builder.tool_calls(calls);
            }
            builder
                .build()
                .map_err(|error| {
                    FinsageError::Validation(format!("Invalid assistant turn: {error}"))
                })?
                .into()
        }
        ChatRole::Tool => ChatCompletionRequestToolMessageArgs::default()
            .content(turn.content.clone())
            .tool_call_id(turn.tool_call_id.clone().unwrap_or_default())
            .build()
            .map_err(|error| FinsageError::Validation(format!("Invalid tool turn: {error}")))?
            .into(),
    };

    Ok(message)
}

fn build_tool(spec: &ToolSpec) -> Result<ChatCompletionTool> {
    let function = FunctionObjectArgs::default()
        .name(spec.name.clone())
        .description(spec.description.clone())
        .parameters(spec.parameters.clone())
        .build()
        .map_err(|error| {
            FinsageError::Validation(format!("Invalid tool definition '{}': {error}", spec.name))
        })?;

    ChatCompletionToolArgs::default()
        .r#type(ChatCompletionToolType::Function)
        .function(function)
        .build()
        .map_err(|error| {
            FinsageError::Validation(format!("Invalid tool declaration '{}': {error}", spec.name))
        })
}

fn extract_completion(response: CreateChatCompletionResponse) -> Result<Completion> {
    let (input_tokens, output_tokens) = response
        .usage
        .as_ref()
        .map(|usage| (usage.prompt_tokens, usage.completion_tokens))
        .unwrap_or((0, 0));

    let message = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| FinsageError::Llm("LLM response contained no choices".to_string()))?
        .message;

    let text = message.content.unwrap_or_default();
    let tool_calls: Vec<ToolCall> = message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .map(|call| ToolCall {
            id: call.id,
            name: call.function.name,
            arguments: call.function.arguments,
        })
        .collect();

    // A reply carrying only tool calls legitimately has no text.
    if text.trim().is_empty() && tool_calls.is_empty() {
        return Err(FinsageError::Llm(
            "LLM response contained empty content".to_string(),
        ));
    }

    Ok(Completion {
        text,
        tool_calls,
        input_tokens,
        output_tokens,
    })
}

fn is_retryable(error: &OpenAIError) -> bool {
    match error {
        OpenAIError::ApiError(api_error) => api_error.r#type.is_none() && api_error.code.is_none(),
        OpenAIError::Reqwest(reqwest_error) => reqwest_error
            .status()
            .map(|status| status.is_server_error())
            .unwrap_or(true),
        _ => false,
    }
}

fn rate_limit_error(error: &OpenAIError) -> Option<FinsageError> {
    match error {
        OpenAIError::Reqwest(reqwest_error)
            if reqwest_error.status() == Some(reqwest::StatusCode::TOO_MANY_REQUESTS) =>
        {
            Some(FinsageError::LlmRateLimit { retry_after: None })
        }
        OpenAIError::ApiError(api_error) if is_rate_limit_api_error(api_error) => {
            Some(FinsageError::LlmRateLimit { retry_after: None })
        }
        _ => None,
    }
}

fn auth_error(error: &OpenAIError) -> Option<FinsageError> {
    match error {
        OpenAIError::Reqwest(reqwest_error)
            if reqwest_error.status() == Some(reqwest::StatusCode::UNAUTHORIZED)
                || reqwest_error.status() == Some(reqwest::StatusCode::FORBIDDEN) =>
        {
            Some(FinsageError::Llm(format!(
                "LLM authentication failed: {reqwest_error}"
            )))
        }
        OpenAIError::ApiError(api_error) if is_auth_api_error(api_error) => Some(
            FinsageError::Llm(format!("LLM authentication failed: {api_error}")),
        ),
        _ => None,
    }
}

fn is_rate_limit_api_error(api_error: &ApiError) -> bool {
    let message = api_error.message.to_lowercase();
    let error_type = api_error.r#type.clone().unwrap_or_default().to_lowercase();
    let code = api_error.code.clone().unwrap_or_default().to_lowercase();

    message.contains("rate limit")
        || message.contains("too many requests")
        || error_type.contains("rate_limit")
        || code.contains("rate_limit")
        || code == "insufficient_quota"
}

fn is_auth_api_error(api_error: &ApiError) -> bool {
    let message = api_error.message.to_lowercase();
    let error_type = api_error.r#type.clone().unwrap_or_default().to_lowercase();
    let code = api_error.code.clone().unwrap_or_default().to_lowercase();

    message.contains("unauthorized")
        || message.contains("forbidden")
        || message.contains("authentication")
        || message.contains("invalid api key")
        || code.contains("invalid_api_key")
        || code.contains("authentication")
        || error_type.contains("authentication")
}

fn map_openai_error(error: OpenAIError) -> FinsageError {
    match error {
        OpenAIError::Reqwest(reqwest_error) => {
            FinsageError::Llm(format!("LLM request failed: {reqwest_error}"))
        }
        OpenAIError::ApiError(api_error) => FinsageError::Llm(format!("LLM API error: {api_error}")),
        OpenAIError::JSONDeserialize(err) => {
            FinsageError::Llm(format!("Failed to parse LLM response: {err}"))
        }
        OpenAIError::InvalidArgument(message) => FinsageError::Validation(message),
        other => FinsageError::Llm(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn test_spec() -> ToolSpec {
        ToolSpec {
            name: "insert_transaction".to_string(),
            description: "Insert a new transaction".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "description": {"type": "string"},
                    "amount": {"type": "number"}
                },
                "required": ["description", "amount"]
            }),
        }
    }

    #[test]
    fn request_declares_tools_when_present() {
        let turns = vec![ChatTurn::user("record 50000 for lunch")];
        let request = build_request("gpt-4o-mini", &turns, &[test_spec()]).unwrap();
        let tools = request.tools.expect("tools should be declared");
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].function.name, "insert_transaction");
    }

    #[test]
    fn request_omits_tools_when_absent() {
        let turns = vec![ChatTurn::user("hello")];
        let request = build_request("gpt-4o-mini", &turns, &[]).unwrap();
        assert!(request.tools.is_none());
    }

    #[test]
    fn assistant_turn_carries_tool_calls() {
        let turn = ChatTurn::assistant(
            "",
            vec![ToolCall {
                id: "call_1".to_string(),
                name: "insert_transaction".to_string(),
                arguments: "{}".to_string(),
            }],
        );
        let message = build_message(&turn).unwrap();
        match message {
            ChatCompletionRequestMessage::Assistant(assistant) => {
                let calls = assistant.tool_calls.expect("tool calls expected");
                assert_eq!(calls[0].function.name, "insert_transaction");
            }
            other => panic!("unexpected message variant: {other:?}"),
        }
    }

    #[test]
    fn client_requires_api_key() {
        let config = crate::config::LlmConfig::default();
        assert!(LlmApiClient::new(&config).is_err());
    }
}
