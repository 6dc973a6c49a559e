//! The bounded agent loop.
//!
//! A run makes at most two model calls: one that may request tool calls,
//! and, if it did, one more that sees the tool outputs and produces the
//! final answer. The model can never loop.

use std::sync::Arc;

use crate::error::Result;
use crate::ports::{ChatCompletionPort, ChatTurn};

use super::tools::{ToolContext, ToolRegistry};

/// The final answer of an agent run, with token usage summed over every
/// model call the run made.
#[derive(Debug, Clone)]
pub struct AgentOutcome {
    pub text: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
}

pub struct AgentRunner {
    llm: Arc<dyn ChatCompletionPort>,
    registry: ToolRegistry,
    model: String,
}

impl AgentRunner {
    pub fn new(llm: Arc<dyn ChatCompletionPort>, registry: ToolRegistry, model: String) -> Self {
        Self {
            llm,
            registry,
            model,
        }
    }

    /// The model every completion of an agent turn goes to.
    pub fn model(&self) -> &str {
        &self.model
    }

    pub async fn run(
        &self,
        system_prompt: &str,
        message: &str,
        ctx: &ToolContext,
    ) -> Result<AgentOutcome> {
        let mut history = vec![ChatTurn::system(system_prompt), ChatTurn::user(message)];
        let specs = self.registry.specs();

        let first = self
            .llm
            .complete(&self.model, history.clone(), &specs)
            .await?;

        // No tool calls requested: the first answer is the final answer.
        if first.tool_calls.is_empty() {
            return Ok(AgentOutcome {
                text: first.text,
                input_tokens: first.input_tokens,
                output_tokens: first.output_tokens,
            });
        }

        tracing::info!(
            tool_calls = first.tool_calls.len(),
            "Model requested tool calls"
        );

        history.push(ChatTurn::assistant(
            first.text.clone(),
            first.tool_calls.clone(),
        ));
        for call in &first.tool_calls {
            let turn = self.registry.execute(call, ctx).await?;
            history.push(turn);
        }

        // Second and final call. The catalog stays declared; the bound comes
        // from never executing a second tool round, not from hiding the tools.
        let second = self.llm.complete(&self.model, history, &specs).await?;

        Ok(AgentOutcome {
            text: second.text,
            input_tokens: first.input_tokens + second.input_tokens,
            output_tokens: first.output_tokens + second.output_tokens,
        })
    }
}
