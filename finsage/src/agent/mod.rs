//! The tool-calling agent: a registry of tools the model may invoke, and a
//! bounded runner that executes at most one round of tool calls per message.

pub mod runner;
pub mod tools;

pub use runner::{AgentOutcome, AgentRunner};
pub use tools::{InsertTransactionTool, ToolContext, ToolHandler, ToolRegistry};
