//! Tool definitions exposed to the model.
//!
//! Tool failures are conversational: a handler that cannot do its job
//! returns the failure as its output text so the model can explain it to
//! the user. Only a call naming a tool that was never registered is a hard
//! error, because that means the model ignored its own tool list.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::error::{FinsageError, Result};
use crate::models::{Category, CategoryKind, TransactionDraft};
use crate::ports::{CategoryStore, ChatTurn, ToolCall, ToolSpec};
use crate::services::transactions::TransactionService;

/// Everything a tool handler may need: the caller's identity plus the
/// domain services it acts through.
#[derive(Clone)]
pub struct ToolContext {
    pub user_id: String,
    pub transactions: TransactionService,
    pub categories: Arc<dyn CategoryStore>,
}

/// One callable tool: its declaration for the model and its execution.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    fn name(&self) -> &str;
    fn spec(&self) -> ToolSpec;
    /// Runs the tool. The returned string is handed back to the model as
    /// the tool's output, success or failure alike.
    async fn handle(&self, call: &ToolCall, ctx: &ToolContext) -> String;
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct ToolRegistry {
    handlers: HashMap<String, Arc<dyn ToolHandler>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, handler: Arc<dyn ToolHandler>) {
        self.handlers.insert(handler.name().to_string(), handler);
    }

    /// Declarations for every registered tool, passed along on the first
    /// model call of an agent run.
    pub fn specs(&self) -> Vec<ToolSpec> {
        self.handlers.values().map(|h| h.spec()).collect()
    }

    /// Executes one call and wraps the output as a tool turn answering it.
    pub async fn execute(&self, call: &ToolCall, ctx: &ToolContext) -> Result<ChatTurn> {
        let handler = self
            .handlers
            .get(&call.name)
            .ok_or_else(|| FinsageError::UnknownTool(call.name.clone()))?;

        tracing::info!(tool = %call.name, user_id = %ctx.user_id, "Executing tool call");
        let output = handler.handle(call, ctx).await;
        Ok(ChatTurn::tool(call.id.clone(), output))
    }
}

// ---------------------------------------------------------------------------
// insert_transaction
// ---------------------------------------------------------------------------

/// Argument payload as the model produces it. Amounts arrive as major-unit
/// decimals and are converted to minor units before persistence.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransactionArgs {
    #[serde(default)]
    category_id: String,
    #[serde(rename = "type", default)]
    kind: String,
    description: String,
    amount: f64,
    #[serde(default)]
    source: String,
    #[serde(default)]
    is_auto_categorized: bool,
    #[serde(default)]
    confirmed: bool,
    #[serde(default)]
    discount: f64,
}

pub struct InsertTransactionTool;

#[async_trait]
impl ToolHandler for InsertTransactionTool {
    fn name(&self) -> &str {
        "insert_transaction"
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "insert_transaction".to_string(),
            description: "Records a financial transaction for the current user. \
                          Use this whenever the user asks to save, record, or \
                          log an income or expense."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "categoryId": {
                        "type": "string",
                        "description": "Category identifier if already known; leave empty to auto-categorize from the description"
                    },
                    "type": {
                        "type": "string",
                        "enum": ["income", "expense"],
                        "description": "Whether this is income or an expense"
                    },
                    "description": {
                        "type": "string",
                        "description": "What the transaction was for"
                    },
                    "amount": {
                        "type": "number",
                        "description": "Transaction amount as a decimal in major currency units"
                    },
                    "source": {
                        "type": "string",
                        "description": "Payment source, e.g. cash or a bank name"
                    },
                    "isAutoCategorized": {
                        "type": "boolean",
                        "description": "True when the category was inferred rather than stated by the user"
                    },
                    "confirmed": {
                        "type": "boolean",
                        "description": "True when the user explicitly confirmed the details"
                    },
                    "discount": {
                        "type": "number",
                        "description": "Discount amount as a decimal in major currency units, 0 if none"
                    }
                },
                "required": ["description", "amount", "type"]
            }),
        }
    }

    async fn handle(&self, call: &ToolCall, ctx: &ToolContext) -> String {
        let args: TransactionArgs = match serde_json::from_str(&call.arguments) {
            Ok(args) => args,
            Err(e) => return format!("Failed to parse arguments: {e}"),
        };

        let kind = CategoryKind::from_wire(&args.kind);

        let category_id = if args.category_id.is_empty() {
            match resolve_category(ctx, kind, &args.description).await {
                Ok(id) => id,
                Err(message) => return message,
            }
        } else {
            args.category_id.clone()
        };

        let draft = TransactionDraft {
            user_id: ctx.user_id.clone(),
            category_id,
            kind,
            description: args.description.clone(),
            amount: to_minor_units(args.amount),
            source: args.source,
            // An empty incoming category means we picked one ourselves.
            is_auto_categorized: args.category_id.is_empty() || args.is_auto_categorized,
            confirmed: args.confirmed,
            discount: to_minor_units(args.discount),
        };

        match ctx.transactions.insert(draft).await {
            Ok(_) => format!(
                "Transaction '{}' for amount {:.2} successfully inserted for user {}",
                args.description, args.amount, ctx.user_id
            ),
            Err(e) => format!("Failed to insert transaction: {e}"),
        }
    }
}

fn to_minor_units(amount: f64) -> i64 {
    (amount * 100.0).round() as i64
}

/// Picks the category whose name best overlaps the description, falling
/// back to the first category of the right kind when nothing overlaps.
async fn resolve_category(
    ctx: &ToolContext,
    kind: CategoryKind,
    description: &str,
) -> std::result::Result<String, String> {
    let categories = match ctx.categories.list_all(Some(kind)).await {
        Ok(categories) => categories,
        Err(e) => return Err(format!("Failed to load categories: {e}")),
    };

    match best_category(&categories, description) {
        Some(id) => Ok(id),
        None => Err(format!(
            "No suitable category found for description '{description}'"
        )),
    }
}

fn best_category(categories: &[Category], description: &str) -> Option<String> {
    let description = description.to_lowercase();
    let desc_words: Vec<&str> = description.split_whitespace().collect();
    if desc_words.is_empty() {
        return categories.first().map(|c| c.id.clone());
    }

    let mut best: Option<&Category> = None;
    let mut best_score = 0.0_f64;
    for category in categories {
        let name = category.name.to_lowercase();
        // Every (description word, category word) containment pair counts,
        // so a description word can score more than once against a
        // multi-word category name.
        let matches: usize = desc_words
            .iter()
            .map(|word| {
                name.split_whitespace()
                    .filter(|cat_word| word.contains(cat_word) || cat_word.contains(*word))
                    .count()
            })
            .sum();
        let score = matches as f64 / desc_words.len() as f64;
        if score > best_score {
            best_score = score;
            best = Some(category);
        }
    }

    best.map(|c| c.id.clone())
        .or_else(|| categories.first().map(|c| c.id.clone()))
}
