//! Prompt templates for the assistant's model calls.
//!
//! Templates use `format!()` interpolation so a missing variable is a
//! compile-time error.

/// Base system prompt for Ask mode.
pub const ASK_SYSTEM_PROMPT: &str = "You are a financial assistant specialized in Indonesian \
    Rupiah (IDR) currency. All monetary amounts are in Rupiah (Rp) as integers without decimal \
    places. Provide helpful and accurate responses to user financial queries.";

/// Base system prompt for Agent mode.
pub const AGENT_SYSTEM_PROMPT: &str = "You are a financial management agent. Your task is to \
    proactively assist users with their financial management by analyzing their data, providing \
    insights, and taking actions on their behalf. You can record transactions and provide \
    personalized recommendations based on their financial patterns. All monetary amounts are in \
    Indonesian Rupiah (Rp) as integers without decimal places.";

/// System prompt for session-title generation.
pub const TITLE_SYSTEM_PROMPT: &str = "You are a helpful assistant that creates concise, \
    descriptive titles for conversations. Respond with only the title, no additional text.";

/// System prompt demanding a bare decimal confidence answer.
pub const CONFIDENCE_SYSTEM_PROMPT: &str = "You are an AI assistant that analyzes transaction \
    descriptions and provides confidence scores for category assignments. Respond with only a \
    decimal number between 0.0 and 1.0, where 1.0 means very confident and 0.0 means not \
    confident at all.";

/// Generate the user prompt for session-title generation.
///
/// # Example
/// ```
/// use finsage::llm::prompts::title_prompt;
///
/// let prompt = title_prompt("What did I spend on coffee?");
/// assert!(prompt.contains("coffee"));
/// ```
pub fn title_prompt(first_message: &str) -> String {
    format!(
        r#"Generate a concise, descriptive title (max 50 characters) for a conversation that starts with this message:

"{first_message}"

Requirements:
- Maximum 50 characters
- Clear and descriptive
- No quotes or special formatting
- Summarize the main topic or intent
- Professional tone

Title:"#
    )
}

/// Generate the user prompt asking how well a category fits a description.
pub fn confidence_prompt(category: &str, description: &str) -> String {
    format!(
        "How confident are you that the category '{category}' is correct for this transaction: \
         '{description}'? Respond with only a number between 0.0 and 1.0."
    )
}

/// Instructional text appended after a RAG-selected context block.
pub const RAG_CONTEXT_INSTRUCTIONS: &str = "Use the above RELEVANT financial data to provide \
    more personalized and accurate responses. The data has been selected based on semantic \
    similarity to the user's question. Reference specific transactions, receipts, or patterns \
    when relevant to the user's question. The relevance scores indicate how closely each item \
    matches the user's query.";

/// Instructional text appended after a recency-based context block.
pub const RECENCY_CONTEXT_INSTRUCTIONS: &str = "Use the above financial data to provide more \
    personalized and accurate responses. Reference specific transactions, receipts, or patterns \
    when relevant to the user's question.";
