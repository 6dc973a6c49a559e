use serde::Deserialize;
use std::env;

fn parse_env_or<T: std::str::FromStr>(var: &str, default: T) -> T
where
    T::Err: std::fmt::Display,
{
    match env::var(var) {
        Ok(val) => match val.parse() {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!("Invalid value '{}' for {}: {}. Using default.", val, var, e);
                default
            }
        },
        Err(_) => default,
    }
}

fn parse_env_opt<T: std::str::FromStr>(var: &str) -> Option<T>
where
    T::Err: std::fmt::Display,
{
    match env::var(var) {
        Ok(val) => match val.parse() {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                tracing::warn!("Invalid value '{}' for {}: {}. Ignoring.", val, var, e);
                None
            }
        },
        Err(_) => None,
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub llm: LlmConfig,
    pub retrieval: RetrievalConfig,
    pub chat: ChatConfig,
}

/// LLM provider configuration shared by the chat and embedding clients.
#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    pub model: String,
    pub embedding_model: String,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
            api_key: None,
            base_url: None,
            timeout_secs: 60,
            max_retries: 2,
        }
    }
}

/// Knobs for retrieval-augmented grounding. Threshold and top-K values are
/// fixed policy, not computed.
#[derive(Debug, Clone, Deserialize)]
pub struct RetrievalConfig {
    /// Minimum cosine similarity for an item to count as relevant.
    pub relevance_threshold: f32,
    /// Ranked transactions kept after threshold filtering.
    pub transaction_top_k: usize,
    /// Ranked receipts kept after threshold filtering.
    pub receipt_top_k: usize,
    /// Window of transactions fetched per retrieval call.
    pub transaction_window: usize,
    /// Fallback context size when nothing clears the threshold.
    pub recency_transactions: usize,
    pub recency_receipts: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            relevance_threshold: 0.5,
            transaction_top_k: 15,
            receipt_top_k: 10,
            transaction_window: 100,
            recency_transactions: 50,
            recency_receipts: 20,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatConfig {
    pub chat_model: String,
    /// Lightweight model for session-title generation.
    pub title_model: String,
    pub confidence_model: String,
    pub title_timeout_secs: u64,
    pub title_max_chars: usize,
    pub title_truncate_at: usize,
    pub placeholder_title: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            chat_model: "gpt-4o-mini".to_string(),
            title_model: "gpt-3.5-turbo".to_string(),
            confidence_model: "gpt-4o-mini".to_string(),
            title_timeout_secs: 30,
            title_max_chars: 50,
            title_truncate_at: 47,
            placeholder_title: "New Chat".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            llm: LlmConfig {
                model: parse_env_or("FINSAGE_LLM_MODEL", "gpt-4o-mini".to_string()),
                embedding_model: parse_env_or(
                    "FINSAGE_EMBEDDING_MODEL",
                    "text-embedding-3-small".to_string(),
                ),
                api_key: parse_env_opt("FINSAGE_LLM_API_KEY"),
                base_url: parse_env_opt("FINSAGE_LLM_BASE_URL"),
                timeout_secs: parse_env_or("FINSAGE_LLM_TIMEOUT_SECS", 60),
                max_retries: parse_env_or("FINSAGE_LLM_MAX_RETRIES", 2),
            },
            retrieval: RetrievalConfig {
                relevance_threshold: parse_env_or("FINSAGE_RELEVANCE_THRESHOLD", 0.5),
                transaction_top_k: parse_env_or("FINSAGE_TRANSACTION_TOP_K", 15),
                receipt_top_k: parse_env_or("FINSAGE_RECEIPT_TOP_K", 10),
                transaction_window: parse_env_or("FINSAGE_TRANSACTION_WINDOW", 100),
                recency_transactions: parse_env_or("FINSAGE_RECENCY_TRANSACTIONS", 50),
                recency_receipts: parse_env_or("FINSAGE_RECENCY_RECEIPTS", 20),
            },
            chat: ChatConfig {
                chat_model: parse_env_or("FINSAGE_CHAT_MODEL", "gpt-4o-mini".to_string()),
                title_model: parse_env_or("FINSAGE_TITLE_MODEL", "gpt-3.5-turbo".to_string()),
                confidence_model: parse_env_or(
                    "FINSAGE_CONFIDENCE_MODEL",
                    "gpt-4o-mini".to_string(),
                ),
                title_timeout_secs: parse_env_or("FINSAGE_TITLE_TIMEOUT_SECS", 30),
                title_max_chars: parse_env_or("FINSAGE_TITLE_MAX_CHARS", 50),
                title_truncate_at: parse_env_or("FINSAGE_TITLE_TRUNCATE_AT", 47),
                placeholder_title: parse_env_or(
                    "FINSAGE_PLACEHOLDER_TITLE",
                    "New Chat".to_string(),
                ),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retrieval_defaults_match_policy() {
        let config = RetrievalConfig::default();
        assert_eq!(config.relevance_threshold, 0.5);
        assert_eq!(config.transaction_top_k, 15);
        assert_eq!(config.receipt_top_k, 10);
        assert_eq!(config.transaction_window, 100);
        assert_eq!(config.recency_transactions, 50);
        assert_eq!(config.recency_receipts, 20);
    }

    #[test]
    fn chat_defaults_match_title_policy() {
        let config = ChatConfig::default();
        assert_eq!(config.title_timeout_secs, 30);
        assert_eq!(config.title_max_chars, 50);
        assert_eq!(config.title_truncate_at, 47);
        assert_eq!(config.placeholder_title, "New Chat");
    }
}
