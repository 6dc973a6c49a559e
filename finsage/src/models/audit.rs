use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Write-once audit record of one model exchange. Never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogMessage {
    pub id: String,
    pub user_id: String,
    pub prompt: String,
    pub response: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub topic: String,
    pub model: String,
    pub created_at: DateTime<Utc>,
}

impl LogMessage {
    pub fn new(
        user_id: &str,
        prompt: &str,
        response: &str,
        input_tokens: u32,
        output_tokens: u32,
        topic: &str,
        model: &str,
    ) -> Self {
        Self {
            id: nanoid::nanoid!(),
            user_id: user_id.to_string(),
            prompt: prompt.to_string(),
            response: response.to_string(),
            input_tokens,
            output_tokens,
            topic: topic.to_string(),
            model: model.to_string(),
            created_at: Utc::now(),
        }
    }
}
