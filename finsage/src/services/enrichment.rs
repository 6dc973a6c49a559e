//! Concurrent enrichment of a transaction write: description embedding and
//! AI categorization confidence, computed in parallel with shielded fan-in.

use std::sync::Arc;

use tokio::sync::oneshot;

use crate::llm::prompts;
use crate::ports::{ChatCompletionPort, ChatTurn, EmbeddingPort};

/// The two enrichment values joined before a transaction is persisted.
#[derive(Debug, Clone, Default)]
pub struct Enrichment {
    /// Empty when embedding failed; the record is still written.
    pub embedding: Vec<f32>,
    /// In [0, 1]; 0.0 when not auto-categorized or on any failure.
    pub confidence: f64,
}

#[derive(Clone)]
pub struct EnrichmentService {
    embeddings: Arc<dyn EmbeddingPort>,
    llm: Arc<dyn ChatCompletionPort>,
    confidence_model: String,
}

impl EnrichmentService {
    pub fn new(
        embeddings: Arc<dyn EmbeddingPort>,
        llm: Arc<dyn ChatCompletionPort>,
        confidence_model: String,
    ) -> Self {
        Self {
            embeddings,
            llm,
            confidence_model,
        }
    }

    /// Runs both enrichment branches concurrently and joins the results.
    ///
    /// Each branch sends exactly one value over its channel. A branch that
    /// fails or panics drops its sender, which surfaces as a recv error and
    /// yields the safe default — the join can never block forever and never
    /// propagates a fault to the caller. When `auto_categorize` is false the
    /// confidence branch resolves to 0.0 without any model call.
    pub async fn enrich(
        &self,
        description: &str,
        category_id: &str,
        auto_categorize: bool,
    ) -> Enrichment {
        let (embedding_tx, embedding_rx) = oneshot::channel::<Vec<f32>>();
        let (confidence_tx, confidence_rx) = oneshot::channel::<f64>();

        let embeddings = Arc::clone(&self.embeddings);
        let embed_input = description.to_string();
        tokio::spawn(async move {
            let vector = match embeddings.embed(&embed_input).await {
                Ok(vector) => vector,
                Err(error) => {
                    tracing::error!("Embedding enrichment failed: {error}");
                    Vec::new()
                }
            };
            let _ = embedding_tx.send(vector);
        });

        let llm = Arc::clone(&self.llm);
        let model = self.confidence_model.clone();
        let category = category_id.to_string();
        let described = description.to_string();
        tokio::spawn(async move {
            if !auto_categorize {
                let _ = confidence_tx.send(0.0);
                return;
            }

            let turns = vec![
                ChatTurn::system(prompts::CONFIDENCE_SYSTEM_PROMPT),
                ChatTurn::user(prompts::confidence_prompt(&category, &described)),
            ];

            let confidence = match llm.complete(&model, turns, &[]).await {
                Ok(completion) => parse_confidence(&completion.text).unwrap_or_else(|| {
                    tracing::warn!(
                        response = %completion.text,
                        "Failed to parse AI confidence response, defaulting to 0.0"
                    );
                    0.0
                }),
                Err(error) => {
                    tracing::error!("Confidence scoring failed: {error}");
                    0.0
                }
            };
            let _ = confidence_tx.send(confidence);
        });

        let (embedding, confidence) = tokio::join!(embedding_rx, confidence_rx);

        Enrichment {
            embedding: embedding.unwrap_or_else(|_| {
                tracing::error!("Embedding branch dropped without reporting");
                Vec::new()
            }),
            confidence: confidence.unwrap_or_else(|_| {
                tracing::error!("Confidence branch dropped without reporting");
                0.0
            }),
        }
    }
}

/// Parses a bare decimal confidence answer and clamps it into [0, 1].
/// Returns `None` for non-numeric output.
pub fn parse_confidence(response: &str) -> Option<f64> {
    let confidence = response.trim().parse::<f64>().ok()?;
    Some(confidence.clamp(0.0, 1.0))
}
