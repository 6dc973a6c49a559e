//! The enriched transaction write path.

use std::sync::Arc;

use chrono::Utc;

use crate::error::Result;
use crate::models::{StoredEmbedding, Transaction, TransactionDraft};
use crate::ports::TransactionStore;
use crate::services::enrichment::EnrichmentService;

/// Joins both enrichment results before constructing the persisted record:
/// a transaction is never written with only one of the two resolved.
#[derive(Clone)]
pub struct TransactionService {
    store: Arc<dyn TransactionStore>,
    enrichment: EnrichmentService,
}

impl TransactionService {
    pub fn new(store: Arc<dyn TransactionStore>, enrichment: EnrichmentService) -> Self {
        Self { store, enrichment }
    }

    pub async fn insert(&self, draft: TransactionDraft) -> Result<Transaction> {
        tracing::info!(
            user_id = %draft.user_id,
            description = %draft.description,
            "Inserting enriched transaction"
        );

        let enrichment = self
            .enrichment
            .enrich(&draft.description, &draft.category_id, draft.is_auto_categorized)
            .await;

        let now = Utc::now();
        let transaction = Transaction {
            id: nanoid::nanoid!(),
            user_id: draft.user_id,
            category_id: draft.category_id,
            kind: draft.kind,
            description: draft.description,
            description_embedding: if enrichment.embedding.is_empty() {
                StoredEmbedding::Absent
            } else {
                StoredEmbedding::Parsed(enrichment.embedding)
            },
            amount: draft.amount,
            source: draft.source,
            transaction_date: now,
            ai_category_confidence: enrichment.confidence,
            is_auto_categorized: draft.is_auto_categorized,
            confirmed: draft.confirmed,
            discount: draft.discount,
            created_at: now,
            updated_at: now,
        };

        self.store.insert(&transaction).await?;

        tracing::info!(
            transaction_id = %transaction.id,
            confidence = transaction.ai_category_confidence,
            "Transaction inserted"
        );
        Ok(transaction)
    }

    pub async fn list_recent(&self, user_id: &str, limit: usize) -> Result<Vec<Transaction>> {
        self.store.list_recent(user_id, limit).await
    }
}
