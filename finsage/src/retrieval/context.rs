//! Retrieval-augmented context assembly for Ask mode.

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::RetrievalConfig;
use crate::llm::prompts;
use crate::models::{
    CategoryKind, Mode, Receipt, ReceiptWithScore, RelevantFinancialData, StoredEmbedding,
    Transaction, TransactionWithScore,
};
use crate::ports::{EmbeddingPort, ReceiptStore, TransactionStore};
use crate::retrieval::similarity::{filter_ranked, rank_by_similarity};

/// Assembles the system prompt for a chat turn, grounding Ask mode in the
/// user's most relevant financial records.
///
/// Grounding degrades rather than fails: an embedding error falls back to
/// the base prompt, and an empty relevance set falls back to a recency
/// context. A chat turn is never aborted for a retrieval problem.
#[derive(Clone)]
pub struct ContextBuilder {
    embeddings: Arc<dyn EmbeddingPort>,
    transactions: Arc<dyn TransactionStore>,
    receipts: Arc<dyn ReceiptStore>,
    config: RetrievalConfig,
}

impl ContextBuilder {
    pub fn new(
        embeddings: Arc<dyn EmbeddingPort>,
        transactions: Arc<dyn TransactionStore>,
        receipts: Arc<dyn ReceiptStore>,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            embeddings,
            transactions,
            receipts,
            config,
        }
    }

    /// Returns the system prompt for `mode`. Only Ask mode is enhanced;
    /// Agent mode gets its base prompt unmodified.
    pub async fn build_system_prompt(&self, user_id: &str, query: &str, mode: Mode) -> String {
        let base_prompt = match mode {
            Mode::Ask => prompts::ASK_SYSTEM_PROMPT,
            Mode::Agent => return prompts::AGENT_SYSTEM_PROMPT.to_string(),
        };

        let query_embedding = match self.embeddings.embed(query).await {
            Ok(vector) => vector,
            Err(error) => {
                tracing::warn!("Failed to embed query, using base prompt: {error}");
                return base_prompt.to_string();
            }
        };

        let relevant = self.gather_relevant(user_id, &query_embedding).await;

        if relevant.is_empty() {
            tracing::info!(user_id, "No relevant financial data found, using recency context");
            let (transactions, receipts) = self.recent_records(user_id).await;
            let context = render_recency_context(&transactions, &receipts);
            return format!(
                "{base_prompt}{context}{}",
                prompts::RECENCY_CONTEXT_INSTRUCTIONS
            );
        }

        let context = render_relevant_context(&relevant);
        format!("{base_prompt}{context}{}", prompts::RAG_CONTEXT_INSTRUCTIONS)
    }

    /// Scores the user's records against the query embedding and keeps the
    /// above-threshold top-K of each kind.
    pub async fn gather_relevant(
        &self,
        user_id: &str,
        query_embedding: &[f32],
    ) -> RelevantFinancialData {
        // On-demand embeddings are memoized for this call only.
        let mut call_cache: HashMap<String, Vec<f32>> = HashMap::new();

        let transactions = match self
            .transactions
            .list_recent(user_id, self.config.transaction_window)
            .await
        {
            Ok(records) => records,
            Err(error) => {
                tracing::warn!("Failed to fetch transactions for retrieval: {error}");
                Vec::new()
            }
        };

        let mut transaction_candidates: Vec<(Transaction, Vec<f32>)> = Vec::new();
        for transaction in transactions {
            let text = transaction.searchable_text();
            match self
                .candidate_embedding(&transaction.description_embedding, &text, &mut call_cache)
                .await
            {
                Some(vector) => transaction_candidates.push((transaction, vector)),
                None => continue,
            }
        }

        let ranked = rank_by_similarity(query_embedding, transaction_candidates);
        let kept = filter_ranked(
            ranked,
            self.config.relevance_threshold,
            self.config.transaction_top_k,
        );

        let receipts = match self.receipts.list_by_user(user_id).await {
            Ok(records) => records,
            Err(error) => {
                tracing::warn!("Failed to fetch receipts for retrieval: {error}");
                Vec::new()
            }
        };

        let mut receipt_candidates: Vec<(Receipt, Vec<f32>)> = Vec::new();
        for receipt in receipts {
            let text = receipt.searchable_text();
            match self
                .candidate_embedding(&receipt.extracted_embedding, &text, &mut call_cache)
                .await
            {
                Some(vector) => receipt_candidates.push((receipt, vector)),
                None => continue,
            }
        }

        let ranked_receipts = rank_by_similarity(query_embedding, receipt_candidates);
        let kept_receipts = filter_ranked(
            ranked_receipts,
            self.config.relevance_threshold,
            self.config.receipt_top_k,
        );

        let relevant = RelevantFinancialData {
            transactions: kept
                .into_iter()
                .map(|(transaction, score)| TransactionWithScore { transaction, score })
                .collect(),
            receipts: kept_receipts
                .into_iter()
                .map(|(receipt, score)| ReceiptWithScore { receipt, score })
                .collect(),
        };

        tracing::info!(
            transactions = relevant.transactions.len(),
            receipts = relevant.receipts.len(),
            "Gathered relevant financial data"
        );

        relevant
    }

    /// Resolves a candidate's vector: stored embedding when present, parse
    /// of the raw form (skip on failure), or computed from `text` when
    /// absent. Returns `None` when the item must be skipped.
    async fn candidate_embedding(
        &self,
        stored: &StoredEmbedding,
        text: &str,
        call_cache: &mut HashMap<String, Vec<f32>>,
    ) -> Option<Vec<f32>> {
        match stored.resolve() {
            Ok(Some(vector)) => Some(vector),
            Err(error) => {
                tracing::warn!("Skipping item with unparseable stored embedding: {error}");
                None
            }
            Ok(None) => {
                if let Some(cached) = call_cache.get(text) {
                    return Some(cached.clone());
                }
                match self.embeddings.embed(text).await {
                    Ok(vector) => {
                        call_cache.insert(text.to_string(), vector.clone());
                        Some(vector)
                    }
                    Err(error) => {
                        tracing::warn!("Failed to embed candidate on demand, skipping: {error}");
                        None
                    }
                }
            }
        }
    }

    async fn recent_records(&self, user_id: &str) -> (Vec<Transaction>, Vec<Receipt>) {
        let transactions = match self
            .transactions
            .list_recent(user_id, self.config.recency_transactions)
            .await
        {
            Ok(records) => records,
            Err(error) => {
                tracing::warn!("Failed to fetch transactions for recency context: {error}");
                Vec::new()
            }
        };

        let mut receipts = match self.receipts.list_by_user(user_id).await {
            Ok(records) => records,
            Err(error) => {
                tracing::warn!("Failed to fetch receipts for recency context: {error}");
                Vec::new()
            }
        };
        receipts.truncate(self.config.recency_receipts);

        (transactions, receipts)
    }
}

const TRANSACTION_DISPLAY_LIMIT: usize = 10;
const RECEIPT_DISPLAY_LIMIT: usize = 5;

fn kind_label(kind: CategoryKind) -> &'static str {
    match kind {
        CategoryKind::Income => "income",
        CategoryKind::Expense => "expense",
    }
}

/// Renders the RAG-selected records, annotated with relevance scores.
pub fn render_relevant_context(relevant: &RelevantFinancialData) -> String {
    let mut context = String::from("\n\n--- RELEVANT FINANCIAL DATA CONTEXT (RAG) ---\n");

    if !relevant.transactions.is_empty() {
        context.push_str(&format!(
            "\nMOST RELEVANT TRANSACTIONS ({}):\n",
            relevant.transactions.len()
        ));
        for (index, scored) in relevant.transactions.iter().enumerate() {
            if index >= TRANSACTION_DISPLAY_LIMIT {
                context.push_str(&format!(
                    "... and {} more relevant transactions\n",
                    relevant.transactions.len() - TRANSACTION_DISPLAY_LIMIT
                ));
                break;
            }
            let tx = &scored.transaction;
            context.push_str(&format!(
                "- {}: {} {:.2} ({}) - {} (Relevance: {:.2})\n",
                tx.transaction_date.format("%Y-%m-%d"),
                kind_label(tx.kind),
                tx.amount as f64 / 100.0,
                tx.source,
                tx.description,
                scored.score,
            ));
        }
    }

    if !relevant.receipts.is_empty() {
        context.push_str(&format!(
            "\nMOST RELEVANT RECEIPTS ({}):\n",
            relevant.receipts.len()
        ));
        for (index, scored) in relevant.receipts.iter().enumerate() {
            if index >= RECEIPT_DISPLAY_LIMIT {
                context.push_str(&format!(
                    "... and {} more relevant receipts\n",
                    relevant.receipts.len() - RECEIPT_DISPLAY_LIMIT
                ));
                break;
            }
            let receipt = &scored.receipt;
            context.push_str(&format!(
                "- {}: {} - Total: {:.2} (Discount: {:.2}) (Relevance: {:.2})\n",
                receipt.transaction_date.format("%Y-%m-%d"),
                receipt.merchant_name,
                receipt.total_shopping as f64 / 100.0,
                receipt.total_discount as f64 / 100.0,
                scored.score,
            ));
        }
    }

    context.push_str("\n--- END OF RELEVANT FINANCIAL DATA CONTEXT ---\n\n");
    context
}

/// Renders the recency fallback block. No relevance annotations because no
/// item cleared the threshold.
pub fn render_recency_context(transactions: &[Transaction], receipts: &[Receipt]) -> String {
    let mut context = String::from("\n\n--- USER'S FINANCIAL DATA CONTEXT ---\n");

    if !transactions.is_empty() {
        context.push_str(&format!("\nRECENT TRANSACTIONS ({}):\n", transactions.len()));
        for (index, tx) in transactions.iter().enumerate() {
            if index >= TRANSACTION_DISPLAY_LIMIT {
                context.push_str(&format!(
                    "... and {} more transactions\n",
                    transactions.len() - TRANSACTION_DISPLAY_LIMIT
                ));
                break;
            }
            context.push_str(&format!(
                "- {}: {} {:.2} ({}) - {}\n",
                tx.transaction_date.format("%Y-%m-%d"),
                kind_label(tx.kind),
                tx.amount as f64 / 100.0,
                tx.source,
                tx.description,
            ));
        }
    }

    if !receipts.is_empty() {
        context.push_str(&format!("\nRECENT RECEIPTS ({}):\n", receipts.len()));
        for (index, receipt) in receipts.iter().enumerate() {
            if index >= RECEIPT_DISPLAY_LIMIT {
                context.push_str(&format!(
                    "... and {} more receipts\n",
                    receipts.len() - RECEIPT_DISPLAY_LIMIT
                ));
                break;
            }
            context.push_str(&format!(
                "- {}: {} - Total: {:.2} (Discount: {:.2})\n",
                receipt.transaction_date.format("%Y-%m-%d"),
                receipt.merchant_name,
                receipt.total_shopping as f64 / 100.0,
                receipt.total_discount as f64 / 100.0,
            ));
        }
    }

    context.push_str("\n--- END OF FINANCIAL DATA CONTEXT ---\n\n");
    context
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{FinsageError, Result};
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct MapEmbedding {
        by_text: HashMap<String, Vec<f32>>,
        fail: bool,
        calls: AtomicUsize,
    }

    impl MapEmbedding {
        fn new(entries: &[(&str, Vec<f32>)]) -> Self {
            Self {
                by_text: entries
                    .iter()
                    .map(|(text, vector)| (text.to_string(), vector.clone()))
                    .collect(),
                fail: false,
                calls: AtomicUsize::new(0),
            }
        }

        fn failing() -> Self {
            Self {
                by_text: HashMap::new(),
                fail: true,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl EmbeddingPort for MapEmbedding {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(FinsageError::Embedding("provider down".to_string()));
            }
            Ok(self
                .by_text
                .get(text)
                .cloned()
                .unwrap_or_else(|| vec![0.0, 1.0]))
        }
    }

    struct FixedTransactions(Vec<Transaction>);

    #[async_trait]
    impl TransactionStore for FixedTransactions {
        async fn list_recent(&self, _user_id: &str, limit: usize) -> Result<Vec<Transaction>> {
            Ok(self.0.iter().take(limit).cloned().collect())
        }

        async fn insert(&self, _transaction: &Transaction) -> Result<()> {
            Ok(())
        }
    }

    struct FixedReceipts(Vec<Receipt>);

    #[async_trait]
    impl ReceiptStore for FixedReceipts {
        async fn list_by_user(&self, _user_id: &str) -> Result<Vec<Receipt>> {
            Ok(self.0.clone())
        }
    }

    fn transaction(description: &str, embedding: StoredEmbedding) -> Transaction {
        Transaction {
            id: nanoid::nanoid!(),
            user_id: "user_1".to_string(),
            category_id: "cat_1".to_string(),
            kind: CategoryKind::Expense,
            description: description.to_string(),
            description_embedding: embedding,
            amount: 2500,
            source: "cash".to_string(),
            transaction_date: Utc::now(),
            ai_category_confidence: 0.0,
            is_auto_categorized: false,
            confirmed: true,
            discount: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn builder(
        embeddings: MapEmbedding,
        transactions: Vec<Transaction>,
        receipts: Vec<Receipt>,
    ) -> ContextBuilder {
        ContextBuilder::new(
            Arc::new(embeddings),
            Arc::new(FixedTransactions(transactions)),
            Arc::new(FixedReceipts(receipts)),
            RetrievalConfig::default(),
        )
    }

    #[tokio::test]
    async fn ask_context_keeps_only_items_above_threshold() {
        // Query embedding [1,0]; "Starbucks coffee" scores 0.8-ish, the
        // other transaction points the other way and scores ~0.2.
        let embeddings = MapEmbedding::new(&[("What did I spend on coffee?", vec![1.0, 0.0])]);
        let matching = transaction(
            "Starbucks coffee",
            StoredEmbedding::Parsed(vec![0.8, 0.6]),
        );
        let other = transaction("Bus ticket", StoredEmbedding::Parsed(vec![0.2, 0.98]));

        let builder = builder(embeddings, vec![matching, other], Vec::new());
        let prompt = builder
            .build_system_prompt("user_1", "What did I spend on coffee?", Mode::Ask)
            .await;

        assert!(prompt.contains("Starbucks coffee"));
        assert!(prompt.contains("(Relevance: 0.80)"));
        assert!(!prompt.contains("Bus ticket"));
        assert!(prompt.contains("RELEVANT FINANCIAL DATA CONTEXT (RAG)"));
    }

    #[tokio::test]
    async fn falls_back_to_recency_when_nothing_clears_threshold() {
        let embeddings = MapEmbedding::new(&[("query", vec![1.0, 0.0])]);
        let unrelated = transaction("Bus ticket", StoredEmbedding::Parsed(vec![0.0, 1.0]));

        let builder = builder(embeddings, vec![unrelated], Vec::new());
        let prompt = builder.build_system_prompt("user_1", "query", Mode::Ask).await;

        // Never an empty context: grounding degrades to recency.
        assert!(prompt.contains("RECENT TRANSACTIONS"));
        assert!(prompt.contains("Bus ticket"));
        assert!(!prompt.contains("Relevance:"));
    }

    #[tokio::test]
    async fn agent_mode_returns_base_prompt_unmodified() {
        let embeddings = MapEmbedding::new(&[]);
        let builder = builder(embeddings, Vec::new(), Vec::new());
        let prompt = builder
            .build_system_prompt("user_1", "record coffee 25000", Mode::Agent)
            .await;
        assert_eq!(prompt, prompts::AGENT_SYSTEM_PROMPT);
    }

    #[tokio::test]
    async fn embedding_failure_falls_back_to_base_prompt() {
        let builder = builder(MapEmbedding::failing(), Vec::new(), Vec::new());
        let prompt = builder.build_system_prompt("user_1", "query", Mode::Ask).await;
        assert_eq!(prompt, prompts::ASK_SYSTEM_PROMPT);
    }

    #[tokio::test]
    async fn unparseable_stored_embedding_is_skipped() {
        let embeddings = MapEmbedding::new(&[("query", vec![1.0, 0.0])]);
        let broken = transaction("Broken record", StoredEmbedding::Raw("garbage".to_string()));
        let good = transaction("Good record", StoredEmbedding::Parsed(vec![1.0, 0.0]));

        let builder = builder(embeddings, vec![broken, good], Vec::new());
        let relevant = builder.gather_relevant("user_1", &[1.0, 0.0]).await;

        assert_eq!(relevant.transactions.len(), 1);
        assert_eq!(relevant.transactions[0].transaction.description, "Good record");
    }

    #[tokio::test]
    async fn absent_embedding_is_computed_on_demand() {
        let embeddings = MapEmbedding::new(&[
            ("query", vec![1.0, 0.0]),
            ("Morning latte cafe expense", vec![1.0, 0.0]),
        ]);
        let unembedded = transaction("Morning latte", StoredEmbedding::Absent);
        // searchable_text is "Morning latte cafe expense" with source "cafe"
        let unembedded = Transaction {
            source: "cafe".to_string(),
            ..unembedded
        };

        let builder = builder(embeddings, vec![unembedded], Vec::new());
        let relevant = builder.gather_relevant("user_1", &[1.0, 0.0]).await;

        assert_eq!(relevant.transactions.len(), 1);
        assert!(relevant.transactions[0].score > 0.99);
    }
}
