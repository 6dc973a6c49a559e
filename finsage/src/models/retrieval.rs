use crate::models::finance::{Receipt, Transaction};

/// A retrieved transaction paired with its cosine similarity to the query.
#[derive(Debug, Clone)]
pub struct TransactionWithScore {
    pub transaction: Transaction,
    pub score: f32,
}

#[derive(Debug, Clone)]
pub struct ReceiptWithScore {
    pub receipt: Receipt,
    pub score: f32,
}

/// Per-query retrieval result. Built fresh each request, never persisted.
/// Both lists are ordered by descending relevance.
#[derive(Debug, Clone, Default)]
pub struct RelevantFinancialData {
    pub transactions: Vec<TransactionWithScore>,
    pub receipts: Vec<ReceiptWithScore>,
}

impl RelevantFinancialData {
    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty() && self.receipts.is_empty()
    }
}
