use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::embedding::StoredEmbedding;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CategoryKind {
    #[serde(rename = "income")]
    Income,
    #[serde(rename = "expense")]
    Expense,
}

impl CategoryKind {
    /// The model sends free-form type strings; anything unrecognized is
    /// treated as an expense.
    pub fn from_wire(raw: &str) -> Self {
        match raw {
            "income" => CategoryKind::Income,
            _ => CategoryKind::Expense,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    pub kind: CategoryKind,
}

/// A financial transaction as read through the Transaction port.
/// Amounts are integer minor units.
#[derive(Debug, Clone)]
pub struct Transaction {
    pub id: String,
    pub user_id: String,
    pub category_id: String,
    pub kind: CategoryKind,
    pub description: String,
    pub description_embedding: StoredEmbedding,
    pub amount: i64,
    pub source: String,
    pub transaction_date: DateTime<Utc>,
    pub ai_category_confidence: f64,
    pub is_auto_categorized: bool,
    pub confirmed: bool,
    pub discount: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    /// Text used when a transaction has to be embedded on demand.
    pub fn searchable_text(&self) -> String {
        format!(
            "{} {} {}",
            self.description,
            self.source,
            match self.kind {
                CategoryKind::Income => "income",
                CategoryKind::Expense => "expense",
            }
        )
    }
}

/// Input to the enriched transaction write path. Everything the caller knows
/// before the embedding and confidence score exist.
#[derive(Debug, Clone)]
pub struct TransactionDraft {
    pub user_id: String,
    pub category_id: String,
    pub kind: CategoryKind,
    pub description: String,
    pub amount: i64,
    pub source: String,
    pub is_auto_categorized: bool,
    pub confirmed: bool,
    pub discount: i64,
}

/// A scanned receipt as read through the Receipt port.
#[derive(Debug, Clone)]
pub struct Receipt {
    pub id: String,
    pub user_id: String,
    pub merchant_name: String,
    pub extracted_embedding: StoredEmbedding,
    pub total_shopping: i64,
    pub total_discount: i64,
    pub transaction_date: DateTime<Utc>,
}

impl Receipt {
    pub fn searchable_text(&self) -> String {
        format!(
            "{} {}",
            self.merchant_name,
            self.transaction_date.format("%Y-%m-%d")
        )
    }
}
