pub mod audit;
pub mod chat;
pub mod embedding;
pub mod finance;
pub mod retrieval;

pub use audit::LogMessage;
pub use chat::{ChatMessage, ChatSession, ChatSessionDetail, Mode, Sender};
pub use embedding::{format_embedding, parse_embedding, StoredEmbedding};
pub use finance::{Category, CategoryKind, Receipt, Transaction, TransactionDraft};
pub use retrieval::{ReceiptWithScore, RelevantFinancialData, TransactionWithScore};
