pub mod chat;
pub mod enrichment;
pub mod transactions;

pub use chat::{ChatService, SendMessageRequest};
pub use enrichment::{Enrichment, EnrichmentService};
pub use transactions::TransactionService;
