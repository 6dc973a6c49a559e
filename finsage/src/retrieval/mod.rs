pub mod context;
pub mod similarity;

pub use context::ContextBuilder;
pub use similarity::{cosine_similarity, rank_by_similarity};
