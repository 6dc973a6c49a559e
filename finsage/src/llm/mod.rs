pub mod api;
pub mod prompts;

pub use api::LlmApiClient;
