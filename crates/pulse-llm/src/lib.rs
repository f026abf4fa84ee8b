pub mod anthropic;
pub mod client;
pub mod error;
pub mod openai_compat;

pub use anthropic::AnthropicClient;
pub use client::LlmClient;
pub use error::{LlmError, Result};
pub use openai_compat::OpenAiCompatClient;
