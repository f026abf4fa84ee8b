use async_trait::async_trait;

use crate::error::Result;

/// Narrow capability this system actually needs from a language model
/// provider: a single non-streaming completion call with a system prompt,
/// a user prompt, and an optional JSON schema hint for structured output.
///
/// Narrowed from a richer provider contract (streaming, tool calls,
/// multi-turn history) down to the one operation the analysis and
/// market-snapshot pipelines use.
#[async_trait]
pub trait LlmClient: Send + Sync {
    fn name(&self) -> &str;

    async fn complete(
        &self,
        model: &str,
        system: &str,
        user: &str,
        schema: Option<&serde_json::Value>,
    ) -> Result<String>;
}
