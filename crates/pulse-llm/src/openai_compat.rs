use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::client::LlmClient;
use crate::error::{LlmError, Result};

/// Talks to any OpenAI-compatible chat completions endpoint for a single
/// non-streaming completion.
pub struct OpenAiCompatClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    chat_path: String,
    provider_name: String,
}

impl OpenAiCompatClient {
    pub fn new(provider_name: String, api_key: String, base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url,
            chat_path: "/v1/chat/completions".to_string(),
            provider_name,
        }
    }
}

#[async_trait]
impl LlmClient for OpenAiCompatClient {
    fn name(&self) -> &str {
        &self.provider_name
    }

    async fn complete(
        &self,
        model: &str,
        system: &str,
        user: &str,
        schema: Option<&serde_json::Value>,
    ) -> Result<String> {
        let mut system_prompt = system.to_string();
        if let Some(s) = schema {
            system_prompt.push_str(&format!(
                "\n\nRespond with JSON matching this schema exactly:\n{s}"
            ));
        }

        let body = serde_json::json!({
            "model": model,
            "messages": [
                { "role": "system", "content": system_prompt },
                { "role": "user", "content": user },
            ],
        });

        debug!(model, provider = %self.provider_name, "sending completion request");

        let resp = self
            .client
            .post(format!("{}{}", self.base_url, self.chat_path))
            .bearer_auth(&self.api_key)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = resp.status().as_u16();
        if status == 429 {
            let retry_after_ms = resp
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(|s| s * 1000)
                .unwrap_or(5000);
            return Err(LlmError::RateLimited { retry_after_ms });
        }

        if !resp.status().is_success() {
            let text = resp.text().await.unwrap_or_default();
            warn!(status, body = %text, "openai-compatible api error");
            return Err(LlmError::Api { status, message: text });
        }

        let parsed: ChatCompletionResponse = resp
            .json()
            .await
            .map_err(|e| LlmError::Parse(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| LlmError::Parse("no choices in response".to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: String,
}
