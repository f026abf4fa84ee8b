use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::client::LlmClient;
use crate::error::{LlmError, Result};

const API_VERSION: &str = "2023-06-01";

/// Talks to the Anthropic Messages API for a single non-streaming
/// completion.
pub struct AnthropicClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl AnthropicClient {
    pub fn new(api_key: String, base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url,
        }
    }
}

#[async_trait]
impl LlmClient for AnthropicClient {
    fn name(&self) -> &str {
        "anthropic"
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
            "max_tokens": 4096,
            "system": system_prompt,
            "messages": [{ "role": "user", "content": user }],
        });

        debug!(model, "sending completion request to Anthropic");

        let resp = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
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
                .unwrap_or(5000)
                * 1000;
            return Err(LlmError::RateLimited { retry_after_ms });
        }

        if !resp.status().is_success() {
            let text = resp.text().await.unwrap_or_default();
            warn!(status, body = %text, "anthropic api error");
            return Err(LlmError::Api { status, message: text });
        }

        let parsed: MessagesResponse = resp
            .json()
            .await
            .map_err(|e| LlmError::Parse(e.to_string()))?;

        Ok(parsed
            .content
            .into_iter()
            .filter_map(|b| b.text)
            .collect::<Vec<_>>()
            .join(""))
    }
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: Option<String>,
}
