use std::time::Duration;

use pulse_core::types::{AnalysisResult, Item};
use pulse_llm::LlmClient;
use tracing::{error, warn};

use crate::prompt::{build_user_prompt, SYSTEM_PROMPT};
use crate::validate::{apply_contracts, order_results, parse_results};

/// Result of one `Analyzer::run` call. `results` is empty both for
/// "nothing worth reporting" and for persistent structured-output
/// failure; `error` distinguishes the latter as a non-fatal run note.
pub struct AnalysisOutcome {
    pub results: Vec<AnalysisResult>,
    pub dropped_invalid_source: usize,
    pub tokens_in: u32,
    pub tokens_out: u32,
    pub error: Option<String>,
}

pub struct Analyzer {
    llm: Box<dyn LlmClient>,
    model: String,
    timeout: Duration,
    max_retries: u32,
}

impl Analyzer {
    pub fn new(llm: Box<dyn LlmClient>, model: String, timeout_seconds: u64, max_retries: u32) -> Self {
        Self {
            llm,
            model,
            timeout: Duration::from_secs(timeout_seconds),
            max_retries,
        }
    }

    /// Classify/filter/summarize `items` in a single batched call, retrying
    /// on structured-output validation failure up to `max_retries` times.
    pub async fn run(&self, market_context: &str, sent_summary: &str, items: &[Item]) -> AnalysisOutcome {
        let base_user_prompt = build_user_prompt(market_context, sent_summary, items);
        let mut user_prompt = base_user_prompt.clone();
        let mut last_error = String::new();
        let mut tokens_in = 0u32;
        let mut tokens_out = 0u32;

        for attempt in 0..=self.max_retries {
            let completion = tokio::time::timeout(
                self.timeout,
                self.llm.complete(&self.model, SYSTEM_PROMPT, &user_prompt, None),
            )
            .await;

            let raw = match completion {
                Ok(Ok(text)) => text,
                Ok(Err(e)) => {
                    last_error = e.to_string();
                    warn!(attempt, error = %last_error, "analyzer llm call failed");
                    continue;
                }
                Err(_) => {
                    last_error = "analysis attempt timed out".to_string();
                    warn!(attempt, "analyzer attempt timed out");
                    continue;
                }
            };

            // token accounting is provider-specific; count prompt/response
            // length as a conservative proxy when a provider doesn't
            // report exact usage (the Anthropic/OpenAI-compatible clients
            // in this workspace return text only, not usage metadata).
            tokens_in = tokens_in.saturating_add((user_prompt.len() / 4) as u32);
            tokens_out = tokens_out.saturating_add((raw.len() / 4) as u32);

            match parse_results(&raw) {
                Ok(parsed) => {
                    let (mut results, dropped) = apply_contracts(parsed, items);
                    order_results(&mut results);
                    return AnalysisOutcome {
                        results,
                        dropped_invalid_source: dropped,
                        tokens_in,
                        tokens_out,
                        error: None,
                    };
                }
                Err(validation_error) => {
                    warn!(attempt, error = %validation_error, "analyzer structured output failed validation");
                    last_error = validation_error.clone();
                    user_prompt = format!(
                        "{base_user_prompt}\n\n## Previous Attempt Error\nYour last response failed validation: {validation_error}\nRespond again with a corrected JSON array only."
                    );
                }
            }
        }

        error!(error = %last_error, "analyzer exhausted retries, returning empty results");
        AnalysisOutcome {
            results: Vec::new(),
            dropped_invalid_source: 0,
            tokens_in,
            tokens_out,
            error: Some(last_error),
        }
    }
}
