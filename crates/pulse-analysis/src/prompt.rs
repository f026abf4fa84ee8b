use chrono::{DateTime, Utc};
use pulse_core::types::Item;
use serde::Serialize;

/// Static system prompt, loaded once at startup with no per-run
/// substitution so it stays cacheable upstream.
pub const SYSTEM_PROMPT: &str = include_str!("system_prompt.txt");

#[derive(Serialize)]
struct PromptItem<'a> {
    time: DateTime<Utc>,
    title: &'a str,
    body: &'a str,
    source_name: &'a str,
    url: &'a str,
}

/// Builds the three-section user prompt: market-context, outdated-news,
/// then the JSON-encoded windowed item list.
pub fn build_user_prompt(market_context: &str, sent_summary: &str, items: &[Item]) -> String {
    let market_block = if market_context.trim().is_empty() {
        "N/A"
    } else {
        market_context
    };
    let sent_block = if sent_summary.trim().is_empty() {
        "N/A"
    } else {
        sent_summary
    };

    let prompt_items: Vec<PromptItem> = items
        .iter()
        .map(|i| PromptItem {
            time: i.published_at,
            title: &i.title,
            body: &i.body,
            source_name: &i.source_name,
            url: &i.url,
        })
        .collect();
    let items_json = serde_json::to_string_pretty(&prompt_items)
        .unwrap_or_else(|_| "[]".to_string());

    format!(
        "## Market Context\n{market_block}\n\n## Previously Reported (do not repeat)\n{sent_block}\n\n## Candidate Items\n{items_json}"
    )
}
