use std::collections::HashMap;

use pulse_core::hash::canonicalize_url as canon;
use pulse_core::types::{AnalysisResult, Item};

/// Parse the LLM's raw completion as a JSON array of `AnalysisResult`.
/// Returns the parse error message (rather than a typed error) so the
/// caller can echo it back to the LLM on retry.
pub fn parse_results(raw: &str) -> Result<Vec<AnalysisResult>, String> {
    let trimmed = raw.trim();
    let json_slice = extract_json_array(trimmed).unwrap_or(trimmed);
    serde_json::from_str::<Vec<AnalysisResult>>(json_slice)
        .map_err(|e| format!("response did not parse as a JSON array of AnalysisResult: {e}"))
}

/// Best-effort extraction of a `[...]` slice from a completion that may
/// include surrounding prose despite instructions not to.
fn extract_json_array(s: &str) -> Option<&str> {
    let start = s.find('[')?;
    let end = s.rfind(']')?;
    if end > start {
        Some(&s[start..=end])
    } else {
        None
    }
}

/// Apply the output contracts: clamp `weight_score` to [0, 100],
/// normalize `category` (trim, empty becomes "Uncategorized"),
/// drop entries whose `source` isn't a URL, and resolve each surviving
/// entry's `item_id` by matching `source` against the windowed items.
/// Returns the surviving results plus the count of dropped entries.
pub fn apply_contracts(mut results: Vec<AnalysisResult>, items: &[Item]) -> (Vec<AnalysisResult>, usize) {
    let by_url: HashMap<String, &Item> = items
        .iter()
        .map(|i| (canon(&i.url), i))
        .collect();

    let mut dropped = 0usize;
    results.retain_mut(|r| {
        r.weight_score = r.weight_score.clamp(0, 100);

        let trimmed = r.category.trim().to_string();
        r.category = if trimmed.is_empty() { "Uncategorized".to_string() } else { trimmed };

        if url::Url::parse(&r.source).is_err() {
            dropped += 1;
            return false;
        }

        r.item_id = by_url.get(&canon(&r.source)).map(|i| i.id.clone());
        true
    });

    (results, dropped)
}

/// Order results by `weight_score` descending, then `time` descending.
/// `time` is an RFC 2822 timestamp, which does not sort chronologically
/// as a plain string (e.g. weekday-name and day-of-month prefixes), so
/// ties are broken by parsing both sides and comparing instants; a
/// result whose `time` fails to parse sorts after ones that parse, with
/// string order as the final tiebreak.
pub fn order_results(results: &mut [AnalysisResult]) {
    results.sort_by(|a, b| {
        b.weight_score.cmp(&a.weight_score).then_with(|| {
            let parsed_a = chrono::DateTime::parse_from_rfc2822(&a.time);
            let parsed_b = chrono::DateTime::parse_from_rfc2822(&b.time);
            match (parsed_a, parsed_b) {
                (Ok(ta), Ok(tb)) => tb.cmp(&ta),
                (Ok(_), Err(_)) => std::cmp::Ordering::Less,
                (Err(_), Ok(_)) => std::cmp::Ordering::Greater,
                (Err(_), Err(_)) => b.time.cmp(&a.time),
            }
        })
    });
}
