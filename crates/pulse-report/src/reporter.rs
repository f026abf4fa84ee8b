use std::collections::HashMap;

use chrono::FixedOffset;
use pulse_core::types::RunReport;

use crate::escape::EscapeRules;

/// One renderable unit the splitter can place on either side of a segment
/// boundary without breaking it internally.
struct Block {
    /// Section/preamble heading, always kept with its first entry.
    heading: Option<String>,
    /// Fully rendered, atomic lines — never split mid-entry.
    entries: Vec<String>,
}

/// Renders a `RunReport` into one or more bounded text segments. Escaping
/// and link formatting are supplied by `rules` so this module stays
/// wire-format agnostic.
pub struct Reporter {
    display_offset: FixedOffset,
}

impl Reporter {
    pub fn new(display_timezone_offset_hours: i32) -> Self {
        let offset = FixedOffset::east_opt(display_timezone_offset_hours * 3600)
            .unwrap_or_else(|| FixedOffset::east_opt(0).unwrap());
        Self { display_offset: offset }
    }

    pub fn render(&self, report: &RunReport, rules: &dyn EscapeRules, max_chars: usize) -> Vec<String> {
        let blocks = self.build_blocks(report, rules);
        pack_blocks(blocks, max_chars)
    }

    fn build_blocks(&self, report: &RunReport, rules: &dyn EscapeRules) -> Vec<Block> {
        let mut blocks = Vec::new();

        let window_start = report.window_start.with_timezone(&self.display_offset);
        let window_end = report.window_end.with_timezone(&self.display_offset);
        let generated_at = report.generated_at.with_timezone(&self.display_offset);

        let mut preamble_entries = vec![rules.heading(&format!(
            "Pulsewatch report — window {} to {} (generated {})",
            window_start.format("%Y-%m-%d %H:%M %z"),
            window_end.format("%Y-%m-%d %H:%M %z"),
            generated_at.format("%Y-%m-%d %H:%M %z"),
        ))];

        for crawl in &report.crawl_results {
            let status = match crawl.status {
                pulse_core::types::CrawlStatus::Ok => "ok",
                pulse_core::types::CrawlStatus::Error => "error",
            };
            preamble_entries.push(rules.escape_text(&format!(
                "{} [{}]: {} ({} items){}",
                crawl.source_name,
                crawl.kind,
                status,
                crawl.item_count,
                crawl
                    .error_message
                    .as_ref()
                    .map(|m| format!(" — {m}"))
                    .unwrap_or_default(),
            )));
        }

        blocks.push(Block { heading: None, entries: preamble_entries });

        let mut by_category: HashMap<&str, Vec<&pulse_core::types::AnalysisResult>> = HashMap::new();
        let mut order: Vec<&str> = Vec::new();
        for result in &report.analysis_results {
            if !by_category.contains_key(result.category.as_str()) {
                order.push(result.category.as_str());
            }
            by_category.entry(result.category.as_str()).or_default().push(result);
        }

        order.sort_by_key(|cat| {
            let max_weight = by_category[cat].iter().map(|r| r.weight_score).max().unwrap_or(0);
            std::cmp::Reverse(max_weight)
        });

        for category in order {
            let results = &by_category[category];
            if results.is_empty() {
                continue;
            }
            let mut entries = Vec::new();
            for result in results.iter() {
                entries.push(render_entry(result, rules));
            }
            blocks.push(Block {
                heading: Some(rules.heading(category)),
                entries,
            });
        }

        blocks
    }
}

fn render_entry(result: &pulse_core::types::AnalysisResult, rules: &dyn EscapeRules) -> String {
    let mut lines = vec![
        rules.escape_text(&result.title),
        rules.escape_text(&result.body),
        rules.hyperlink("source", &result.source),
    ];
    if !result.related_sources.is_empty() {
        let related = result
            .related_sources
            .iter()
            .enumerate()
            .map(|(i, url)| rules.hyperlink(&format!("related {}", i + 1), url))
            .collect::<Vec<_>>()
            .join(", ");
        lines.push(related);
    }
    lines.join("\n")
}

fn render_block(block: &Block) -> String {
    let mut parts = Vec::new();
    if let Some(h) = &block.heading {
        parts.push(h.clone());
    }
    parts.extend(block.entries.iter().cloned());
    parts.join("\n")
}

/// Pack blocks into segments bounded by `max_chars`. Splits at block
/// (section) boundaries first; when a single block alone exceeds the
/// limit, splits at its entry boundaries instead — never inside an entry.
fn pack_blocks(blocks: Vec<Block>, max_chars: usize) -> Vec<String> {
    let mut segments = Vec::new();
    let mut current = String::new();

    for block in blocks {
        let rendered = render_block(&block);

        if rendered.len() > max_chars {
            if !current.is_empty() {
                segments.push(std::mem::take(&mut current));
            }
            segments.extend(pack_entries(&block, max_chars));
            continue;
        }

        let candidate_len = current.len() + if current.is_empty() { 0 } else { 1 } + rendered.len();
        if candidate_len > max_chars && !current.is_empty() {
            segments.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push('\n');
        }
        current.push_str(&rendered);
    }

    if !current.is_empty() {
        segments.push(current);
    }

    segments
}

/// Fallback splitter for a single oversized block: keeps the heading with
/// the first sub-segment and packs entries individually.
fn pack_entries(block: &Block, max_chars: usize) -> Vec<String> {
    let mut segments = Vec::new();
    let mut current = String::new();
    if let Some(h) = &block.heading {
        current.push_str(h);
    }

    for entry in &block.entries {
        let candidate_len = current.len() + if current.is_empty() { 0 } else { 1 } + entry.len();
        if candidate_len > max_chars && !current.is_empty() {
            segments.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push('\n');
        }
        current.push_str(entry);
    }

    if !current.is_empty() {
        segments.push(current);
    }

    segments
}
