pub mod escape;
pub mod reporter;

pub use escape::{EscapeRules, PlainTextEscape};
pub use reporter::Reporter;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use pulse_core::types::{AnalysisResult, CrawlResult, CrawlStatus, RunReport, SourceKind};

    fn result(category: &str, weight: i32, title: &str) -> AnalysisResult {
        AnalysisResult {
            time: Utc::now().to_rfc3339(),
            category: category.to_string(),
            weight_score: weight,
            title: title.to_string(),
            body: "summary text".to_string(),
            source: "https://example.com/a".to_string(),
            related_sources: Vec::new(),
            item_id: None,
        }
    }

    fn base_report() -> RunReport {
        RunReport {
            window_start: Utc::now() - chrono::Duration::hours(24),
            window_end: Utc::now(),
            generated_at: Utc::now(),
            crawl_results: vec![CrawlResult {
                source_name: "coindesk".to_string(),
                kind: SourceKind::Rss,
                status: CrawlStatus::Ok,
                item_count: 2,
                error_message: None,
            }],
            analysis_results: vec![result("Fed", 70, "Fed holds rates")],
            categories_present: vec!["Fed".to_string()],
        }
    }

    #[test]
    fn renders_single_segment_for_small_report() {
        let reporter = Reporter::new(8);
        let report = base_report();
        let segments = reporter.render(&report, &PlainTextEscape, 4096);
        assert_eq!(segments.len(), 1);
        assert!(segments[0].contains("Fed holds rates"));
        assert!(segments[0].contains("coindesk"));
    }

    #[test]
    fn sections_ordered_by_max_weight_descending() {
        let reporter = Reporter::new(8);
        let mut report = base_report();
        report.analysis_results = vec![
            result("Regulation", 40, "Minor SEC note"),
            result("Fed", 90, "Surprise rate cut"),
        ];
        let segments = reporter.render(&report, &PlainTextEscape, 4096);
        let text = segments.join("\n");
        let fed_pos = text.find("Fed").unwrap();
        let reg_pos = text.find("Regulation").unwrap();
        assert!(fed_pos < reg_pos);
    }

    #[test]
    fn splits_at_section_boundary_when_over_limit() {
        let reporter = Reporter::new(8);
        let mut report = base_report();
        report.analysis_results = vec![
            result("Fed", 90, "Entry one with a decently long title to pad length"),
            result("Regulation", 40, "Entry two with a decently long title to pad length"),
        ];
        // small enough that both sections can't share one segment
        let segments = reporter.render(&report, &PlainTextEscape, 120);
        assert!(segments.len() >= 2);
        for seg in &segments {
            assert!(seg.len() <= 200, "segment should stay close to bound: {seg}");
        }
    }

    #[test]
    fn empty_categories_are_omitted() {
        let reporter = Reporter::new(8);
        let mut report = base_report();
        report.analysis_results = vec![];
        let segments = reporter.render(&report, &PlainTextEscape, 4096);
        assert_eq!(segments.len(), 1);
        assert!(!segments[0].contains("Regulation"));
    }
}
