pub mod analyzer;
pub mod error;
pub mod prompt;
pub mod validate;

pub use analyzer::{AnalysisOutcome, Analyzer};
pub use error::{AnalysisError, Result};

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use pulse_core::types::{Item, SourceKind};
    use std::sync::atomic::{AtomicU32, Ordering};

    fn item(url: &str, title: &str) -> Item {
        Item {
            id: format!("id-{title}"),
            title: title.to_string(),
            body: "body text".to_string(),
            url: url.to_string(),
            published_at: Utc::now(),
            source_name: "coindesk".to_string(),
            source_kind: SourceKind::Rss,
            content_hash: "hash".to_string(),
            ingested_at: Utc::now(),
        }
    }

    struct ScriptedLlm {
        responses: std::sync::Mutex<Vec<String>>,
        calls: AtomicU32,
    }

    #[async_trait]
    impl pulse_llm::LlmClient for ScriptedLlm {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn complete(
            &self,
            _model: &str,
            _system: &str,
            _user: &str,
            _schema: Option<&serde_json::Value>,
        ) -> pulse_llm::Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut responses = self.responses.lock().unwrap();
            Ok(if responses.is_empty() {
                "[]".to_string()
            } else {
                responses.remove(0)
            })
        }
    }

    #[tokio::test]
    async fn retries_on_malformed_output_then_succeeds() {
        let items = vec![item("https://example.com/a", "Headline")];
        let llm = ScriptedLlm {
            responses: std::sync::Mutex::new(vec![
                "not json at all".to_string(),
                serde_json::json!([{
                    "time": items[0].published_at,
                    "category": "  Fed  ",
                    "weight_score": 150,
                    "title": "Headline",
                    "body": "summary",
                    "source": "https://example.com/a",
                }])
                .to_string(),
            ]),
            calls: AtomicU32::new(0),
        };

        let analyzer = Analyzer::new(Box::new(llm), "test-model".to_string(), 30, 2);
        let outcome = analyzer.run("N/A", "N/A", &items).await;

        assert!(outcome.error.is_none());
        assert_eq!(outcome.results.len(), 1);
        assert_eq!(outcome.results[0].weight_score, 100);
        assert_eq!(outcome.results[0].category, "Fed");
        assert_eq!(outcome.results[0].item_id.as_deref(), Some(items[0].id.as_str()));
    }

    #[tokio::test]
    async fn empty_array_is_accepted_as_success() {
        let items = vec![item("https://example.com/a", "Headline")];
        let llm = ScriptedLlm {
            responses: std::sync::Mutex::new(vec!["[]".to_string()]),
            calls: AtomicU32::new(0),
        };

        let analyzer = Analyzer::new(Box::new(llm), "test-model".to_string(), 30, 2);
        let outcome = analyzer.run("N/A", "N/A", &items).await;

        assert!(outcome.error.is_none());
        assert!(outcome.results.is_empty());
    }

    #[tokio::test]
    async fn persistent_failure_yields_empty_results_and_error() {
        let items = vec![item("https://example.com/a", "Headline")];
        let llm = ScriptedLlm {
            responses: std::sync::Mutex::new(vec![
                "garbage one".to_string(),
                "garbage two".to_string(),
                "garbage three".to_string(),
            ]),
            calls: AtomicU32::new(0),
        };

        let analyzer = Analyzer::new(Box::new(llm), "test-model".to_string(), 30, 2);
        let outcome = analyzer.run("N/A", "N/A", &items).await;

        assert!(outcome.error.is_some());
        assert!(outcome.results.is_empty());
    }

    #[tokio::test]
    async fn drops_entries_with_non_url_source() {
        let items = vec![item("https://example.com/a", "Headline")];
        let llm = ScriptedLlm {
            responses: std::sync::Mutex::new(vec![serde_json::json!([{
                "time": items[0].published_at,
                "category": "Fed",
                "weight_score": 50,
                "title": "Headline",
                "body": "summary",
                "source": "not-a-url",
            }])
            .to_string()]),
            calls: AtomicU32::new(0),
        };

        let analyzer = Analyzer::new(Box::new(llm), "test-model".to_string(), 30, 2);
        let outcome = analyzer.run("N/A", "N/A", &items).await;

        assert!(outcome.results.is_empty());
        assert_eq!(outcome.dropped_invalid_source, 1);
    }
}
