pub mod coordinator;
pub mod error;
pub mod messenger;
pub mod stats;

pub use coordinator::{Coordinator, CoordinatorConfig};
pub use error::{CoordinatorError, Result};
pub use messenger::{Messenger, MessengerError};
pub use stats::{RunStatsSnapshot, TokenUsageSnapshot};

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use pulse_analysis::Analyzer;
    use pulse_core::config::SourceConfig;
    use pulse_core::types::SourceKind;
    use pulse_llm::LlmClient;
    use pulse_market::MarketSnapshotProvider;
    use pulse_report::{PlainTextEscape, Reporter};
    use pulse_sources::SourceRegistry;
    use pulse_store::Store;
    use std::sync::{Arc, Mutex};

    struct NullLlm;

    #[async_trait]
    impl LlmClient for NullLlm {
        fn name(&self) -> &str {
            "null"
        }
        async fn complete(
            &self,
            _model: &str,
            _system: &str,
            _user: &str,
            _schema: Option<&serde_json::Value>,
        ) -> pulse_llm::Result<String> {
            Ok("[]".to_string())
        }
    }

    struct RecordingMessenger {
        sent: Mutex<Vec<(i64, String)>>,
    }

    #[async_trait]
    impl Messenger for RecordingMessenger {
        async fn send(&self, chat_id: i64, text: &str) -> Result<(), MessengerError> {
            self.sent.lock().unwrap().push((chat_id, text.to_string()));
            Ok(())
        }

        async fn resolve_username(&self, _name: &str) -> Option<i64> {
            None
        }
    }

    fn build_coordinator() -> (Arc<Coordinator>, Arc<RecordingMessenger>) {
        let store = Arc::new(Store::in_memory(7).unwrap());
        let registry = Arc::new(SourceRegistry::new());
        let market = Arc::new(MarketSnapshotProvider::new(Box::new(NullLlm), "m".into(), 30, 5));
        let analyzer = Arc::new(Analyzer::new(Box::new(NullLlm), "m".into(), 30, 1));
        let reporter = Arc::new(Reporter::new(8));
        let messenger = Arc::new(RecordingMessenger { sent: Mutex::new(Vec::new()) });
        let escape_rules = Arc::new(PlainTextEscape);

        let cfg = CoordinatorConfig {
            sources: vec![SourceConfig {
                name: "coindesk".to_string(),
                kind: SourceKind::Rss,
                params: serde_json::json!({}),
            }],
            time_window_hours: 24,
            sent_cache_ttl_hours: 24,
            sent_summary_max_chars: 8192,
            max_message_chars: 4096,
            max_fetch_parallelism: 4,
            max_concurrent_runs: 1,
            run_timeout_seconds: 30,
            broadcast_chat_id: 999,
        };

        let coordinator = Coordinator::new(
            store,
            registry,
            market,
            analyzer,
            reporter,
            messenger.clone(),
            escape_rules,
            cfg,
        );
        (coordinator, messenger)
    }

    #[tokio::test]
    async fn manual_run_completes_and_sends_crawl_status_report() {
        let (coordinator, messenger) = build_coordinator();
        let run_id = coordinator.trigger_manual(1, 42).unwrap();

        for _ in 0..50 {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            if coordinator.active_runs().is_empty() {
                break;
            }
        }

        assert!(coordinator.active_runs().is_empty());
        assert!(coordinator.last_completed_at().is_some());
        let sent = messenger.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, 42);
        let stats = coordinator.run_stats();
        assert_eq!(stats.total, 1);
        assert_eq!(stats.succeeded, 1);
        let _ = run_id;
    }

    #[tokio::test]
    async fn second_trigger_while_busy_is_rejected() {
        let (coordinator, _messenger) = build_coordinator();
        let _first = coordinator.trigger_manual(1, 42).unwrap();
        let second = coordinator.trigger_manual(2, 43);
        assert!(matches!(second, Err(CoordinatorError::Busy { .. })));
    }
}
