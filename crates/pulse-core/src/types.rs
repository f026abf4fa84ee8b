use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which concrete fetcher implementation produced an [`Item`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Rss,
    X,
    Rest,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Rss => write!(f, "rss"),
            SourceKind::X => write!(f, "x"),
            SourceKind::Rest => write!(f, "rest"),
        }
    }
}

impl std::str::FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "rss" => Ok(SourceKind::Rss),
            "x" => Ok(SourceKind::X),
            "rest" => Ok(SourceKind::Rest),
            other => Err(format!("unknown source kind: {other}")),
        }
    }
}

/// Kind of chat a command arrived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatKind {
    Private,
    Group,
    Supergroup,
}

impl fmt::Display for ChatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatKind::Private => write!(f, "private"),
            ChatKind::Group => write!(f, "group"),
            ChatKind::Supergroup => write!(f, "supergroup"),
        }
    }
}

/// What caused a run to start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunTrigger {
    Scheduled,
    Manual,
    Startup,
}

impl fmt::Display for RunTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunTrigger::Scheduled => write!(f, "scheduled"),
            RunTrigger::Manual => write!(f, "manual"),
            RunTrigger::Startup => write!(f, "startup"),
        }
    }
}

/// Stage of the run state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStage {
    Fetching,
    Analyzing,
    Reporting,
    Sending,
    Done,
    Failed,
}

impl RunStage {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStage::Done | RunStage::Failed)
    }
}

impl fmt::Display for RunStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStage::Fetching => write!(f, "fetching"),
            RunStage::Analyzing => write!(f, "analyzing"),
            RunStage::Reporting => write!(f, "reporting"),
            RunStage::Sending => write!(f, "sending"),
            RunStage::Done => write!(f, "done"),
            RunStage::Failed => write!(f, "failed"),
        }
    }
}

/// One unit of ingested content. Immutable after insertion into the Store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    pub title: String,
    pub body: String,
    pub url: String,
    pub published_at: DateTime<Utc>,
    pub source_name: String,
    pub source_kind: SourceKind,
    pub content_hash: String,
    pub ingested_at: DateTime<Utc>,
}

/// A fetched item before it has been assigned an id/content_hash/ingested_at
/// by the Store. Fetchers produce these; `Store::insert` finalizes them
/// into [`Item`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawItem {
    pub title: String,
    pub body: String,
    pub url: String,
    pub published_at: DateTime<Utc>,
    pub source_name: String,
    pub source_kind: SourceKind,
}

/// A configured ingestion source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceDescriptor {
    pub name: String,
    pub kind: SourceKind,
    pub params: serde_json::Value,
}

/// Outcome of attempting to fetch one source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlResult {
    pub source_name: String,
    pub kind: SourceKind,
    pub status: CrawlStatus,
    pub item_count: usize,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrawlStatus {
    Ok,
    Error,
}

/// A single surviving item after LLM filtering/classification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub time: String,
    pub category: String,
    pub weight_score: i32,
    pub title: String,
    pub body: String,
    pub source: String,
    #[serde(default)]
    pub related_sources: Vec<String>,
    /// Item id this result was derived from, resolved by the Analyzer by
    /// matching `source` back against the windowed items. Used by the
    /// Coordinator to mark items sent without re-parsing report text.
    #[serde(skip)]
    pub item_id: Option<String>,
}

/// Full output of one run, rendered by the Reporter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub generated_at: DateTime<Utc>,
    pub crawl_results: Vec<CrawlResult>,
    pub analysis_results: Vec<AnalysisResult>,
    pub categories_present: Vec<String>,
}

/// Origin of the market-context text returned by MarketSnapshotProvider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotOrigin {
    Live,
    Cached,
    Fallback,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub text: String,
    pub fetched_at: DateTime<Utc>,
    pub origin: SnapshotOrigin,
    pub valid: bool,
}

/// Identity of a command sender.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatContext {
    pub user_id: i64,
    pub username: Option<String>,
    pub chat_id: i64,
    pub chat_kind: ChatKind,
}

/// In-flight or completed run, owned by the Coordinator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionHandle {
    pub run_id: uuid::Uuid,
    pub trigger: RunTrigger,
    pub triggered_by: Option<i64>,
    pub started_at: DateTime<Utc>,
    pub stage: RunStage,
    pub ended_at: Option<DateTime<Utc>>,
    pub target_chat: Option<i64>,
    pub fail_reason: Option<String>,
}

impl ExecutionHandle {
    pub fn new(trigger: RunTrigger, triggered_by: Option<i64>, target_chat: Option<i64>) -> Self {
        Self {
            run_id: uuid::Uuid::new_v4(),
            trigger,
            triggered_by,
            started_at: Utc::now(),
            stage: RunStage::Fetching,
            ended_at: None,
            target_chat,
            fail_reason: None,
        }
    }
}
