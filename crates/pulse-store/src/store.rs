use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use pulse_core::hash::{canonicalize_url, content_hash, item_id};
use pulse_core::types::{Item, RawItem, SourceKind};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::warn;

use crate::db::init_db;
use crate::error::Result;

/// Maximum allowed drift between a claimed `published_at` and the moment
/// the Store actually sees the item.
const CLOCK_SKEW: Duration = Duration::hours(1);

/// Outcome of an `insert` batch.
#[derive(Debug, Clone, Default)]
pub struct InsertOutcome {
    pub inserted: Vec<Item>,
    /// (offered item url, existing item id) pairs for items that already existed.
    pub duplicates: Vec<(String, String)>,
}

#[derive(Debug, Clone, Default)]
pub struct PurgeStats {
    pub items_removed: u64,
    pub sent_records_removed: u64,
}

/// Durable keyed storage for Items with time-indexed retrieval, soft dedup,
/// watermark tracking, and sent-cache management.
///
/// All mutating operations take the single connection mutex for their
/// entire duration (insert is atomic per batch); read-only queries take
/// the same lock but release it immediately after.
pub struct Store {
    conn: Mutex<Connection>,
    dedup_window: Duration,
}

impl Store {
    pub fn open(path: &str, dedup_window_days: i64) -> Result<Self> {
        let conn = Connection::open(path)?;
        init_db(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            dedup_window: Duration::days(dedup_window_days),
        })
    }

    pub fn in_memory(dedup_window_days: i64) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        init_db(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            dedup_window: Duration::days(dedup_window_days),
        })
    }

    /// Insert a batch of raw items. Each item is deduped against `url`
    /// first, then against `content_hash` within `dedup_window`. Updates
    /// the per-source watermark on every item, whether it is a fresh
    /// insert or a duplicate — watermark tracks ingestion, independent of
    /// dedup/analysis outcome. A claimed `published_at` beyond clock-skew
    /// tolerance is clamped to ingestion time before it is stored or used
    /// to bump the watermark, so the watermark never exceeds the
    /// `published_at` of an item actually on disk.
    pub fn insert(&self, items: Vec<RawItem>) -> Result<InsertOutcome> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let mut outcome = InsertOutcome::default();
        let now = Utc::now();

        for raw in items {
            let canon_url = canonicalize_url(&raw.url);
            let id = item_id(&raw.url, &raw.title);
            let c_hash = content_hash(&raw.body);

            let published_at = if raw.published_at > now + CLOCK_SKEW {
                warn!(
                    url = %raw.url,
                    claimed = %raw.published_at,
                    "published_at exceeds clock skew tolerance, clamping to ingestion time"
                );
                now
            } else {
                raw.published_at
            };

            let existing_by_url: Option<String> = tx
                .query_row("SELECT id FROM items WHERE url = ?1", params![canon_url], |r| {
                    r.get(0)
                })
                .optional()?;

            if let Some(existing_id) = existing_by_url {
                bump_watermark(&tx, &raw.source_name, raw.source_kind, published_at)?;
                outcome.duplicates.push((raw.url, existing_id));
                continue;
            }

            let dedup_floor = (now - self.dedup_window).to_rfc3339();
            let existing_by_hash: Option<String> = tx
                .query_row(
                    "SELECT id FROM items WHERE content_hash = ?1 AND ingested_at >= ?2",
                    params![c_hash, dedup_floor],
                    |r| r.get(0),
                )
                .optional()?;

            if let Some(existing_id) = existing_by_hash {
                bump_watermark(&tx, &raw.source_name, raw.source_kind, published_at)?;
                outcome.duplicates.push((raw.url, existing_id));
                continue;
            }

            tx.execute(
                "INSERT INTO items (id, url, title, body, published_at, source_name,
                 source_kind, content_hash, ingested_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    id,
                    canon_url,
                    raw.title,
                    raw.body,
                    published_at.to_rfc3339(),
                    raw.source_name,
                    raw.source_kind.to_string(),
                    c_hash,
                    now.to_rfc3339(),
                ],
            )?;

            bump_watermark(&tx, &raw.source_name, raw.source_kind, published_at)?;

            outcome.inserted.push(Item {
                id,
                title: raw.title,
                body: raw.body,
                url: canon_url,
                published_at,
                source_name: raw.source_name,
                source_kind: raw.source_kind,
                content_hash: c_hash,
                ingested_at: now,
            });
        }

        tx.commit()?;
        Ok(outcome)
    }

    /// Items with `published_at` in `[now-hours, now]`, newest first,
    /// stable tiebreak on `id`.
    pub fn query_window(&self, now: DateTime<Utc>, hours: i64) -> Result<Vec<Item>> {
        let conn = self.conn.lock().unwrap();
        let floor = (now - Duration::hours(hours)).to_rfc3339();
        let ceil = now.to_rfc3339();

        let mut stmt = conn.prepare(
            "SELECT id, title, body, url, published_at, source_name, source_kind,
                    content_hash, ingested_at
             FROM items
             WHERE published_at >= ?1 AND published_at <= ?2
             ORDER BY published_at DESC, id ASC",
        )?;
        let rows = stmt.query_map(params![floor, ceil], row_to_item)?;
        let items: std::result::Result<Vec<Item>, rusqlite::Error> = rows.collect();
        Ok(items?)
    }

    /// Max `published_at` ever seen for `(source_name, kind)`.
    pub fn latest_time(
        &self,
        source_name: &str,
        kind: SourceKind,
    ) -> Result<Option<DateTime<Utc>>> {
        let conn = self.conn.lock().unwrap();
        let raw: Option<String> = conn
            .query_row(
                "SELECT latest_published_at FROM watermarks
                 WHERE source_name = ?1 AND source_kind = ?2",
                params![source_name, kind.to_string()],
                |r| r.get(0),
            )
            .optional()?;
        Ok(raw.and_then(|s| DateTime::parse_from_rfc3339(&s).ok().map(|d| d.with_timezone(&Utc))))
    }

    /// Idempotent insert into the sent cache.
    pub fn mark_sent(&self, item_ids: &[String], at: DateTime<Utc>) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        for id in item_ids {
            conn.execute(
                "INSERT OR REPLACE INTO sent_records (item_id, sent_at) VALUES (?1, ?2)",
                params![id, at.to_rfc3339()],
            )?;
        }
        Ok(())
    }

    /// Compact textual digest of non-expired sent records (title + time),
    /// bounded by `max_chars`, oldest dropped first.
    pub fn sent_summary(&self, now: DateTime<Utc>, ttl_hours: i64, max_chars: usize) -> Result<String> {
        let conn = self.conn.lock().unwrap();
        let floor = (now - Duration::hours(ttl_hours)).to_rfc3339();

        let mut stmt = conn.prepare(
            "SELECT i.title, s.sent_at
             FROM sent_records s
             JOIN items i ON i.id = s.item_id
             WHERE s.sent_at >= ?1
             ORDER BY s.sent_at DESC",
        )?;
        let rows = stmt.query_map(params![floor], |r| {
            let title: String = r.get(0)?;
            let sent_at: String = r.get(1)?;
            Ok((title, sent_at))
        })?;

        let mut out = String::new();
        for row in rows {
            let (title, sent_at) = row?;
            let line = format!("- {title} ({sent_at})\n");
            if out.len() + line.len() > max_chars {
                break;
            }
            out.push_str(&line);
        }
        Ok(out)
    }

    /// Remove items outside both the retention window and the active
    /// analysis window, and sent records past their TTL.
    pub fn purge(
        &self,
        now: DateTime<Utc>,
        retention_days: i64,
        active_window_hours: i64,
        sent_cache_ttl_hours: i64,
    ) -> Result<PurgeStats> {
        let conn = self.conn.lock().unwrap();
        let ingested_floor = (now - Duration::days(retention_days)).to_rfc3339();
        let published_floor = (now - Duration::hours(active_window_hours)).to_rfc3339();
        let sent_floor = (now - Duration::hours(sent_cache_ttl_hours)).to_rfc3339();

        let items_removed = conn.execute(
            "DELETE FROM items WHERE ingested_at < ?1 AND published_at < ?2",
            params![ingested_floor, published_floor],
        )?;
        let sent_records_removed = conn.execute(
            "DELETE FROM sent_records WHERE sent_at < ?1",
            params![sent_floor],
        )?;

        Ok(PurgeStats {
            items_removed: items_removed as u64,
            sent_records_removed: sent_records_removed as u64,
        })
    }
}

fn bump_watermark(
    tx: &rusqlite::Transaction<'_>,
    source_name: &str,
    kind: SourceKind,
    published_at: DateTime<Utc>,
) -> Result<()> {
    let existing: Option<String> = tx
        .query_row(
            "SELECT latest_published_at FROM watermarks WHERE source_name = ?1 AND source_kind = ?2",
            params![source_name, kind.to_string()],
            |r| r.get(0),
        )
        .optional()?;

    let should_update = match &existing {
        None => true,
        Some(existing_str) => {
            let existing_dt = DateTime::parse_from_rfc3339(existing_str)
                .map(|d| d.with_timezone(&Utc))
                .unwrap_or(DateTime::<Utc>::MIN_UTC);
            published_at > existing_dt
        }
    };

    if should_update {
        tx.execute(
            "INSERT INTO watermarks (source_name, source_kind, latest_published_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(source_name, source_kind) DO UPDATE SET latest_published_at = excluded.latest_published_at",
            params![source_name, kind.to_string(), published_at.to_rfc3339()],
        )?;
    }
    Ok(())
}

fn row_to_item(row: &rusqlite::Row<'_>) -> rusqlite::Result<Item> {
    let published_at: String = row.get(4)?;
    let ingested_at: String = row.get(8)?;
    let source_kind: String = row.get(6)?;
    Ok(Item {
        id: row.get(0)?,
        title: row.get(1)?,
        body: row.get(2)?,
        url: row.get(3)?,
        published_at: DateTime::parse_from_rfc3339(&published_at)
            .unwrap()
            .with_timezone(&Utc),
        source_name: row.get(5)?,
        source_kind: source_kind.parse().unwrap_or(SourceKind::Rss),
        content_hash: row.get(7)?,
        ingested_at: DateTime::parse_from_rfc3339(&ingested_at)
            .unwrap()
            .with_timezone(&Utc),
    })
}
