use rusqlite::Connection;

use crate::error::Result;

/// Initialize all tables for the store subsystem. Safe to call on every
/// startup — `CREATE TABLE IF NOT EXISTS` makes it idempotent.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS items (
            id            TEXT PRIMARY KEY NOT NULL,
            url           TEXT NOT NULL UNIQUE,
            title         TEXT NOT NULL,
            body          TEXT NOT NULL,
            published_at  TEXT NOT NULL,
            source_name   TEXT NOT NULL,
            source_kind   TEXT NOT NULL,
            content_hash  TEXT NOT NULL,
            ingested_at   TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_items_published_at ON items (published_at DESC);
        CREATE INDEX IF NOT EXISTS idx_items_content_hash ON items (content_hash);

        CREATE TABLE IF NOT EXISTS watermarks (
            source_name         TEXT NOT NULL,
            source_kind         TEXT NOT NULL,
            latest_published_at TEXT NOT NULL,
            PRIMARY KEY (source_name, source_kind)
        );

        CREATE TABLE IF NOT EXISTS sent_records (
            item_id TEXT PRIMARY KEY NOT NULL,
            sent_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_sent_records_sent_at ON sent_records (sent_at);",
    )?;
    Ok(())
}
