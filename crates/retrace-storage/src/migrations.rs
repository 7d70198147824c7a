//! Database schema migrations.
//!
//! Applies the initial schema: the pages and passages tables, the meta
//! table carrying the embedding dimension, and the schema_migrations
//! tracking table. A store written by a newer version is refused at open.

use rusqlite::Connection;
use tracing::info;

use retrace_core::error::RetraceError;

/// Schema version written by this build.
pub const SCHEMA_VERSION: i64 = 1;

/// Run all pending database migrations.
///
/// Returns `SchemaMismatch` if the store was written by a newer version
/// of Retrace; downgrades are never attempted.
pub fn run_migrations(conn: &Connection) -> Result<(), RetraceError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version     INTEGER PRIMARY KEY NOT NULL,
            name        TEXT NOT NULL,
            applied_at  INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );",
    )
    .map_err(|e| RetraceError::Storage(format!("Failed to create migrations table: {}", e)))?;

    let current_version: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .map_err(|e| RetraceError::Storage(format!("Failed to query migration version: {}", e)))?;

    if current_version > SCHEMA_VERSION {
        return Err(RetraceError::SchemaMismatch {
            found: current_version,
            expected: SCHEMA_VERSION,
        });
    }

    if current_version < 1 {
        apply_v1(conn)?;
        info!("Applied migration v1: initial_schema");
    }

    Ok(())
}

/// Version 1: Initial schema.
fn apply_v1(conn: &Connection) -> Result<(), RetraceError> {
    conn.execute_batch(
        "
        -- Store-level metadata: schema bookkeeping and the embedding
        -- dimension D, fixed on first write.
        CREATE TABLE IF NOT EXISTS meta (
            key     TEXT PRIMARY KEY NOT NULL,
            value   TEXT NOT NULL
        );

        -- One row per indexed page, keyed by id, deduplicated by url.
        CREATE TABLE IF NOT EXISTS pages (
            id              TEXT PRIMARY KEY NOT NULL,
            url             TEXT NOT NULL UNIQUE,
            title           TEXT NOT NULL DEFAULT '',
            content         TEXT NOT NULL DEFAULT '',
            timestamp       INTEGER NOT NULL,
            last_accessed   INTEGER NOT NULL DEFAULT 0,
            visit_count     INTEGER NOT NULL DEFAULT 1,
            dwell_time_sec  REAL NOT NULL DEFAULT 0,
            created_at      INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );

        CREATE INDEX IF NOT EXISTS idx_pages_timestamp
            ON pages (timestamp DESC);

        -- One row per passage; embedding is a fixed-length f32 blob.
        CREATE TABLE IF NOT EXISTS passages (
            page_id     TEXT NOT NULL REFERENCES pages(id) ON DELETE CASCADE,
            position    INTEGER NOT NULL,
            text        TEXT NOT NULL,
            word_count  INTEGER NOT NULL,
            quality     REAL NOT NULL,
            embedding   BLOB NOT NULL,
            PRIMARY KEY (page_id, position)
        );

        CREATE INDEX IF NOT EXISTS idx_passages_page
            ON passages (page_id, position ASC);

        INSERT INTO schema_migrations (version, name) VALUES (1, 'initial_schema');
        ",
    )
    .map_err(|e| RetraceError::Storage(format!("Migration v1 failed: {}", e)))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
        conn
    }

    #[test]
    fn test_migrations_create_tables() {
        let conn = open_conn();
        run_migrations(&conn).unwrap();

        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master
                 WHERE type = 'table' AND name IN ('pages', 'passages', 'meta')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 3);
    }

    #[test]
    fn test_migrations_are_idempotent() {
        let conn = open_conn();
        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();

        let version: i64 = conn
            .query_row("SELECT MAX(version) FROM schema_migrations", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(version, SCHEMA_VERSION);
    }

    #[test]
    fn test_future_version_is_rejected() {
        let conn = open_conn();
        run_migrations(&conn).unwrap();
        conn.execute(
            "INSERT INTO schema_migrations (version, name) VALUES (42, 'from_the_future')",
            [],
        )
        .unwrap();

        let result = run_migrations(&conn);
        assert!(matches!(
            result,
            Err(RetraceError::SchemaMismatch {
                found: 42,
                expected: SCHEMA_VERSION
            })
        ));
    }

    #[test]
    fn test_delete_page_cascades_to_passages() {
        let conn = open_conn();
        run_migrations(&conn).unwrap();

        conn.execute(
            "INSERT INTO pages (id, url, timestamp) VALUES ('p1', 'https://a', 0)",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO passages (page_id, position, text, word_count, quality, embedding)
             VALUES ('p1', 0, 'hello world', 2, 0.9, x'0000803f')",
            [],
        )
        .unwrap();

        conn.execute("DELETE FROM pages WHERE id = 'p1'", []).unwrap();

        let remaining: i64 = conn
            .query_row("SELECT COUNT(*) FROM passages", [], |row| row.get(0))
            .unwrap();
        assert_eq!(remaining, 0);
    }
}
