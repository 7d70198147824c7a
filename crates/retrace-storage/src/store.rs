//! Persistent page store: the keyed vector store behind the engine.
//!
//! One record per page, passages (with their embedding blobs) in a child
//! table. `put` replaces a page atomically inside a transaction; metadata
//! scans never read embedding blobs; full scans stream one page at a
//! time so a large store is never materialized at once.

use std::sync::Arc;

use rusqlite::{Connection, OptionalExtension};
use tracing::{debug, warn};
use uuid::Uuid;

use retrace_core::error::RetraceError;
use retrace_core::types::{PageMetadata, PageRecord, Passage, StoreStats};

use crate::db::Database;

/// Meta-table key recording the embedding dimension D.
const META_EMBEDDING_DIM: &str = "embedding_dim";

/// Encode an f32 vector as a little-endian blob.
fn embedding_to_blob(vector: &[f32]) -> Vec<u8> {
    let mut blob = Vec::with_capacity(vector.len() * 4);
    for value in vector {
        blob.extend_from_slice(&value.to_le_bytes());
    }
    blob
}

/// Decode a little-endian blob back to an f32 vector.
fn blob_to_embedding(blob: &[u8]) -> Result<Vec<f32>, RetraceError> {
    if blob.len() % 4 != 0 {
        return Err(RetraceError::CorruptRecord(format!(
            "Embedding blob length {} is not a multiple of 4",
            blob.len()
        )));
    }
    Ok(blob
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

/// SQLite-backed store of [`PageRecord`]s.
///
/// Writers take the connection mutex exclusively for the duration of a
/// transactional `put`; readers never observe a half-written page.
/// Iteration order is insertion order (rowid); no sort guarantee.
pub struct PageStore {
    db: Arc<Database>,
}

impl PageStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// The embedding dimension this store is locked to, if any page has
    /// been written yet.
    pub fn dimensions(&self) -> Result<Option<usize>, RetraceError> {
        self.db.with_conn(|conn| read_dimensions(conn))
    }

    /// Insert or replace a page atomically.
    ///
    /// Validates the stored-page invariants first: at least one passage,
    /// every passage embedded, positions dense from 0, and a uniform
    /// embedding dimension matching the store's recorded D.
    pub fn put(&self, page: &PageRecord) -> Result<(), RetraceError> {
        validate_page(page)?;
        let dim = page.passages[0]
            .embedding
            .as_ref()
            .map(Vec::len)
            .unwrap_or(0);

        self.db.with_conn(|conn| {
            if let Some(stored_dim) = read_dimensions(conn)? {
                if stored_dim != dim {
                    return Err(RetraceError::InvalidArgs(format!(
                        "Embedding dimension {} does not match store dimension {}",
                        dim, stored_dim
                    )));
                }
            }

            let tx = conn
                .unchecked_transaction()
                .map_err(|e| RetraceError::Storage(format!("Failed to begin transaction: {}", e)))?;

            tx.execute(
                "INSERT INTO meta (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO NOTHING",
                rusqlite::params![META_EMBEDDING_DIM, dim.to_string()],
            )
            .map_err(|e| RetraceError::Storage(format!("Failed to record dimension: {}", e)))?;

            tx.execute(
                "INSERT INTO pages (id, url, title, content, timestamp, last_accessed, visit_count, dwell_time_sec)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 ON CONFLICT(id) DO UPDATE SET
                     url = excluded.url,
                     title = excluded.title,
                     content = excluded.content,
                     timestamp = excluded.timestamp,
                     last_accessed = excluded.last_accessed,
                     visit_count = excluded.visit_count,
                     dwell_time_sec = excluded.dwell_time_sec",
                rusqlite::params![
                    page.id.to_string(),
                    page.url,
                    page.title,
                    page.content,
                    page.timestamp,
                    page.last_accessed,
                    page.visit_count,
                    page.dwell_time_sec,
                ],
            )
            .map_err(|e| RetraceError::Storage(format!("Failed to save page: {}", e)))?;

            tx.execute(
                "DELETE FROM passages WHERE page_id = ?1",
                rusqlite::params![page.id.to_string()],
            )
            .map_err(|e| RetraceError::Storage(format!("Failed to clear passages: {}", e)))?;

            for passage in &page.passages {
                let embedding = passage
                    .embedding
                    .as_ref()
                    .expect("validated above: every stored passage is embedded");
                tx.execute(
                    "INSERT INTO passages (page_id, position, text, word_count, quality, embedding)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    rusqlite::params![
                        page.id.to_string(),
                        passage.position,
                        passage.text,
                        passage.word_count as i64,
                        passage.quality,
                        embedding_to_blob(embedding),
                    ],
                )
                .map_err(|e| RetraceError::Storage(format!("Failed to save passage: {}", e)))?;
            }

            tx.commit()
                .map_err(|e| RetraceError::Storage(format!("Failed to commit page: {}", e)))?;

            debug!(page_id = %page.id, passages = page.passages.len(), "Page stored");
            Ok(())
        })
    }

    /// Load a full page by id.
    pub fn get(&self, id: Uuid) -> Result<Option<PageRecord>, RetraceError> {
        self.db.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT id, url, title, content, timestamp, last_accessed, visit_count, dwell_time_sec
                     FROM pages WHERE id = ?1",
                    rusqlite::params![id.to_string()],
                    row_to_page_shell,
                )
                .optional()
                .map_err(|e| RetraceError::Storage(e.to_string()))?;

            match row {
                Some(shell) => {
                    let mut page = shell?;
                    page.passages = load_passages(conn, page.id)?;
                    Ok(Some(page))
                }
                None => Ok(None),
            }
        })
    }

    /// Load a full page by its url (the dedup key).
    pub fn find_by_url(&self, url: &str) -> Result<Option<PageRecord>, RetraceError> {
        self.db.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT id, url, title, content, timestamp, last_accessed, visit_count, dwell_time_sec
                     FROM pages WHERE url = ?1",
                    rusqlite::params![url],
                    row_to_page_shell,
                )
                .optional()
                .map_err(|e| RetraceError::Storage(e.to_string()))?;

            match row {
                Some(shell) => {
                    let mut page = shell?;
                    page.passages = load_passages(conn, page.id)?;
                    Ok(Some(page))
                }
                None => Ok(None),
            }
        })
    }

    /// Page-level metadata for every page, in insertion order.
    ///
    /// Never touches the passages table, so embedding blobs stay on disk.
    pub fn get_metadata_all(&self) -> Result<Vec<PageMetadata>, RetraceError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, url, title, timestamp, last_accessed, visit_count
                     FROM pages ORDER BY rowid ASC",
                )
                .map_err(|e| RetraceError::Storage(e.to_string()))?;

            let rows = stmt
                .query_map([], |row| {
                    let id_str: String = row.get(0)?;
                    let url: String = row.get(1)?;
                    let title: String = row.get(2)?;
                    let timestamp: i64 = row.get(3)?;
                    let last_accessed: i64 = row.get(4)?;
                    let visit_count: i64 = row.get(5)?;
                    Ok((id_str, url, title, timestamp, last_accessed, visit_count))
                })
                .map_err(|e| RetraceError::Storage(e.to_string()))?;

            let mut out = Vec::new();
            for row in rows {
                let (id_str, url, title, timestamp, last_accessed, visit_count) =
                    row.map_err(|e| RetraceError::Storage(e.to_string()))?;
                let id = Uuid::parse_str(&id_str)
                    .map_err(|e| RetraceError::CorruptRecord(format!("Invalid page id: {}", e)))?;
                out.push(PageMetadata {
                    id,
                    url,
                    title,
                    timestamp,
                    last_accessed,
                    visit_count: visit_count as u32,
                });
            }
            Ok(out)
        })
    }

    /// Load every page fully, in insertion order.
    ///
    /// Convenience for small corpora and tests; scans should prefer
    /// [`PageStore::for_each_page`].
    pub fn get_all(&self) -> Result<Vec<PageRecord>, RetraceError> {
        let mut pages = Vec::new();
        self.for_each_page(|page| {
            pages.push(page);
            Ok(())
        })?;
        Ok(pages)
    }

    /// Stream every page through a visitor, one fully-loaded page at a
    /// time, in insertion order.
    ///
    /// The store never materializes more than one page's embeddings at
    /// once on this path.
    pub fn for_each_page<F>(&self, mut visit: F) -> Result<(), RetraceError>
    where
        F: FnMut(PageRecord) -> Result<(), RetraceError>,
    {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, url, title, content, timestamp, last_accessed, visit_count, dwell_time_sec
                     FROM pages ORDER BY rowid ASC",
                )
                .map_err(|e| RetraceError::Storage(e.to_string()))?;

            let rows = stmt
                .query_map([], row_to_page_shell)
                .map_err(|e| RetraceError::Storage(e.to_string()))?;

            for row in rows {
                let mut page = row.map_err(|e| RetraceError::Storage(e.to_string()))??;
                page.passages = load_passages(conn, page.id)?;
                visit(page)?;
            }
            Ok(())
        })
    }

    /// Delete a page and, via cascade, all of its passages.
    ///
    /// Deleting a page that does not exist is not an error.
    pub fn delete(&self, id: Uuid) -> Result<(), RetraceError> {
        self.db.with_conn(|conn| {
            conn.execute(
                "DELETE FROM pages WHERE id = ?1",
                rusqlite::params![id.to_string()],
            )
            .map_err(|e| RetraceError::Storage(format!("Failed to delete page: {}", e)))?;
            Ok(())
        })
    }

    /// Remove every page and passage and release the dimension lock.
    pub fn clear(&self) -> Result<(), RetraceError> {
        self.db.with_conn(|conn| {
            conn.execute_batch(
                "DELETE FROM passages;
                 DELETE FROM pages;
                 DELETE FROM meta;",
            )
            .map_err(|e| RetraceError::Storage(format!("Failed to clear store: {}", e)))?;
            Ok(())
        })
    }

    /// Number of pages currently stored.
    pub fn count(&self) -> Result<u64, RetraceError> {
        self.db.with_conn(|conn| {
            let count: i64 = conn
                .query_row("SELECT COUNT(*) FROM pages", [], |row| row.get(0))
                .map_err(|e| RetraceError::Storage(e.to_string()))?;
            Ok(count as u64)
        })
    }

    /// Aggregate statistics. Size accounting is approximate (text +
    /// blob lengths) but monotone under put/delete.
    pub fn stats(&self) -> Result<StoreStats, RetraceError> {
        self.db.with_conn(|conn| {
            let (total_pages, oldest_ts, newest_ts, last_access_ts): (i64, i64, i64, i64) = conn
                .query_row(
                    "SELECT COUNT(*),
                            COALESCE(MIN(timestamp), 0),
                            COALESCE(MAX(timestamp), 0),
                            COALESCE(MAX(last_accessed), 0)
                     FROM pages",
                    [],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
                )
                .map_err(|e| RetraceError::Storage(e.to_string()))?;

            let page_bytes: i64 = conn
                .query_row(
                    "SELECT COALESCE(SUM(LENGTH(url) + LENGTH(title) + LENGTH(content)), 0)
                     FROM pages",
                    [],
                    |row| row.get(0),
                )
                .map_err(|e| RetraceError::Storage(e.to_string()))?;

            let passage_bytes: i64 = conn
                .query_row(
                    "SELECT COALESCE(SUM(LENGTH(text) + LENGTH(embedding)), 0) FROM passages",
                    [],
                    |row| row.get(0),
                )
                .map_err(|e| RetraceError::Storage(e.to_string()))?;

            Ok(StoreStats {
                total_pages: total_pages as u64,
                size_bytes: (page_bytes + passage_bytes) as u64,
                oldest_ts,
                newest_ts,
                last_access_ts,
            })
        })
    }

    /// Record that a page was opened from a search result.
    pub fn record_search_access(&self, id: Uuid, accessed_at: i64) -> Result<(), RetraceError> {
        self.db.with_conn(|conn| {
            let updated = conn
                .execute(
                    "UPDATE pages SET last_accessed = ?2 WHERE id = ?1",
                    rusqlite::params![id.to_string(), accessed_at],
                )
                .map_err(|e| RetraceError::Storage(format!("Failed to record access: {}", e)))?;
            if updated == 0 {
                warn!(page_id = %id, "record_search_access on unknown page");
            }
            Ok(())
        })
    }
}

impl std::fmt::Debug for PageStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageStore").finish()
    }
}

/// Validate the stored-page invariants before writing.
fn validate_page(page: &PageRecord) -> Result<(), RetraceError> {
    if page.passages.is_empty() {
        return Err(RetraceError::CorruptRecord(format!(
            "Page {} has no passages; pages without passages are never stored",
            page.url
        )));
    }

    let mut dim: Option<usize> = None;
    for (index, passage) in page.passages.iter().enumerate() {
        if passage.position as usize != index {
            return Err(RetraceError::CorruptRecord(format!(
                "Passage positions are not dense: expected {} at index {}, got {}",
                index, index, passage.position
            )));
        }
        let embedding = passage.embedding.as_ref().ok_or_else(|| {
            RetraceError::CorruptRecord(format!(
                "Passage {} of {} has no embedding",
                passage.position, page.url
            ))
        })?;
        match dim {
            None => dim = Some(embedding.len()),
            Some(d) if d != embedding.len() => {
                return Err(RetraceError::CorruptRecord(format!(
                    "Mixed embedding dimensions within a page: {} vs {}",
                    d,
                    embedding.len()
                )));
            }
            Some(_) => {}
        }
    }
    Ok(())
}

fn read_dimensions(conn: &Connection) -> Result<Option<usize>, RetraceError> {
    let value: Option<String> = conn
        .query_row(
            "SELECT value FROM meta WHERE key = ?1",
            rusqlite::params![META_EMBEDDING_DIM],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| RetraceError::Storage(e.to_string()))?;

    match value {
        Some(s) => {
            let dim = s.parse::<usize>().map_err(|e| {
                RetraceError::CorruptRecord(format!("Invalid stored dimension {:?}: {}", s, e))
            })?;
            Ok(Some(dim))
        }
        None => Ok(None),
    }
}

type PageShell = Result<PageRecord, RetraceError>;

fn row_to_page_shell(row: &rusqlite::Row<'_>) -> rusqlite::Result<PageShell> {
    let id_str: String = row.get(0)?;
    let url: String = row.get(1)?;
    let title: String = row.get(2)?;
    let content: String = row.get(3)?;
    let timestamp: i64 = row.get(4)?;
    let last_accessed: i64 = row.get(5)?;
    let visit_count: i64 = row.get(6)?;
    let dwell_time_sec: f64 = row.get(7)?;

    Ok(match Uuid::parse_str(&id_str) {
        Ok(id) => Ok(PageRecord {
            id,
            url,
            title,
            content,
            passages: Vec::new(),
            timestamp,
            last_accessed,
            visit_count: visit_count as u32,
            dwell_time_sec,
        }),
        Err(e) => Err(RetraceError::CorruptRecord(format!(
            "Invalid page id {:?}: {}",
            id_str, e
        ))),
    })
}

fn load_passages(conn: &Connection, page_id: Uuid) -> Result<Vec<Passage>, RetraceError> {
    let mut stmt = conn
        .prepare(
            "SELECT position, text, word_count, quality, embedding
             FROM passages WHERE page_id = ?1 ORDER BY position ASC",
        )
        .map_err(|e| RetraceError::Storage(e.to_string()))?;

    let rows = stmt
        .query_map(rusqlite::params![page_id.to_string()], |row| {
            let position: i64 = row.get(0)?;
            let text: String = row.get(1)?;
            let word_count: i64 = row.get(2)?;
            let quality: f64 = row.get(3)?;
            let blob: Vec<u8> = row.get(4)?;
            Ok((position, text, word_count, quality, blob))
        })
        .map_err(|e| RetraceError::Storage(e.to_string()))?;

    let mut passages = Vec::new();
    for row in rows {
        let (position, text, word_count, quality, blob) =
            row.map_err(|e| RetraceError::Storage(e.to_string()))?;
        let embedding = blob_to_embedding(&blob)?;
        passages.push(Passage {
            id: position as u32,
            text,
            word_count: word_count as usize,
            position: position as u32,
            quality,
            embedding: Some(embedding),
        });
    }
    Ok(passages)
}
