//! Local SQLite catalog used as a search collaborator.
//!
//! Schema:
//! - `catalog_tracks`: one row per remote track, artists stored as a JSON array
//! - `catalog_fts`: external-content FTS5 index over normalized title and artists
//!
//! Searches AND the normalized query tokens, rank by bm25 and then popularity,
//! and stop at the requested limit.

use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::{params, Connection};
use tracing::{debug, info};

use crate::error::SearchError;
use crate::models::Candidate;
use crate::normalize::{normalize, normalize_artist};
use crate::progress::{create_progress_bar, create_spinner};
use crate::source::CandidateSource;

const WRITE_BATCH_SIZE: usize = 10_000;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS catalog_tracks (
        pk INTEGER PRIMARY KEY,
        id TEXT NOT NULL UNIQUE,
        title TEXT NOT NULL,
        artists_json TEXT NOT NULL,
        album TEXT NOT NULL DEFAULT '',
        popularity INTEGER NOT NULL DEFAULT 0,
        title_norm TEXT NOT NULL,
        artist_norm TEXT NOT NULL
    );

    CREATE VIRTUAL TABLE IF NOT EXISTS catalog_fts USING fts5(
        title_norm, artist_norm,
        content='catalog_tracks',
        content_rowid='pk'
    );";

const SEARCH_SQL: &str = "
    SELECT t.id, t.title, t.artists_json, t.album, t.popularity
    FROM catalog_fts
    JOIN catalog_tracks t ON catalog_fts.rowid = t.pk
    WHERE catalog_fts MATCH ?1
    ORDER BY bm25(catalog_fts), t.popularity DESC, t.pk
    LIMIT ?2";

pub struct SqliteCatalog {
    conn: Connection,
}

impl SqliteCatalog {
    /// Open (or create) a catalog database.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).with_context(|| format!("Failed to open catalog {}", path.display()))?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA temp_store = MEMORY;",
        )?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory catalog")?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA).context("Failed to create catalog schema")?;
        Ok(Self { conn })
    }

    /// Insert or replace candidates by id, then rebuild the FTS index.
    pub fn insert_candidates(&mut self, candidates: &[Candidate]) -> Result<usize> {
        let pb = create_progress_bar(candidates.len() as u64, "Importing catalog");

        for chunk in candidates.chunks(WRITE_BATCH_SIZE) {
            let tx = self.conn.transaction()?;
            {
                let mut stmt = tx.prepare_cached(
                    "INSERT OR REPLACE INTO catalog_tracks
                        (id, title, artists_json, album, popularity, title_norm, artist_norm)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                )?;

                for c in chunk {
                    let artists_json = serde_json::to_string(&c.artists)?;
                    let artist_norm = c
                        .artists
                        .iter()
                        .map(|a| normalize_artist(a))
                        .collect::<Vec<_>>()
                        .join(" ");
                    stmt.execute(params![
                        c.id,
                        c.title,
                        artists_json,
                        c.album,
                        c.popularity,
                        normalize(&c.title).text,
                        artist_norm,
                    ])?;
                    pb.inc(1);
                }
            }
            tx.commit()?;
        }
        pb.finish_with_message(format!("wrote {} tracks", candidates.len()));

        self.rebuild_index()?;
        info!(tracks = candidates.len(), "catalog import complete");
        Ok(candidates.len())
    }

    /// Import a JSON array of candidates.
    pub fn import_json(&mut self, path: &Path) -> Result<usize> {
        let candidates = load_candidates(path)?;
        self.insert_candidates(&candidates)
    }

    fn rebuild_index(&self) -> Result<()> {
        let spinner = create_spinner("Building search index");
        self.conn
            .execute("INSERT INTO catalog_fts(catalog_fts) VALUES('rebuild')", [])
            .context("Failed to rebuild catalog index")?;
        spinner.finish_with_message("Search index built");
        Ok(())
    }

    pub fn len(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM catalog_tracks", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

/// Read a JSON array of candidates (the import and `compare` input format).
pub fn load_candidates(path: &Path) -> Result<Vec<Candidate>> {
    let text = std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let candidates: Vec<Candidate> =
        serde_json::from_str(&text).with_context(|| format!("Failed to parse candidates in {}", path.display()))?;
    Ok(candidates)
}

/// FTS5 query ANDing every normalized token. Tokens are `[a-z0-9]+` after
/// normalization, so quoting each one is enough to neutralize FTS syntax.
fn fts_query(query: &str) -> Option<String> {
    let tokens: Vec<String> = normalize(query)
        .text
        .split_whitespace()
        .map(|t| format!("\"{}\"", t))
        .collect();
    if tokens.is_empty() {
        None
    } else {
        Some(tokens.join(" "))
    }
}

impl CandidateSource for SqliteCatalog {
    fn search(&mut self, query: &str, limit: usize) -> Result<Vec<Candidate>, SearchError> {
        let Some(fts) = fts_query(query) else {
            return Ok(Vec::new());
        };

        // A missing table or index means the catalog itself is unusable
        let mut stmt = self
            .conn
            .prepare_cached(SEARCH_SQL)
            .map_err(|e| SearchError::Fatal(format!("catalog not searchable: {}", e)))?;

        let rows = stmt
            .query_map(params![fts, limit as i64], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, i32>(4)?,
                ))
            })
            .map_err(|e| SearchError::Unavailable(e.to_string()))?;

        let mut candidates = Vec::new();
        for row in rows {
            let (id, title, artists_json, album, popularity) =
                row.map_err(|e| SearchError::Unavailable(e.to_string()))?;
            let artists: Vec<String> = serde_json::from_str(&artists_json)
                .map_err(|e| SearchError::Unavailable(format!("bad artists for {}: {}", id, e)))?;
            candidates.push(Candidate {
                id,
                title,
                artists,
                album,
                popularity,
            });
        }

        debug!(query = %fts, hits = candidates.len(), "catalog search");
        Ok(candidates)
    }
}
