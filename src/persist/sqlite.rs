//! SQLite-backed revision store for [`DocMeta`] documents.

use std::path::Path;

use rusqlite::{Connection, OptionalExtension, params};
use serde::{Deserialize, Serialize};

use crate::{
    core::doc_meta::DocMeta,
    now_ms,
    types::{Fingerprint, PageNum, Revision},
};

use super::{DocMetaSink, PersistError, PersistResult};

/// Version number for serialized [`DocMeta`] payloads.
pub const DOC_META_FORMAT_VERSION: u16 = 1;

#[derive(Debug, Deserialize)]
struct DocMetaEnvelope {
    format_version: u16,
    doc_meta: DocMeta,
}

#[derive(Serialize)]
struct DocMetaEnvelopeRef<'a> {
    format_version: u16,
    doc_meta: &'a DocMeta,
}

/// SQLite implementation of [`crate::persist::DocMetaSink`].
///
/// Every write lands as its own `(fingerprint, revision)` row and reads pick
/// the highest revision, so writes completing out of order still converge.
pub struct SqliteDocMetaSink {
    conn: Connection,
    retain_revisions: usize,
}

impl SqliteDocMetaSink {
    /// Opens or creates a SQLite-backed sink at `path`.
    ///
    /// Enables WAL mode and sets `synchronous=NORMAL`.
    pub fn open(path: impl AsRef<Path>) -> PersistResult<Self> {
        let conn = Connection::open(path)?;
        Self::init_connection(conn)
    }

    /// Opens an in-memory SQLite sink.
    pub fn open_in_memory() -> PersistResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_connection(conn)
    }

    fn init_connection(conn: Connection) -> PersistResult<Self> {
        conn.execute_batch(include_str!("schema.sql"))?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        Ok(Self {
            conn,
            retain_revisions: 0,
        })
    }

    /// Keeps only the newest `keep` revisions per document after each write.
    /// Zero keeps everything.
    pub fn with_retention(mut self, keep: usize) -> Self {
        self.retain_revisions = keep;
        self
    }

    /// Loads the highest stored revision of `fingerprint`.
    pub fn load(&self, fingerprint: &Fingerprint) -> PersistResult<Option<DocMeta>> {
        let payload: Option<Vec<u8>> = self
            .conn
            .query_row(
                "SELECT payload FROM doc_meta WHERE fingerprint = ?1 ORDER BY revision DESC LIMIT 1",
                params![fingerprint.as_str()],
                |row| row.get(0),
            )
            .optional()?;

        payload.map(|p| decode_doc_meta(&p)).transpose()
    }

    /// Loads `fingerprint`, or creates an empty document with `nr_pages` pages.
    pub fn load_or_new(&self, fingerprint: &Fingerprint, nr_pages: PageNum) -> PersistResult<DocMeta> {
        Ok(self
            .load(fingerprint)?
            .unwrap_or_else(|| DocMeta::new(fingerprint.clone(), nr_pages)))
    }

    /// Stored revisions of `fingerprint`, ascending.
    pub fn revisions(&self, fingerprint: &Fingerprint) -> PersistResult<Vec<Revision>> {
        let mut stmt = self
            .conn
            .prepare("SELECT revision FROM doc_meta WHERE fingerprint = ?1 ORDER BY revision ASC")?;
        let rows = stmt.query_map(params![fingerprint.as_str()], |row| row.get::<_, i64>(0))?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row? as Revision);
        }
        Ok(out)
    }

    /// Every stored document, ordered by fingerprint.
    pub fn fingerprints(&self) -> PersistResult<Vec<Fingerprint>> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT fingerprint FROM doc_meta ORDER BY fingerprint ASC")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut out = Vec::new();
        for row in rows {
            out.push(Fingerprint::new(row?));
        }
        Ok(out)
    }

    /// Deletes all but the newest `keep` revisions of `fingerprint`.
    pub fn prune(&mut self, fingerprint: &Fingerprint, keep: usize) -> PersistResult<usize> {
        let count = self.conn.execute(
            "DELETE FROM doc_meta WHERE fingerprint = ?1 AND revision NOT IN (
                SELECT revision FROM doc_meta WHERE fingerprint = ?1 ORDER BY revision DESC LIMIT ?2
            )",
            params![fingerprint.as_str(), keep as i64],
        )?;
        Ok(count)
    }
}

impl DocMetaSink for SqliteDocMetaSink {
    fn write_doc_meta(&mut self, doc: &DocMeta) -> PersistResult<()> {
        let payload = serde_json::to_vec(&DocMetaEnvelopeRef {
            format_version: DOC_META_FORMAT_VERSION,
            doc_meta: doc,
        })?;

        self.conn.execute(
            "INSERT OR REPLACE INTO doc_meta(fingerprint, revision, ts_ms, payload) VALUES (?1, ?2, ?3, ?4)",
            params![
                doc.fingerprint().as_str(),
                doc.revision as i64,
                now_ms() as i64,
                payload,
            ],
        )?;

        if self.retain_revisions > 0 {
            self.prune(doc.fingerprint(), self.retain_revisions)?;
        }
        Ok(())
    }

    fn read_doc_meta(&mut self, fingerprint: &Fingerprint) -> PersistResult<Option<DocMeta>> {
        self.load(fingerprint)
    }

    fn flush(&mut self) -> PersistResult<()> {
        self.conn.execute_batch("PRAGMA wal_checkpoint(PASSIVE);")?;
        Ok(())
    }
}

fn decode_doc_meta(payload: &[u8]) -> PersistResult<DocMeta> {
    let env: DocMetaEnvelope = serde_json::from_slice(payload)?;
    if env.format_version != DOC_META_FORMAT_VERSION {
        return Err(PersistError::UnsupportedFormat(env.format_version));
    }
    Ok(env.doc_meta)
}
