pub mod sqlite;

use crate::{core::doc_meta::DocMeta, types::Fingerprint};

/// Failure reading or writing a [`DocMeta`].
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("serde: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("unsupported doc meta format version {0}")]
    UnsupportedFormat(u16),
    #[error("{0}")]
    Message(String),
}

pub type PersistResult<T> = Result<T, PersistError>;

/// Durable home for [`DocMeta`] documents.
///
/// Calls block; the dispatcher runs them on the blocking pool.
pub trait DocMetaSink: Send {
    /// Stores `doc` under its fingerprint and revision.
    fn write_doc_meta(&mut self, doc: &DocMeta) -> PersistResult<()>;
    /// Latest stored revision of `fingerprint`, if any.
    fn read_doc_meta(&mut self, fingerprint: &Fingerprint) -> PersistResult<Option<DocMeta>>;
    fn flush(&mut self) -> PersistResult<()> {
        Ok(())
    }
}
