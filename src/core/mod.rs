//! In-memory document metadata and its authoritative store.

/// Document, page, and annotation-collection model.
pub mod doc_meta;
/// Copy-on-write store applying mutation intents.
pub mod store;
