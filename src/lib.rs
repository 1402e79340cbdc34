//! Annotation mutation dispatch over shared document metadata, with
//! asynchronous SQLite persistence.
//!
//! # Examples
//!
//! Applying intents directly to a [`core::store::DocMetaStore`]:
//! ```
//! use docmeta::{
//!     annotation::{Html, ParentRef},
//!     core::{doc_meta::DocMeta, store::DocMetaStore},
//!     mutation::{CommentMutation, Intent},
//!     types::Fingerprint,
//! };
//!
//! let mut store = DocMetaStore::new(DocMeta::new(Fingerprint::new("doc-1"), 3));
//! let applied = store
//!     .apply(Intent::Comment(CommentMutation::Create {
//!         parent: ParentRef::Page(1),
//!         body: Html::from("hello"),
//!     }))
//!     .expect("create comment");
//! assert_eq!(applied.revision, 1);
//! assert_eq!(store.doc().page(1).expect("page").comments.len(), 1);
//! ```
//!
//! Dispatcher usage with a SQLite sink:
//! ```no_run
//! use docmeta::{
//!     annotation::{Html, ParentRef},
//!     mutation::CommentMutation,
//!     persist::sqlite::SqliteDocMetaSink,
//!     runtime::{config::RuntimeConfig, handle::spawn_dispatcher},
//!     types::Fingerprint,
//! };
//!
//! # #[tokio::main]
//! # async fn main() {
//! let sink = SqliteDocMetaSink::open("docmeta.db").expect("open sqlite");
//! let doc = sink.load_or_new(&Fingerprint::new("doc-1"), 12).expect("load");
//! let handle = spawn_dispatcher(doc, Some(Box::new(sink)), RuntimeConfig::default());
//! handle
//!     .dispatch_comment(CommentMutation::Create {
//!         parent: ParentRef::Page(1),
//!         body: Html::from("hello"),
//!     })
//!     .await
//!     .expect("comment");
//! handle.shutdown().await.expect("shutdown");
//! # }
//! ```

/// Annotation records, references, and payloads.
pub mod annotation;
/// Document model and copy-on-write store.
pub mod core;
/// Mutation intents.
pub mod mutation;
/// Persistence abstraction and SQLite implementation.
pub mod persist;
/// Single-writer dispatcher runtime and events.
pub mod runtime;
/// Shared primitive types and enums.
pub mod types;

pub(crate) fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
