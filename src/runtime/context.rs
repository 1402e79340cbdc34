use std::sync::Arc;

use tokio::sync::watch;

use crate::core::doc_meta::DocMeta;

/// UI-visible "current document" cell.
pub struct DocContext {
    tx: watch::Sender<Arc<DocMeta>>,
}

impl DocContext {
    pub fn new(doc: Arc<DocMeta>) -> Self {
        let (tx, _) = watch::channel(doc);
        Self { tx }
    }

    /// Publishes `doc` to every observer, even when none is subscribed yet.
    pub fn set_doc(&self, doc: Arc<DocMeta>) {
        self.tx.send_replace(doc);
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<DocMeta>> {
        self.tx.subscribe()
    }
}
