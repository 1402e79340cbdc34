use std::sync::Arc;

use hashbrown::HashMap;
use tokio::{sync::Mutex, task::JoinSet};

use crate::{
    core::doc_meta::DocMeta,
    persist::{DocMetaSink, PersistError, PersistResult},
    types::{Fingerprint, Revision},
};

pub(crate) type SharedSink = Arc<Mutex<Box<dyn DocMetaSink>>>;

#[derive(Debug)]
pub(crate) struct WriteOutcome {
    pub fingerprint: Fingerprint,
    pub revision: Revision,
    pub result: Result<(), PersistError>,
}

/// Outstanding document writes, counted per document.
pub(crate) struct WriteTracker {
    tasks: JoinSet<WriteOutcome>,
    in_flight: HashMap<Fingerprint, usize>,
}

impl WriteTracker {
    pub fn new() -> Self {
        Self {
            tasks: JoinSet::new(),
            in_flight: HashMap::new(),
        }
    }

    pub fn spawn(&mut self, sink: &SharedSink, doc: Arc<DocMeta>) {
        let fingerprint = doc.fingerprint().clone();
        let revision = doc.revision;
        *self.in_flight.entry(fingerprint.clone()).or_default() += 1;

        let sink = Arc::clone(sink);
        self.tasks.spawn(async move {
            let result = with_sink(&sink, move |s| s.write_doc_meta(&doc)).await;
            WriteOutcome {
                fingerprint,
                revision,
                result,
            }
        });
    }

    pub fn in_flight(&self, fingerprint: &Fingerprint) -> usize {
        self.in_flight.get(fingerprint).copied().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub async fn join_next(&mut self) -> Option<WriteOutcome> {
        loop {
            match self.tasks.join_next().await? {
                Ok(outcome) => {
                    self.settle(&outcome.fingerprint);
                    return Some(outcome);
                }
                Err(err) => {
                    tracing::warn!(error = %err, "write task ended without an outcome");
                }
            }
        }
    }

    /// Aborts every outstanding write and returns how many were dropped.
    ///
    /// Sink calls already running on the blocking pool still finish.
    pub async fn abandon(&mut self) -> usize {
        for (fingerprint, count) in self.in_flight.drain() {
            if count > 0 {
                tracing::warn!(%fingerprint, abandoned = count, "abandoning outstanding doc meta writes");
            }
        }
        let count = self.tasks.len();
        self.tasks.shutdown().await;
        count
    }

    fn settle(&mut self, fingerprint: &Fingerprint) {
        if let Some(count) = self.in_flight.get_mut(fingerprint) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                self.in_flight.remove(fingerprint);
            }
        }
    }
}

/// Runs `f` against the sink on the blocking pool.
pub(crate) async fn with_sink<T, F>(sink: &SharedSink, f: F) -> PersistResult<T>
where
    T: Send + 'static,
    F: FnOnce(&mut dyn DocMetaSink) -> PersistResult<T> + Send + 'static,
{
    let sink = Arc::clone(sink);
    tokio::task::spawn_blocking(move || {
        let mut sink = sink.blocking_lock();
        f(sink.as_mut())
    })
    .await
    .map_err(|e| PersistError::Message(format!("join error: {e}")))?
}
