use std::sync::Arc;

use hashbrown::HashMap;
use tokio::sync::{broadcast, mpsc, oneshot, watch, Mutex};

use crate::{
    annotation::{Annotation, AnnotationRef},
    core::{
        doc_meta::DocMeta,
        store::{Applied, ChangeKind, DocMetaStore, StoreError},
    },
    mutation::{CommentMutation, FlashcardMutation, Intent, TextHighlightMutation},
    persist::{DocMetaSink, PersistError},
    types::{Fingerprint, Revision},
};

use super::{
    config::{ConsistencyPolicy, RuntimeConfig, TeardownPolicy},
    context::DocContext,
    events::DocEvent,
    writes::{with_sink, SharedSink, WriteOutcome, WriteTracker},
};

/// Errors returned through a [`DispatcherHandle`].
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// The intent was rejected.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// The sink failed during a flush.
    #[error(transparent)]
    Persist(#[from] PersistError),
    /// The dispatcher task has stopped.
    #[error("dispatcher channel closed")]
    ChannelClosed,
}

/// What happened to outstanding writes when the dispatcher stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TeardownReport {
    /// Writes awaited to completion (successful or not).
    pub completed: usize,
    /// Writes aborted before reporting an outcome.
    pub abandoned: usize,
}

/// Cloneable front door to the dispatcher task.
pub struct DispatcherHandle {
    cmd_tx: mpsc::Sender<Command>,
    events_tx: broadcast::Sender<DocEvent>,
    doc_rx: watch::Receiver<Arc<DocMeta>>,
}

impl Clone for DispatcherHandle {
    fn clone(&self) -> Self {
        Self {
            cmd_tx: self.cmd_tx.clone(),
            events_tx: self.events_tx.clone(),
            doc_rx: self.doc_rx.clone(),
        }
    }
}

enum Command {
    Dispatch {
        intent: Intent,
        resp: oneshot::Sender<Result<Applied, DispatchError>>,
    },
    Persist {
        resp: oneshot::Sender<Revision>,
    },
    Open {
        doc: DocMeta,
        resp: oneshot::Sender<()>,
    },
    InFlight {
        resp: oneshot::Sender<usize>,
    },
    Flush {
        resp: oneshot::Sender<Result<Revision, DispatchError>>,
    },
    Shutdown {
        resp: oneshot::Sender<TeardownReport>,
    },
}

/// Starts the dispatcher task with `doc` as the current document.
///
/// Without a sink, writes are skipped and every scheduled revision is
/// reported durable immediately.
pub fn spawn_dispatcher(
    doc: DocMeta,
    sink: Option<Box<dyn DocMetaSink>>,
    config: RuntimeConfig,
) -> DispatcherHandle {
    let (cmd_tx, mut cmd_rx) = mpsc::channel::<Command>(config.command_queue_bound.max(1));
    let (events_tx, _) = broadcast::channel::<DocEvent>(config.event_capacity.max(1));

    let store = DocMetaStore::new(doc);
    let context = DocContext::new(store.snapshot());
    let doc_rx = context.subscribe();

    let mut dispatcher = Dispatcher {
        store,
        context,
        sink: sink.map(|s| Arc::new(Mutex::new(s))),
        writes: WriteTracker::new(),
        durable: HashMap::new(),
        events_tx: events_tx.clone(),
        config,
    };

    tokio::spawn(async move {
        loop {
            tokio::select! {
                cmd = cmd_rx.recv() => {
                    let Some(cmd) = cmd else {
                        let report = dispatcher.teardown().await;
                        tracing::debug!(?report, "all dispatcher handles dropped");
                        break;
                    };
                    if dispatcher.handle_command(cmd).await {
                        break;
                    }
                }
                Some(outcome) = dispatcher.writes.join_next(), if !dispatcher.writes.is_empty() => {
                    dispatcher.on_write_outcome(outcome).await;
                }
            }
        }
    });

    DispatcherHandle {
        cmd_tx,
        events_tx,
        doc_rx,
    }
}

impl DispatcherHandle {
    /// Receiver for events emitted after it is created.
    pub fn subscribe(&self) -> broadcast::Receiver<DocEvent> {
        self.events_tx.subscribe()
    }

    /// The document the UI should render right now.
    pub fn current_doc(&self) -> Arc<DocMeta> {
        Arc::clone(&self.doc_rx.borrow())
    }

    /// Observer that wakes on every published document.
    pub fn watch_doc(&self) -> watch::Receiver<Arc<DocMeta>> {
        self.doc_rx.clone()
    }

    /// Applies `intent` and returns once the document reflects it.
    ///
    /// The write it schedules is not awaited; its outcome arrives as a
    /// [`DocEvent`].
    pub async fn dispatch(&self, intent: impl Into<Intent>) -> Result<Applied, DispatchError> {
        let intent = intent.into();
        self.call(|resp| Command::Dispatch { intent, resp }).await?
    }

    pub async fn dispatch_comment(&self, mutation: CommentMutation) -> Result<Applied, DispatchError> {
        self.dispatch(mutation).await
    }

    pub async fn dispatch_flashcard(&self, mutation: FlashcardMutation) -> Result<Applied, DispatchError> {
        self.dispatch(mutation).await
    }

    /// Revises or reverts a highlight's text. Not written unless configured;
    /// follow with [`Self::persist`] when durability matters.
    pub async fn dispatch_text_highlight(
        &self,
        mutation: TextHighlightMutation,
    ) -> Result<Applied, DispatchError> {
        self.dispatch(mutation).await
    }

    pub async fn dispatch_delete(&self, target: AnnotationRef) -> Result<Applied, DispatchError> {
        self.dispatch(Intent::Delete(target)).await
    }

    pub async fn dispatch_update(&self, annotation: Annotation) -> Result<Applied, DispatchError> {
        self.dispatch(Intent::Update(annotation)).await
    }

    /// Schedules a write of the current document and returns its revision.
    pub async fn persist(&self) -> Result<Revision, DispatchError> {
        self.call(|resp| Command::Persist { resp }).await
    }

    /// Makes `doc` the current document without writing it.
    pub async fn open(&self, doc: DocMeta) -> Result<(), DispatchError> {
        self.call(|resp| Command::Open { doc, resp }).await
    }

    /// Outstanding writes for the current document.
    pub async fn in_flight(&self) -> Result<usize, DispatchError> {
        self.call(|resp| Command::InFlight { resp }).await
    }

    /// Waits for outstanding writes and returns the current document's
    /// highest durable revision.
    pub async fn flush(&self) -> Result<Revision, DispatchError> {
        self.call(|resp| Command::Flush { resp }).await?
    }

    pub async fn shutdown(&self) -> Result<TeardownReport, DispatchError> {
        self.call(|resp| Command::Shutdown { resp }).await
    }

    async fn call<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T, DispatchError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(make(tx))
            .await
            .map_err(|_| DispatchError::ChannelClosed)?;
        rx.await.map_err(|_| DispatchError::ChannelClosed)
    }
}

struct Dispatcher {
    store: DocMetaStore,
    context: DocContext,
    sink: Option<SharedSink>,
    writes: WriteTracker,
    durable: HashMap<Fingerprint, Revision>,
    events_tx: broadcast::Sender<DocEvent>,
    config: RuntimeConfig,
}

impl Dispatcher {
    async fn handle_command(&mut self, cmd: Command) -> bool {
        match cmd {
            Command::Dispatch { intent, resp } => {
                let _ = resp.send(self.dispatch(intent));
            }
            Command::Persist { resp } => {
                let snapshot = self.store.snapshot();
                let revision = snapshot.revision;
                self.schedule_write(snapshot);
                let _ = resp.send(revision);
            }
            Command::Open { doc, resp } => {
                self.open(doc);
                let _ = resp.send(());
            }
            Command::InFlight { resp } => {
                let _ = resp.send(self.writes.in_flight(self.store.fingerprint()));
            }
            Command::Flush { resp } => {
                let out = self.flush().await;
                let _ = resp.send(out);
            }
            Command::Shutdown { resp } => {
                let report = self.teardown().await;
                let _ = resp.send(report);
                return true;
            }
        }

        false
    }

    fn dispatch(&mut self, intent: Intent) -> Result<Applied, DispatchError> {
        let persist = intent.persists_by_default() || self.config.persist_text_highlight_edits;
        let applied = self.store.apply(intent).inspect_err(|err| {
            tracing::debug!(error = %err, "intent rejected");
        })?;
        tracing::debug!(
            annotation = %applied.target,
            revision = applied.revision,
            changed = applied.changed,
            "intent applied"
        );

        // UI sees the mutation before the write is even scheduled.
        let snapshot = self.store.snapshot();
        self.context.set_doc(Arc::clone(&snapshot));

        for target in &applied.cascaded {
            let _ = self.events_tx.send(DocEvent::Deleted {
                target: target.clone(),
            });
        }
        let target = applied.target.clone();
        let _ = self.events_tx.send(match applied.change {
            ChangeKind::Created => DocEvent::Created { target },
            ChangeKind::Updated => DocEvent::Updated { target },
            ChangeKind::Deleted => DocEvent::Deleted { target },
            ChangeKind::TextRevised => DocEvent::TextRevised { target },
        });

        if persist {
            self.schedule_write(snapshot);
        }
        Ok(applied)
    }

    fn open(&mut self, doc: DocMeta) {
        let doc = Arc::new(doc);
        let fingerprint = doc.fingerprint().clone();
        self.store.replace(Arc::clone(&doc));
        self.context.set_doc(doc);
        let writes = &self.writes;
        self.durable
            .retain(|fp, _| fp == &fingerprint || writes.in_flight(fp) > 0);
        tracing::info!(%fingerprint, "doc meta opened");
        let _ = self.events_tx.send(DocEvent::Opened { fingerprint });
    }

    fn schedule_write(&mut self, snapshot: Arc<DocMeta>) {
        match &self.sink {
            Some(sink) => self.writes.spawn(sink, snapshot),
            None => self.mark_durable(snapshot.fingerprint().clone(), snapshot.revision),
        }
    }

    fn mark_durable(&mut self, fingerprint: Fingerprint, revision: Revision) {
        let durable = self.durable.entry(fingerprint.clone()).or_insert(0);
        *durable = (*durable).max(revision);
        let revision = *durable;
        tracing::info!(%fingerprint, revision, "doc meta durable");

        // Closed documents are only tracked while their writes are in flight.
        if &fingerprint != self.store.fingerprint() && self.writes.in_flight(&fingerprint) == 0 {
            self.durable.remove(&fingerprint);
        }
        let _ = self.events_tx.send(DocEvent::DurableUpTo {
            fingerprint,
            revision,
        });
    }

    async fn on_write_outcome(&mut self, outcome: WriteOutcome) {
        let WriteOutcome {
            fingerprint,
            revision,
            result,
        } = outcome;

        let Err(err) = result else {
            self.mark_durable(fingerprint, revision);
            return;
        };

        tracing::error!(%fingerprint, revision, error = %err, "doc meta write failed");
        let _ = self.events_tx.send(DocEvent::WriteFailed {
            fingerprint: fingerprint.clone(),
            revision,
            reason: err.to_string(),
        });

        if self.config.consistency == ConsistencyPolicy::ReconcileOnFailure {
            self.reconcile(fingerprint, revision).await;
        }
    }

    async fn reconcile(&mut self, fingerprint: Fingerprint, failed: Revision) {
        if self.store.fingerprint() != &fingerprint {
            tracing::debug!(%fingerprint, "failed write is for a closed document; not reconciling");
            return;
        }
        if self.store.revision() != failed {
            tracing::warn!(
                %fingerprint,
                failed,
                current = self.store.revision(),
                "newer revision supersedes failed write; not reconciling"
            );
            return;
        }
        let Some(sink) = &self.sink else {
            return;
        };

        let key = fingerprint.clone();
        let loaded = with_sink(sink, move |s| s.read_doc_meta(&key)).await;
        match loaded {
            Ok(Some(doc)) => {
                let doc = Arc::new(doc);
                let revision = doc.revision;
                self.store.replace(Arc::clone(&doc));
                self.context.set_doc(doc);
                tracing::warn!(%fingerprint, revision, "reverted to durable doc meta");
                let _ = self.events_tx.send(DocEvent::Reconciled {
                    fingerprint,
                    revision,
                });
            }
            Ok(None) => {
                tracing::warn!(%fingerprint, "no durable doc meta to reconcile with");
            }
            Err(err) => {
                tracing::error!(%fingerprint, error = %err, "reading durable doc meta failed");
            }
        }
    }

    async fn flush(&mut self) -> Result<Revision, DispatchError> {
        self.drain().await;
        if let Some(sink) = &self.sink {
            with_sink(sink, |s| s.flush()).await?;
        }
        Ok(self
            .durable
            .get(self.store.fingerprint())
            .copied()
            .unwrap_or(0))
    }

    async fn drain(&mut self) -> usize {
        let mut completed = 0;
        while let Some(outcome) = self.writes.join_next().await {
            completed += 1;
            self.on_write_outcome(outcome).await;
        }
        completed
    }

    async fn teardown(&mut self) -> TeardownReport {
        let report = match self.config.teardown {
            TeardownPolicy::AwaitOutstanding => TeardownReport {
                completed: self.drain().await,
                abandoned: 0,
            },
            TeardownPolicy::Abandon => TeardownReport {
                completed: 0,
                abandoned: self.writes.abandon().await,
            },
        };
        tracing::info!(
            fingerprint = %self.store.fingerprint(),
            completed = report.completed,
            abandoned = report.abandoned,
            "dispatcher stopped"
        );
        report
    }
}
