//! Runtime event stream payloads.

use crate::{
    annotation::AnnotationRef,
    types::{Fingerprint, Revision},
};

/// Events emitted from the single-writer dispatcher loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocEvent {
    /// A document became current.
    Opened {
        /// Document that is now current.
        fingerprint: Fingerprint,
    },
    /// An annotation was created.
    Created {
        /// New annotation.
        target: AnnotationRef,
    },
    /// An annotation was rewritten.
    Updated {
        /// Rewritten annotation.
        target: AnnotationRef,
    },
    /// An annotation was deleted, or was already absent.
    Deleted {
        /// Deleted annotation.
        target: AnnotationRef,
    },
    /// A text highlight's revised text was set or reverted.
    TextRevised {
        /// Revised highlight.
        target: AnnotationRef,
    },
    /// Persistence has reached at least this revision.
    DurableUpTo {
        /// Written document.
        fingerprint: Fingerprint,
        /// Highest revision known durable.
        revision: Revision,
    },
    /// A write was rejected by the sink.
    WriteFailed {
        /// Document that failed to write.
        fingerprint: Fingerprint,
        /// Revision carried by the failed write.
        revision: Revision,
        /// Sink error text.
        reason: String,
    },
    /// The durable document replaced the optimistic one after a failed write.
    Reconciled {
        /// Reloaded document.
        fingerprint: Fingerprint,
        /// Revision now current.
        revision: Revision,
    },
}
