//! Mutation intents produced by UI gestures and consumed by the dispatcher.

use serde::{Deserialize, Serialize};

use crate::{
    annotation::{Annotation, AnnotationRef, FlashcardFields, Html, ParentRef},
    types::FlashcardType,
};

/// Requested change to a comment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommentMutation {
    /// Attach a new comment to `parent`.
    Create {
        /// Page or annotation receiving the comment.
        parent: ParentRef,
        /// Comment body.
        body: Html,
    },
    /// Replace the body of `existing`.
    Update {
        /// Parent `existing` is attached to.
        parent: ParentRef,
        /// New body.
        body: Html,
        /// Comment to rewrite.
        existing: AnnotationRef,
    },
    /// Remove `existing`.
    Delete {
        /// Parent `existing` is attached to.
        parent: ParentRef,
        /// Comment to remove.
        existing: AnnotationRef,
    },
}

/// Requested change to a flashcard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlashcardMutation {
    /// Attach a new flashcard to `parent`.
    Create {
        /// Page or annotation receiving the card.
        parent: ParentRef,
        /// Card layout.
        flashcard_type: FlashcardType,
        /// Card content.
        fields: FlashcardFields,
    },
    /// Replace the type and fields of `existing`.
    Update {
        /// Parent `existing` is attached to.
        parent: ParentRef,
        /// New card layout.
        flashcard_type: FlashcardType,
        /// New card content.
        fields: FlashcardFields,
        /// Flashcard to rewrite.
        existing: AnnotationRef,
    },
    /// Remove `existing`.
    Delete {
        /// Parent `existing` is attached to.
        parent: ParentRef,
        /// Flashcard to remove.
        existing: AnnotationRef,
    },
}

/// Requested change to a text highlight's displayed text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TextHighlightMutation {
    /// Drop any user revision and show the extracted text again.
    Revert {
        /// Highlight to revert.
        text_highlight: AnnotationRef,
    },
    /// Store revised text.
    Update {
        /// Highlight to revise.
        text_highlight: AnnotationRef,
        /// Revised text.
        body: Html,
    },
}

/// Any intent the dispatcher accepts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Intent {
    /// Comment create/update/delete.
    Comment(CommentMutation),
    /// Flashcard create/update/delete.
    Flashcard(FlashcardMutation),
    /// Text highlight revise/revert.
    TextHighlight(TextHighlightMutation),
    /// Remove any annotation (and its attached comments and flashcards).
    Delete(AnnotationRef),
    /// Replace any annotation in place.
    Update(Annotation),
}

impl Intent {
    /// Whether the dispatcher writes the document after applying this intent.
    ///
    /// Text-highlight edits are left to the caller to persist.
    pub fn persists_by_default(&self) -> bool {
        !matches!(self, Self::TextHighlight(_))
    }
}

impl From<CommentMutation> for Intent {
    fn from(value: CommentMutation) -> Self {
        Self::Comment(value)
    }
}

impl From<FlashcardMutation> for Intent {
    fn from(value: FlashcardMutation) -> Self {
        Self::Flashcard(value)
    }
}

impl From<TextHighlightMutation> for Intent {
    fn from(value: TextHighlightMutation) -> Self {
        Self::TextHighlight(value)
    }
}
