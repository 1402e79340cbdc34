//! Shared primitive IDs and annotation-related enums.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One-based page number within a document.
pub type PageNum = u32;
/// Monotonic document revision, bumped by every state-changing mutation.
pub type Revision = u64;

/// Stable document identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Wraps an existing document identifier.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the identifier text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Annotation identifier, unique within its page's map.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnnotationId(String);

impl AnnotationId {
    /// Wraps an existing identifier.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Allocates a fresh random identifier.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    /// Returns the identifier text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AnnotationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Annotation kind tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnnotationType {
    /// Highlighted run of page text.
    TextHighlight,
    /// Free-form rich-text comment.
    Comment,
    /// Spaced-repetition flashcard.
    Flashcard,
}

impl fmt::Display for AnnotationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::TextHighlight => "text-highlight",
            Self::Comment => "comment",
            Self::Flashcard => "flashcard",
        };
        f.write_str(name)
    }
}

/// Flashcard layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FlashcardType {
    /// Question on the front, answer on the back.
    BasicFrontBack,
    /// Single text with cloze deletions.
    Cloze,
}

impl FlashcardType {
    /// Field names a flashcard of this type must carry.
    pub fn required_fields(self) -> &'static [&'static str] {
        match self {
            Self::BasicFrontBack => &["front", "back"],
            Self::Cloze => &["text"],
        }
    }
}
