//! Annotation records, references, and flashcard field payloads.

use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};

use crate::types::{AnnotationId, AnnotationType, FlashcardType, PageNum};

/// Rich-text (HTML) body.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Html(String);

impl Html {
    /// Wraps HTML text.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the HTML text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Html {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for Html {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Address of one annotation inside a document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AnnotationRef {
    /// Page holding the annotation.
    pub page: PageNum,
    /// Map the annotation lives in.
    pub kind: AnnotationType,
    /// Annotation id within that map.
    pub id: AnnotationId,
}

impl AnnotationRef {
    /// Builds a reference from its parts.
    pub fn new(page: PageNum, kind: AnnotationType, id: AnnotationId) -> Self {
        Self { page, kind, id }
    }
}

impl fmt::Display for AnnotationRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}@p{}", self.kind, self.id, self.page)
    }
}

/// What an annotation is attached to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParentRef {
    /// Attached directly to a page.
    Page(PageNum),
    /// Attached to another annotation.
    Annotation(AnnotationRef),
}

impl ParentRef {
    /// Page that owns anything attached to this parent.
    pub fn page(&self) -> PageNum {
        match self {
            Self::Page(page) => *page,
            Self::Annotation(target) => target.page,
        }
    }
}

impl fmt::Display for ParentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Page(page) => write!(f, "page {page}"),
            Self::Annotation(target) => target.fmt(f),
        }
    }
}

impl From<AnnotationRef> for ParentRef {
    fn from(value: AnnotationRef) -> Self {
        Self::Annotation(value)
    }
}

/// Named flashcard fields, e.g. `front`/`back` or `text`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FlashcardFields(BTreeMap<String, Html>);

impl FlashcardFields {
    /// Fields for a [`FlashcardType::BasicFrontBack`] card.
    pub fn front_back(front: impl Into<Html>, back: impl Into<Html>) -> Self {
        let mut fields = BTreeMap::new();
        fields.insert("front".to_string(), front.into());
        fields.insert("back".to_string(), back.into());
        Self(fields)
    }

    /// Fields for a [`FlashcardType::Cloze`] card.
    pub fn cloze(text: impl Into<Html>) -> Self {
        let mut fields = BTreeMap::new();
        fields.insert("text".to_string(), text.into());
        Self(fields)
    }

    /// Sets or replaces one field.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Html>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }

    /// Returns one field.
    pub fn get(&self, name: &str) -> Option<&Html> {
        self.0.get(name)
    }

    /// First required field of `flashcard_type` that is absent.
    pub fn missing_for(&self, flashcard_type: FlashcardType) -> Option<&'static str> {
        flashcard_type
            .required_fields()
            .iter()
            .copied()
            .find(|name| !self.0.contains_key(*name))
    }
}

/// Highlighted run of page text, optionally revised by the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextHighlight {
    /// Stable id.
    pub id: AnnotationId,
    /// Owning page.
    pub parent: ParentRef,
    /// Text as extracted from the page.
    pub text: Html,
    /// User-edited replacement for `text`.
    pub revised_text: Option<Html>,
    /// Highlight colour name or hex value.
    pub color: Option<String>,
    /// Free-form tags.
    pub tags: Vec<String>,
    /// Creation time in milliseconds since epoch.
    pub created_ms: u64,
    /// Last modification time in milliseconds since epoch.
    pub updated_ms: u64,
}

impl TextHighlight {
    /// Creates a highlight on `page` with a fresh id.
    pub fn new(page: PageNum, text: impl Into<Html>) -> Self {
        let now = crate::now_ms();
        Self {
            id: AnnotationId::generate(),
            parent: ParentRef::Page(page),
            text: text.into(),
            revised_text: None,
            color: None,
            tags: Vec::new(),
            created_ms: now,
            updated_ms: now,
        }
    }

    /// Revised text when present, otherwise the extracted text.
    pub fn current_text(&self) -> &Html {
        self.revised_text.as_ref().unwrap_or(&self.text)
    }
}

/// Rich-text comment attached to a page or annotation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    /// Stable id.
    pub id: AnnotationId,
    /// What this comment is attached to.
    pub parent: ParentRef,
    /// Comment body.
    pub body: Html,
    /// Free-form tags.
    pub tags: Vec<String>,
    /// Creation time in milliseconds since epoch.
    pub created_ms: u64,
    /// Last modification time in milliseconds since epoch.
    pub updated_ms: u64,
}

/// Flashcard attached to a page or annotation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flashcard {
    /// Stable id.
    pub id: AnnotationId,
    /// What this flashcard is attached to.
    pub parent: ParentRef,
    /// Card layout.
    pub flashcard_type: FlashcardType,
    /// Card content.
    pub fields: FlashcardFields,
    /// Free-form tags.
    pub tags: Vec<String>,
    /// Creation time in milliseconds since epoch.
    pub created_ms: u64,
    /// Last modification time in milliseconds since epoch.
    pub updated_ms: u64,
}

/// Any annotation stored in a [`crate::core::doc_meta::PageMeta`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Annotation {
    /// Text highlight.
    TextHighlight(TextHighlight),
    /// Comment.
    Comment(Comment),
    /// Flashcard.
    Flashcard(Flashcard),
}

impl Annotation {
    /// Type tag of the wrapped record.
    pub fn kind(&self) -> AnnotationType {
        match self {
            Self::TextHighlight(_) => AnnotationType::TextHighlight,
            Self::Comment(_) => AnnotationType::Comment,
            Self::Flashcard(_) => AnnotationType::Flashcard,
        }
    }

    /// Id of the wrapped record.
    pub fn id(&self) -> &AnnotationId {
        match self {
            Self::TextHighlight(v) => &v.id,
            Self::Comment(v) => &v.id,
            Self::Flashcard(v) => &v.id,
        }
    }

    /// Parent of the wrapped record.
    pub fn parent(&self) -> &ParentRef {
        match self {
            Self::TextHighlight(v) => &v.parent,
            Self::Comment(v) => &v.parent,
            Self::Flashcard(v) => &v.parent,
        }
    }

    /// Reference addressing this annotation.
    pub fn to_ref(&self) -> AnnotationRef {
        AnnotationRef::new(self.parent().page(), self.kind(), self.id().clone())
    }

    pub(crate) fn touch(&mut self, now: u64) {
        match self {
            Self::TextHighlight(v) => v.updated_ms = now,
            Self::Comment(v) => v.updated_ms = now,
            Self::Flashcard(v) => v.updated_ms = now,
        }
    }
}
