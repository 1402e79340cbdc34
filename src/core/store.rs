use std::sync::Arc;

use crate::{
    annotation::{Annotation, AnnotationRef, Comment, Flashcard, FlashcardFields, Html, ParentRef},
    core::doc_meta::DocMeta,
    mutation::{CommentMutation, FlashcardMutation, Intent, TextHighlightMutation},
    now_ms,
    types::{AnnotationId, AnnotationType, Fingerprint, FlashcardType, PageNum, Revision},
};

/// Why an intent was rejected. A rejected intent leaves the document untouched.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The addressed page is not part of the document.
    #[error("page {0} does not exist")]
    MissingPage(PageNum),
    /// The addressed annotation is not on its page.
    #[error("annotation {0} does not exist")]
    InvalidReference(AnnotationRef),
    /// The parent of a new annotation does not exist.
    #[error("parent {0} does not exist")]
    MissingParent(ParentRef),
    /// The reference's type tag does not fit the intent.
    #[error("{target} is not a {expected}")]
    KindMismatch {
        /// Reference carried by the intent.
        target: AnnotationRef,
        /// Type the intent operates on.
        expected: AnnotationType,
    },
    /// The annotation is attached to a different parent than the intent names.
    #[error("{target} is not attached to {parent}")]
    ParentMismatch {
        /// Annotation addressed.
        target: AnnotationRef,
        /// Parent named by the intent.
        parent: ParentRef,
    },
    /// A flashcard lacks a field its type requires.
    #[error("{flashcard_type:?} flashcard is missing field `{field}`")]
    MissingField {
        /// Card layout being validated.
        flashcard_type: FlashcardType,
        /// First absent field.
        field: &'static str,
    },
}

/// What an applied intent did to its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// A new annotation was stored.
    Created,
    /// An existing annotation was rewritten.
    Updated,
    /// An annotation was removed, or was already absent.
    Deleted,
    /// A highlight's revised text was set or cleared.
    TextRevised,
}

/// Result of applying one intent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Applied {
    /// Annotation the intent addressed (or created).
    pub target: AnnotationRef,
    /// Kind of change.
    pub change: ChangeKind,
    /// False when the intent was a no-op, e.g. deleting an absent id.
    pub changed: bool,
    /// Document revision after the intent.
    pub revision: Revision,
    /// Comments and flashcards removed because an ancestor was deleted.
    pub cascaded: Vec<AnnotationRef>,
}

/// Owner of the current [`DocMeta`].
///
/// Mutations are copy-on-write: snapshots handed out by [`Self::snapshot`]
/// never change after they are taken.
#[derive(Debug, Clone)]
pub struct DocMetaStore {
    doc: Arc<DocMeta>,
}

impl DocMetaStore {
    /// Takes ownership of `doc` as the current document.
    pub fn new(doc: DocMeta) -> Self {
        Self { doc: Arc::new(doc) }
    }

    pub fn from_shared(doc: Arc<DocMeta>) -> Self {
        Self { doc }
    }

    pub fn doc(&self) -> &DocMeta {
        &self.doc
    }

    /// Shares the current document without copying it.
    pub fn snapshot(&self) -> Arc<DocMeta> {
        Arc::clone(&self.doc)
    }

    pub fn fingerprint(&self) -> &Fingerprint {
        self.doc.fingerprint()
    }

    pub fn revision(&self) -> Revision {
        self.doc.revision
    }

    /// Makes `doc` the current document.
    pub fn replace(&mut self, doc: Arc<DocMeta>) {
        self.doc = doc;
    }

    /// Applies one intent. On error the document is unchanged.
    pub fn apply(&mut self, intent: Intent) -> Result<Applied, StoreError> {
        match intent {
            Intent::Comment(m) => self.apply_comment(m),
            Intent::Flashcard(m) => self.apply_flashcard(m),
            Intent::TextHighlight(m) => self.apply_text_highlight(m),
            Intent::Delete(target) => self.delete(&target),
            Intent::Update(annotation) => self.update(annotation),
        }
    }

    pub fn apply_comment(&mut self, mutation: CommentMutation) -> Result<Applied, StoreError> {
        match mutation {
            CommentMutation::Create { parent, body } => self.create_comment(parent, body),
            CommentMutation::Update {
                parent,
                body,
                existing,
            } => self.update_comment(&parent, body, &existing),
            CommentMutation::Delete { parent, existing } => {
                self.delete_attached(&parent, &existing, AnnotationType::Comment)
            }
        }
    }

    pub fn apply_flashcard(&mut self, mutation: FlashcardMutation) -> Result<Applied, StoreError> {
        match mutation {
            FlashcardMutation::Create {
                parent,
                flashcard_type,
                fields,
            } => self.create_flashcard(parent, flashcard_type, fields),
            FlashcardMutation::Update {
                parent,
                flashcard_type,
                fields,
                existing,
            } => self.update_flashcard(&parent, flashcard_type, fields, &existing),
            FlashcardMutation::Delete { parent, existing } => {
                self.delete_attached(&parent, &existing, AnnotationType::Flashcard)
            }
        }
    }

    pub fn apply_text_highlight(&mut self, mutation: TextHighlightMutation) -> Result<Applied, StoreError> {
        let (target, revised) = match mutation {
            TextHighlightMutation::Revert { text_highlight } => (text_highlight, None),
            TextHighlightMutation::Update { text_highlight, body } => (text_highlight, Some(body)),
        };
        Self::expect_kind(&target, AnnotationType::TextHighlight)?;

        let current = self
            .doc
            .page(target.page)
            .and_then(|p| p.text_highlights.get(&target.id))
            .ok_or_else(|| StoreError::InvalidReference(target.clone()))?;
        if current.revised_text == revised {
            return Ok(self.unchanged(target, ChangeKind::TextRevised));
        }

        let now = now_ms();
        let doc = Arc::make_mut(&mut self.doc);
        if let Some(th) = doc
            .page_mut(target.page)
            .and_then(|p| p.text_highlights.get_mut(&target.id))
        {
            th.revised_text = revised;
            th.updated_ms = now;
        }
        Ok(self.commit(target, ChangeKind::TextRevised, now, Vec::new()))
    }

    /// Removes any annotation plus the comments and flashcards attached to it.
    ///
    /// Deleting an id that is already gone from an existing page is a no-op.
    pub fn delete(&mut self, target: &AnnotationRef) -> Result<Applied, StoreError> {
        let page = self
            .doc
            .page(target.page)
            .ok_or(StoreError::MissingPage(target.page))?;
        if !page.contains(target.kind, &target.id) {
            return Ok(self.unchanged(target.clone(), ChangeKind::Deleted));
        }
        Ok(self.remove_with_children(target))
    }

    /// Replaces an existing annotation, addressed by its own type tag and id.
    pub fn update(&mut self, mut annotation: Annotation) -> Result<Applied, StoreError> {
        let target = annotation.to_ref();
        let stored = self
            .doc
            .annotation(&target)
            .ok_or_else(|| StoreError::InvalidReference(target.clone()))?;
        if stored.parent() != annotation.parent() {
            return Err(StoreError::ParentMismatch {
                target,
                parent: annotation.parent().clone(),
            });
        }
        if stored == annotation {
            return Ok(self.unchanged(target, ChangeKind::Updated));
        }

        let now = now_ms();
        annotation.touch(now);
        let doc = Arc::make_mut(&mut self.doc);
        if let Some(page) = doc.page_mut(target.page) {
            page.put(annotation);
        }
        Ok(self.commit(target, ChangeKind::Updated, now, Vec::new()))
    }

    fn create_comment(&mut self, parent: ParentRef, body: Html) -> Result<Applied, StoreError> {
        self.expect_parent(&parent)?;
        let now = now_ms();
        let comment = Comment {
            id: AnnotationId::generate(),
            parent,
            body,
            tags: Vec::new(),
            created_ms: now,
            updated_ms: now,
        };
        Ok(self.insert(Annotation::Comment(comment), now))
    }

    fn update_comment(
        &mut self,
        parent: &ParentRef,
        body: Html,
        existing: &AnnotationRef,
    ) -> Result<Applied, StoreError> {
        self.expect_attached(parent, existing, AnnotationType::Comment)?;
        let now = now_ms();
        let doc = Arc::make_mut(&mut self.doc);
        if let Some(c) = doc
            .page_mut(existing.page)
            .and_then(|p| p.comments.get_mut(&existing.id))
        {
            c.body = body;
            c.updated_ms = now;
        }
        Ok(self.commit(existing.clone(), ChangeKind::Updated, now, Vec::new()))
    }

    fn create_flashcard(
        &mut self,
        parent: ParentRef,
        flashcard_type: FlashcardType,
        fields: FlashcardFields,
    ) -> Result<Applied, StoreError> {
        Self::expect_fields(flashcard_type, &fields)?;
        self.expect_parent(&parent)?;
        let now = now_ms();
        let flashcard = Flashcard {
            id: AnnotationId::generate(),
            parent,
            flashcard_type,
            fields,
            tags: Vec::new(),
            created_ms: now,
            updated_ms: now,
        };
        Ok(self.insert(Annotation::Flashcard(flashcard), now))
    }

    fn update_flashcard(
        &mut self,
        parent: &ParentRef,
        flashcard_type: FlashcardType,
        fields: FlashcardFields,
        existing: &AnnotationRef,
    ) -> Result<Applied, StoreError> {
        Self::expect_fields(flashcard_type, &fields)?;
        self.expect_attached(parent, existing, AnnotationType::Flashcard)?;
        let now = now_ms();
        let doc = Arc::make_mut(&mut self.doc);
        if let Some(f) = doc
            .page_mut(existing.page)
            .and_then(|p| p.flashcards.get_mut(&existing.id))
        {
            f.flashcard_type = flashcard_type;
            f.fields = fields;
            f.updated_ms = now;
        }
        Ok(self.commit(existing.clone(), ChangeKind::Updated, now, Vec::new()))
    }

    fn delete_attached(
        &mut self,
        parent: &ParentRef,
        existing: &AnnotationRef,
        expected: AnnotationType,
    ) -> Result<Applied, StoreError> {
        Self::expect_kind(existing, expected)?;
        let Some(stored) = self
            .doc
            .page(existing.page)
            .ok_or(StoreError::MissingPage(existing.page))?
            .get(existing.kind, &existing.id)
        else {
            return Ok(self.unchanged(existing.clone(), ChangeKind::Deleted));
        };
        if stored.parent() != parent {
            return Err(StoreError::ParentMismatch {
                target: existing.clone(),
                parent: parent.clone(),
            });
        }
        Ok(self.remove_with_children(existing))
    }

    fn insert(&mut self, annotation: Annotation, now: u64) -> Applied {
        let target = annotation.to_ref();
        let doc = Arc::make_mut(&mut self.doc);
        if let Some(page) = doc.page_mut(target.page) {
            page.put(annotation);
        }
        self.commit(target, ChangeKind::Created, now, Vec::new())
    }

    fn remove_with_children(&mut self, target: &AnnotationRef) -> Applied {
        let now = now_ms();
        let doc = Arc::make_mut(&mut self.doc);
        let cascaded = match doc.page_mut(target.page) {
            Some(page) => {
                page.remove(target.kind, &target.id);
                page.remove_children_of(target)
            }
            None => Vec::new(),
        };
        self.commit(target.clone(), ChangeKind::Deleted, now, cascaded)
    }

    fn commit(
        &mut self,
        target: AnnotationRef,
        change: ChangeKind,
        now: u64,
        cascaded: Vec<AnnotationRef>,
    ) -> Applied {
        let doc = Arc::make_mut(&mut self.doc);
        doc.revision += 1;
        doc.doc_info.updated_ms = now;
        Applied {
            target,
            change,
            changed: true,
            revision: doc.revision,
            cascaded,
        }
    }

    fn unchanged(&self, target: AnnotationRef, change: ChangeKind) -> Applied {
        Applied {
            target,
            change,
            changed: false,
            revision: self.doc.revision,
            cascaded: Vec::new(),
        }
    }

    fn expect_parent(&self, parent: &ParentRef) -> Result<(), StoreError> {
        if self.doc.parent_exists(parent) {
            Ok(())
        } else {
            Err(StoreError::MissingParent(parent.clone()))
        }
    }

    fn expect_attached(
        &self,
        parent: &ParentRef,
        existing: &AnnotationRef,
        expected: AnnotationType,
    ) -> Result<(), StoreError> {
        Self::expect_kind(existing, expected)?;
        let stored = self
            .doc
            .annotation(existing)
            .ok_or_else(|| StoreError::InvalidReference(existing.clone()))?;
        if stored.parent() != parent {
            return Err(StoreError::ParentMismatch {
                target: existing.clone(),
                parent: parent.clone(),
            });
        }
        Ok(())
    }

    fn expect_kind(target: &AnnotationRef, expected: AnnotationType) -> Result<(), StoreError> {
        if target.kind == expected {
            Ok(())
        } else {
            Err(StoreError::KindMismatch {
                target: target.clone(),
                expected,
            })
        }
    }

    fn expect_fields(flashcard_type: FlashcardType, fields: &FlashcardFields) -> Result<(), StoreError> {
        match fields.missing_for(flashcard_type) {
            Some(field) => Err(StoreError::MissingField { flashcard_type, field }),
            None => Ok(()),
        }
    }
}
