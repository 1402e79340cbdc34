use std::collections::BTreeMap;

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::{
    annotation::{Annotation, AnnotationRef, Comment, Flashcard, ParentRef, TextHighlight},
    types::{AnnotationId, AnnotationType, Fingerprint, PageNum, Revision},
};

/// Document-level metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocInfo {
    /// Stable document identifier.
    pub fingerprint: Fingerprint,
    /// Display title, when known.
    pub title: Option<String>,
    /// Free-form tags.
    pub tags: Vec<String>,
    /// When the document was first added, in milliseconds since epoch.
    pub added_ms: u64,
    /// Last mutation time in milliseconds since epoch.
    pub updated_ms: u64,
}

/// Annotation collections for one page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMeta {
    /// One-based page number.
    pub page_num: PageNum,
    /// Highlights on this page, by id.
    pub text_highlights: HashMap<AnnotationId, TextHighlight>,
    /// Comments attached to this page or to annotations on it, by id.
    pub comments: HashMap<AnnotationId, Comment>,
    /// Flashcards attached to this page or to annotations on it, by id.
    pub flashcards: HashMap<AnnotationId, Flashcard>,
}

impl PageMeta {
    pub fn new(page_num: PageNum) -> Self {
        Self {
            page_num,
            text_highlights: HashMap::new(),
            comments: HashMap::new(),
            flashcards: HashMap::new(),
        }
    }

    pub fn get(&self, kind: AnnotationType, id: &AnnotationId) -> Option<Annotation> {
        match kind {
            AnnotationType::TextHighlight => self
                .text_highlights
                .get(id)
                .cloned()
                .map(Annotation::TextHighlight),
            AnnotationType::Comment => self.comments.get(id).cloned().map(Annotation::Comment),
            AnnotationType::Flashcard => self.flashcards.get(id).cloned().map(Annotation::Flashcard),
        }
    }

    pub fn contains(&self, kind: AnnotationType, id: &AnnotationId) -> bool {
        match kind {
            AnnotationType::TextHighlight => self.text_highlights.contains_key(id),
            AnnotationType::Comment => self.comments.contains_key(id),
            AnnotationType::Flashcard => self.flashcards.contains_key(id),
        }
    }

    /// Stores `annotation` in the map matching its type, replacing any entry with the same id.
    pub fn put(&mut self, annotation: Annotation) {
        match annotation {
            Annotation::TextHighlight(v) => {
                self.text_highlights.insert(v.id.clone(), v);
            }
            Annotation::Comment(v) => {
                self.comments.insert(v.id.clone(), v);
            }
            Annotation::Flashcard(v) => {
                self.flashcards.insert(v.id.clone(), v);
            }
        }
    }

    pub fn remove(&mut self, kind: AnnotationType, id: &AnnotationId) -> bool {
        match kind {
            AnnotationType::TextHighlight => self.text_highlights.remove(id).is_some(),
            AnnotationType::Comment => self.comments.remove(id).is_some(),
            AnnotationType::Flashcard => self.flashcards.remove(id).is_some(),
        }
    }

    /// Removes comments and flashcards attached to `parent`, and anything
    /// attached to those in turn, returning every removed ref.
    pub fn remove_children_of(&mut self, parent: &AnnotationRef) -> Vec<AnnotationRef> {
        let page_num = self.page_num;
        let mut removed = Vec::new();
        let mut pending = vec![parent.clone()];

        while let Some(next) = pending.pop() {
            let parent = ParentRef::Annotation(next);
            let start = removed.len();

            self.comments.retain(|id, c| {
                if c.parent == parent {
                    removed.push(AnnotationRef::new(page_num, AnnotationType::Comment, id.clone()));
                    false
                } else {
                    true
                }
            });
            self.flashcards.retain(|id, f| {
                if f.parent == parent {
                    removed.push(AnnotationRef::new(page_num, AnnotationType::Flashcard, id.clone()));
                    false
                } else {
                    true
                }
            });

            pending.extend(removed[start..].iter().cloned());
        }

        removed
    }

    pub fn len(&self) -> usize {
        self.text_highlights.len() + self.comments.len() + self.flashcards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Aggregate of one document's pages and annotations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocMeta {
    /// Document-level metadata.
    pub doc_info: DocInfo,
    /// Pages keyed by page number.
    pub page_metas: BTreeMap<PageNum, PageMeta>,
    /// Bumped by every state-changing mutation.
    pub revision: Revision,
}

impl DocMeta {
    /// Creates an empty document with pages `1..=nr_pages`.
    pub fn new(fingerprint: Fingerprint, nr_pages: PageNum) -> Self {
        let now = crate::now_ms();
        let page_metas = (1..=nr_pages).map(|n| (n, PageMeta::new(n))).collect();
        Self {
            doc_info: DocInfo {
                fingerprint,
                title: None,
                tags: Vec::new(),
                added_ms: now,
                updated_ms: now,
            },
            page_metas,
            revision: 0,
        }
    }

    pub fn fingerprint(&self) -> &Fingerprint {
        &self.doc_info.fingerprint
    }

    pub fn page(&self, page: PageNum) -> Option<&PageMeta> {
        self.page_metas.get(&page)
    }

    pub fn page_mut(&mut self, page: PageNum) -> Option<&mut PageMeta> {
        self.page_metas.get_mut(&page)
    }

    pub fn annotation(&self, target: &AnnotationRef) -> Option<Annotation> {
        self.page(target.page)?.get(target.kind, &target.id)
    }

    pub fn contains(&self, target: &AnnotationRef) -> bool {
        self.page(target.page)
            .is_some_and(|p| p.contains(target.kind, &target.id))
    }

    pub fn parent_exists(&self, parent: &ParentRef) -> bool {
        match parent {
            ParentRef::Page(page) => self.page_metas.contains_key(page),
            ParentRef::Annotation(target) => self.contains(target),
        }
    }

    /// Comments attached to `parent`, in no particular order.
    pub fn comments_of(&self, parent: &ParentRef) -> Vec<&Comment> {
        self.page(parent.page())
            .into_iter()
            .flat_map(|p| p.comments.values())
            .filter(|c| &c.parent == parent)
            .collect()
    }

    /// Flashcards attached to `parent`, in no particular order.
    pub fn flashcards_of(&self, parent: &ParentRef) -> Vec<&Flashcard> {
        self.page(parent.page())
            .into_iter()
            .flat_map(|p| p.flashcards.values())
            .filter(|f| &f.parent == parent)
            .collect()
    }

    pub fn annotation_count(&self) -> usize {
        self.page_metas.values().map(PageMeta::len).sum()
    }
}
