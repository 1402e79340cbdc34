use docmeta::{
    annotation::{Annotation, AnnotationRef, FlashcardFields, Html, ParentRef, TextHighlight},
    core::{
        doc_meta::DocMeta,
        store::{ChangeKind, DocMetaStore, StoreError},
    },
    mutation::{CommentMutation, FlashcardMutation, Intent, TextHighlightMutation},
    types::{AnnotationId, AnnotationType, Fingerprint, FlashcardType},
};

fn store_with_highlight() -> (DocMetaStore, AnnotationRef) {
    let mut doc = DocMeta::new(Fingerprint::new("doc-1"), 3);
    let highlight = TextHighlight::new(2, "extracted text");
    let target = Annotation::TextHighlight(highlight.clone()).to_ref();
    doc.page_mut(2)
        .expect("page 2")
        .put(Annotation::TextHighlight(highlight));
    (DocMetaStore::new(doc), target)
}

fn create_comment(store: &mut DocMetaStore, parent: &ParentRef, body: &str) -> AnnotationRef {
    store
        .apply(Intent::Comment(CommentMutation::Create {
            parent: parent.clone(),
            body: Html::from(body),
        }))
        .expect("create comment")
        .target
}

#[test]
fn comment_create_update_delete_under_highlight() {
    let (mut store, highlight) = store_with_highlight();
    let parent = ParentRef::from(highlight.clone());

    let comment = create_comment(&mut store, &parent, "first");
    assert_eq!(comment.page, 2);
    assert_eq!(comment.kind, AnnotationType::Comment);
    assert_eq!(store.revision(), 1);

    let applied = store
        .apply(Intent::Comment(CommentMutation::Update {
            parent: parent.clone(),
            body: Html::from("second"),
            existing: comment.clone(),
        }))
        .expect("update");
    assert_eq!(applied.change, ChangeKind::Updated);
    assert_eq!(applied.target, comment);

    let comments = store.doc().comments_of(&parent);
    assert_eq!(comments.len(), 1);
    assert_eq!(comments[0].body.as_str(), "second");
    assert_eq!(comments[0].id, comment.id);

    store
        .apply(Intent::Comment(CommentMutation::Delete {
            parent: parent.clone(),
            existing: comment.clone(),
        }))
        .expect("delete");
    assert!(!store.doc().contains(&comment));
    assert_eq!(store.revision(), 3);
}

#[test]
fn flashcard_fields_are_validated_and_replaced() {
    let (mut store, highlight) = store_with_highlight();
    let parent = ParentRef::from(highlight);

    let err = store
        .apply(Intent::Flashcard(FlashcardMutation::Create {
            parent: parent.clone(),
            flashcard_type: FlashcardType::BasicFrontBack,
            fields: FlashcardFields::cloze("{{c1::x}}"),
        }))
        .expect_err("missing front");
    assert_eq!(
        err,
        StoreError::MissingField {
            flashcard_type: FlashcardType::BasicFrontBack,
            field: "front",
        }
    );
    assert_eq!(store.revision(), 0);

    let card = store
        .apply(Intent::Flashcard(FlashcardMutation::Create {
            parent: parent.clone(),
            flashcard_type: FlashcardType::BasicFrontBack,
            fields: FlashcardFields::front_back("Q", "A"),
        }))
        .expect("create")
        .target;

    store
        .apply(Intent::Flashcard(FlashcardMutation::Update {
            parent: parent.clone(),
            flashcard_type: FlashcardType::Cloze,
            fields: FlashcardFields::cloze("The {{c1::sky}} is blue"),
            existing: card.clone(),
        }))
        .expect("update");

    let cards = store.doc().flashcards_of(&parent);
    assert_eq!(cards.len(), 1);
    assert_eq!(cards[0].id, card.id);
    assert_eq!(cards[0].flashcard_type, FlashcardType::Cloze);
    assert_eq!(
        cards[0].fields.get("text").map(Html::as_str),
        Some("The {{c1::sky}} is blue")
    );
}

#[test]
fn text_highlight_revise_then_revert_restores_extracted_text() {
    let (mut store, highlight) = store_with_highlight();

    store
        .apply(Intent::TextHighlight(TextHighlightMutation::Update {
            text_highlight: highlight.clone(),
            body: Html::from("edited"),
        }))
        .expect("revise");
    let Some(Annotation::TextHighlight(th)) = store.doc().annotation(&highlight) else {
        panic!("highlight missing");
    };
    assert_eq!(th.current_text().as_str(), "edited");

    store
        .apply(Intent::TextHighlight(TextHighlightMutation::Revert {
            text_highlight: highlight.clone(),
        }))
        .expect("revert");
    let Some(Annotation::TextHighlight(th)) = store.doc().annotation(&highlight) else {
        panic!("highlight missing");
    };
    assert_eq!(th.revised_text, None);
    assert_eq!(th.current_text().as_str(), "extracted text");

    let again = store
        .apply(Intent::TextHighlight(TextHighlightMutation::Revert {
            text_highlight: highlight,
        }))
        .expect("revert twice");
    assert!(!again.changed);
    assert_eq!(store.revision(), 2);
}

#[test]
fn invalid_references_are_rejected_without_mutation() {
    let (mut store, highlight) = store_with_highlight();
    let before = store.snapshot();

    let ghost = AnnotationRef::new(2, AnnotationType::Comment, AnnotationId::new("ghost"));
    let err = store
        .apply(Intent::Comment(CommentMutation::Update {
            parent: ParentRef::from(highlight.clone()),
            body: Html::from("x"),
            existing: ghost.clone(),
        }))
        .expect_err("unknown comment");
    assert_eq!(err, StoreError::InvalidReference(ghost));

    let err = store
        .apply(Intent::Comment(CommentMutation::Create {
            parent: ParentRef::Page(99),
            body: Html::from("x"),
        }))
        .expect_err("unknown page");
    assert_eq!(err, StoreError::MissingParent(ParentRef::Page(99)));

    let err = store
        .apply(Intent::TextHighlight(TextHighlightMutation::Revert {
            text_highlight: AnnotationRef::new(2, AnnotationType::Comment, highlight.id.clone()),
        }))
        .expect_err("wrong kind");
    assert!(matches!(err, StoreError::KindMismatch { .. }));

    let err = store
        .apply(Intent::Delete(AnnotationRef::new(
            42,
            AnnotationType::TextHighlight,
            highlight.id.clone(),
        )))
        .expect_err("unknown page");
    assert_eq!(err, StoreError::MissingPage(42));

    assert_eq!(store.snapshot(), before);
}

#[test]
fn comment_update_with_foreign_parent_is_rejected() {
    let (mut store, highlight) = store_with_highlight();
    let comment = create_comment(&mut store, &ParentRef::from(highlight), "mine");

    let err = store
        .apply(Intent::Comment(CommentMutation::Update {
            parent: ParentRef::Page(2),
            body: Html::from("hijack"),
            existing: comment.clone(),
        }))
        .expect_err("parent mismatch");
    assert!(matches!(err, StoreError::ParentMismatch { .. }));
}

#[test]
fn generic_delete_cascades_to_attached_annotations() {
    let (mut store, highlight) = store_with_highlight();
    let parent = ParentRef::from(highlight.clone());
    let c1 = create_comment(&mut store, &parent, "one");
    let c2 = create_comment(&mut store, &parent, "two");
    let unrelated = create_comment(&mut store, &ParentRef::Page(2), "page note");

    let applied = store.apply(Intent::Delete(highlight.clone())).expect("delete");
    assert_eq!(applied.change, ChangeKind::Deleted);
    assert_eq!(applied.cascaded.len(), 2);
    assert!(applied.cascaded.contains(&c1));
    assert!(applied.cascaded.contains(&c2));

    assert!(!store.doc().contains(&highlight));
    assert!(!store.doc().contains(&c1));
    assert!(store.doc().contains(&unrelated));

    let again = store.apply(Intent::Delete(highlight)).expect("delete again");
    assert!(!again.changed);
}

#[test]
fn generic_update_replaces_in_place_and_keeps_id() {
    let (mut store, highlight) = store_with_highlight();
    let Some(Annotation::TextHighlight(mut th)) = store.doc().annotation(&highlight) else {
        panic!("highlight missing");
    };
    th.color = Some("yellow".to_string());
    th.tags.push("important".to_string());

    store
        .apply(Intent::Update(Annotation::TextHighlight(th)))
        .expect("update");

    let page = store.doc().page(2).expect("page");
    assert_eq!(page.text_highlights.len(), 1);
    let stored = page.text_highlights.get(&highlight.id).expect("same id");
    assert_eq!(stored.color.as_deref(), Some("yellow"));
    assert_eq!(stored.tags, vec!["important".to_string()]);

    let missing = TextHighlight::new(2, "never stored");
    let err = store
        .apply(Intent::Update(Annotation::TextHighlight(missing)))
        .expect_err("absent");
    assert!(matches!(err, StoreError::InvalidReference(_)));
}

#[test]
fn snapshots_are_not_touched_by_later_mutations() {
    let (mut store, highlight) = store_with_highlight();
    let before = store.snapshot();

    create_comment(&mut store, &ParentRef::from(highlight), "after");

    assert_eq!(before.revision, 0);
    assert_eq!(before.page(2).expect("page").comments.len(), 0);
    assert_eq!(store.doc().page(2).expect("page").comments.len(), 1);
}

#[test]
fn generic_delete_cascades_through_nested_attachments() {
    let (mut store, highlight) = store_with_highlight();
    let comment = create_comment(&mut store, &ParentRef::from(highlight.clone()), "on highlight");
    let card = store
        .apply(Intent::Flashcard(FlashcardMutation::Create {
            parent: ParentRef::from(comment.clone()),
            flashcard_type: FlashcardType::Cloze,
            fields: FlashcardFields::cloze("{{c1::nested}}"),
        }))
        .expect("flashcard on comment")
        .target;
    let reply = create_comment(&mut store, &ParentRef::from(card.clone()), "on flashcard");
    let page_note = create_comment(&mut store, &ParentRef::Page(2), "page note");

    let applied = store.apply(Intent::Delete(highlight.clone())).expect("delete");
    assert_eq!(applied.cascaded.len(), 3);
    for removed in [&comment, &card, &reply] {
        assert!(applied.cascaded.contains(removed));
        assert!(!store.doc().contains(removed));
    }
    assert!(!store.doc().contains(&highlight));
    assert!(store.doc().contains(&page_note));

    let page = store.doc().page(2).expect("page");
    assert!(page.comments.values().all(|c| store.doc().parent_exists(&c.parent)));
    assert!(page.flashcards.values().all(|f| store.doc().parent_exists(&f.parent)));
}

#[test]
fn flashcard_delete_checks_parent_and_is_idempotent() {
    let (mut store, highlight) = store_with_highlight();
    let parent = ParentRef::from(highlight);
    let card = store
        .apply(Intent::Flashcard(FlashcardMutation::Create {
            parent: parent.clone(),
            flashcard_type: FlashcardType::BasicFrontBack,
            fields: FlashcardFields::front_back("Q", "A"),
        }))
        .expect("create")
        .target;

    let err = store
        .apply(Intent::Flashcard(FlashcardMutation::Delete {
            parent: ParentRef::Page(2),
            existing: card.clone(),
        }))
        .expect_err("parent mismatch");
    assert!(matches!(err, StoreError::ParentMismatch { .. }));
    assert!(store.doc().contains(&card));

    let delete = Intent::Flashcard(FlashcardMutation::Delete {
        parent: parent.clone(),
        existing: card.clone(),
    });
    let first = store.apply(delete.clone()).expect("delete");
    assert!(first.changed);
    assert_eq!(first.change, ChangeKind::Deleted);
    assert!(!store.doc().contains(&card));
    assert!(store.doc().flashcards_of(&parent).is_empty());

    let once = store.snapshot();
    let again = store.apply(delete).expect("delete again");
    assert!(!again.changed);
    assert_eq!(again.revision, first.revision);
    assert_eq!(store.snapshot(), once);
}
