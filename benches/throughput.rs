use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

use docmeta::{
    annotation::{AnnotationRef, Html, ParentRef},
    core::{doc_meta::DocMeta, store::DocMetaStore},
    mutation::{CommentMutation, Intent},
    types::Fingerprint,
};

const PAGES: u32 = 200;

fn create(page: u32, i: u64) -> Intent {
    Intent::Comment(CommentMutation::Create {
        parent: ParentRef::Page(page),
        body: Html::new(format!("<p>comment {i}</p>")),
    })
}

fn populated(n: u64) -> (DocMetaStore, Vec<AnnotationRef>) {
    let mut store = DocMetaStore::new(DocMeta::new(Fingerprint::new("bench"), PAGES));
    let mut refs = Vec::with_capacity(n as usize);
    for i in 0..n {
        let page = (i % u64::from(PAGES)) as u32 + 1;
        refs.push(store.apply(create(page, i)).expect("create").target);
    }
    (store, refs)
}

fn bench_creates(c: &mut Criterion) {
    c.bench_function("store_create_10k", |b| {
        b.iter(|| populated(10_000));
    });
}

fn bench_updates(c: &mut Criterion) {
    c.bench_function("store_update_10k", |b| {
        b.iter(|| {
            let (mut store, refs) = populated(10_000);
            for (i, existing) in refs.into_iter().enumerate() {
                let _ = store
                    .apply(Intent::Comment(CommentMutation::Update {
                        parent: ParentRef::Page(existing.page),
                        body: Html::new(format!("<p>edited {i}</p>")),
                        existing,
                    }))
                    .expect("update");
            }
        });
    });
}

// Each snapshot held across a mutation forces a copy of the document.
fn bench_snapshot_then_mutate(c: &mut Criterion) {
    let mut group = c.benchmark_group("snapshot_then_mutate");
    for n in [100u64, 1_000, 10_000] {
        let (store, _) = populated(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &store, |b, store| {
            b.iter(|| {
                let mut store = DocMetaStore::from_shared(store.snapshot());
                let held = store.snapshot();
                let _ = store.apply(create(1, n)).expect("create");
                held
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_creates, bench_updates, bench_snapshot_then_mutate);
criterion_main!(benches);
