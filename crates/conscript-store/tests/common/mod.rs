use conscript_core::{DraftEngine, DraftOptions, Record, RecordStore};
use conscript_store::SqliteRecordStore;

/// Fresh migrated in-memory store
#[allow(dead_code)]
pub fn setup_store() -> SqliteRecordStore {
    SqliteRecordStore::open_in_memory().expect("in-memory store")
}

/// Engine with `post` propagating `comments` and ignoring `slug`
#[allow(dead_code)]
pub fn post_engine() -> DraftEngine {
    let mut engine = DraftEngine::new();
    engine.configure(
        "post",
        DraftOptions::new()
            .associations(["comments"])
            .ignore_attributes(["slug"]),
    );
    engine
}

/// Persist a published post with one comment and one (unpropagated) tag
#[allow(dead_code)]
pub fn saved_post(store: &mut dyn RecordStore, title: &str) -> Record {
    let mut post = Record::new("post")
        .with_attribute("title", title)
        .with_attribute("slug", title.to_lowercase())
        .with_association(
            "comments",
            vec![Record::new("comment").with_attribute("body", "first")],
        )
        .with_association("tags", vec![Record::new("tag").with_attribute("label", "news")]);
    store.persist(&mut post).unwrap();
    post
}
