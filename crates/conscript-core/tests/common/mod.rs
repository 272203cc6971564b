use conscript_core::errors::{DraftError, Result};
use conscript_core::model::{Filter, Record, RecordId};
use conscript_core::{DraftEngine, DraftOptions, MemoryStore, RecordStore};

/// Record type used across the integration tests
#[allow(dead_code)]
pub const POST: &str = "post";

/// Engine with `post` configured to propagate `comments` and ignore `slug`
#[allow(dead_code)]
pub fn post_engine() -> DraftEngine {
    let mut engine = DraftEngine::new();
    engine.configure(
        POST,
        DraftOptions::new()
            .associations(["comments"])
            .ignore_attributes(["slug"]),
    );
    engine
}

/// Persist a published post with one comment and one tag
///
/// `tags` is not propagated, so drafts start without it.
#[allow(dead_code)]
pub fn saved_post(store: &mut dyn RecordStore, title: &str) -> Record {
    let mut post = Record::new(POST)
        .with_attribute("title", title)
        .with_attribute("slug", title.to_lowercase().replace(' ', "-"))
        .with_association(
            "comments",
            vec![Record::new("comment").with_attribute("body", "first")],
        )
        .with_association("tags", vec![Record::new("tag").with_attribute("label", "news")]);
    store.persist(&mut post).unwrap();
    post
}

/// Number of drafts in storage cloned from `original`
#[allow(dead_code)]
pub fn draft_count(store: &dyn RecordStore, original: &Record) -> usize {
    store
        .count_where(&original.record_type, &Filter::drafts_of(original.id.unwrap()))
        .unwrap()
}

/// Memory store whose writes can be made to fail on demand
#[allow(dead_code)]
#[derive(Debug, Default)]
pub struct FailingStore {
    pub inner: MemoryStore,
    pub fail_persist: bool,
    pub fail_delete: bool,
}

#[allow(dead_code)]
impl FailingStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn injected(op: &str) -> DraftError {
        DraftError::persistence(op, "injected failure")
    }
}

impl RecordStore for FailingStore {
    fn find(&self, record_type: &str, id: RecordId) -> Result<Option<Record>> {
        self.inner.find(record_type, id)
    }

    fn persist(&mut self, record: &mut Record) -> Result<()> {
        if self.fail_persist {
            return Err(Self::injected("persist"));
        }
        self.inner.persist(record)
    }

    fn delete(&mut self, record: &Record) -> Result<()> {
        if self.fail_delete {
            return Err(Self::injected("delete"));
        }
        self.inner.delete(record)
    }

    fn delete_where(&mut self, record_type: &str, filter: &Filter) -> Result<usize> {
        if self.fail_delete {
            return Err(Self::injected("delete_where"));
        }
        self.inner.delete_where(record_type, filter)
    }

    fn query_where(&self, record_type: &str, filter: &Filter) -> Result<Vec<Record>> {
        self.inner.query_where(record_type, filter)
    }

    fn begin(&mut self) -> Result<()> {
        self.inner.begin()
    }

    fn commit(&mut self) -> Result<()> {
        self.inner.commit()
    }

    fn rollback(&mut self) -> Result<()> {
        self.inner.rollback()
    }
}
