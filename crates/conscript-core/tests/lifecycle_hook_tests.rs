#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use std::sync::{Arc, Mutex};

use common::{draft_count, post_engine, saved_post, POST};
use conscript_core::errors::DraftError;
use conscript_core::{DraftOptions, MemoryStore, Record, RecordStore, Timing, Transition};

fn recorder(log: &Arc<Mutex<Vec<String>>>, label: &str) -> impl Fn(&mut conscript_core::HookContext<'_>) -> conscript_core::Result<()> + Send + Sync + 'static {
    let log = log.clone();
    let label = label.to_string();
    move |_ctx| {
        log.lock().unwrap().push(label.clone());
        Ok(())
    }
}

fn refuse(ctx: &mut conscript_core::HookContext<'_>) -> conscript_core::Result<()> {
    Err(DraftError::Hook {
        hook: "refuse".to_string(),
        message: format!("{} refused", ctx.transition.as_str()),
    })
}

#[test]
fn test_hooks_run_in_registration_order_around_body() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut engine = post_engine();
    engine.register_hook(POST, Transition::Publish, Timing::After, "a1", recorder(&log, "a1"));
    engine.register_hook(POST, Transition::Publish, Timing::Before, "b1", recorder(&log, "b1"));
    engine.register_hook(POST, Transition::Publish, Timing::Before, "b2", recorder(&log, "b2"));
    engine.register_hook(POST, Transition::Publish, Timing::After, "a2", recorder(&log, "a2"));
    engine.register_hook(POST, Transition::CreateDraft, Timing::Before, "c1", recorder(&log, "c1"));

    let mut store = MemoryStore::new();
    let mut original = saved_post(&mut store, "Hello");
    let draft = engine
        .create_draft(&mut store, &mut original)
        .unwrap()
        .into_owned();
    engine.publish(&mut store, draft).unwrap();

    assert_eq!(*log.lock().unwrap(), vec!["c1", "b1", "b2", "a1", "a2"]);
}

#[test]
fn test_hooks_are_scoped_to_record_type() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut engine = post_engine();
    engine.configure("page", DraftOptions::new());
    engine.register_hook("page", Transition::CreateDraft, Timing::Before, "page", recorder(&log, "page"));

    let mut store = MemoryStore::new();
    let mut original = saved_post(&mut store, "Hello");
    engine.create_draft(&mut store, &mut original).unwrap();

    assert!(log.lock().unwrap().is_empty());
}

#[test]
fn test_create_draft_context_exposes_original_and_draft() {
    let seen = Arc::new(Mutex::new(None));
    let mut engine = post_engine();
    let sink = seen.clone();
    engine.register_hook(POST, Transition::CreateDraft, Timing::After, "inspect", move |ctx| {
        let draft = ctx.result.expect("after hook sees the draft");
        *sink.lock().unwrap() = Some((ctx.subject.id, draft.draft_parent_id, draft.id.is_some()));
        Ok(())
    });

    let mut store = MemoryStore::new();
    let mut original = saved_post(&mut store, "Hello");
    engine.create_draft(&mut store, &mut original).unwrap();

    let (subject_id, parent_id, draft_saved) = seen.lock().unwrap().unwrap();
    assert_eq!(subject_id, original.id);
    assert_eq!(parent_id, original.id);
    assert!(draft_saved);
}

#[test]
fn test_publish_context_exposes_previous_state() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let mut engine = post_engine();
    let sink = seen.clone();
    engine.register_hook(POST, Transition::Publish, Timing::After, "inspect", move |ctx| {
        let previous = ctx.previous.and_then(|r| r.get_str("title")).map(str::to_string);
        let current = ctx.result.and_then(|r| r.get_str("title")).map(str::to_string);
        sink.lock().unwrap().push((previous, current));
        Ok(())
    });

    let mut store = MemoryStore::new();
    let mut original = saved_post(&mut store, "Hello");
    let mut draft = engine
        .create_draft(&mut store, &mut original)
        .unwrap()
        .into_owned();
    draft.set("title", "Goodbye");
    engine.publish(&mut store, draft).unwrap();

    assert_eq!(
        *seen.lock().unwrap(),
        vec![(Some("Hello".to_string()), Some("Goodbye".to_string()))]
    );
}

#[test]
fn test_failing_before_hook_aborts_create_draft() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut engine = post_engine();
    engine.register_hook(POST, Transition::CreateDraft, Timing::Before, "refuse", refuse);
    engine.register_hook(POST, Transition::CreateDraft, Timing::Before, "later", recorder(&log, "later"));

    let mut store = MemoryStore::new();
    let mut original = saved_post(&mut store, "Hello");
    let result = engine.create_draft(&mut store, &mut original);

    assert!(matches!(result, Err(DraftError::Hook { .. })));
    assert!(log.lock().unwrap().is_empty());
    assert_eq!(draft_count(&store, &original), 0);
}

#[test]
fn test_failing_after_hook_discards_persisted_draft() {
    let mut engine = post_engine();
    engine.register_hook(POST, Transition::CreateDraft, Timing::After, "refuse", refuse);

    let mut store = MemoryStore::new();
    let mut original = saved_post(&mut store, "Hello");
    let result = engine.create_draft(&mut store, &mut original);

    assert!(result.is_err());
    assert_eq!(draft_count(&store, &original), 0);
    assert_eq!(store.len(), 1);
}

#[test]
fn test_failing_hook_reverts_in_place_draft() {
    let mut engine = post_engine();
    engine.register_hook(POST, Transition::CreateDraft, Timing::After, "refuse", refuse);

    let mut store = MemoryStore::new();
    let mut fresh = Record::new(POST);
    let result = engine.create_draft(&mut store, &mut fresh);

    assert!(result.is_err());
    assert!(!fresh.is_draft);
}

#[test]
fn test_failing_after_publish_hook_rolls_back_merge() {
    let mut engine = post_engine();
    engine.register_hook(POST, Transition::Publish, Timing::After, "refuse", refuse);

    let mut store = MemoryStore::new();
    let mut original = saved_post(&mut store, "Hello");
    let mut draft = engine
        .create_draft(&mut store, &mut original)
        .unwrap()
        .into_owned();
    draft.set("title", "Goodbye");
    let draft_id = draft.id.unwrap();

    let result = engine.publish(&mut store, draft);

    assert!(matches!(result, Err(DraftError::Hook { .. })));
    let stored = store.find(POST, original.id.unwrap()).unwrap().unwrap();
    assert_eq!(stored.get_str("title"), Some("Hello"));
    assert!(store.find(POST, draft_id).unwrap().is_some());
}

#[test]
fn test_hook_writes_share_the_transition_transaction() {
    let mut engine = post_engine();
    engine.register_hook(POST, Transition::Publish, Timing::Before, "audit", |ctx| {
        let mut entry = Record::new("audit").with_attribute("action", "publish");
        ctx.store.persist(&mut entry)
    });
    engine.register_hook(POST, Transition::Publish, Timing::After, "refuse", refuse);

    let mut store = MemoryStore::new();
    let mut original = saved_post(&mut store, "Hello");
    let draft = engine
        .create_draft(&mut store, &mut original)
        .unwrap()
        .into_owned();

    assert!(engine.publish(&mut store, draft).is_err());
    assert!(store
        .query_where("audit", &conscript_core::Filter::all())
        .unwrap()
        .is_empty());
}

#[test]
fn test_committed_hooks_run_only_after_commit() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut engine = post_engine();
    engine.register_hook(POST, Transition::Publish, Timing::Committed, "done", recorder(&log, "done"));
    engine.register_hook(POST, Transition::Publish, Timing::After, "a1", recorder(&log, "a1"));

    let mut store = MemoryStore::new();
    let mut original = saved_post(&mut store, "Hello");
    let draft = engine
        .create_draft(&mut store, &mut original)
        .unwrap()
        .into_owned();
    engine.publish(&mut store, draft).unwrap();
    assert_eq!(*log.lock().unwrap(), vec!["a1", "done"]);

    engine.register_hook(POST, Transition::Publish, Timing::After, "refuse", refuse);
    let draft = engine
        .create_draft(&mut store, &mut original)
        .unwrap()
        .into_owned();
    assert!(engine.publish(&mut store, draft).is_err());
    assert_eq!(*log.lock().unwrap(), vec!["a1", "done", "a1"]);
}

#[test]
fn test_failing_committed_hook_keeps_publish() {
    let mut engine = post_engine();
    engine.register_hook(POST, Transition::Publish, Timing::Committed, "refuse", refuse);

    let mut store = MemoryStore::new();
    let mut original = saved_post(&mut store, "Hello");
    let mut draft = engine
        .create_draft(&mut store, &mut original)
        .unwrap()
        .into_owned();
    draft.set("title", "Goodbye");

    let published = engine.publish(&mut store, draft).unwrap();

    assert_eq!(published.get_str("title"), Some("Goodbye"));
    assert_eq!(draft_count(&store, &original), 0);
}
