//! Draft lifecycle engine
//!
//! The state machine behind drafts. A record is either published or a draft:
//!
//! ```text
//!               create_draft (clone)
//!   PUBLISHED ----------------------> DRAFT (parent = original)
//!       ^                               |
//!       |   publish (merge into parent, |
//!       +---- delete draft) ------------+
//!
//!   unsaved PUBLISHED --create_draft--> DRAFT (no parent, same record)
//!   DRAFT (no parent) ----publish-----> PUBLISHED (same record, persisted)
//! ```
//!
//! Both transitions run their hooks and body inside one store transaction,
//! so a failure anywhere leaves storage as it was.

use std::ops::{Deref, DerefMut};
use std::time::Instant;

use crate::errors::{DraftError, Result};
use crate::guard::{DraftGuard, FieldErrors, SaveOutcome};
use crate::hooks::{run_hooks, Hook, HookContext, HookRegistry, Timing, Transition};
use crate::model::{Filter, Record};
use crate::registry::{DraftConfig, DraftOptions, DraftRegistry};
use crate::store::{transaction, RecordStore};
use crate::{log_op_end, log_op_error, log_op_start};

/// Name of the built-in after-publish hook enabled by `destroy_drafts_on_publish`
pub const SIBLING_CLEANUP_HOOK: &str = "destroy_sibling_drafts";

/// Outcome of `create_draft`
///
/// An unsaved record becomes a draft in place, so the caller's own record is
/// handed back. A persisted record is cloned and the new draft is returned.
#[derive(Debug)]
pub enum Drafted<'r> {
    InPlace(&'r mut Record),
    Cloned(Record),
}

impl Drafted<'_> {
    pub fn is_in_place(&self) -> bool {
        matches!(self, Drafted::InPlace(_))
    }

    /// Take the draft by value, cloning it if it was drafted in place
    pub fn into_owned(self) -> Record {
        match self {
            Drafted::InPlace(record) => record.clone(),
            Drafted::Cloned(record) => record,
        }
    }
}

impl Deref for Drafted<'_> {
    type Target = Record;

    fn deref(&self) -> &Record {
        match self {
            Drafted::InPlace(record) => &**record,
            Drafted::Cloned(record) => record,
        }
    }
}

impl DerefMut for Drafted<'_> {
    fn deref_mut(&mut self) -> &mut Record {
        match self {
            Drafted::InPlace(record) => &mut **record,
            Drafted::Cloned(record) => record,
        }
    }
}

/// Draft lifecycle engine
///
/// Owns the draft registry and hook lists. Storage is passed to each
/// operation so the same engine can serve any number of stores.
#[derive(Debug, Clone)]
pub struct DraftEngine {
    registry: DraftRegistry,
    hooks: HookRegistry,
    guard: DraftGuard,
    sibling_cleanup: Hook,
}

impl Default for DraftEngine {
    fn default() -> Self {
        Self::with_registry(DraftRegistry::new())
    }
}

impl DraftEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an engine around an existing registry, e.g. one loaded from TOML
    pub fn with_registry(registry: DraftRegistry) -> Self {
        Self {
            registry,
            hooks: HookRegistry::new(),
            guard: DraftGuard,
            sibling_cleanup: Hook::new(SIBLING_CLEANUP_HOOK, Timing::After, |ctx| {
                delete_sibling_drafts(&mut *ctx.store, ctx.subject).map(|_| ())
            }),
        }
    }

    pub fn registry(&self) -> &DraftRegistry {
        &self.registry
    }

    pub fn hooks(&self) -> &HookRegistry {
        &self.hooks
    }

    /// Register a type for drafts or merge options into its configuration
    pub fn configure(&mut self, record_type: impl Into<String>, options: DraftOptions) {
        self.registry.configure(record_type, options);
    }

    /// Append a hook for a type and transition
    pub fn register_hook<F>(
        &mut self,
        record_type: impl Into<String>,
        transition: Transition,
        timing: Timing,
        name: impl Into<String>,
        func: F,
    ) where
        F: Fn(&mut HookContext<'_>) -> Result<()> + Send + Sync + 'static,
    {
        self.add_hook(record_type, transition, Hook::new(name, timing, func));
    }

    /// Append a prebuilt hook
    pub fn add_hook(&mut self, record_type: impl Into<String>, transition: Transition, hook: Hook) {
        self.hooks.register(record_type, transition, hook);
    }

    /// All published records of a type
    ///
    /// # Errors
    ///
    /// `NotConfigured` for unknown types, or store failures.
    pub fn list_published(&self, store: &dyn RecordStore, record_type: &str) -> Result<Vec<Record>> {
        self.registry.config_for(record_type)?;
        store.query_where(record_type, &Filter::published())
    }

    /// All drafts of a type, including new-record drafts
    ///
    /// # Errors
    ///
    /// `NotConfigured` for unknown types, or store failures.
    pub fn list_drafts(&self, store: &dyn RecordStore, record_type: &str) -> Result<Vec<Record>> {
        self.registry.config_for(record_type)?;
        store.query_where(record_type, &Filter::drafts())
    }

    /// Drafts cloned from `original`; empty for unsaved records
    ///
    /// # Errors
    ///
    /// `NotConfigured` for unknown types, or store failures.
    pub fn drafts_of(&self, store: &dyn RecordStore, original: &Record) -> Result<Vec<Record>> {
        self.registry.config_for(&original.record_type)?;
        match original.id {
            Some(id) => store.query_where(&original.record_type, &Filter::drafts_of(id)),
            None => Ok(Vec::new()),
        }
    }

    /// Start a draft of `record`
    ///
    /// # Errors
    ///
    /// - `NotConfigured` if the record's type is not registered
    /// - `AlreadyDraft` if the record is already a draft
    /// - any hook or store error; nothing is persisted in that case
    pub fn create_draft<'r>(
        &self,
        store: &mut dyn RecordStore,
        record: &'r mut Record,
    ) -> Result<Drafted<'r>> {
        let started = Instant::now();
        let record_type = record.record_type.clone();
        let record_id = record.id;
        log_op_start!("create_draft", record_type = %record_type, record_id = ?record_id);

        let result = self.create_draft_inner(store, record);

        let duration_ms = started.elapsed().as_millis() as u64;
        match &result {
            Ok(draft) => log_op_end!(
                "create_draft",
                duration_ms = duration_ms,
                record_type = %record_type,
                record_id = ?record_id,
                draft_id = ?draft.id,
                in_place = draft.is_in_place()
            ),
            Err(err) => log_op_error!(
                "create_draft",
                err.clone(),
                duration_ms = duration_ms,
                record_type = %record_type,
                record_id = ?record_id
            ),
        }
        result
    }

    fn create_draft_inner<'r>(
        &self,
        store: &mut dyn RecordStore,
        record: &'r mut Record,
    ) -> Result<Drafted<'r>> {
        let config = self.registry.config_for(&record.record_type)?;
        if record.is_draft {
            return Err(DraftError::AlreadyDraft {
                record_type: record.record_type.clone(),
                record_id: record.id,
            });
        }

        if !record.is_persisted() {
            // Nothing to preserve: the record itself becomes the draft
            record.is_draft = true;
            let hooks = transaction(store, |tx| {
                self.run_hooks_at(tx, Transition::CreateDraft, Timing::Before, &*record, None, None, None)?;
                self.run_hooks_at(
                    tx,
                    Transition::CreateDraft,
                    Timing::After,
                    &*record,
                    Some(&*record),
                    None,
                    None,
                )
            });
            if let Err(err) = hooks {
                record.is_draft = false;
                return Err(err);
            }
            self.run_committed_hooks(store, Transition::CreateDraft, &*record, &*record, None);
            return Ok(Drafted::InPlace(record));
        }

        let draft = transaction(store, |tx| {
            self.run_hooks_at(tx, Transition::CreateDraft, Timing::Before, &*record, None, None, None)?;

            let mut draft = record.duplicate(config.association_names());
            draft.is_draft = true;
            draft.draft_parent_id = record.id;
            tx.persist(&mut draft)?;

            self.run_hooks_at(
                tx,
                Transition::CreateDraft,
                Timing::After,
                &*record,
                Some(&draft),
                None,
                None,
            )?;
            Ok(draft)
        })?;

        self.run_committed_hooks(store, Transition::CreateDraft, &*record, &draft, None);
        Ok(Drafted::Cloned(draft))
    }

    /// Publish a draft, consuming it
    ///
    /// A draft without a parent is promoted in place and returned. A draft
    /// with a parent is merged into it and deleted; the updated parent is
    /// returned.
    ///
    /// # Errors
    ///
    /// - `NotConfigured` if the draft's type is not registered
    /// - `NotADraft` if the record is published
    /// - `ParentNotFound` if the original no longer exists
    /// - any hook or store error; the transaction is rolled back
    pub fn publish(&self, store: &mut dyn RecordStore, draft: Record) -> Result<Record> {
        let started = Instant::now();
        let record_type = draft.record_type.clone();
        let record_id = draft.id;
        let parent_id = draft.draft_parent_id;
        log_op_start!(
            "publish",
            record_type = %record_type,
            record_id = ?record_id,
            parent_id = ?parent_id
        );

        let result = self.publish_inner(store, draft);

        let duration_ms = started.elapsed().as_millis() as u64;
        match &result {
            Ok(target) => log_op_end!(
                "publish",
                duration_ms = duration_ms,
                record_type = %record_type,
                record_id = ?record_id,
                target_id = ?target.id
            ),
            Err(err) => log_op_error!(
                "publish",
                err.clone(),
                duration_ms = duration_ms,
                record_type = %record_type,
                record_id = ?record_id
            ),
        }
        result
    }

    fn publish_inner(&self, store: &mut dyn RecordStore, draft: Record) -> Result<Record> {
        let config = self.registry.config_for(&draft.record_type)?;
        if !draft.is_draft {
            return Err(DraftError::NotADraft {
                record_type: draft.record_type.clone(),
                record_id: draft.id,
            });
        }
        let cleanup = config
            .destroy_drafts_on_publish
            .then_some(&self.sibling_cleanup);

        let (target, previous) = match draft.draft_parent_id {
            None => transaction(store, |tx| {
                self.run_hooks_at(tx, Transition::Publish, Timing::Before, &draft, None, None, None)?;

                let mut promoted = draft.clone();
                promoted.is_draft = false;
                tx.persist(&mut promoted)?;

                self.run_hooks_at(
                    tx,
                    Transition::Publish,
                    Timing::After,
                    &draft,
                    Some(&promoted),
                    None,
                    cleanup,
                )?;
                Ok((promoted, None))
            })?,
            Some(parent_id) => transaction(store, |tx| {
                self.run_hooks_at(tx, Transition::Publish, Timing::Before, &draft, None, None, None)?;

                let previous = tx.find(&draft.record_type, parent_id)?.ok_or_else(|| {
                    DraftError::ParentNotFound {
                        record_type: draft.record_type.clone(),
                        parent_id,
                    }
                })?;
                let mut target = previous.clone();
                merge_attributes(config, &draft, &mut target);
                // Fresh copies: the draft's own children are deleted with it
                let copies = draft.duplicate(config.association_names());
                target.associations.extend(copies.associations);

                tx.delete(&draft)?;
                tx.persist(&mut target)?;

                self.run_hooks_at(
                    tx,
                    Transition::Publish,
                    Timing::After,
                    &draft,
                    Some(&target),
                    Some(&previous),
                    cleanup,
                )?;
                Ok((target, Some(previous)))
            })?,
        };

        self.run_committed_hooks(store, Transition::Publish, &draft, &target, previous.as_ref());
        Ok(target)
    }

    /// Delete every draft sharing `record`'s parent
    ///
    /// Returns the number of drafts deleted; `0` when the record has no parent.
    ///
    /// # Errors
    ///
    /// `NotConfigured` for unknown types, or store failures.
    pub fn destroy_sibling_drafts(&self, store: &mut dyn RecordStore, record: &Record) -> Result<usize> {
        let started = Instant::now();
        log_op_start!(
            "destroy_sibling_drafts",
            record_type = %record.record_type,
            record_id = ?record.id
        );

        let result = self
            .registry
            .config_for(&record.record_type)
            .and_then(|_| delete_sibling_drafts(store, record));

        let duration_ms = started.elapsed().as_millis() as u64;
        match &result {
            Ok(destroyed) => log_op_end!(
                "destroy_sibling_drafts",
                duration_ms = duration_ms,
                record_type = %record.record_type,
                record_id = ?record.id,
                destroyed = *destroyed
            ),
            Err(err) => log_op_error!(
                "destroy_sibling_drafts",
                err.clone(),
                duration_ms = duration_ms,
                record_type = %record.record_type,
                record_id = ?record.id
            ),
        }
        result
    }

    /// Persist a record behind the guard policy
    ///
    /// A published original with drafts is not written unless its type
    /// allows updates with drafts; the violation comes back as
    /// `SaveOutcome::Rejected`. Unconfigured types are saved unguarded.
    ///
    /// # Errors
    ///
    /// Store failures only.
    pub fn save(&self, store: &mut dyn RecordStore, record: &mut Record) -> Result<SaveOutcome> {
        let started = Instant::now();
        let record_type = record.record_type.clone();
        log_op_start!("save", record_type = %record_type, record_id = ?record.id);

        let result = self.save_inner(store, record);

        let duration_ms = started.elapsed().as_millis() as u64;
        match &result {
            Ok(outcome) => log_op_end!(
                "save",
                duration_ms = duration_ms,
                record_type = %record_type,
                record_id = ?record.id,
                saved = outcome.is_saved()
            ),
            Err(err) => log_op_error!(
                "save",
                err.clone(),
                duration_ms = duration_ms,
                record_type = %record_type,
                record_id = ?record.id
            ),
        }
        result
    }

    fn save_inner(&self, store: &mut dyn RecordStore, record: &mut Record) -> Result<SaveOutcome> {
        if let Ok(config) = self.registry.config_for(&record.record_type) {
            if let Some(violation) = self.guard.check(&*store, config, record)? {
                tracing::warn!(
                    record_type = %record.record_type,
                    record_id = ?record.id,
                    code = violation.code,
                    "write refused by draft guard"
                );
                let mut errors = FieldErrors::new();
                errors.push(violation);
                return Ok(SaveOutcome::Rejected(errors));
            }
        }
        store.persist(record)?;
        Ok(SaveOutcome::Saved)
    }

    /// Committed hooks see the store outside the transition's transaction;
    /// the transition stands even when one of them fails
    fn run_committed_hooks(
        &self,
        store: &mut dyn RecordStore,
        transition: Transition,
        subject: &Record,
        result: &Record,
        previous: Option<&Record>,
    ) {
        let mut ctx = HookContext {
            record_type: &subject.record_type,
            transition,
            timing: Timing::Committed,
            subject,
            result: Some(result),
            previous,
            store,
        };
        for hook in self
            .hooks
            .hooks_for(&subject.record_type, transition, Timing::Committed)
        {
            if let Err(err) = hook.call(&mut ctx) {
                tracing::warn!(
                    hook = hook.name(),
                    transition = transition.as_str(),
                    record_type = %subject.record_type,
                    error = %err,
                    "committed hook failed"
                );
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn run_hooks_at(
        &self,
        store: &mut dyn RecordStore,
        transition: Transition,
        timing: Timing,
        subject: &Record,
        result: Option<&Record>,
        previous: Option<&Record>,
        builtin: Option<&Hook>,
    ) -> Result<()> {
        let mut ctx = HookContext {
            record_type: &subject.record_type,
            transition,
            timing,
            subject,
            result,
            previous,
            store,
        };
        let registered = self.hooks.hooks_for(&subject.record_type, transition, timing);
        run_hooks(builtin.into_iter().chain(registered), &mut ctx)
    }
}

/// Copy content attributes from `draft` onto `target`
///
/// Ignored attributes on the target are left alone. Other attributes the
/// draft no longer has are removed, so the target ends up with exactly the
/// draft's content.
fn merge_attributes(config: &DraftConfig, draft: &Record, target: &mut Record) {
    target
        .attributes
        .retain(|name, _| config.is_ignored(name) || draft.attributes.contains_key(name));
    for (name, value) in &draft.attributes {
        if !config.is_ignored(name) {
            target.attributes.insert(name.clone(), value.clone());
        }
    }
}

fn delete_sibling_drafts(store: &mut dyn RecordStore, record: &Record) -> Result<usize> {
    let Some(parent_id) = record.draft_parent_id else {
        return Ok(0);
    };
    let destroyed = store.delete_where(&record.record_type, &Filter::drafts_of(parent_id))?;
    tracing::info!(
        record_type = %record.record_type,
        parent_id = parent_id,
        destroyed = destroyed,
        "destroyed sibling drafts"
    );
    Ok(destroyed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::json;

    fn engine() -> DraftEngine {
        let mut engine = DraftEngine::new();
        engine.configure(
            "widget",
            DraftOptions::new()
                .associations(["items"])
                .ignore_attributes(["slug"]),
        );
        engine
    }

    fn saved_widget(store: &mut MemoryStore) -> Record {
        let mut widget = Record::new("widget")
            .with_attribute("name", "Old")
            .with_attribute("slug", "old")
            .with_association("items", vec![Record::new("item").with_attribute("sku", "A")])
            .with_association("notes", vec![Record::new("note")]);
        store.persist(&mut widget).unwrap();
        widget
    }

    #[test]
    fn test_merge_attributes_respects_ignored_and_removals() {
        let config = engine().registry().config_for("widget").unwrap().clone();
        let mut target = Record::new("widget")
            .with_attribute("name", "Old")
            .with_attribute("slug", "old")
            .with_attribute("legacy", true);
        let draft = Record::new("widget")
            .with_attribute("name", "New")
            .with_attribute("slug", "new")
            .with_attribute("colour", "red");

        merge_attributes(&config, &draft, &mut target);

        assert_eq!(target.get("name"), Some(&json!("New")));
        assert_eq!(target.get("slug"), Some(&json!("old")));
        assert_eq!(target.get("colour"), Some(&json!("red")));
        assert!(target.get("legacy").is_none());
    }

    #[test]
    fn test_create_draft_clones_listed_associations_only() {
        let engine = engine();
        let mut store = MemoryStore::new();
        let mut widget = saved_widget(&mut store);

        let draft = engine.create_draft(&mut store, &mut widget).unwrap();

        assert!(!draft.is_in_place());
        let draft = draft.into_owned();
        assert!(draft.is_draft);
        assert_eq!(draft.draft_parent_id, widget.id);
        assert_eq!(draft.association("items").len(), 1);
        assert_ne!(draft.association("items")[0].id, widget.association("items")[0].id);
        assert!(draft.association("notes").is_empty());
    }

    #[test]
    fn test_create_draft_in_place_for_unsaved_record() {
        let engine = engine();
        let mut store = MemoryStore::new();
        let mut widget = Record::new("widget");

        let drafted = engine.create_draft(&mut store, &mut widget).unwrap();
        assert!(drafted.is_in_place());
        drop(drafted);

        assert!(widget.is_new_record_draft());
        assert!(store.is_empty());
    }

    #[test]
    fn test_publish_merges_and_consumes_draft() {
        let engine = engine();
        let mut store = MemoryStore::new();
        let mut widget = saved_widget(&mut store);
        let mut draft = engine
            .create_draft(&mut store, &mut widget)
            .unwrap()
            .into_owned();
        draft.set("name", "New");
        draft.set("slug", "new");
        let draft_id = draft.id.unwrap();

        let published = engine.publish(&mut store, draft).unwrap();

        assert_eq!(published.id, widget.id);
        assert_eq!(published.get_str("name"), Some("New"));
        assert_eq!(published.get_str("slug"), Some("old"));
        assert!(!store.contains(draft_id));
        // Unpropagated association survives on the original
        let reloaded = store.find("widget", widget.id.unwrap()).unwrap().unwrap();
        assert_eq!(reloaded.association("notes").len(), 1);
    }

    #[test]
    fn test_sibling_cleanup_hook_is_first_after_hook() {
        let mut engine = engine();
        engine.configure("widget", DraftOptions::new().destroy_drafts_on_publish(true));
        engine.register_hook(
            "widget",
            Transition::Publish,
            Timing::After,
            "count_siblings",
            |ctx| {
                let parent = ctx.subject.draft_parent_id.unwrap_or_default();
                let left = ctx
                    .store
                    .count_where(ctx.record_type, &Filter::drafts_of(parent))?;
                if left == 0 {
                    Ok(())
                } else {
                    Err(DraftError::Internal {
                        message: format!("{} siblings left", left),
                    })
                }
            },
        );
        let mut store = MemoryStore::new();
        let mut widget = saved_widget(&mut store);
        let first = engine
            .create_draft(&mut store, &mut widget)
            .unwrap()
            .into_owned();
        engine.create_draft(&mut store, &mut widget).unwrap();

        engine.publish(&mut store, first).unwrap();

        assert!(engine.drafts_of(&store, &widget).unwrap().is_empty());
    }
}
