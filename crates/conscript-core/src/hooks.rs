//! Lifecycle hooks
//!
//! Ordered before/after callbacks around `create_draft` and `publish`. Hooks
//! let collaborators such as attachment cleanup or audit logging take part
//! in a transition without the engine knowing about them.
//!
//! Before and after hooks run inside the transition's store transaction. A
//! hook that returns `Err` stops the chain and the whole transition is
//! rolled back. Committed hooks run once that transaction has committed and
//! are the place for side effects a rollback cannot undo.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::errors::Result;
use crate::model::Record;
use crate::store::RecordStore;

/// Lifecycle transition a hook is attached to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transition {
    CreateDraft,
    Publish,
}

impl Transition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Transition::CreateDraft => "create_draft",
            Transition::Publish => "publish",
        }
    }
}

/// When a hook runs relative to the transition body and its transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Timing {
    Before,
    After,
    /// After the transaction committed; failures are logged, never rolled back
    Committed,
}

/// Everything a hook can see and touch
pub struct HookContext<'a> {
    pub record_type: &'a str,
    pub transition: Transition,
    pub timing: Timing,
    /// Record the transition was invoked on: the original for create_draft,
    /// the draft for publish
    pub subject: &'a Record,
    /// The new draft, or the record published into; None before the body runs
    pub result: Option<&'a Record>,
    /// The publish target as it was before the merge; only set after
    /// publishing into a parent
    pub previous: Option<&'a Record>,
    /// Store handle; inside the transition's transaction except for
    /// committed hooks
    pub store: &'a mut dyn RecordStore,
}

/// Hook callback signature
pub type HookFn = dyn Fn(&mut HookContext<'_>) -> Result<()> + Send + Sync;

/// A named hook with its timing
#[derive(Clone)]
pub struct Hook {
    name: String,
    timing: Timing,
    func: Arc<HookFn>,
}

impl Hook {
    pub fn new<F>(name: impl Into<String>, timing: Timing, func: F) -> Self
    where
        F: Fn(&mut HookContext<'_>) -> Result<()> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            timing,
            func: Arc::new(func),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn timing(&self) -> Timing {
        self.timing
    }

    /// Invoke the hook
    ///
    /// # Errors
    ///
    /// Whatever the hook returns, unchanged.
    pub fn call(&self, ctx: &mut HookContext<'_>) -> Result<()> {
        (self.func)(ctx)
    }
}

impl fmt::Debug for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hook")
            .field("name", &self.name)
            .field("timing", &self.timing)
            .finish_non_exhaustive()
    }
}

/// Hook lists keyed by record type and transition
#[derive(Debug, Clone, Default)]
pub struct HookRegistry {
    hooks: HashMap<(String, Transition), Vec<Hook>>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a hook; earlier registrations run first
    pub fn register(&mut self, record_type: impl Into<String>, transition: Transition, hook: Hook) {
        self.hooks
            .entry((record_type.into(), transition))
            .or_default()
            .push(hook);
    }

    /// Hooks for one type, transition and timing, in registration order
    pub fn hooks_for<'a>(
        &'a self,
        record_type: &str,
        transition: Transition,
        timing: Timing,
    ) -> impl Iterator<Item = &'a Hook> + 'a {
        self.hooks
            .get(&(record_type.to_string(), transition))
            .into_iter()
            .flatten()
            .filter(move |hook| hook.timing == timing)
    }

    /// Number of hooks registered for a type and transition
    pub fn len_for(&self, record_type: &str, transition: Transition) -> usize {
        self.hooks
            .get(&(record_type.to_string(), transition))
            .map_or(0, Vec::len)
    }
}

/// Run hooks in order, stopping at the first failure
///
/// # Errors
///
/// Returns the first hook error unchanged.
pub fn run_hooks<'h, I>(hooks: I, ctx: &mut HookContext<'_>) -> Result<()>
where
    I: IntoIterator<Item = &'h Hook>,
{
    for hook in hooks {
        tracing::debug!(
            hook = hook.name(),
            transition = ctx.transition.as_str(),
            timing = ?ctx.timing,
            record_type = ctx.record_type,
            "running hook"
        );
        if let Err(err) = hook.call(ctx) {
            tracing::warn!(hook = hook.name(), error = %err, "hook failed");
            return Err(err);
        }
    }
    Ok(())
}
