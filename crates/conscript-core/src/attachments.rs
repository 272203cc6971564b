//! Attachment cleanup on publish
//!
//! Records refer to blobs by key through plain string attributes. Drafts
//! share those keys with their original until someone uploads a replacement,
//! so a blob can only be dropped once nothing points at it any more.
//! [`AttachmentJanitor`] plugs into the publish transition as a committed
//! hook and removes the keys a publish replaced. Blob removal cannot be
//! rolled back, so it waits until the publish has committed.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use crate::errors::{DraftError, Result};
use crate::hooks::{Hook, Timing};
use crate::model::{Filter, Record};
use crate::store::RecordStore;

/// Name of the hook returned by [`AttachmentJanitor::after_publish_hook`]
pub const JANITOR_HOOK: &str = "attachment_janitor";

/// Blob storage addressed by key
pub trait BlobStore: Send + Sync {
    /// Remove a blob; removing an unknown key is not an error
    fn remove(&self, key: &str) -> Result<()>;

    fn contains(&self, key: &str) -> Result<bool>;
}

/// Blob store kept in memory
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store bytes under a key, replacing any existing blob
    ///
    /// # Errors
    ///
    /// `Internal` if the lock is poisoned.
    pub fn put(&self, key: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Result<()> {
        self.lock()?.insert(key.into(), bytes.into());
        Ok(())
    }

    /// Stored keys, sorted
    ///
    /// # Errors
    ///
    /// `Internal` if the lock is poisoned.
    pub fn keys(&self) -> Result<Vec<String>> {
        Ok(self.lock()?.keys().cloned().collect())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, Vec<u8>>>> {
        self.blobs.lock().map_err(|_| DraftError::Internal {
            message: "blob store lock poisoned".to_string(),
        })
    }
}

impl BlobStore for MemoryBlobStore {
    fn remove(&self, key: &str) -> Result<()> {
        self.lock()?.remove(key);
        Ok(())
    }

    fn contains(&self, key: &str) -> Result<bool> {
        Ok(self.lock()?.contains_key(key))
    }
}

/// Removes blobs orphaned by a publish
#[derive(Clone)]
pub struct AttachmentJanitor {
    attributes: Vec<String>,
    blobs: Arc<dyn BlobStore>,
}

impl fmt::Debug for AttachmentJanitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttachmentJanitor")
            .field("attributes", &self.attributes)
            .finish_non_exhaustive()
    }
}

impl AttachmentJanitor {
    /// Watch the given attachment attributes, removing blobs from `blobs`
    pub fn new<I, S>(attributes: I, blobs: Arc<dyn BlobStore>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            attributes: attributes.into_iter().map(Into::into).collect(),
            blobs,
        }
    }

    pub fn attributes(&self) -> &[String] {
        &self.attributes
    }

    /// Hook to register on the publish transition of a record type
    ///
    /// Runs once the publish has committed. Only publishes into a parent can
    /// orphan a blob; promoting a new-record draft leaves the hook with
    /// nothing to do.
    pub fn after_publish_hook(&self) -> Hook {
        let janitor = self.clone();
        Hook::new(JANITOR_HOOK, Timing::Committed, move |ctx| {
            let (Some(previous), Some(published)) = (ctx.previous, ctx.result) else {
                return Ok(());
            };
            janitor.sweep(&*ctx.store, previous, published).map(|_| ())
        })
    }

    /// Remove every blob `previous` held that `published` replaced and that
    /// nothing else still references; returns the removed keys
    ///
    /// # Errors
    ///
    /// Store or blob store failures.
    pub fn sweep(
        &self,
        store: &dyn RecordStore,
        previous: &Record,
        published: &Record,
    ) -> Result<Vec<String>> {
        let mut removed = Vec::new();
        for attribute in &self.attributes {
            let Some(old_key) = previous.get_str(attribute) else {
                continue;
            };
            if is_referenced(store, published, attribute, old_key)? {
                continue;
            }
            self.blobs.remove(old_key)?;
            tracing::debug!(
                record_type = %published.record_type,
                record_id = ?published.id,
                attribute = %attribute,
                key = old_key,
                "removed orphaned attachment"
            );
            removed.push(old_key.to_string());
        }
        Ok(removed)
    }
}

/// Check whether `key` is still held in `attribute` by `target` or by any
/// draft of it
///
/// # Errors
///
/// Store failures while looking up drafts.
pub fn is_referenced(
    store: &dyn RecordStore,
    target: &Record,
    attribute: &str,
    key: &str,
) -> Result<bool> {
    if target.get_str(attribute) == Some(key) {
        return Ok(true);
    }
    let Some(id) = target.id else {
        return Ok(false);
    };
    let holders = store.count_where(
        &target.record_type,
        &Filter::drafts_of(id).with_attribute(attribute, key),
    )?;
    Ok(holders > 0)
}
