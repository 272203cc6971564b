//! Draft registry
//!
//! Per-record-type draft configuration. A type takes part in the draft
//! lifecycle only after it has been passed through [`DraftRegistry::configure`],
//! either directly or from a TOML file.
//!
//! ```toml
//! [types.widget]
//! associations = ["items"]
//! ignore_attributes = ["slug"]
//! allow_update_with_drafts = false
//! destroy_drafts_on_publish = true
//! ```

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;

use serde::Deserialize;

use crate::errors::{DraftError, Result};
use crate::model::STRUCTURAL_ATTRIBUTES;

/// Options accepted by `configure`
///
/// List options are unioned with what is already configured; boolean
/// toggles replace the current value only when set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DraftOptions {
    #[serde(default)]
    pub associations: Vec<String>,
    #[serde(default)]
    pub ignore_attributes: Vec<String>,
    pub allow_update_with_drafts: Option<bool>,
    pub destroy_drafts_on_publish: Option<bool>,
}

impl DraftOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn associations<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.associations.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn ignore_attributes<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignore_attributes
            .extend(names.into_iter().map(Into::into));
        self
    }

    pub fn allow_update_with_drafts(mut self, allow: bool) -> Self {
        self.allow_update_with_drafts = Some(allow);
        self
    }

    pub fn destroy_drafts_on_publish(mut self, destroy: bool) -> Self {
        self.destroy_drafts_on_publish = Some(destroy);
        self
    }
}

/// Merged configuration for one record type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftConfig {
    /// Associations copied on create_draft and merged on publish
    pub associations: BTreeSet<String>,
    /// Attributes never copied back on publish; always holds the structural names
    pub ignored_attributes: BTreeSet<String>,
    /// When false, saving an original that has drafts is rejected
    pub allow_update_with_drafts: bool,
    /// When true, publishing a draft deletes all of its siblings
    pub destroy_drafts_on_publish: bool,
}

impl Default for DraftConfig {
    fn default() -> Self {
        Self {
            associations: BTreeSet::new(),
            ignored_attributes: STRUCTURAL_ATTRIBUTES.iter().map(|s| s.to_string()).collect(),
            allow_update_with_drafts: false,
            destroy_drafts_on_publish: false,
        }
    }
}

impl DraftConfig {
    /// Merge options into this entry
    pub fn merge(&mut self, options: DraftOptions) {
        self.associations.extend(options.associations);
        self.ignored_attributes.extend(options.ignore_attributes);
        if let Some(allow) = options.allow_update_with_drafts {
            self.allow_update_with_drafts = allow;
        }
        if let Some(destroy) = options.destroy_drafts_on_publish {
            self.destroy_drafts_on_publish = destroy;
        }
    }

    pub fn is_ignored(&self, attribute: &str) -> bool {
        self.ignored_attributes.contains(attribute)
    }

    /// Association names as borrowed strs, for `Record::duplicate`
    pub fn association_names(&self) -> impl Iterator<Item = &str> {
        self.associations.iter().map(String::as_str)
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RegistryFile {
    #[serde(default)]
    types: BTreeMap<String, DraftOptions>,
}

/// Registry of draft configuration keyed by record type
#[derive(Debug, Clone, Default)]
pub struct DraftRegistry {
    entries: HashMap<String, DraftConfig>,
}

impl DraftRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a type for drafts, or merge options into its existing entry
    ///
    /// Calling this again with identical options leaves the entry unchanged.
    pub fn configure(&mut self, record_type: impl Into<String>, options: DraftOptions) {
        self.entries
            .entry(record_type.into())
            .or_default()
            .merge(options);
    }

    /// Get the merged configuration for a type
    ///
    /// # Errors
    ///
    /// Returns `NotConfigured` if the type was never configured.
    pub fn config_for(&self, record_type: &str) -> Result<&DraftConfig> {
        self.entries
            .get(record_type)
            .ok_or_else(|| DraftError::NotConfigured {
                record_type: record_type.to_string(),
            })
    }

    pub fn is_configured(&self, record_type: &str) -> bool {
        self.entries.contains_key(record_type)
    }

    /// Configured type names, sorted
    pub fn record_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }

    /// Merge every `[types.<name>]` table of a TOML document into the registry
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the document does not parse or contains
    /// unknown keys.
    pub fn load_toml_str(&mut self, source: &str) -> Result<()> {
        let file: RegistryFile = toml::from_str(source).map_err(|e| DraftError::InvalidConfig {
            reason: e.to_string(),
        })?;
        for (record_type, options) in file.types {
            tracing::debug!(record_type = %record_type, "loaded draft configuration");
            self.configure(record_type, options);
        }
        Ok(())
    }

    /// Build a registry from a TOML document
    ///
    /// # Errors
    ///
    /// See [`DraftRegistry::load_toml_str`].
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let mut registry = Self::new();
        registry.load_toml_str(source)?;
        Ok(registry)
    }

    /// Build a registry from a TOML file on disk
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the file cannot be read or parsed.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|e| DraftError::InvalidConfig {
            reason: format!("cannot read {}: {}", path.display(), e),
        })?;
        Self::from_toml_str(&source)
    }
}
