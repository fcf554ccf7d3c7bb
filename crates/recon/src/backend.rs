//! Collaborator interfaces the engine is constructed with.
//!
//! The reconciliation components never reach for global state; everything
//! they read or mutate goes through these traits, so tests can run against
//! in-memory fakes (see [`crate::memory`]).

use std::fmt;

use crate::error::ImportError;
use crate::model::{
    Association, AttributeOption, ExistingAttribute, ExistingGroup, ExistingStore,
    ExistingWebsite, LabelSet, OptionBatch, RootCategory, Row,
};

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "INFO"),
            Self::Warning => write!(f, "WARNING"),
            Self::Error => write!(f, "ERROR"),
        }
    }
}

/// Leveled line sink. The engine logs every skip, conflict, and state-change
/// decision here; it never writes to the terminal itself.
pub trait Logger {
    fn log(&self, level: Level, message: &str);

    fn info(&self, message: &str) {
        self.log(Level::Info, message);
    }

    fn warning(&self, message: &str) {
        self.log(Level::Warning, message);
    }

    fn error(&self, message: &str) {
        self.log(Level::Error, message);
    }
}

// ---------------------------------------------------------------------------
// Entity store
// ---------------------------------------------------------------------------

/// Persistence boundary for websites, store groups, stores, root categories,
/// and per-store config values. Reads return snapshots in collection order;
/// each write is applied independently and durably as it is decided.
pub trait EntityStore {
    fn websites(&self) -> Result<Vec<ExistingWebsite>, ImportError>;
    fn groups(&self) -> Result<Vec<ExistingGroup>, ImportError>;
    fn stores(&self) -> Result<Vec<ExistingStore>, ImportError>;
    fn root_categories(&self) -> Result<Vec<RootCategory>, ImportError>;

    fn create_website(&mut self, code: &str) -> Result<ExistingWebsite, ImportError>;
    fn save_website(&mut self, website: &ExistingWebsite) -> Result<(), ImportError>;
    fn create_group(
        &mut self,
        website_id: u64,
        name: &str,
        root_category_id: u64,
    ) -> Result<ExistingGroup, ImportError>;
    fn save_group(&mut self, group: &ExistingGroup) -> Result<(), ImportError>;
    fn create_store(&mut self, code: &str) -> Result<ExistingStore, ImportError>;
    fn save_store(&mut self, store: &ExistingStore) -> Result<(), ImportError>;
    fn create_root_category(&mut self, name: &str) -> Result<u64, ImportError>;

    fn save_config(
        &mut self,
        scope: &str,
        scope_id: u64,
        key: &str,
        value: &str,
    ) -> Result<(), ImportError>;
}

// ---------------------------------------------------------------------------
// Attribute repository
// ---------------------------------------------------------------------------

/// Persistence boundary for attribute metadata: attributes, option rows,
/// attribute sets, set groups, and attribute↔group associations. All lookups
/// and writes are scoped by the entity-type id obtained from
/// [`AttributeRepository::entity_type_id`].
pub trait AttributeRepository {
    /// Id of the fixed product entity type every operation works against.
    fn entity_type_id(&self) -> Result<u64, ImportError>;

    fn attribute_by_code(
        &self,
        entity_type: u64,
        code: &str,
    ) -> Result<Option<ExistingAttribute>, ImportError>;
    fn user_defined_attributes(&self, entity_type: u64) -> Result<Vec<String>, ImportError>;
    fn add_attribute(
        &mut self,
        entity_type: u64,
        code: &str,
        properties: &Row,
    ) -> Result<(), ImportError>;
    fn remove_attribute(&mut self, entity_type: u64, code: &str) -> Result<(), ImportError>;
    fn set_store_labels(
        &mut self,
        entity_type: u64,
        code: &str,
        labels: &LabelSet,
    ) -> Result<(), ImportError>;

    /// Option rows of one attribute as visible from one store view.
    fn attribute_options(
        &self,
        attribute_id: u64,
        store_view: u64,
    ) -> Result<Vec<AttributeOption>, ImportError>;
    fn apply_option_batch(&mut self, batch: &OptionBatch) -> Result<(), ImportError>;

    fn attribute_set_names(&self, entity_type: u64) -> Result<Vec<String>, ImportError>;
    fn attribute_set_id(&self, entity_type: u64, name: &str) -> Result<Option<u64>, ImportError>;
    /// Upsert; sort order is always (re)applied. Returns the set id.
    fn add_attribute_set(
        &mut self,
        entity_type: u64,
        name: &str,
        sort_order: i64,
    ) -> Result<u64, ImportError>;
    fn remove_attribute_set(&mut self, entity_type: u64, name: &str) -> Result<(), ImportError>;

    /// Current groups of a set as (name, sort order), in collection order.
    fn attribute_groups(&self, set_id: u64) -> Result<Vec<(String, i64)>, ImportError>;
    fn attribute_group_id(&self, set_id: u64, name: &str) -> Result<Option<u64>, ImportError>;
    fn add_attribute_group(
        &mut self,
        entity_type: u64,
        set_id: u64,
        name: &str,
        sort_order: i64,
    ) -> Result<(), ImportError>;
    fn remove_attribute_group(&mut self, set_id: u64, name: &str) -> Result<(), ImportError>;

    fn associations(&self, entity_type: u64) -> Result<Vec<Association>, ImportError>;
    /// Upsert by names/code; the repository resolves them, creating the group
    /// under the set when absent.
    fn add_attribute_to_group(
        &mut self,
        entity_type: u64,
        set_name: &str,
        group_name: &str,
        attribute_code: &str,
        sort_order: i64,
    ) -> Result<(), ImportError>;
    fn remove_association(
        &mut self,
        entity_type: u64,
        association: Association,
    ) -> Result<(), ImportError>;
}

// ---------------------------------------------------------------------------
// Locale collaborators
// ---------------------------------------------------------------------------

/// Canonicalizes a locale code, or yields nothing when unsupported.
/// Implementations may trigger language-pack installation as a side effect.
pub trait LocaleResolver {
    fn resolve(&mut self, code: &str, log: &dyn Logger) -> Option<String>;
}

/// Language-pack installation boundary; fetch/deploy side effects live
/// entirely behind this trait.
pub trait PackageInstaller {
    fn is_installed(&self, repo: &str) -> bool;
    fn install(&mut self, pack: &crate::locale::PackSource) -> Result<(), ImportError>;
}
