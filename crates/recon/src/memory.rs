//! In-memory collaborators: a snapshot-backed `EntityStore` +
//! `AttributeRepository`, a recording logger, and no-op locale pieces.
//!
//! Tests run the engine against these; the CLI uses [`MemoryStore`] as its
//! JSON state backend for offline planning runs.

use std::cell::RefCell;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::backend::{
    AttributeRepository, EntityStore, Level, LocaleResolver, Logger, PackageInstaller,
};
use crate::error::ImportError;
use crate::locale::PackSource;
use crate::model::{
    Association, AttributeOption, ExistingAttribute, ExistingGroup, ExistingStore,
    ExistingWebsite, LabelSet, OptionBatch, OptionRef, RootCategory, Row,
};

/// Entity-type id [`MemoryStore`] reports for the product entity type.
pub const PRODUCT_ENTITY_TYPE: u64 = 4;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributeRecord {
    pub id: u64,
    pub code: String,
    #[serde(default)]
    pub frontend_input: String,
    #[serde(default = "default_true")]
    pub is_user_defined: bool,
    #[serde(default)]
    pub store_labels: LabelSet,
    #[serde(default)]
    pub options: Vec<OptionRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionRecord {
    pub id: u64,
    pub labels: LabelSet,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributeSetRecord {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub sort_order: i64,
    #[serde(default)]
    pub groups: Vec<SetGroupRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetGroupRecord {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub sort_order: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigEntry {
    pub scope: String,
    pub scope_id: u64,
    pub key: String,
    pub value: String,
}

fn default_true() -> bool {
    true
}

/// Insertion-ordered in-memory state, serializable as a JSON snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryStore {
    #[serde(default)]
    pub websites: Vec<ExistingWebsite>,
    #[serde(default)]
    pub groups: Vec<ExistingGroup>,
    #[serde(default)]
    pub stores: Vec<ExistingStore>,
    #[serde(default)]
    pub root_categories: Vec<RootCategory>,
    #[serde(default)]
    pub attributes: Vec<AttributeRecord>,
    #[serde(default)]
    pub attribute_sets: Vec<AttributeSetRecord>,
    #[serde(default)]
    pub associations: Vec<Association>,
    #[serde(default)]
    pub config: Vec<ConfigEntry>,
}

impl MemoryStore {
    pub fn from_json(input: &str) -> Result<Self, ImportError> {
        serde_json::from_str(input).map_err(|e| ImportError::Io(e.to_string()))
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).expect("snapshot serialization cannot fail")
    }

    /// Next free id across every entity family; snapshots may carry
    /// arbitrary ids.
    fn allocate_id(&self) -> u64 {
        let max = self
            .websites
            .iter()
            .map(|w| w.id)
            .chain(self.groups.iter().map(|g| g.id))
            .chain(self.stores.iter().map(|s| s.id))
            .chain(self.root_categories.iter().map(|c| c.id))
            .chain(self.attributes.iter().map(|a| a.id))
            .chain(self.attributes.iter().flat_map(|a| a.options.iter().map(|o| o.id)))
            .chain(self.attribute_sets.iter().map(|s| s.id))
            .chain(
                self.attribute_sets
                    .iter()
                    .flat_map(|s| s.groups.iter().map(|g| g.id)),
            )
            .max()
            .unwrap_or(0);
        max + 1
    }

    pub fn config_value(&self, scope: &str, scope_id: u64, key: &str) -> Option<String> {
        self.config
            .iter()
            .find(|e| e.scope == scope && e.scope_id == scope_id && e.key == key)
            .map(|e| e.value.clone())
    }

    pub fn seed_attribute(&mut self, code: &str, input: &str, options: &[(u64, &[(u64, &str)])]) {
        let id = self.allocate_id();
        self.attributes.push(AttributeRecord {
            id,
            code: code.to_string(),
            frontend_input: input.to_string(),
            is_user_defined: true,
            store_labels: LabelSet::new(),
            options: options
                .iter()
                .map(|(option_id, labels)| OptionRecord {
                    id: *option_id,
                    labels: labels.iter().map(|(view, l)| (*view, l.to_string())).collect(),
                })
                .collect(),
        });
    }

    pub fn seed_system_attribute(&mut self, code: &str, input: &str) {
        let id = self.allocate_id();
        self.attributes.push(AttributeRecord {
            id,
            code: code.to_string(),
            frontend_input: input.to_string(),
            is_user_defined: false,
            store_labels: LabelSet::new(),
            options: Vec::new(),
        });
    }

    pub fn seed_attribute_set(&mut self, name: &str, sort_order: i64, groups: &[(&str, i64)]) {
        let id = self.allocate_id();
        let mut set = AttributeSetRecord {
            id,
            name: name.to_string(),
            sort_order,
            groups: Vec::new(),
        };
        for (offset, (group_name, group_sort)) in groups.iter().enumerate() {
            set.groups.push(SetGroupRecord {
                id: id + 1 + offset as u64,
                name: group_name.to_string(),
                sort_order: *group_sort,
            });
        }
        self.attribute_sets.push(set);
    }

    pub fn attribute_options_by_code(&self, code: &str) -> Vec<(u64, LabelSet)> {
        self.attributes
            .iter()
            .find(|a| a.code == code)
            .map(|a| a.options.iter().map(|o| (o.id, o.labels.clone())).collect())
            .unwrap_or_default()
    }

    pub fn store_labels(&self, code: &str) -> Vec<(u64, String)> {
        self.attributes
            .iter()
            .find(|a| a.code == code)
            .map(|a| a.store_labels.iter().map(|(v, l)| (*v, l.clone())).collect())
            .unwrap_or_default()
    }

    fn attribute_mut(&mut self, attribute_id: u64) -> Result<&mut AttributeRecord, ImportError> {
        self.attributes
            .iter_mut()
            .find(|a| a.id == attribute_id)
            .ok_or_else(|| ImportError::Backend(format!("unknown attribute id {attribute_id}")))
    }

    fn set_mut(&mut self, set_id: u64) -> Result<&mut AttributeSetRecord, ImportError> {
        self.attribute_sets
            .iter_mut()
            .find(|s| s.id == set_id)
            .ok_or_else(|| ImportError::Backend(format!("unknown attribute set id {set_id}")))
    }
}

impl EntityStore for MemoryStore {
    fn websites(&self) -> Result<Vec<ExistingWebsite>, ImportError> {
        Ok(self.websites.clone())
    }

    fn groups(&self) -> Result<Vec<ExistingGroup>, ImportError> {
        Ok(self.groups.clone())
    }

    fn stores(&self) -> Result<Vec<ExistingStore>, ImportError> {
        Ok(self.stores.clone())
    }

    fn root_categories(&self) -> Result<Vec<RootCategory>, ImportError> {
        Ok(self.root_categories.clone())
    }

    fn create_website(&mut self, code: &str) -> Result<ExistingWebsite, ImportError> {
        let website = ExistingWebsite {
            id: self.allocate_id(),
            code: code.to_string(),
            name: String::new(),
            is_default: false,
            default_group_id: None,
        };
        self.websites.push(website.clone());
        Ok(website)
    }

    fn save_website(&mut self, website: &ExistingWebsite) -> Result<(), ImportError> {
        match self.websites.iter_mut().find(|w| w.id == website.id) {
            Some(slot) => {
                *slot = website.clone();
                Ok(())
            }
            None => Err(ImportError::Backend(format!("unknown website id {}", website.id))),
        }
    }

    fn create_group(
        &mut self,
        website_id: u64,
        name: &str,
        root_category_id: u64,
    ) -> Result<ExistingGroup, ImportError> {
        let group = ExistingGroup {
            id: self.allocate_id(),
            website_id,
            name: name.to_string(),
            root_category_id,
            default_store_id: None,
        };
        self.groups.push(group.clone());
        Ok(group)
    }

    fn save_group(&mut self, group: &ExistingGroup) -> Result<(), ImportError> {
        match self.groups.iter_mut().find(|g| g.id == group.id) {
            Some(slot) => {
                *slot = group.clone();
                Ok(())
            }
            None => Err(ImportError::Backend(format!("unknown group id {}", group.id))),
        }
    }

    fn create_store(&mut self, code: &str) -> Result<ExistingStore, ImportError> {
        let store = ExistingStore {
            id: self.allocate_id(),
            code: code.to_string(),
            name: String::new(),
            website_id: 0,
            group_id: 0,
            sort_order: 0,
            is_active: false,
        };
        self.stores.push(store.clone());
        Ok(store)
    }

    fn save_store(&mut self, store: &ExistingStore) -> Result<(), ImportError> {
        match self.stores.iter_mut().find(|s| s.id == store.id) {
            Some(slot) => {
                *slot = store.clone();
                Ok(())
            }
            None => Err(ImportError::Backend(format!("unknown store id {}", store.id))),
        }
    }

    fn create_root_category(&mut self, name: &str) -> Result<u64, ImportError> {
        let id = self.allocate_id();
        self.root_categories.push(RootCategory { id, name: name.to_string() });
        Ok(id)
    }

    fn save_config(
        &mut self,
        scope: &str,
        scope_id: u64,
        key: &str,
        value: &str,
    ) -> Result<(), ImportError> {
        match self
            .config
            .iter_mut()
            .find(|e| e.scope == scope && e.scope_id == scope_id && e.key == key)
        {
            Some(entry) => entry.value = value.to_string(),
            None => self.config.push(ConfigEntry {
                scope: scope.to_string(),
                scope_id,
                key: key.to_string(),
                value: value.to_string(),
            }),
        }
        Ok(())
    }
}

impl AttributeRepository for MemoryStore {
    fn entity_type_id(&self) -> Result<u64, ImportError> {
        Ok(PRODUCT_ENTITY_TYPE)
    }

    fn attribute_by_code(
        &self,
        _entity_type: u64,
        code: &str,
    ) -> Result<Option<ExistingAttribute>, ImportError> {
        Ok(self.attributes.iter().find(|a| a.code == code).map(|a| ExistingAttribute {
            id: a.id,
            code: a.code.clone(),
            frontend_input: a.frontend_input.clone(),
            is_user_defined: a.is_user_defined,
        }))
    }

    fn user_defined_attributes(&self, _entity_type: u64) -> Result<Vec<String>, ImportError> {
        Ok(self
            .attributes
            .iter()
            .filter(|a| a.is_user_defined)
            .map(|a| a.code.clone())
            .collect())
    }

    fn add_attribute(
        &mut self,
        _entity_type: u64,
        code: &str,
        properties: &Row,
    ) -> Result<(), ImportError> {
        let input = properties
            .get("frontend_input")
            .or_else(|| properties.get("input"))
            .cloned();
        match self.attributes.iter_mut().find(|a| a.code == code) {
            Some(attribute) => {
                if let Some(input) = input {
                    attribute.frontend_input = input;
                }
            }
            None => {
                let id = self.allocate_id();
                self.attributes.push(AttributeRecord {
                    id,
                    code: code.to_string(),
                    frontend_input: input.unwrap_or_default(),
                    is_user_defined: properties
                        .get("is_user_defined")
                        .map_or(true, |v| crate::grouper::truthy(v)),
                    store_labels: LabelSet::new(),
                    options: Vec::new(),
                });
            }
        }
        Ok(())
    }

    fn remove_attribute(&mut self, _entity_type: u64, code: &str) -> Result<(), ImportError> {
        if let Some(position) = self.attributes.iter().position(|a| a.code == code) {
            let removed = self.attributes.remove(position);
            self.associations.retain(|a| a.attribute_id != removed.id);
        }
        Ok(())
    }

    fn set_store_labels(
        &mut self,
        _entity_type: u64,
        code: &str,
        labels: &LabelSet,
    ) -> Result<(), ImportError> {
        match self.attributes.iter_mut().find(|a| a.code == code) {
            Some(attribute) => {
                attribute.store_labels = labels.clone();
                Ok(())
            }
            None => Err(ImportError::Backend(format!("unknown attribute code {code}"))),
        }
    }

    fn attribute_options(
        &self,
        attribute_id: u64,
        store_view: u64,
    ) -> Result<Vec<AttributeOption>, ImportError> {
        let attribute = self
            .attributes
            .iter()
            .find(|a| a.id == attribute_id)
            .ok_or_else(|| ImportError::Backend(format!("unknown attribute id {attribute_id}")))?;
        Ok(attribute
            .options
            .iter()
            .filter_map(|option| {
                option.labels.get(&store_view).map(|label| AttributeOption {
                    option_id: option.id,
                    label: label.clone(),
                })
            })
            .collect())
    }

    fn apply_option_batch(&mut self, batch: &OptionBatch) -> Result<(), ImportError> {
        let mut new_ids: Vec<u64> = Vec::new();
        let next = self.allocate_id();
        let attribute = self.attribute_mut(batch.attribute_id)?;

        for option_id in &batch.delete {
            attribute.options.retain(|o| o.id != *option_id);
        }
        for (target, labels) in &batch.value {
            match target {
                OptionRef::Existing(option_id) => {
                    if batch.delete.contains(option_id) {
                        continue;
                    }
                    match attribute.options.iter_mut().find(|o| o.id == *option_id) {
                        Some(option) => option.labels = labels.clone(),
                        None => {
                            return Err(ImportError::Backend(format!(
                                "unknown option id {option_id}"
                            )))
                        }
                    }
                }
                OptionRef::New(_) => {
                    let id = next + new_ids.len() as u64;
                    new_ids.push(id);
                    attribute.options.push(OptionRecord { id, labels: labels.clone() });
                }
            }
        }
        Ok(())
    }

    fn attribute_set_names(&self, _entity_type: u64) -> Result<Vec<String>, ImportError> {
        Ok(self.attribute_sets.iter().map(|s| s.name.clone()).collect())
    }

    fn attribute_set_id(&self, _entity_type: u64, name: &str) -> Result<Option<u64>, ImportError> {
        Ok(self.attribute_sets.iter().find(|s| s.name == name).map(|s| s.id))
    }

    fn add_attribute_set(
        &mut self,
        _entity_type: u64,
        name: &str,
        sort_order: i64,
    ) -> Result<u64, ImportError> {
        if let Some(set) = self.attribute_sets.iter_mut().find(|s| s.name == name) {
            set.sort_order = sort_order;
            return Ok(set.id);
        }
        let id = self.allocate_id();
        self.attribute_sets.push(AttributeSetRecord {
            id,
            name: name.to_string(),
            sort_order,
            groups: Vec::new(),
        });
        Ok(id)
    }

    fn remove_attribute_set(&mut self, _entity_type: u64, name: &str) -> Result<(), ImportError> {
        if let Some(position) = self.attribute_sets.iter().position(|s| s.name == name) {
            let removed = self.attribute_sets.remove(position);
            self.associations.retain(|a| a.set_id != removed.id);
        }
        Ok(())
    }

    fn attribute_groups(&self, set_id: u64) -> Result<Vec<(String, i64)>, ImportError> {
        let set = self
            .attribute_sets
            .iter()
            .find(|s| s.id == set_id)
            .ok_or_else(|| ImportError::Backend(format!("unknown attribute set id {set_id}")))?;
        Ok(set.groups.iter().map(|g| (g.name.clone(), g.sort_order)).collect())
    }

    fn attribute_group_id(&self, set_id: u64, name: &str) -> Result<Option<u64>, ImportError> {
        let set = self
            .attribute_sets
            .iter()
            .find(|s| s.id == set_id)
            .ok_or_else(|| ImportError::Backend(format!("unknown attribute set id {set_id}")))?;
        Ok(set.groups.iter().find(|g| g.name == name).map(|g| g.id))
    }

    fn add_attribute_group(
        &mut self,
        _entity_type: u64,
        set_id: u64,
        name: &str,
        sort_order: i64,
    ) -> Result<(), ImportError> {
        let id = self.allocate_id();
        let set = self.set_mut(set_id)?;
        match set.groups.iter_mut().find(|g| g.name == name) {
            Some(group) => group.sort_order = sort_order,
            None => set.groups.push(SetGroupRecord { id, name: name.to_string(), sort_order }),
        }
        Ok(())
    }

    fn remove_attribute_group(&mut self, set_id: u64, name: &str) -> Result<(), ImportError> {
        let set = self.set_mut(set_id)?;
        if let Some(position) = set.groups.iter().position(|g| g.name == name) {
            let removed = set.groups.remove(position);
            self.associations
                .retain(|a| !(a.set_id == set_id && a.group_id == removed.id));
        }
        Ok(())
    }

    fn associations(&self, _entity_type: u64) -> Result<Vec<Association>, ImportError> {
        Ok(self.associations.clone())
    }

    fn add_attribute_to_group(
        &mut self,
        entity_type: u64,
        set_name: &str,
        group_name: &str,
        attribute_code: &str,
        sort_order: i64,
    ) -> Result<(), ImportError> {
        let set_id = self
            .attribute_set_id(entity_type, set_name)?
            .ok_or_else(|| ImportError::Backend(format!("unknown attribute set '{set_name}'")))?;
        if self.attribute_group_id(set_id, group_name)?.is_none() {
            self.add_attribute_group(entity_type, set_id, group_name, sort_order)?;
        }
        let group_id = self.attribute_group_id(set_id, group_name)?.unwrap();
        let attribute = self
            .attribute_by_code(entity_type, attribute_code)?
            .ok_or_else(|| {
                ImportError::Backend(format!("unknown attribute code {attribute_code}"))
            })?;
        let association = Association { set_id, group_id, attribute_id: attribute.id };
        if !self.associations.contains(&association) {
            self.associations.push(association);
        }
        Ok(())
    }

    fn remove_association(
        &mut self,
        _entity_type: u64,
        association: Association,
    ) -> Result<(), ImportError> {
        self.associations.retain(|a| *a != association);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Logger + locale fakes
// ---------------------------------------------------------------------------

/// Captures log lines for assertions.
#[derive(Debug, Default)]
pub struct RecordingLogger {
    entries: RefCell<Vec<(Level, String)>>,
}

impl RecordingLogger {
    pub fn entries(&self) -> Vec<(Level, String)> {
        self.entries.borrow().clone()
    }

    pub fn count(&self, level: Level) -> usize {
        self.entries.borrow().iter().filter(|(l, _)| *l == level).count()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.entries.borrow().iter().any(|(_, message)| message.contains(needle))
    }
}

impl Logger for RecordingLogger {
    fn log(&self, level: Level, message: &str) {
        self.entries.borrow_mut().push((level, message.to_string()));
    }
}

/// Resolver that knows no locales; config values pass through unchanged.
pub struct NullResolver;

impl LocaleResolver for NullResolver {
    fn resolve(&mut self, _code: &str, _log: &dyn Logger) -> Option<String> {
        None
    }
}

/// Installer that treats every pack as already deployed.
pub struct NullInstaller;

impl PackageInstaller for NullInstaller {
    fn is_installed(&self, _repo: &str) -> bool {
        true
    }

    fn install(&mut self, _pack: &PackSource) -> Result<(), ImportError> {
        Ok(())
    }
}
