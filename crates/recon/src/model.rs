use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Ordered map
// ---------------------------------------------------------------------------

/// String-keyed map that iterates in insertion order.
///
/// Pairs a hash index with an insertion-ordered key list. Overwriting a key
/// keeps its original position; removing a key drops it from both.
#[derive(Debug, Clone, Default)]
pub struct OrderedMap<V> {
    keys: Vec<String>,
    map: HashMap<String, V>,
}

impl<V> OrderedMap<V> {
    pub fn new() -> Self {
        Self { keys: Vec::new(), map: HashMap::new() }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.map.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        self.map.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut V> {
        self.map.get_mut(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: V) -> Option<V> {
        let key = key.into();
        let previous = self.map.insert(key.clone(), value);
        if previous.is_none() {
            self.keys.push(key);
        }
        previous
    }

    pub fn remove(&mut self, key: &str) -> Option<V> {
        let removed = self.map.remove(key);
        if removed.is_some() {
            self.keys.retain(|k| k != key);
        }
        removed
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.keys.iter()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &V)> {
        self.keys.iter().map(|k| (k, &self.map[k]))
    }
}

impl<V> FromIterator<(String, V)> for OrderedMap<V> {
    fn from_iter<T: IntoIterator<Item = (String, V)>>(iter: T) -> Self {
        let mut map = Self::new();
        for (key, value) in iter {
            map.insert(key, value);
        }
        map
    }
}

/// One flat input row: column name → cell value, in column order.
/// Loaders drop empty cells, so a present key always carries a value.
pub type Row = OrderedMap<String>;

// ---------------------------------------------------------------------------
// Behavior
// ---------------------------------------------------------------------------

/// How desired state is reconciled against existing state.
/// `DeleteIfNotExist` is only valid for attribute-oriented operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    Append,
    Replace,
    Delete,
    DeleteIfNotExist,
}

impl Behavior {
    pub fn parse(name: &str) -> Option<Behavior> {
        match name {
            "append" => Some(Self::Append),
            "replace" => Some(Self::Replace),
            "delete" => Some(Self::Delete),
            "delete_if_not_exist" => Some(Self::DeleteIfNotExist),
            _ => None,
        }
    }
}

impl fmt::Display for Behavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Append => write!(f, "append"),
            Self::Replace => write!(f, "replace"),
            Self::Delete => write!(f, "delete"),
            Self::DeleteIfNotExist => write!(f, "delete_if_not_exist"),
        }
    }
}

// ---------------------------------------------------------------------------
// Desired tree
// ---------------------------------------------------------------------------

/// Desired website node, grouped from flat rows.
#[derive(Debug, Clone)]
pub struct Website {
    pub code: String,
    pub name: String,
    pub is_default: bool,
    pub groups: OrderedMap<StoreGroup>,
}

/// Desired store group, keyed by name within its website.
#[derive(Debug, Clone)]
pub struct StoreGroup {
    pub root_category: String,
    pub is_default: bool,
    pub stores: OrderedMap<Store>,
}

/// Desired store, keyed by code within its group.
#[derive(Debug, Clone)]
pub struct Store {
    pub code: String,
    pub name: String,
    pub is_default: bool,
    pub is_active: bool,
    pub sort_order: i64,
    /// Columns outside the fixed schema, forwarded as per-store config writes.
    pub config: OrderedMap<String>,
    /// Source row index, for diagnostics.
    pub row_index: usize,
}

// ---------------------------------------------------------------------------
// Existing-entity snapshots
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExistingWebsite {
    pub id: u64,
    pub code: String,
    pub name: String,
    pub is_default: bool,
    pub default_group_id: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExistingGroup {
    pub id: u64,
    pub website_id: u64,
    pub name: String,
    pub root_category_id: u64,
    pub default_store_id: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExistingStore {
    pub id: u64,
    pub code: String,
    pub name: String,
    pub website_id: u64,
    pub group_id: u64,
    pub sort_order: i64,
    pub is_active: bool,
}

/// Level-1 category, the root a store group points at.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RootCategory {
    pub id: u64,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct ExistingAttribute {
    pub id: u64,
    pub code: String,
    pub frontend_input: String,
    pub is_user_defined: bool,
}

/// One option row as stored for a single store view.
#[derive(Debug, Clone)]
pub struct AttributeOption {
    pub option_id: u64,
    pub label: String,
}

/// An attribute ↔ (set, group) link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Association {
    pub set_id: u64,
    pub group_id: u64,
    pub attribute_id: u64,
}

// ---------------------------------------------------------------------------
// Attribute-oriented inputs and outputs
// ---------------------------------------------------------------------------

/// Store-view id → display label. View id 0 is the default/admin view.
pub type LabelSet = BTreeMap<u64, String>;

/// Desired attribute set: name, sort order, and group name → group sort order.
#[derive(Debug, Clone)]
pub struct AttributeSetSpec {
    pub name: String,
    pub sort_order: i64,
    pub groups: OrderedMap<i64>,
}

/// Target of one option write: an existing option id or a batch-local
/// placeholder for an option to be created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionRef {
    Existing(u64),
    New(usize),
}

impl fmt::Display for OptionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Existing(id) => write!(f, "{id}"),
            Self::New(ordinal) => write!(f, "new_{ordinal}"),
        }
    }
}

/// Diff result for one attribute's option collection.
#[derive(Debug, Clone)]
pub struct OptionBatch {
    pub attribute_id: u64,
    /// Option ids to remove.
    pub delete: Vec<u64>,
    /// Label maps to write, per existing id or placeholder, in decision order.
    pub value: Vec<(OptionRef, LabelSet)>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordered_map_preserves_insertion_order() {
        let mut map = OrderedMap::new();
        map.insert("b", 2);
        map.insert("a", 1);
        map.insert("c", 3);
        let keys: Vec<&String> = map.keys().collect();
        assert_eq!(keys, ["b", "a", "c"]);
    }

    #[test]
    fn ordered_map_overwrite_keeps_position() {
        let mut map = OrderedMap::new();
        map.insert("b", 2);
        map.insert("a", 1);
        assert_eq!(map.insert("b", 20), Some(2));
        let pairs: Vec<(String, i32)> = map.iter().map(|(k, v)| (k.clone(), *v)).collect();
        assert_eq!(pairs, [("b".into(), 20), ("a".into(), 1)]);
    }

    #[test]
    fn ordered_map_remove() {
        let mut map = OrderedMap::new();
        map.insert("a", 1);
        map.insert("b", 2);
        assert_eq!(map.remove("a"), Some(1));
        assert!(!map.contains_key("a"));
        assert_eq!(map.len(), 1);
        assert_eq!(map.remove("a"), None);
    }

    #[test]
    fn behavior_round_trip() {
        for name in ["append", "replace", "delete", "delete_if_not_exist"] {
            let behavior = Behavior::parse(name).unwrap();
            assert_eq!(behavior.to_string(), name);
        }
        assert_eq!(Behavior::parse("truncate"), None);
    }

    #[test]
    fn option_ref_display() {
        assert_eq!(OptionRef::Existing(42).to_string(), "42");
        assert_eq!(OptionRef::New(0).to_string(), "new_0");
    }
}
