//! Groups flat store rows into the desired Website → Group → Store tree.
//!
//! Rows are validated for required columns, checked for ambiguous duplicate
//! claims against already-registered values, and default-flag conflicts are
//! resolved first-registered-wins before a store is inserted.

use crate::backend::Logger;
use crate::model::{OrderedMap, Row, Store, StoreGroup, Website};

pub const REQUIRED_COLUMNS: [&str; 9] = [
    "code",
    "name",
    "is_default",
    "group_name",
    "group_root_category",
    "group_is_default",
    "website_code",
    "website_name",
    "website_is_default",
];

const STORE_DEFAULTS: [(&str, &str); 2] = [("is_active", "0"), ("sort_order", "0")];

#[derive(Debug)]
pub struct GroupedRows {
    pub websites: OrderedMap<Website>,
    pub rejected_rows: usize,
}

/// True for the truthy string spellings; everything else is false.
pub fn truthy(value: &str) -> bool {
    matches!(value, "true" | "1" | "yes")
}

fn cell<'r>(row: &'r Row, key: &str) -> &'r str {
    row.get(key).map(String::as_str).unwrap_or("")
}

/// A value counts as present when non-empty; loaders drop empty cells, so
/// the literal "0" passes like any other non-empty string.
fn value_present(row: &Row, key: &str) -> bool {
    !cell(row, key).is_empty()
}

/// One ERROR per field whose row value disagrees with the already-registered
/// one. Returns whether the row must be dropped.
fn has_ambiguous_values(checks: &[(&str, bool)], row_index: usize, log: &dyn Logger) -> bool {
    let mut ambiguous = false;
    for (field, matches) in checks {
        if !matches {
            ambiguous = true;
            log.error(&format!(
                "Invalid row {row_index}: Conflict for {field} - already registered with a different value"
            ));
        }
    }
    ambiguous
}

/// Default-flag resolver: the first sibling registered as default wins. A
/// later candidate claiming default is downgraded with a WARNING naming the
/// kept sibling. Returns the candidate's final flag.
fn keep_first_default<'a>(
    kind: &str,
    id: &str,
    row_index: usize,
    mut siblings: impl Iterator<Item = (&'a String, bool)>,
    log: &dyn Logger,
) -> bool {
    match siblings.find(|(sibling, is_default)| *is_default && sibling.as_str() != id) {
        Some((keeper, _)) => {
            log.warning(&format!(
                "Default {kind} conflict in line {row_index} - keeping '{keeper}'"
            ));
            false
        }
        None => true,
    }
}

pub fn group_rows(rows: &[Row], log: &dyn Logger) -> GroupedRows {
    let mut websites: OrderedMap<Website> = OrderedMap::new();
    let mut rejected_rows = 0;

    for (i, row) in rows.iter().enumerate() {
        let missing: Vec<&str> = REQUIRED_COLUMNS
            .iter()
            .filter(|key| !value_present(row, key))
            .copied()
            .collect();
        if !missing.is_empty() {
            log.error(&format!(
                "Invalid row {i}: Missing columns {}",
                missing.join(", ")
            ));
            rejected_rows += 1;
            continue;
        }

        let ws_code = cell(row, "website_code").to_string();
        if !websites.contains_key(&ws_code) {
            websites.insert(
                ws_code.clone(),
                Website {
                    code: ws_code.clone(),
                    name: cell(row, "website_name").to_string(),
                    is_default: truthy(cell(row, "website_is_default")),
                    groups: OrderedMap::new(),
                },
            );
        }

        {
            let website = websites.get(&ws_code).unwrap();
            let checks = [
                ("website_name", website.name == cell(row, "website_name")),
                (
                    "website_is_default",
                    website.is_default == truthy(cell(row, "website_is_default")),
                ),
            ];
            if has_ambiguous_values(&checks, i, log) {
                rejected_rows += 1;
                continue;
            }
        }

        if websites.get(&ws_code).unwrap().is_default {
            let keep = keep_first_default(
                "website",
                &ws_code,
                i,
                websites.iter().map(|(code, w)| (code, w.is_default)),
                log,
            );
            websites.get_mut(&ws_code).unwrap().is_default = keep;
        }

        let group_name = cell(row, "group_name").to_string();
        let website = websites.get_mut(&ws_code).unwrap();
        if !website.groups.contains_key(&group_name) {
            website.groups.insert(
                group_name.clone(),
                StoreGroup {
                    root_category: cell(row, "group_root_category").to_string(),
                    is_default: truthy(cell(row, "group_is_default")),
                    stores: OrderedMap::new(),
                },
            );
        }

        {
            let group = website.groups.get(&group_name).unwrap();
            let checks = [
                (
                    "group_root_category",
                    group.root_category == cell(row, "group_root_category"),
                ),
                (
                    "group_is_default",
                    group.is_default == truthy(cell(row, "group_is_default")),
                ),
            ];
            if has_ambiguous_values(&checks, i, log) {
                rejected_rows += 1;
                continue;
            }
        }

        if website.groups.get(&group_name).unwrap().is_default {
            let keep = keep_first_default(
                "group",
                &group_name,
                i,
                website.groups.iter().map(|(name, g)| (name, g.is_default)),
                log,
            );
            website.groups.get_mut(&group_name).unwrap().is_default = keep;
        }

        let group = website.groups.get_mut(&group_name).unwrap();
        let store = build_store(row, i, group, log);
        group.stores.insert(store.code.clone(), store);
    }

    GroupedRows { websites, rejected_rows }
}

fn build_store(row: &Row, row_index: usize, group: &StoreGroup, log: &dyn Logger) -> Store {
    let code = cell(row, "code").to_string();

    let is_active = row
        .get("is_active")
        .map(String::as_str)
        .unwrap_or(STORE_DEFAULTS[0].1);
    let sort_order = row
        .get("sort_order")
        .map(String::as_str)
        .unwrap_or(STORE_DEFAULTS[1].1);

    let mut is_default = truthy(cell(row, "is_default"));
    if is_default {
        is_default = keep_first_default(
            "store",
            &code,
            row_index,
            group.stores.iter().map(|(c, s)| (c, s.is_default)),
            log,
        );
    }

    let mut config = OrderedMap::new();
    for (column, value) in row.iter() {
        let fixed = REQUIRED_COLUMNS.contains(&column.as_str())
            || STORE_DEFAULTS.iter().any(|(key, _)| key == column);
        if !fixed {
            config.insert(column.clone(), value.clone());
        }
    }

    Store {
        code,
        name: cell(row, "name").to_string(),
        is_default,
        is_active: truthy(is_active),
        sort_order: sort_order.parse().unwrap_or(0),
        config,
        row_index,
    }
}
