//! Matches the desired tree against existing entities and applies the
//! resulting create/update/rename/deactivate decisions through the store.
//!
//! Snapshots are read once up front; every decision is computed against them
//! and applied immediately. A store failure aborts the batch with whatever
//! was already committed left in place.

use crate::backend::{EntityStore, LocaleResolver, Logger};
use crate::error::ImportError;
use crate::model::{ExistingGroup, ExistingStore, OrderedMap, StoreGroup, Website};

#[derive(Debug, Default)]
pub struct SyncOutcome {
    pub websites_added: usize,
    pub groups_added: usize,
    pub stores_added: usize,
    pub stores_deactivated: usize,
}

enum GroupMatch {
    /// Category and name both match; nothing to change.
    Direct(usize),
    /// Name matches, category differs; name is the stronger key.
    SetCategory(usize),
    /// Category matches, name differs; rename to the desired name.
    Rename(usize),
    Create,
}

pub fn sync_stores<S: EntityStore, R: LocaleResolver>(
    tree: &OrderedMap<Website>,
    store: &mut S,
    locales: &mut R,
    locale_key: &str,
    log: &dyn Logger,
) -> Result<SyncOutcome, ImportError> {
    let mut outcome = SyncOutcome::default();

    let mut websites = store.websites()?;
    let mut groups = store.groups()?;
    let mut stores = store.stores()?;

    // Root category name → id, first name wins.
    let mut root_categories: Vec<(String, u64)> = Vec::new();
    for category in store.root_categories()? {
        if root_categories.iter().any(|(name, _)| *name == category.name) {
            log.warning(&format!("Duplicate root category name: {}", category.name));
        } else {
            root_categories.push((category.name, category.id));
        }
    }

    for (ws_code, ws_data) in tree.iter() {
        let ws_idx = match websites.iter().position(|w| w.code == *ws_code) {
            Some(idx) => idx,
            None => {
                log.info(&format!("Adding new website '{ws_code}'"));
                let website = store.create_website(ws_code)?;
                websites.push(website);
                outcome.websites_added += 1;
                websites.len() - 1
            }
        };

        if ws_data.is_default && !websites[ws_idx].is_default {
            log.info(&format!("Setting website '{ws_code}' as default"));
            for idx in 0..websites.len() {
                if idx != ws_idx && websites[idx].is_default {
                    websites[idx].is_default = false;
                    store.save_website(&websites[idx])?;
                }
            }
        }
        websites[ws_idx].is_default = ws_data.is_default;
        websites[ws_idx].name = ws_data.name.clone();
        store.save_website(&websites[ws_idx])?;
        let website_id = websites[ws_idx].id;

        for (group_name, g_data) in ws_data.groups.iter() {
            let category_id = resolve_root_category(
                &mut root_categories,
                &g_data.root_category,
                store,
                log,
            )?;

            let group_idx = match find_group(&groups, website_id, group_name, category_id) {
                GroupMatch::Direct(idx) => idx,
                GroupMatch::SetCategory(idx) => {
                    log.info(&format!(
                        "Setting root category of group '{group_name}' on website '{ws_code}' to '{}'",
                        g_data.root_category
                    ));
                    groups[idx].root_category_id = category_id;
                    store.save_group(&groups[idx])?;
                    idx
                }
                GroupMatch::Rename(idx) => {
                    log.info(&format!(
                        "Renaming group '{}' on website '{ws_code}' to '{group_name}'",
                        groups[idx].name
                    ));
                    groups[idx].name = group_name.clone();
                    store.save_group(&groups[idx])?;
                    idx
                }
                GroupMatch::Create => {
                    log.info(&format!(
                        "Adding store group '{group_name}' to website '{ws_code}'"
                    ));
                    let group = store.create_group(website_id, group_name, category_id)?;
                    groups.push(group);
                    outcome.groups_added += 1;
                    groups.len() - 1
                }
            };
            let group_id = groups[group_idx].id;

            if g_data.is_default && websites[ws_idx].default_group_id != Some(group_id) {
                log.info(&format!(
                    "Setting '{group_name}' as default group on '{ws_code}'"
                ));
                websites[ws_idx].default_group_id = Some(group_id);
                store.save_website(&websites[ws_idx])?;
            }

            sync_group_stores(
                g_data, group_name, ws_code, website_id, group_id, &mut groups, group_idx,
                &mut stores, store, locales, locale_key, log, &mut outcome,
            )?;

            // Deactivate active stores of this group that the input no longer names.
            for existing in stores.iter_mut() {
                if existing.group_id == group_id
                    && existing.is_active
                    && !g_data.stores.contains_key(&existing.code)
                {
                    log.info(&format!("Deactivating store '{}'", existing.code));
                    existing.is_active = false;
                    store.save_store(existing)?;
                    outcome.stores_deactivated += 1;
                }
            }
        }
    }

    Ok(outcome)
}

fn find_group(
    groups: &[ExistingGroup],
    website_id: u64,
    name: &str,
    category_id: u64,
) -> GroupMatch {
    for (idx, group) in groups.iter().enumerate() {
        if group.website_id != website_id {
            continue;
        }
        if group.root_category_id == category_id && group.name == name {
            return GroupMatch::Direct(idx);
        }
        if group.name == name {
            return GroupMatch::SetCategory(idx);
        }
        if group.root_category_id == category_id {
            return GroupMatch::Rename(idx);
        }
    }
    GroupMatch::Create
}

fn resolve_root_category<S: EntityStore>(
    root_categories: &mut Vec<(String, u64)>,
    name: &str,
    store: &mut S,
    log: &dyn Logger,
) -> Result<u64, ImportError> {
    if let Some((_, id)) = root_categories.iter().find(|(n, _)| n == name) {
        return Ok(*id);
    }
    log.info(&format!("Adding new root category '{name}'"));
    let id = store.create_root_category(name)?;
    root_categories.push((name.to_string(), id));
    Ok(id)
}

#[allow(clippy::too_many_arguments)]
fn sync_group_stores<S: EntityStore, R: LocaleResolver>(
    g_data: &StoreGroup,
    group_name: &str,
    ws_code: &str,
    website_id: u64,
    group_id: u64,
    groups: &mut [ExistingGroup],
    group_idx: usize,
    stores: &mut Vec<ExistingStore>,
    store: &mut S,
    locales: &mut R,
    locale_key: &str,
    log: &dyn Logger,
    outcome: &mut SyncOutcome,
) -> Result<(), ImportError> {
    for (code, s_data) in g_data.stores.iter() {
        let store_idx = match stores.iter().position(|s| s.code == *code) {
            Some(idx) => idx,
            None => {
                log.info(&format!(
                    "Adding new store '{code}' on group '{group_name}' on website '{ws_code}'"
                ));
                let created = store.create_store(code)?;
                stores.push(created);
                outcome.stores_added += 1;
                stores.len() - 1
            }
        };

        {
            let existing = &mut stores[store_idx];
            existing.name = s_data.name.clone();
            existing.website_id = website_id;
            existing.group_id = group_id;
            existing.sort_order = s_data.sort_order;
            existing.is_active = s_data.is_active;
            store.save_store(existing)?;
        }
        let store_id = stores[store_idx].id;

        for (key, value) in s_data.config.iter() {
            let mut value = value.clone();
            if key == locale_key {
                if let Some(canonical) = locales.resolve(&value, log) {
                    value = canonical;
                }
            }
            store.save_config("stores", store_id, key, &value)?;
        }

        if s_data.is_default && groups[group_idx].default_store_id != Some(store_id) {
            log.info(&format!(
                "Setting '{code}' as default store on group '{group_name}' on website '{ws_code}'"
            ));
            groups[group_idx].default_store_id = Some(store_id);
            store.save_group(&groups[group_idx])?;
        }
    }
    Ok(())
}
