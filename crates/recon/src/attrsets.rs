//! Reconciles attribute-set / attribute-group structures against the
//! repository under a behavior policy. Group membership is diffed by name
//! only; sort order is just the value written on upsert.

use crate::backend::{AttributeRepository, Logger};
use crate::error::ImportError;
use crate::model::{AttributeSetSpec, Behavior, OrderedMap, Row};

#[derive(Debug, Default)]
pub struct SetOutcome {
    pub sets_applied: usize,
    pub sets_removed: usize,
    pub groups_removed: usize,
    pub rejected_rows: usize,
    pub skipped: usize,
}

/// Parse rows into set specs: `attribute_set_name`, `sort_order`, and every
/// other column as group name → group sort order.
pub fn parse_set_specs(rows: &[Row], log: &dyn Logger) -> (Vec<AttributeSetSpec>, usize) {
    let mut specs = Vec::new();
    let mut rejected = 0;

    for (i, row) in rows.iter().enumerate() {
        let name = match row.get("attribute_set_name") {
            Some(name) if !name.is_empty() => name.clone(),
            _ => {
                log.error(&format!("Invalid row {i}: Missing attribute_set_name"));
                rejected += 1;
                continue;
            }
        };
        let sort_order = row
            .get("sort_order")
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);

        let mut groups = OrderedMap::new();
        for (column, value) in row.iter() {
            if column == "attribute_set_name" || column == "sort_order" {
                continue;
            }
            groups.insert(column.clone(), value.parse().unwrap_or(0));
        }

        specs.push(AttributeSetSpec { name, sort_order, groups });
    }

    (specs, rejected)
}

pub fn run_attribute_sets<A: AttributeRepository>(
    rows: &[Row],
    behavior: Behavior,
    repo: &mut A,
    log: &dyn Logger,
) -> Result<SetOutcome, ImportError> {
    let entity_type = repo.entity_type_id()?;
    let (specs, rejected_rows) = parse_set_specs(rows, log);
    let mut outcome = SetOutcome { rejected_rows, ..SetOutcome::default() };

    match behavior {
        Behavior::Delete => {
            for spec in &specs {
                repo.remove_attribute_set(entity_type, &spec.name)?;
                outcome.sets_removed += 1;
            }
        }
        Behavior::Append | Behavior::Replace => {
            for spec in &specs {
                let set_id = repo.add_attribute_set(entity_type, &spec.name, spec.sort_order)?;
                for (group_name, sort_order) in spec.groups.iter() {
                    repo.add_attribute_group(entity_type, set_id, group_name, *sort_order)?;
                }
                outcome.sets_applied += 1;
            }
        }
        Behavior::DeleteIfNotExist => {
            prune_attribute_sets(&specs, entity_type, repo, log, &mut outcome)?;
        }
    }

    Ok(outcome)
}

/// Remove every existing set absent from the input, then prune each
/// remaining set's groups down to the names its row lists.
fn prune_attribute_sets<A: AttributeRepository>(
    specs: &[AttributeSetSpec],
    entity_type: u64,
    repo: &mut A,
    log: &dyn Logger,
    outcome: &mut SetOutcome,
) -> Result<(), ImportError> {
    let existing = repo.attribute_set_names(entity_type)?;
    for name in existing {
        if !specs.iter().any(|spec| spec.name == name) {
            log.info(&format!("Removing attribute set '{name}'"));
            repo.remove_attribute_set(entity_type, &name)?;
            outcome.sets_removed += 1;
        }
    }

    for spec in specs {
        let set_id = match repo.attribute_set_id(entity_type, &spec.name)? {
            Some(id) => id,
            None => {
                log.warning(&format!(
                    "Attribute set '{}' does not exist - skipping group prune",
                    spec.name
                ));
                outcome.skipped += 1;
                continue;
            }
        };
        for (group_name, _) in repo.attribute_groups(set_id)? {
            if !spec.groups.contains_key(&group_name) {
                log.info(&format!(
                    "Removing group '{group_name}' from attribute set '{}'",
                    spec.name
                ));
                repo.remove_attribute_group(set_id, &group_name)?;
                outcome.groups_removed += 1;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryStore, RecordingLogger};
    use crate::model::Row;

    fn row(pairs: &[(&str, &str)]) -> Row {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn parse_partitions_group_columns() {
        let log = RecordingLogger::default();
        let rows = vec![row(&[
            ("attribute_set_name", "Furniture"),
            ("sort_order", "3"),
            ("General", "1"),
            ("Dimensions", "2"),
        ])];
        let (specs, rejected) = parse_set_specs(&rows, &log);
        assert_eq!(rejected, 0);
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].name, "Furniture");
        assert_eq!(specs[0].sort_order, 3);
        let groups: Vec<(&String, &i64)> = specs[0].groups.iter().collect();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0], (&"General".to_string(), &1));
        assert_eq!(groups[1], (&"Dimensions".to_string(), &2));
    }

    #[test]
    fn parse_rejects_missing_name() {
        let log = RecordingLogger::default();
        let (specs, rejected) = parse_set_specs(&[row(&[("sort_order", "1")])], &log);
        assert!(specs.is_empty());
        assert_eq!(rejected, 1);
        assert!(log.contains("Invalid row 0: Missing attribute_set_name"));
    }

    #[test]
    fn append_upserts_sets_and_groups() {
        let log = RecordingLogger::default();
        let mut state = MemoryStore::default();
        let rows = vec![row(&[
            ("attribute_set_name", "Furniture"),
            ("sort_order", "3"),
            ("General", "1"),
        ])];
        let outcome = run_attribute_sets(&rows, Behavior::Append, &mut state, &log).unwrap();
        assert_eq!(outcome.sets_applied, 1);

        let set_id = state.attribute_set_id(4, "Furniture").unwrap().unwrap();
        assert_eq!(state.attribute_groups(set_id).unwrap(), [("General".to_string(), 1)]);

        // Re-running with a different sort order re-applies it, adds nothing.
        let rows = vec![row(&[
            ("attribute_set_name", "Furniture"),
            ("sort_order", "9"),
            ("General", "5"),
        ])];
        run_attribute_sets(&rows, Behavior::Replace, &mut state, &log).unwrap();
        assert_eq!(state.attribute_set_names(4).unwrap().len(), 1);
        assert_eq!(state.attribute_groups(set_id).unwrap(), [("General".to_string(), 5)]);
    }

    #[test]
    fn replace_does_not_delete_unlisted_groups() {
        let log = RecordingLogger::default();
        let mut state = MemoryStore::default();
        state.seed_attribute_set("Furniture", 1, &[("General", 1), ("Dimensions", 2)]);

        let rows = vec![row(&[("attribute_set_name", "Furniture"), ("sort_order", "1"), ("General", "1")])];
        run_attribute_sets(&rows, Behavior::Replace, &mut state, &log).unwrap();

        let set_id = state.attribute_set_id(4, "Furniture").unwrap().unwrap();
        let groups = state.attribute_groups(set_id).unwrap();
        assert_eq!(groups.len(), 2, "replace/append never delete groups");
    }

    #[test]
    fn delete_removes_named_sets_only() {
        let log = RecordingLogger::default();
        let mut state = MemoryStore::default();
        state.seed_attribute_set("Furniture", 1, &[]);
        state.seed_attribute_set("Garden", 2, &[]);

        let rows = vec![row(&[("attribute_set_name", "Furniture")])];
        let outcome = run_attribute_sets(&rows, Behavior::Delete, &mut state, &log).unwrap();
        assert_eq!(outcome.sets_removed, 1);
        assert_eq!(state.attribute_set_names(4).unwrap(), ["Garden"]);
    }

    #[test]
    fn prune_removes_unlisted_sets_then_unlisted_groups() {
        let log = RecordingLogger::default();
        let mut state = MemoryStore::default();
        state.seed_attribute_set("Furniture", 1, &[("General", 1), ("Obsolete", 2)]);
        state.seed_attribute_set("Garden", 2, &[("General", 1)]);

        let rows = vec![row(&[
            ("attribute_set_name", "Furniture"),
            ("sort_order", "1"),
            ("General", "1"),
        ])];
        let outcome =
            run_attribute_sets(&rows, Behavior::DeleteIfNotExist, &mut state, &log).unwrap();
        assert_eq!(outcome.sets_removed, 1);
        assert_eq!(outcome.groups_removed, 1);
        assert_eq!(state.attribute_set_names(4).unwrap(), ["Furniture"]);
        let set_id = state.attribute_set_id(4, "Furniture").unwrap().unwrap();
        assert_eq!(state.attribute_groups(set_id).unwrap(), [("General".to_string(), 1)]);
        assert!(log.contains("Removing attribute set 'Garden'"));
        assert!(log.contains("Removing group 'Obsolete' from attribute set 'Furniture'"));
    }

    #[test]
    fn prune_with_sort_order_change_keeps_group() {
        let log = RecordingLogger::default();
        let mut state = MemoryStore::default();
        state.seed_attribute_set("Furniture", 1, &[("General", 1)]);

        // Same group name, different sort order: name-only diffing keeps it.
        let rows = vec![row(&[
            ("attribute_set_name", "Furniture"),
            ("sort_order", "1"),
            ("General", "99"),
        ])];
        let outcome =
            run_attribute_sets(&rows, Behavior::DeleteIfNotExist, &mut state, &log).unwrap();
        assert_eq!(outcome.groups_removed, 0);
        let set_id = state.attribute_set_id(4, "Furniture").unwrap().unwrap();
        // Prune never writes sort orders either.
        assert_eq!(state.attribute_groups(set_id).unwrap(), [("General".to_string(), 1)]);
    }

    #[test]
    fn prune_skips_sets_it_cannot_resolve() {
        let log = RecordingLogger::default();
        let mut state = MemoryStore::default();
        let rows = vec![row(&[("attribute_set_name", "Ghost"), ("sort_order", "1")])];
        let outcome =
            run_attribute_sets(&rows, Behavior::DeleteIfNotExist, &mut state, &log).unwrap();
        assert_eq!(outcome.skipped, 1);
        assert!(log.contains("Attribute set 'Ghost' does not exist - skipping group prune"));
    }
}
