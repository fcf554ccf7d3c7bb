//! Attribute-definition and attribute↔group association imports.

use crate::backend::{AttributeRepository, Logger};
use crate::error::ImportError;
use crate::model::{Association, Behavior, Row};
use crate::options::extract_store_fields;

#[derive(Debug, Default)]
pub struct AttributeOutcome {
    pub applied: usize,
    pub removed: usize,
    pub rejected_rows: usize,
    pub skipped: usize,
}

pub fn run_attributes<A: AttributeRepository>(
    rows: &[Row],
    behavior: Behavior,
    repo: &mut A,
    views: &[(String, u64)],
    log: &dyn Logger,
) -> Result<AttributeOutcome, ImportError> {
    let entity_type = repo.entity_type_id()?;
    let mut outcome = AttributeOutcome::default();

    if behavior == Behavior::DeleteIfNotExist {
        let desired: Vec<&String> = rows.iter().filter_map(|row| row.get("attribute_id")).collect();
        for code in repo.user_defined_attributes(entity_type)? {
            if !desired.iter().any(|c| **c == code) {
                repo.remove_attribute(entity_type, &code)?;
                outcome.removed += 1;
            }
        }
        return Ok(outcome);
    }

    for (i, row) in rows.iter().enumerate() {
        let code = match row.get("attribute_id") {
            Some(code) if !code.is_empty() => code.clone(),
            _ => {
                log.error(&format!("Invalid row {i}: Missing attribute_id"));
                outcome.rejected_rows += 1;
                continue;
            }
        };

        match behavior {
            Behavior::Append | Behavior::Replace => {
                let mut properties = row.clone();
                properties.remove("attribute_id");
                let labels = extract_store_fields(&mut properties, "label", views);
                repo.add_attribute(entity_type, &code, &properties)?;
                if !labels.is_empty()
                    && repo.set_store_labels(entity_type, &code, &labels).is_err()
                {
                    log.warning(&format!("Could not update labels for {code}"));
                }
                outcome.applied += 1;
            }
            Behavior::Delete => {
                repo.remove_attribute(entity_type, &code)?;
                outcome.removed += 1;
            }
            _ => unreachable!("delete_if_not_exist handled above"),
        }
    }

    Ok(outcome)
}

struct AssociationSpec {
    set: String,
    group: String,
    attribute: String,
    sort_order: i64,
}

fn parse_association_rows(
    rows: &[Row],
    log: &dyn Logger,
) -> (Vec<AssociationSpec>, usize) {
    let mut specs = Vec::new();
    let mut rejected = 0;

    for (i, row) in rows.iter().enumerate() {
        let missing: Vec<&str> = ["attribute_set_id", "attribute_group_id", "attribute_id"]
            .into_iter()
            .filter(|key| row.get(key).map_or(true, String::is_empty))
            .collect();
        if !missing.is_empty() {
            log.error(&format!(
                "Invalid row {i}: Missing columns {}",
                missing.join(", ")
            ));
            rejected += 1;
            continue;
        }
        specs.push(AssociationSpec {
            set: row.get("attribute_set_id").unwrap().clone(),
            group: row.get("attribute_group_id").unwrap().clone(),
            attribute: row.get("attribute_id").unwrap().clone(),
            sort_order: row
                .get("sort_order")
                .and_then(|v| v.parse().ok())
                .unwrap_or(0),
        });
    }

    (specs, rejected)
}

/// Resolve a spec's names to ids; logs and yields nothing on any unknown
/// reference.
fn resolve_association<A: AttributeRepository>(
    spec: &AssociationSpec,
    entity_type: u64,
    repo: &A,
    log: &dyn Logger,
) -> Result<Option<Association>, ImportError> {
    let set_id = match repo.attribute_set_id(entity_type, &spec.set)? {
        Some(id) => id,
        None => {
            log.error(&format!("No attribute set with name '{}'", spec.set));
            return Ok(None);
        }
    };
    let group_id = match repo.attribute_group_id(set_id, &spec.group)? {
        Some(id) => id,
        None => {
            log.error(&format!(
                "No attribute group '{}' in attribute set '{}'",
                spec.group, spec.set
            ));
            return Ok(None);
        }
    };
    let attribute = match repo.attribute_by_code(entity_type, &spec.attribute)? {
        Some(attribute) => attribute,
        None => {
            log.error(&format!("No attribute with code {}", spec.attribute));
            return Ok(None);
        }
    };
    Ok(Some(Association { set_id, group_id, attribute_id: attribute.id }))
}

pub fn run_attribute_associations<A: AttributeRepository>(
    rows: &[Row],
    behavior: Behavior,
    repo: &mut A,
    log: &dyn Logger,
) -> Result<AttributeOutcome, ImportError> {
    let entity_type = repo.entity_type_id()?;
    let (specs, rejected_rows) = parse_association_rows(rows, log);
    let mut outcome = AttributeOutcome { rejected_rows, ..AttributeOutcome::default() };

    match behavior {
        Behavior::Append | Behavior::Replace => {
            for spec in &specs {
                repo.add_attribute_to_group(
                    entity_type,
                    &spec.set,
                    &spec.group,
                    &spec.attribute,
                    spec.sort_order,
                )?;
                outcome.applied += 1;
            }
        }
        Behavior::Delete => {
            for spec in &specs {
                match resolve_association(spec, entity_type, repo, log)? {
                    Some(association) => {
                        repo.remove_association(entity_type, association)?;
                        outcome.removed += 1;
                    }
                    None => outcome.skipped += 1,
                }
            }
        }
        Behavior::DeleteIfNotExist => {
            let mut desired = Vec::new();
            for spec in &specs {
                match resolve_association(spec, entity_type, repo, log)? {
                    Some(association) => desired.push(association),
                    None => outcome.skipped += 1,
                }
            }
            for existing in repo.associations(entity_type)? {
                if !desired.contains(&existing) {
                    repo.remove_association(entity_type, existing)?;
                    outcome.removed += 1;
                }
            }
        }
    }

    Ok(outcome)
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
    fn upsert_attribute_with_store_labels() {
        let log = RecordingLogger::default();
        let mut state = MemoryStore::default();
        let views = vec![("de".to_string(), 2u64)];
        let rows = vec![row(&[
            ("attribute_id", "color"),
            ("frontend_input", "select"),
            ("label", "Color"),
            ("label-de", "Farbe"),
        ])];
        let outcome = run_attributes(&rows, Behavior::Append, &mut state, &views, &log).unwrap();
        assert_eq!(outcome.applied, 1);

        let attribute = state.attribute_by_code(4, "color").unwrap().unwrap();
        assert_eq!(attribute.frontend_input, "select");
        assert_eq!(state.store_labels("color"), vec![(2, "Farbe".to_string())]);
    }

    #[test]
    fn delete_removes_named_attributes() {
        let log = RecordingLogger::default();
        let mut state = MemoryStore::default();
        state.seed_attribute("color", "select", &[]);
        let rows = vec![row(&[("attribute_id", "color")])];
        let outcome = run_attributes(&rows, Behavior::Delete, &mut state, &[], &log).unwrap();
        assert_eq!(outcome.removed, 1);
        assert!(state.attribute_by_code(4, "color").unwrap().is_none());
    }

    #[test]
    fn prune_spares_listed_and_system_attributes() {
        let log = RecordingLogger::default();
        let mut state = MemoryStore::default();
        state.seed_attribute("color", "select", &[]);
        state.seed_attribute("material", "select", &[]);
        state.seed_system_attribute("sku", "text");

        let rows = vec![row(&[("attribute_id", "color")])];
        let outcome =
            run_attributes(&rows, Behavior::DeleteIfNotExist, &mut state, &[], &log).unwrap();
        assert_eq!(outcome.removed, 1);
        assert!(state.attribute_by_code(4, "color").unwrap().is_some());
        assert!(state.attribute_by_code(4, "material").unwrap().is_none());
        assert!(state.attribute_by_code(4, "sku").unwrap().is_some());
    }

    #[test]
    fn associations_upsert_and_prune() {
        let log = RecordingLogger::default();
        let mut state = MemoryStore::default();
        state.seed_attribute("color", "select", &[]);
        state.seed_attribute("material", "select", &[]);
        state.seed_attribute_set("Furniture", 1, &[("General", 1)]);

        let rows = vec![
            row(&[
                ("attribute_set_id", "Furniture"),
                ("attribute_group_id", "General"),
                ("attribute_id", "color"),
                ("sort_order", "10"),
            ]),
            row(&[
                ("attribute_set_id", "Furniture"),
                ("attribute_group_id", "General"),
                ("attribute_id", "material"),
            ]),
        ];
        let outcome =
            run_attribute_associations(&rows, Behavior::Append, &mut state, &log).unwrap();
        assert_eq!(outcome.applied, 2);
        assert_eq!(state.associations(4).unwrap().len(), 2);

        // Prune down to color only.
        let keep = vec![row(&[
            ("attribute_set_id", "Furniture"),
            ("attribute_group_id", "General"),
            ("attribute_id", "color"),
        ])];
        let outcome =
            run_attribute_associations(&keep, Behavior::DeleteIfNotExist, &mut state, &log)
                .unwrap();
        assert_eq!(outcome.removed, 1);
        let remaining = state.associations(4).unwrap();
        assert_eq!(remaining.len(), 1);
        let color = state.attribute_by_code(4, "color").unwrap().unwrap();
        assert_eq!(remaining[0].attribute_id, color.id);
    }

    #[test]
    fn association_delete_skips_unknown_references() {
        let log = RecordingLogger::default();
        let mut state = MemoryStore::default();
        state.seed_attribute_set("Furniture", 1, &[("General", 1)]);
        let rows = vec![row(&[
            ("attribute_set_id", "Furniture"),
            ("attribute_group_id", "General"),
            ("attribute_id", "ghost"),
        ])];
        let outcome =
            run_attribute_associations(&rows, Behavior::Delete, &mut state, &log).unwrap();
        assert_eq!(outcome.removed, 0);
        assert_eq!(outcome.skipped, 1);
        assert!(log.contains("No attribute with code ghost"));
    }

    #[test]
    fn association_rows_missing_references_are_rejected() {
        let log = RecordingLogger::default();
        let mut state = MemoryStore::default();
        let rows = vec![row(&[("attribute_set_id", "Furniture")])];
        let outcome =
            run_attribute_associations(&rows, Behavior::Append, &mut state, &log).unwrap();
        assert_eq!(outcome.rejected_rows, 1);
        assert!(log.contains("Invalid row 0: Missing columns attribute_group_id, attribute_id"));
    }
}
