//! Reconciles desired attribute-option label sets against the options an
//! attribute already has, per store view.

use crate::backend::{AttributeRepository, Logger};
use crate::error::ImportError;
use crate::model::{Behavior, LabelSet, OptionBatch, OptionRef, Row};

#[derive(Debug, Default)]
pub struct OptionOutcome {
    pub batches_applied: usize,
    pub attributes_skipped: usize,
    pub rejected_rows: usize,
}

/// Desired option rows grouped per attribute code, in first-seen order.
/// Each entry keeps its per-attribute ordinal through the label set position.
#[derive(Debug, Default)]
pub struct DesiredOptions {
    pub by_attribute: Vec<(String, Vec<LabelSet>)>,
    pub rejected_rows: usize,
}

/// Pull `<field>-<store_code>` columns out of the row as a view-id → value
/// map, consuming them from the row.
pub(crate) fn extract_store_fields(
    row: &mut Row,
    field: &str,
    views: &[(String, u64)],
) -> LabelSet {
    let mut values = LabelSet::new();
    for (code, view_id) in views {
        let key = format!("{field}-{code}");
        if let Some(value) = row.remove(&key) {
            values.insert(*view_id, value);
        }
    }
    values
}

pub fn group_option_rows(
    rows: &[Row],
    views: &[(String, u64)],
    log: &dyn Logger,
) -> DesiredOptions {
    let mut desired = DesiredOptions::default();

    for (i, row) in rows.iter().enumerate() {
        let code = match row.get("attribute_id") {
            Some(code) if !code.is_empty() => code.clone(),
            _ => {
                log.error(&format!("Invalid row {i}: Missing attribute_id"));
                desired.rejected_rows += 1;
                continue;
            }
        };
        let mut row = row.clone();
        let mut labels = extract_store_fields(&mut row, "label", views);
        if let Some(admin) = row.get("label") {
            // Bare `label` is the admin-view fallback.
            labels.entry(0).or_insert_with(|| admin.clone());
        }
        if labels.is_empty() {
            log.error(&format!("Invalid row {i}: No label(s)"));
            desired.rejected_rows += 1;
            continue;
        }

        match desired.by_attribute.iter_mut().find(|(c, _)| *c == code) {
            Some((_, sets)) => sets.push(labels),
            None => desired.by_attribute.push((code, vec![labels])),
        }
    }

    desired
}

/// Diff one attribute's desired label sets against its present options.
///
/// A desired set matches the first remaining present option that carries
/// every desired view with the same label. Matches consume both sides.
/// Key coverage alone is not enough: a key-only subset test would consume a
/// renamed label as a match and make it impossible to ever append the new
/// value (see `label_value_conflict_does_not_match`).
pub fn diff_option_sets(
    behavior: Behavior,
    attribute_id: u64,
    desired: &[LabelSet],
    present: Vec<(u64, LabelSet)>,
) -> OptionBatch {
    let mut present = present;
    let mut batch = OptionBatch { attribute_id, delete: Vec::new(), value: Vec::new() };
    let mut unmatched: Vec<(usize, &LabelSet)> = Vec::new();

    for (ordinal, labels) in desired.iter().enumerate() {
        let position = present
            .iter()
            .position(|(_, present_labels)| {
                labels
                    .iter()
                    .all(|(view, label)| present_labels.get(view) == Some(label))
            });
        match position {
            Some(found) => {
                let (option_id, present_labels) = present.remove(found);
                if behavior == Behavior::Delete {
                    batch.delete.push(option_id);
                    batch.value.push((OptionRef::Existing(option_id), present_labels));
                }
            }
            None => unmatched.push((ordinal, labels)),
        }
    }

    if behavior == Behavior::Replace {
        for (option_id, present_labels) in present {
            batch.delete.push(option_id);
            batch.value.push((OptionRef::Existing(option_id), present_labels));
        }
    }

    if matches!(behavior, Behavior::Replace | Behavior::Append) {
        for (ordinal, labels) in unmatched {
            batch.value.push((OptionRef::New(ordinal), labels.clone()));
        }
    }

    batch
}

pub fn run_attribute_options<A: AttributeRepository>(
    rows: &[Row],
    behavior: Behavior,
    repo: &mut A,
    views: &[(String, u64)],
    log: &dyn Logger,
) -> Result<OptionOutcome, ImportError> {
    let entity_type = repo.entity_type_id()?;
    let desired = group_option_rows(rows, views, log);
    let mut outcome = OptionOutcome {
        rejected_rows: desired.rejected_rows,
        ..OptionOutcome::default()
    };

    for (code, label_sets) in &desired.by_attribute {
        let attribute = match repo.attribute_by_code(entity_type, code)? {
            Some(attribute) => attribute,
            None => {
                log.error(&format!("No attribute with code {code}"));
                outcome.attributes_skipped += 1;
                continue;
            }
        };
        if !matches!(attribute.frontend_input.as_str(), "select" | "multiselect") {
            log.error(&format!("Attribute {code} is not a select/multiselect"));
            outcome.attributes_skipped += 1;
            continue;
        }

        let present = present_options(repo, attribute.id, views)?;
        let batch = diff_option_sets(behavior, attribute.id, label_sets, present);
        if !batch.value.is_empty() {
            repo.apply_option_batch(&batch)?;
            outcome.batches_applied += 1;
        }
    }

    Ok(outcome)
}

/// Merge per-view option rows into optionId → (viewId → label), preserving
/// the order options are first seen in.
fn present_options<A: AttributeRepository>(
    repo: &A,
    attribute_id: u64,
    views: &[(String, u64)],
) -> Result<Vec<(u64, LabelSet)>, ImportError> {
    let mut merged: Vec<(u64, LabelSet)> = Vec::new();
    let mut view_ids = vec![0u64];
    view_ids.extend(views.iter().map(|(_, id)| *id));

    for view in view_ids {
        for option in repo.attribute_options(attribute_id, view)? {
            match merged.iter_mut().find(|(id, _)| *id == option.option_id) {
                Some((_, labels)) => {
                    labels.insert(view, option.label);
                }
                None => {
                    let mut labels = LabelSet::new();
                    labels.insert(view, option.label);
                    merged.push((option.option_id, labels));
                }
            }
        }
    }

    Ok(merged)
}
