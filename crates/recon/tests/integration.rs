use std::path::PathBuf;

use catsync_recon::backend::{AttributeRepository, EntityStore, Level};
use catsync_recon::engine::{load_rows, Importer, Operation};
use catsync_recon::locale::PackLocaleResolver;
use catsync_recon::memory::{MemoryStore, NullInstaller, NullResolver, RecordingLogger};
use catsync_recon::model::{Behavior, Row};
use catsync_recon::ImportConfig;

fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn fixture_rows(name: &str) -> Vec<Row> {
    let path = fixtures_dir().join(name);
    let data = std::fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("cannot read {}: {e}", path.display()));
    load_rows(&data, b';').unwrap()
}

fn run_stores(rows: &[Row], state: &mut MemoryStore, log: &RecordingLogger) {
    let mut locales = NullResolver;
    let mut importer = Importer::new(state, &mut locales, ImportConfig::default(), log);
    importer.run(Operation::Stores, rows, Behavior::Replace).unwrap();
}

// -------------------------------------------------------------------------
// Store hierarchy
// -------------------------------------------------------------------------

#[test]
fn two_websites_end_to_end() {
    let rows = fixture_rows("stores.csv");
    let log = RecordingLogger::default();
    let mut state = MemoryStore::default();
    run_stores(&rows, &mut state, &log);

    let websites = state.websites().unwrap();
    assert_eq!(websites.len(), 2);
    let base = websites.iter().find(|w| w.code == "base").unwrap();
    let other = websites.iter().find(|w| w.code == "other").unwrap();
    assert_eq!(base.name, "Base");
    assert!(base.is_default);
    assert!(!other.is_default);

    let groups = state.groups().unwrap();
    assert_eq!(groups.len(), 2);
    let main = groups.iter().find(|g| g.name == "Main").unwrap();
    let other_group = groups.iter().find(|g| g.name == "Other Group").unwrap();
    assert_eq!(main.website_id, base.id);
    assert_eq!(other_group.website_id, other.id);
    // Each group is default within its own website; independent sibling sets.
    assert_eq!(base.default_group_id, Some(main.id));
    assert_eq!(other.default_group_id, Some(other_group.id));

    let stores = state.stores().unwrap();
    assert_eq!(stores.len(), 2);
    let default_store = stores.iter().find(|s| s.code == "default").unwrap();
    let other_store = stores.iter().find(|s| s.code == "other_store").unwrap();
    assert_eq!(default_store.group_id, main.id);
    assert_eq!(other_store.group_id, other_group.id);
    assert_eq!(main.default_store_id, Some(default_store.id));
    assert_eq!(other_group.default_store_id, Some(other_store.id));

    // No cross-group default conflict warnings.
    assert_eq!(log.count(Level::Warning), 0);
    assert_eq!(log.count(Level::Error), 0);
}

#[test]
fn second_run_converges_to_no_op() {
    let rows = fixture_rows("stores.csv");
    let mut state = MemoryStore::default();
    run_stores(&rows, &mut state, &RecordingLogger::default());

    let log = RecordingLogger::default();
    run_stores(&rows, &mut state, &log);
    let changes: Vec<String> = log
        .entries()
        .into_iter()
        .filter(|(level, message)| {
            *level == Level::Info
                && (message.starts_with("Adding") || message.starts_with("Setting"))
        })
        .map(|(_, message)| message)
        .collect();
    assert!(changes.is_empty(), "second run logged changes: {changes:?}");
}

#[test]
fn store_missing_from_its_group_is_deactivated() {
    let rows = fixture_rows("stores.csv");
    let mut state = MemoryStore::default();
    run_stores(&rows, &mut state, &RecordingLogger::default());

    // Re-import Main with a fresh store and without `default`.
    let csv = "\
website_code;website_name;website_is_default;group_name;group_root_category;group_is_default;code;name;is_default;is_active
base;Base;true;Main;Default Category;true;replacement;Replacement Store;true;1
";
    let log = RecordingLogger::default();
    run_stores(&load_rows(csv, b';').unwrap(), &mut state, &log);

    let stores = state.stores().unwrap();
    assert_eq!(stores.len(), 3, "deactivation never deletes");
    let old = stores.iter().find(|s| s.code == "default").unwrap();
    assert!(!old.is_active);
    assert!(log.contains("Deactivating store 'default'"));
    // The untouched group keeps its store active.
    assert!(stores.iter().find(|s| s.code == "other_store").unwrap().is_active);
}

#[test]
fn locale_config_is_canonicalized_before_write() {
    let csv = "\
website_code;website_name;website_is_default;group_name;group_root_category;group_is_default;code;name;is_default;is_active;general/locale/code
base;Base;true;Main;Default Category;true;default;Default Store;true;1;de_AT
";
    let rows = load_rows(csv, b';').unwrap();
    let log = RecordingLogger::default();
    let mut state = MemoryStore::default();
    let config = ImportConfig::default();
    let mut locales = PackLocaleResolver::new(&config, NullInstaller, &log);
    let mut importer = Importer::new(&mut state, &mut locales, config.clone(), &log);
    importer.run(Operation::Stores, &rows, Behavior::Replace).unwrap();

    let store_id = state.stores().unwrap()[0].id;
    assert_eq!(
        state.config_value("stores", store_id, "general/locale/code"),
        Some("de_DE".to_string())
    );
    assert!(log.contains("No language pack found for de_AT but for de_DE - using that"));
}

// -------------------------------------------------------------------------
// Attribute pipeline
// -------------------------------------------------------------------------

#[test]
fn attribute_pipeline_through_registry() {
    let log = RecordingLogger::default();
    let mut state = MemoryStore::default();
    let mut locales = NullResolver;
    let mut importer = Importer::new(&mut state, &mut locales, ImportConfig::default(), &log);

    let attribute_rows = load_rows(
        "attribute_id;frontend_input;label\ncolor;select;Color\n",
        b';',
    )
    .unwrap();
    importer
        .run(Operation::Attributes, &attribute_rows, Behavior::Append)
        .unwrap();

    let set_rows = fixture_rows("attribute-sets.csv");
    let report = importer
        .run(Operation::AttributeSets, &set_rows, Behavior::Append)
        .unwrap();
    assert_eq!(report.summary.applied, 2);

    let association_rows = load_rows(
        "attribute_set_id;attribute_group_id;attribute_id;sort_order\nFurniture;General;color;10\n",
        b';',
    )
    .unwrap();
    let report = importer
        .run(Operation::AttributeAssociations, &association_rows, Behavior::Append)
        .unwrap();
    assert_eq!(report.summary.applied, 1);

    assert!(state.attribute_by_code(4, "color").unwrap().is_some());
    let furniture = state.attribute_set_id(4, "Furniture").unwrap().unwrap();
    let groups = state.attribute_groups(furniture).unwrap();
    assert_eq!(groups.len(), 2);
    assert_eq!(state.associations(4).unwrap().len(), 1);
}

#[test]
fn option_replace_matches_spec_example() {
    let log = RecordingLogger::default();
    let mut state = MemoryStore::default();
    state.seed_attribute("color", "select", &[(1, &[(0, "Red")]), (2, &[(0, "Blue")])]);
    let mut locales = NullResolver;
    let mut importer = Importer::new(&mut state, &mut locales, ImportConfig::default(), &log);

    // Desired input names no options at all: replace deletes everything.
    let rows = load_rows("attribute_id;label\ncolor;Green\n", b';').unwrap();
    let report = importer
        .run(Operation::AttributeOptions, &rows, Behavior::Replace)
        .unwrap();
    assert_eq!(report.summary.applied, 1);

    let options = state.attribute_options_by_code("color");
    assert_eq!(options.len(), 1);
    assert_eq!(options[0].1[&0], "Green");
}

#[test]
fn reports_serialize_to_json() {
    let log = RecordingLogger::default();
    let mut state = MemoryStore::default();
    let mut locales = NullResolver;
    let mut importer = Importer::new(&mut state, &mut locales, ImportConfig::default(), &log);
    let report = importer
        .run(Operation::Stores, &fixture_rows("stores.csv"), Behavior::Replace)
        .unwrap();

    let value = serde_json::to_value(&report).unwrap();
    assert_eq!(value["meta"]["operation"], "stores");
    assert_eq!(value["summary"]["applied"], 6);
    assert_eq!(value["summary"]["rejected_rows"], 0);
}

#[test]
fn rejected_rows_are_counted_but_not_fatal() {
    let csv = "\
website_code;website_name;website_is_default;group_name;group_root_category;group_is_default;code;name;is_default
base;Base;true;Main;Default Category;true;default;Default Store;true
base;;;Main;Default Category;true;broken;;
";
    let rows = load_rows(csv, b';').unwrap();
    let log = RecordingLogger::default();
    let mut state = MemoryStore::default();
    let mut locales = NullResolver;
    let mut importer = Importer::new(&mut state, &mut locales, ImportConfig::default(), &log);
    let report = importer.run(Operation::Stores, &rows, Behavior::Replace).unwrap();

    assert_eq!(report.summary.rejected_rows, 1);
    assert_eq!(state.stores().unwrap().len(), 1, "valid rows still applied");
    assert!(log.count(Level::Error) >= 1);
}
