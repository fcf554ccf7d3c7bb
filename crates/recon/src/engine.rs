//! Import orchestration: the operation registry, the `Importer` facade over
//! the injected collaborators, CSV row ingestion, and run reports.

use serde::Serialize;

use crate::attributes::{run_attribute_associations, run_attributes};
use crate::attrsets::run_attribute_sets;
use crate::backend::{AttributeRepository, EntityStore, LocaleResolver, Logger};
use crate::config::ImportConfig;
use crate::error::ImportError;
use crate::grouper::group_rows;
use crate::locale::run_locales;
use crate::matcher::sync_stores;
use crate::model::{Behavior, OrderedMap, Row};
use crate::options::run_attribute_options;

// ---------------------------------------------------------------------------
// Operation registry
// ---------------------------------------------------------------------------

/// One importable row-set kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Stores,
    Attributes,
    AttributeSets,
    AttributeOptions,
    AttributeAssociations,
    Locales,
}

/// Statically declared name → operation table; front ends dispatch and build
/// their help text from this.
pub const OPERATIONS: &[(&str, Operation)] = &[
    ("stores", Operation::Stores),
    ("attributes", Operation::Attributes),
    ("attribute-sets", Operation::AttributeSets),
    ("attribute-options", Operation::AttributeOptions),
    ("attribute-associations", Operation::AttributeAssociations),
    ("locales", Operation::Locales),
];

impl Operation {
    pub fn from_name(name: &str) -> Option<Operation> {
        OPERATIONS
            .iter()
            .find(|(op_name, _)| *op_name == name)
            .map(|(_, operation)| *operation)
    }

    pub fn name(&self) -> &'static str {
        OPERATIONS
            .iter()
            .find(|(_, operation)| operation == self)
            .map(|(name, _)| *name)
            .expect("every operation is registered")
    }

    /// Attribute-oriented operations additionally accept `delete_if_not_exist`.
    pub fn is_attribute_kind(&self) -> bool {
        self.name().starts_with("attribute")
    }
}

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct ImportReport {
    pub meta: ReportMeta,
    pub summary: ReportSummary,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportMeta {
    pub operation: String,
    pub behavior: String,
    pub engine_version: String,
    pub run_at: String,
}

/// Counts of what the run decided. Rejected rows and skipped entities are
/// reported back so the caller can decide whether partial success is failure.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReportSummary {
    pub applied: usize,
    pub removed: usize,
    pub deactivated: usize,
    pub rejected_rows: usize,
    pub skipped: usize,
}

fn report(operation: Operation, behavior: Behavior, summary: ReportSummary) -> ImportReport {
    ImportReport {
        meta: ReportMeta {
            operation: operation.name().to_string(),
            behavior: behavior.to_string(),
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            run_at: chrono::Utc::now().to_rfc3339(),
        },
        summary,
    }
}

// ---------------------------------------------------------------------------
// Row ingestion
// ---------------------------------------------------------------------------

/// Load CSV data into rows. The first record is the header; empty cells are
/// dropped so "column absent" and "column empty" read the same downstream.
pub fn load_rows(csv_data: &str, delimiter: u8) -> Result<Vec<Row>, ImportError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(csv_data.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| ImportError::Csv(e.to_string()))?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| ImportError::Csv(e.to_string()))?;
        let mut row = OrderedMap::new();
        for (i, header) in headers.iter().enumerate() {
            match record.get(i) {
                Some(value) if !value.is_empty() => {
                    row.insert(header.clone(), value.to_string());
                }
                _ => {}
            }
        }
        rows.push(row);
    }

    Ok(rows)
}

// ---------------------------------------------------------------------------
// Importer
// ---------------------------------------------------------------------------

/// Facade binding the injected collaborators to the import operations.
/// One instance handles one batch at a time; nothing is cached across runs.
pub struct Importer<'a, B, R>
where
    B: EntityStore + AttributeRepository,
    R: LocaleResolver,
{
    backend: &'a mut B,
    locales: &'a mut R,
    config: ImportConfig,
    logger: &'a dyn Logger,
}

impl<'a, B, R> Importer<'a, B, R>
where
    B: EntityStore + AttributeRepository,
    R: LocaleResolver,
{
    pub fn new(
        backend: &'a mut B,
        locales: &'a mut R,
        config: ImportConfig,
        logger: &'a dyn Logger,
    ) -> Self {
        Self { backend, locales, config, logger }
    }

    /// Dispatch through the registry.
    pub fn run(
        &mut self,
        operation: Operation,
        rows: &[Row],
        behavior: Behavior,
    ) -> Result<ImportReport, ImportError> {
        match operation {
            Operation::Stores => self.import_stores(rows, behavior),
            Operation::Attributes => self.import_attributes(rows, behavior),
            Operation::AttributeSets => self.import_attribute_sets(rows, behavior),
            Operation::AttributeOptions => self.import_attribute_options(rows, behavior),
            Operation::AttributeAssociations => {
                self.import_attribute_associations(rows, behavior)
            }
            Operation::Locales => self.import_locales(rows, behavior),
        }
    }

    /// Store code → store-view id, the mapping label columns are keyed by.
    fn store_views(&self) -> Result<Vec<(String, u64)>, ImportError> {
        Ok(self
            .backend
            .stores()?
            .into_iter()
            .map(|store| (store.code, store.id))
            .collect())
    }

    pub fn import_stores(
        &mut self,
        rows: &[Row],
        behavior: Behavior,
    ) -> Result<ImportReport, ImportError> {
        if !matches!(behavior, Behavior::Append | Behavior::Replace) {
            self.logger
                .error(&format!("Behavior {behavior} currently not supported"));
            return Err(ImportError::UnsupportedBehavior {
                operation: Operation::Stores.name().to_string(),
                behavior,
            });
        }

        let grouped = group_rows(rows, self.logger);
        let outcome = sync_stores(
            &grouped.websites,
            &mut *self.backend,
            &mut *self.locales,
            &self.config.locale_key,
            self.logger,
        )?;

        Ok(report(
            Operation::Stores,
            behavior,
            ReportSummary {
                applied: outcome.websites_added + outcome.groups_added + outcome.stores_added,
                deactivated: outcome.stores_deactivated,
                rejected_rows: grouped.rejected_rows,
                ..ReportSummary::default()
            },
        ))
    }

    pub fn import_attributes(
        &mut self,
        rows: &[Row],
        behavior: Behavior,
    ) -> Result<ImportReport, ImportError> {
        let views = self.store_views()?;
        let outcome = run_attributes(rows, behavior, &mut *self.backend, &views, self.logger)?;
        Ok(report(
            Operation::Attributes,
            behavior,
            ReportSummary {
                applied: outcome.applied,
                removed: outcome.removed,
                rejected_rows: outcome.rejected_rows,
                skipped: outcome.skipped,
                ..ReportSummary::default()
            },
        ))
    }

    pub fn import_attribute_sets(
        &mut self,
        rows: &[Row],
        behavior: Behavior,
    ) -> Result<ImportReport, ImportError> {
        let outcome = run_attribute_sets(rows, behavior, &mut *self.backend, self.logger)?;
        Ok(report(
            Operation::AttributeSets,
            behavior,
            ReportSummary {
                applied: outcome.sets_applied,
                removed: outcome.sets_removed + outcome.groups_removed,
                rejected_rows: outcome.rejected_rows,
                skipped: outcome.skipped,
                ..ReportSummary::default()
            },
        ))
    }

    pub fn import_attribute_options(
        &mut self,
        rows: &[Row],
        behavior: Behavior,
    ) -> Result<ImportReport, ImportError> {
        let views = self.store_views()?;
        let outcome =
            run_attribute_options(rows, behavior, &mut *self.backend, &views, self.logger)?;
        Ok(report(
            Operation::AttributeOptions,
            behavior,
            ReportSummary {
                applied: outcome.batches_applied,
                rejected_rows: outcome.rejected_rows,
                skipped: outcome.attributes_skipped,
                ..ReportSummary::default()
            },
        ))
    }

    pub fn import_attribute_associations(
        &mut self,
        rows: &[Row],
        behavior: Behavior,
    ) -> Result<ImportReport, ImportError> {
        let outcome =
            run_attribute_associations(rows, behavior, &mut *self.backend, self.logger)?;
        Ok(report(
            Operation::AttributeAssociations,
            behavior,
            ReportSummary {
                applied: outcome.applied,
                removed: outcome.removed,
                rejected_rows: outcome.rejected_rows,
                skipped: outcome.skipped,
                ..ReportSummary::default()
            },
        ))
    }

    pub fn import_locales(
        &mut self,
        rows: &[Row],
        behavior: Behavior,
    ) -> Result<ImportReport, ImportError> {
        let outcome = run_locales(rows, &mut *self.locales, self.logger);
        Ok(report(
            Operation::Locales,
            behavior,
            ReportSummary {
                applied: outcome.resolved,
                rejected_rows: outcome.rejected_rows,
                ..ReportSummary::default()
            },
        ))
    }
}
