//! `catsync-recon` — catalog import reconciliation engine.
//!
//! Pure engine crate: receives pre-loaded rows and injected collaborators,
//! diffs them against existing entities, applies the decided operations, and
//! returns a report. No CLI or terminal IO.

pub mod attributes;
pub mod attrsets;
pub mod backend;
pub mod config;
pub mod engine;
pub mod error;
pub mod grouper;
pub mod locale;
pub mod matcher;
pub mod memory;
pub mod model;
pub mod options;

pub use backend::{AttributeRepository, EntityStore, Level, LocaleResolver, Logger};
pub use config::ImportConfig;
pub use engine::{load_rows, ImportReport, Importer, Operation, OPERATIONS};
pub use error::ImportError;
pub use model::{Behavior, Row};
