use std::fmt;

use crate::model::Behavior;

#[derive(Debug)]
pub enum ImportError {
    /// TOML parse / deserialization error.
    ConfigParse(String),
    /// CSV read error.
    Csv(String),
    /// Operation name not present in the registry.
    UnknownOperation(String),
    /// Behavior not accepted by the targeted operation.
    UnsupportedBehavior { operation: String, behavior: Behavior },
    /// A collaborator (entity store / attribute repository) failed while
    /// applying a decided operation. Fatal to the batch.
    Backend(String),
    /// IO error (file read, etc.).
    Io(String),
}

impl fmt::Display for ImportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigParse(msg) => write!(f, "config parse error: {msg}"),
            Self::Csv(msg) => write!(f, "CSV error: {msg}"),
            Self::UnknownOperation(name) => write!(f, "unknown operation: {name}"),
            Self::UnsupportedBehavior { operation, behavior } => {
                write!(f, "operation '{operation}': behavior '{behavior}' not supported")
            }
            Self::Backend(msg) => write!(f, "backend error: {msg}"),
            Self::Io(msg) => write!(f, "IO error: {msg}"),
        }
    }
}

impl std::error::Error for ImportError {}
