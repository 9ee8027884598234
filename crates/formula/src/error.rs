use thiserror::Error;

use vista_core::Metric;

#[derive(Error, Debug, PartialEq)]
pub enum FormulaError {
    #[error("Parse error at {position}: {message}")]
    Parse { position: usize, message: String },

    #[error("Unknown function: {0}")]
    UnknownFunction(String),

    #[error("Invalid cell reference: {0}")]
    InvalidReference(String),

    #[error("Metric '{0}' has no column in the data sheet")]
    UnboundMetric(Metric),

    #[error("Sheet not found: {0}")]
    SheetNotFound(String),

    #[error("Nothing to export: no branch records")]
    EmptyDataset,

    #[error("Branch '{id}' cannot be a lookup key: {reason}")]
    AmbiguousKey { id: String, reason: String },
}
