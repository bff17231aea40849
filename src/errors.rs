use serde::{Deserialize, Serialize};

/// Unified error type for every fallible operation in the crate.
///
/// The core never lets an I/O or parse failure escape as a panic: all
/// failure paths funnel into one of these variants and callers decide how
/// to surface them (the CLI maps them to exit codes, a web handler would
/// map them to HTTP responses).
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// An export or mutation was attempted on an order record that was
    /// never successfully loaded from the ledger.
    #[error("Order data not loaded: {0}")]
    DataNotLoaded(String),

    /// A destructive operation aborted because its pre-mutation backup
    /// could not be created. The live file is untouched in this case.
    #[error("Backup failed: {0}")]
    BackupFailed(String),
}

impl ServiceError {
    /// True when the error denotes an absent reference or file rather
    /// than a real fault.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ServiceError::NotFound(_))
    }
}

/// Aggregated result of a bulk operation that continues past individual
/// item failures instead of aborting on the first one.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct BulkOutcome {
    pub success_count: usize,
    pub error_count: usize,
    pub errors: Vec<String>,
}

impl BulkOutcome {
    pub fn record_success(&mut self) {
        self.success_count += 1;
    }

    pub fn record_failure(&mut self, message: String) {
        self.error_count += 1;
        self.errors.push(message);
    }

    /// Overall success means every item succeeded.
    pub fn is_success(&self) -> bool {
        self.error_count == 0
    }
}
