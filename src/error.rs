use thiserror::Error;

/// Caller-facing failure taxonomy for engine operations.
///
/// Every variant is a recoverable rejection: the engine leaves no partial
/// mutation behind when returning one of these.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Not authorized: {0}")]
    Authorization(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Insufficient funds: have {have}, need {need}")]
    InsufficientFunds { have: u64, need: u64 },

    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),

    #[error("Duplicate application: {0}")]
    DuplicateApplication(String),

    /// Snapshot I/O failures in the CLI path. Engine operations never
    /// produce this variant.
    #[error("Storage error: {0}")]
    Storage(String),
}

pub type Result<T> = std::result::Result<T, Error>;
