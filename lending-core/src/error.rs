//! Error types for the lending engine

use thiserror::Error;

/// Result type for lending operations
pub type Result<T> = std::result::Result<T, Error>;

/// Lending errors
///
/// Every variant is a recoverable condition handed back to the caller.
/// Failed operations leave catalog and ledger state untouched.
#[derive(Error, Debug)]
pub enum Error {
    /// Item, patron or loan not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Patron missing or inactive
    #[error("Patron not eligible: {0}")]
    PatronNotEligible(String),

    /// Patron already holds as many active loans as allowed
    #[error("Borrow limit reached ({limit} items)")]
    BorrowLimitExceeded {
        /// The patron's borrow limit
        limit: u32,
    },

    /// Patron already has an active loan for this item
    #[error("Already borrowed: patron {patron_id} holds item {item_id}")]
    AlreadyBorrowed {
        /// Borrowing patron
        patron_id: String,
        /// Requested item
        item_id: String,
    },

    /// Item missing, inactive, or with no copy on the shelf
    #[error("Item unavailable: {0}")]
    ItemUnavailable(String),

    /// Loan is already closed
    #[error("Loan already returned: {0}")]
    AlreadyReturned(String),

    /// Invariant violation (availability bounds, etc.)
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// Identity already registered
    #[error("Duplicate id: {0}")]
    DuplicateId(String),

    /// Storage error (RocksDB)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// Concurrency error (actor mailbox closed, etc.)
    #[error("Concurrency error: {0}")]
    Concurrency(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// True for the lending-rule rejections a caller is expected to handle
    /// (as opposed to infrastructure failures).
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Error::NotFound(_)
                | Error::PatronNotEligible(_)
                | Error::BorrowLimitExceeded { .. }
                | Error::AlreadyBorrowed { .. }
                | Error::ItemUnavailable(_)
                | Error::AlreadyReturned(_)
        )
    }
}

impl From<rocksdb::Error> for Error {
    fn from(err: rocksdb::Error) -> Self {
        Error::Storage(err.to_string())
    }
}
