//! Lending Core
//!
//! Circulation engine for a library: a catalog of items with copy counts, a
//! directory of patrons with borrow limits, and a ledger of loans that moves
//! copies between the shelf and patrons.
//!
//! # Architecture
//!
//! - **Catalog**: items and their availability; only the ledger may move copies
//! - **Directory**: patrons, their status and borrow limits
//! - **Ledger**: the `Active -> Returned` loan state machine and fines
//! - **Aggregator**: read-only reports recomputed from the tables
//! - **Library**: ties the tables to RocksDB with all-or-nothing commits
//! - **Actor**: single writer so concurrent borrows serialize

#![forbid(unsafe_code)]
//!
//! # Invariants
//!
//! - Availability: `0 <= available_copies <= total_copies` for every item
//! - Conservation: `total - available` == active loans of that item
//! - Uniqueness: at most one active loan per (patron, item)
//! - Limit: a borrow never takes a patron past their borrow limit
//! - Atomicity: a failed borrow or return leaves every table unchanged

#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod types;
pub mod error;
pub mod config;
pub mod catalog;
pub mod directory;
pub mod ledger;
pub mod aggregator;
pub mod storage;
pub mod library;
pub mod actor;
pub mod metrics;

// Re-exports
pub use error::{Error, Result};
pub use types::{
    Item, ItemId, ItemUpdate, Loan, LoanId, LoanKind, LoanStatus, NewItem, NewPatron, Patron,
    PatronId, PatronUpdate,
};
pub use ledger::{Eligibility, IneligibleReason, Ledger};
pub use aggregator::Aggregator;
pub use library::Library;
pub use actor::{spawn_library_actor, LibraryHandle};
pub use storage::Storage;
pub use config::Config;
