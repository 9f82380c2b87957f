//! Core types for the lending engine
//!
//! All types are designed for:
//! - Lossless serialization (bincode, timestamps round-trip exactly)
//! - Lookup by identity (tables are keyed, never shared by reference)
//! - Exact arithmetic (Decimal for fines)

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Catalog item identifier (caller-chosen, e.g. an accession number)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ItemId(String);

impl ItemId {
    /// Create new item ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Patron identifier (caller-chosen, e.g. a card number)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PatronId(String);

impl PatronId {
    /// Create new patron ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PatronId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Loan identifier (UUIDv7, so ids sort by creation time)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LoanId(Uuid);

impl LoanId {
    /// Generate a fresh, time-ordered loan ID
    pub fn generate() -> Self {
        Self(Uuid::now_v7())
    }

    /// Wrap an existing UUID
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Underlying UUID
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for LoanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A lendable catalog entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    /// Item identity
    pub id: ItemId,

    /// Title
    pub title: String,

    /// Author
    pub author: String,

    /// ISBN (free-form, not validated)
    pub isbn: String,

    /// Genre label
    pub genre: String,

    /// Copies owned by the library
    pub total_copies: u32,

    /// Copies currently on the shelf (`0 <= available <= total`)
    pub available_copies: u32,

    /// Soft-delete flag; inactive items cannot be borrowed
    pub active: bool,
}

impl Item {
    /// Copies currently out on loan
    pub fn checked_out(&self) -> u32 {
        self.total_copies.saturating_sub(self.available_copies)
    }

    /// Whether at least one copy can be lent right now
    pub fn is_lendable(&self) -> bool {
        self.active && self.available_copies > 0
    }
}

/// Request to register a new catalog item
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewItem {
    /// Item identity
    pub id: ItemId,
    /// Title
    pub title: String,
    /// Author
    pub author: String,
    /// ISBN
    pub isbn: String,
    /// Genre label
    pub genre: String,
    /// Copies owned
    pub total_copies: u32,
}

/// Edit of an item's descriptive fields; `None` leaves a field as is.
/// Copy counts and status have their own operations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ItemUpdate {
    /// New title
    pub title: Option<String>,
    /// New author
    pub author: Option<String>,
    /// New ISBN
    pub isbn: Option<String>,
    /// New genre label
    pub genre: Option<String>,
}

/// An entity permitted to hold loans
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Patron {
    /// Patron identity
    pub id: PatronId,

    /// Display name
    pub name: String,

    /// Contact email (informational)
    pub email: String,

    /// Maximum number of simultaneously active loans
    pub borrow_limit: u32,

    /// Inactive patrons cannot borrow
    pub active: bool,
}

/// Request to register a new patron
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPatron {
    /// Patron identity
    pub id: PatronId,
    /// Display name
    pub name: String,
    /// Contact email
    pub email: String,
    /// Borrow limit; the configured default applies when absent
    pub borrow_limit: Option<u32>,
}

/// Edit of a patron's contact details; `None` leaves a field as is
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PatronUpdate {
    /// New display name
    pub name: Option<String>,
    /// New contact email
    pub email: Option<String>,
}

/// Loan type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum LoanKind {
    /// Item taken out by a patron
    Borrow = 1,
}

/// Loan status
///
/// `Active -> Returned` is the only transition. Overdue is not a status;
/// see [`Loan::is_overdue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum LoanStatus {
    /// Item is out with the patron
    Active = 1,
    /// Item is back (terminal)
    Returned = 2,
}

/// One item held by one patron over an interval
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Loan {
    /// Loan identity
    pub id: LoanId,

    /// Borrowing patron
    pub patron_id: PatronId,

    /// Borrowed item
    pub item_id: ItemId,

    /// Loan type
    pub kind: LoanKind,

    /// When the loan was created
    pub borrowed_at: DateTime<Utc>,

    /// When the item is due back
    pub due_at: DateTime<Utc>,

    /// When the item came back (set on return)
    pub returned_at: Option<DateTime<Utc>>,

    /// Current status
    pub status: LoanStatus,

    /// Fine assessed at return (zero while active)
    pub fine: Decimal,

    /// Free-form notes recorded at return
    pub notes: Option<String>,
}

impl Loan {
    /// Whether the item is still out
    pub fn is_active(&self) -> bool {
        self.status == LoanStatus::Active
    }

    /// Check if loan is in terminal state
    pub fn is_terminal(&self) -> bool {
        self.status == LoanStatus::Returned
    }

    /// Active and past its due date at `now`.
    ///
    /// Always recomputed; never stored on the loan.
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.is_active() && now > self.due_at
    }
}
