//! Library orchestration layer
//!
//! Ties the catalog, patron directory and ledger together with an optional
//! persistence collaborator. A borrow or return is applied in memory, then
//! committed; if the commit fails the in-memory change is undone, so the
//! tables and the store never disagree.
//!
//! # Example
//!
//! ```
//! use chrono::Utc;
//! use lending_core::{ItemId, Library, NewItem, NewPatron, PatronId};
//! use lending_core::config::LendingPolicy;
//!
//! let mut library = Library::in_memory(LendingPolicy::default())?;
//! library.add_item(NewItem {
//!     id: ItemId::new("B-1"),
//!     title: "The Hobbit".into(),
//!     author: "J.R.R. Tolkien".into(),
//!     isbn: "978-0-547-92822-7".into(),
//!     genre: "Fantasy".into(),
//!     total_copies: 2,
//! })?;
//! library.register_patron(NewPatron {
//!     id: PatronId::new("P-1"),
//!     name: "Jane".into(),
//!     email: "jane@example.com".into(),
//!     borrow_limit: None,
//! })?;
//!
//! let now = Utc::now();
//! let loan = library.borrow(&PatronId::new("P-1"), &ItemId::new("B-1"), now, None)?;
//! let fine = library.return_loan(loan.id, now, None)?;
//! assert!(fine.is_zero());
//! # Ok::<(), lending_core::Error>(())
//! ```

use crate::{
    aggregator::Aggregator,
    catalog::CatalogStore,
    config::LendingPolicy,
    directory::PatronDirectory,
    ledger::{Eligibility, Ledger},
    metrics::Metrics,
    storage::{Persistence, Storage},
    types::{
        Item, ItemId, ItemUpdate, Loan, LoanId, NewItem, NewPatron, Patron, PatronId,
        PatronUpdate,
    },
    Config, Error, Result,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// Lending engine: tables plus their commit boundary
pub struct Library {
    /// Item table (sole writer of availability)
    catalog: CatalogStore,

    /// Patron table
    directory: PatronDirectory,

    /// Loan table and state machine
    ledger: Ledger,

    /// Persistence collaborator (absent for purely in-memory use)
    store: Option<Box<dyn Persistence>>,

    /// Metrics
    metrics: Metrics,
}

impl std::fmt::Debug for Library {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Library")
            .field("items", &self.catalog.len())
            .field("patrons", &self.directory.len())
            .field("loans", &self.ledger.len())
            .field("persistent", &self.store.is_some())
            .finish()
    }
}

impl Library {
    /// Empty library without persistence
    pub fn in_memory(policy: LendingPolicy) -> Result<Self> {
        policy.validate()?;
        Ok(Self {
            catalog: CatalogStore::new(),
            directory: PatronDirectory::new(policy.default_borrow_limit),
            ledger: Ledger::new(policy),
            store: None,
            metrics: new_metrics()?,
        })
    }

    /// Load every table from `store` and keep committing to it
    pub fn with_store(policy: LendingPolicy, store: Box<dyn Persistence>) -> Result<Self> {
        policy.validate()?;
        let tables = store.load()?;

        let library = Self {
            catalog: CatalogStore::from_items(tables.items)?,
            directory: PatronDirectory::from_patrons(policy.default_borrow_limit, tables.patrons)?,
            ledger: Ledger::from_loans(policy, tables.loans)?,
            store: Some(store),
            metrics: new_metrics()?,
        };

        if let Err(e) = library.check_invariants() {
            tracing::error!(error = %e, "Persisted lending state is inconsistent");
            return Err(e);
        }

        let active = library.ledger.loans().filter(|loan| loan.is_active()).count();
        library.metrics.set_active_loans(active);

        Ok(library)
    }

    /// Open the RocksDB store named by `config` and load it
    pub fn open(config: &Config) -> Result<Self> {
        let storage = Storage::open(config)?;
        Self::with_store(config.policy.clone(), Box::new(storage))
    }

    /// Item table
    pub fn catalog(&self) -> &CatalogStore {
        &self.catalog
    }

    /// Patron table
    pub fn directory(&self) -> &PatronDirectory {
        &self.directory
    }

    /// Loan table
    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Metrics
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Reporting view over the current tables
    pub fn reports(&self) -> Aggregator<'_> {
        Aggregator::new(&self.catalog, &self.directory, &self.ledger)
    }

    // Catalog administration

    /// Register a new item
    pub fn add_item(&mut self, new_item: NewItem) -> Result<Item> {
        let before = self.catalog.clone();
        let item = self.catalog.add_item(new_item)?;
        if let Err(e) = self.persist_item(&item) {
            self.catalog = before;
            return Err(e);
        }
        Ok(item)
    }

    /// Change an item's copy count; copies on loan stay on loan
    pub fn set_total_copies(&mut self, item_id: &ItemId, total: u32) -> Result<Item> {
        let before = self.catalog.clone();
        let item = self.catalog.set_total_copies(item_id, total)?;
        if let Err(e) = self.persist_item(&item) {
            self.catalog = before;
            return Err(e);
        }
        Ok(item)
    }

    /// Edit an item's descriptive fields
    pub fn update_item(&mut self, item_id: &ItemId, update: ItemUpdate) -> Result<Item> {
        let before = self.catalog.clone();
        let item = self.catalog.update_item(item_id, update)?;
        if let Err(e) = self.persist_item(&item) {
            self.catalog = before;
            return Err(e);
        }
        Ok(item)
    }

    /// Withdraw an item from circulation (or bring it back)
    pub fn set_item_active(&mut self, item_id: &ItemId, active: bool) -> Result<Item> {
        let before = self.catalog.clone();
        let item = if active {
            self.catalog.reactivate(item_id)?
        } else {
            self.catalog.deactivate(item_id)?
        };
        if let Err(e) = self.persist_item(&item) {
            self.catalog = before;
            return Err(e);
        }
        Ok(item)
    }

    // Patron administration

    /// Register a new patron
    pub fn register_patron(&mut self, new_patron: NewPatron) -> Result<Patron> {
        let before = self.directory.clone();
        let patron = self.directory.register(new_patron)?;
        if let Err(e) = self.persist_patron(&patron) {
            self.directory = before;
            return Err(e);
        }
        Ok(patron)
    }

    /// Activate or suspend a patron
    pub fn set_patron_active(&mut self, patron_id: &PatronId, active: bool) -> Result<Patron> {
        let before = self.directory.clone();
        let patron = self.directory.set_active(patron_id, active)?;
        if let Err(e) = self.persist_patron(&patron) {
            self.directory = before;
            return Err(e);
        }
        Ok(patron)
    }

    /// Edit a patron's name or email
    pub fn update_patron(&mut self, patron_id: &PatronId, update: PatronUpdate) -> Result<Patron> {
        let before = self.directory.clone();
        let patron = self.directory.update_patron(patron_id, update)?;
        if let Err(e) = self.persist_patron(&patron) {
            self.directory = before;
            return Err(e);
        }
        Ok(patron)
    }

    /// Change a patron's borrow limit
    pub fn set_borrow_limit(&mut self, patron_id: &PatronId, limit: u32) -> Result<Patron> {
        let before = self.directory.clone();
        let patron = self.directory.set_borrow_limit(patron_id, limit)?;
        if let Err(e) = self.persist_patron(&patron) {
            self.directory = before;
            return Err(e);
        }
        Ok(patron)
    }

    // Lending

    /// Advisory "may this patron borrow" check
    pub fn check_eligibility(&self, patron_id: &PatronId, now: DateTime<Utc>) -> Eligibility {
        self.ledger.check_eligibility(&self.directory, patron_id, now)
    }

    /// Lend `item_id` to `patron_id`; see [`Ledger::borrow`]
    pub fn borrow(
        &mut self,
        patron_id: &PatronId,
        item_id: &ItemId,
        now: DateTime<Utc>,
        due_at: Option<DateTime<Utc>>,
    ) -> Result<Loan> {
        let loan = match self
            .ledger
            .borrow(&self.directory, &mut self.catalog, patron_id, item_id, now, due_at)
        {
            Ok(loan) => loan,
            Err(e) => {
                self.note_failure("borrow", &e);
                if e.is_rejection() {
                    self.metrics.record_rejection(&e);
                }
                return Err(e);
            }
        };

        if let Some(store) = &self.store {
            let committed = self
                .catalog
                .get(&loan.item_id)
                .and_then(|item| store.commit_loan(&loan, item));

            if let Err(e) = committed {
                tracing::warn!(
                    loan_id = %loan.id,
                    error = %e,
                    "Borrow commit failed, rolling back"
                );
                if let Err(undo) = self.ledger.undo_borrow(&mut self.catalog, loan.id) {
                    self.note_failure("borrow rollback", &undo);
                }
                return Err(e);
            }
        }

        self.metrics.record_borrow();
        tracing::info!(
            loan_id = %loan.id,
            patron_id = %loan.patron_id,
            item_id = %loan.item_id,
            due_at = %loan.due_at,
            "Item borrowed"
        );

        Ok(loan)
    }

    /// Close `loan_id`; see [`Ledger::return_loan`]
    pub fn return_loan(
        &mut self,
        loan_id: LoanId,
        returned_at: DateTime<Utc>,
        notes: Option<String>,
    ) -> Result<Decimal> {
        let previous = self.ledger.get(loan_id)?.clone();

        let fine = match self
            .ledger
            .return_loan(&mut self.catalog, loan_id, returned_at, notes)
        {
            Ok(fine) => fine,
            Err(e) => {
                self.note_failure("return", &e);
                return Err(e);
            }
        };

        if let Some(store) = &self.store {
            let committed = self.ledger.get(loan_id).and_then(|loan| {
                let item = self.catalog.get(&loan.item_id)?;
                store.commit_loan(loan, item)
            });

            if let Err(e) = committed {
                tracing::warn!(
                    loan_id = %loan_id,
                    error = %e,
                    "Return commit failed, rolling back"
                );
                if let Err(undo) = self.ledger.undo_return(&mut self.catalog, previous) {
                    self.note_failure("return rollback", &undo);
                }
                return Err(e);
            }
        }

        self.metrics.record_return(fine);
        tracing::info!(
            loan_id = %loan_id,
            patron_id = %previous.patron_id,
            item_id = %previous.item_id,
            fine = %fine,
            "Item returned"
        );

        Ok(fine)
    }

    /// Verify cross-table consistency.
    ///
    /// Every item's checked-out count must equal its active loans, and
    /// every loan must reference a known patron and item.
    pub fn check_invariants(&self) -> Result<()> {
        for loan in self.ledger.loans() {
            self.directory.get(&loan.patron_id).map_err(|_| {
                Error::InvariantViolation(format!(
                    "loan {} references unknown patron {}",
                    loan.id, loan.patron_id
                ))
            })?;
            self.catalog.get(&loan.item_id).map_err(|_| {
                Error::InvariantViolation(format!(
                    "loan {} references unknown item {}",
                    loan.id, loan.item_id
                ))
            })?;
        }

        for item in self.catalog.iter() {
            let active = self.ledger.active_loan_count_for_item(&item.id);
            if item.available_copies > item.total_copies || item.checked_out() as usize != active {
                return Err(Error::InvariantViolation(format!(
                    "item {}: {} of {} available but {} active loans",
                    item.id, item.available_copies, item.total_copies, active
                )));
            }
        }

        Ok(())
    }

    fn persist_item(&self, item: &Item) -> Result<()> {
        match &self.store {
            Some(store) => store.save_item(item),
            None => Ok(()),
        }
    }

    fn persist_patron(&self, patron: &Patron) -> Result<()> {
        match &self.store {
            Some(store) => store.save_patron(patron),
            None => Ok(()),
        }
    }

    fn note_failure(&self, operation: &str, error: &Error) {
        if matches!(error, Error::InvariantViolation(_)) {
            tracing::error!(operation, error = %error, "Unexpected invariant violation");
        }
    }
}

fn new_metrics() -> Result<Metrics> {
    Metrics::new().map_err(|e| Error::Config(format!("Failed to create metrics: {}", e)))
}
