//! Single-writer access to a [`Library`]
//!
//! All borrows and returns for a library go through one task that owns it,
//! so two callers racing for the last copy of an item are serialized and
//! exactly one of them wins.
//!
//! # Architecture
//!
//! ```text
//!   LibraryHandle (Clone) ── LibraryHandle ── LibraryHandle
//!              │                  │                │
//!              └──────── mpsc::channel (bounded) ──┘
//!                                 │
//!                                 ▼
//!                    LendingActor (single task)
//!                    owns Library: catalog,
//!                    directory, ledger, store
//! ```

use crate::{
    aggregator::{Dashboard, PatronSummary},
    ledger::Eligibility,
    types::{Item, ItemId, Loan, LoanId, NewItem, NewPatron, Patron, PatronId},
    Error, Library, Result,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::{mpsc, oneshot};

/// Message sent to the lending actor
#[derive(Debug)]
pub enum LendingMessage {
    /// Lend an item
    Borrow {
        patron_id: PatronId,
        item_id: ItemId,
        now: DateTime<Utc>,
        due_at: Option<DateTime<Utc>>,
        response: oneshot::Sender<Result<Loan>>,
    },

    /// Close a loan
    Return {
        loan_id: LoanId,
        returned_at: DateTime<Utc>,
        notes: Option<String>,
        response: oneshot::Sender<Result<Decimal>>,
    },

    /// Get a loan by ID
    GetLoan {
        loan_id: LoanId,
        response: oneshot::Sender<Result<Loan>>,
    },

    /// Get an item by ID
    GetItem {
        item_id: ItemId,
        response: oneshot::Sender<Result<Item>>,
    },

    /// Advisory eligibility check
    Eligibility {
        patron_id: PatronId,
        now: DateTime<Utc>,
        response: oneshot::Sender<Eligibility>,
    },

    /// Library-wide overview
    Dashboard {
        now: DateTime<Utc>,
        response: oneshot::Sender<Dashboard>,
    },

    /// One patron's standing
    PatronSummary {
        patron_id: PatronId,
        now: DateTime<Utc>,
        response: oneshot::Sender<Result<PatronSummary>>,
    },

    /// Active loans past due
    OverdueLoans {
        now: DateTime<Utc>,
        response: oneshot::Sender<Vec<Loan>>,
    },

    /// Register an item
    AddItem {
        item: NewItem,
        response: oneshot::Sender<Result<Item>>,
    },

    /// Register a patron
    RegisterPatron {
        patron: NewPatron,
        response: oneshot::Sender<Result<Patron>>,
    },

    /// Stop the actor
    Shutdown,
}

/// Task owning the library
#[derive(Debug)]
pub struct LendingActor {
    library: Library,
    mailbox: mpsc::Receiver<LendingMessage>,
}

impl LendingActor {
    /// Create new actor
    pub fn new(library: Library, mailbox: mpsc::Receiver<LendingMessage>) -> Self {
        Self { library, mailbox }
    }

    /// Process messages until shutdown or until every handle is dropped.
    /// Gives the library back so callers can inspect its final state.
    pub async fn run(mut self) -> Library {
        while let Some(msg) = self.mailbox.recv().await {
            if let LendingMessage::Shutdown = msg {
                tracing::info!("Lending actor shutting down");
                break;
            }
            self.handle_message(msg);
        }
        self.library
    }

    fn handle_message(&mut self, msg: LendingMessage) {
        // A dropped receiver means the caller gave up; nothing to do.
        match msg {
            LendingMessage::Borrow {
                patron_id,
                item_id,
                now,
                due_at,
                response,
            } => {
                let _ = response.send(self.library.borrow(&patron_id, &item_id, now, due_at));
            }

            LendingMessage::Return {
                loan_id,
                returned_at,
                notes,
                response,
            } => {
                let _ = response.send(self.library.return_loan(loan_id, returned_at, notes));
            }

            LendingMessage::GetLoan { loan_id, response } => {
                let _ = response.send(self.library.ledger().get(loan_id).cloned());
            }

            LendingMessage::GetItem { item_id, response } => {
                let _ = response.send(self.library.catalog().get(&item_id).cloned());
            }

            LendingMessage::Eligibility {
                patron_id,
                now,
                response,
            } => {
                let _ = response.send(self.library.check_eligibility(&patron_id, now));
            }

            LendingMessage::Dashboard { now, response } => {
                let _ = response.send(self.library.reports().dashboard(now));
            }

            LendingMessage::PatronSummary {
                patron_id,
                now,
                response,
            } => {
                let _ = response.send(self.library.reports().patron_summary(&patron_id, now));
            }

            LendingMessage::OverdueLoans { now, response } => {
                let overdue = self
                    .library
                    .reports()
                    .overdue_loans(now)
                    .into_iter()
                    .cloned()
                    .collect();
                let _ = response.send(overdue);
            }

            LendingMessage::AddItem { item, response } => {
                let _ = response.send(self.library.add_item(item));
            }

            LendingMessage::RegisterPatron { patron, response } => {
                let _ = response.send(self.library.register_patron(patron));
            }

            LendingMessage::Shutdown => {
                // Handled in run()
            }
        }
    }
}

/// Handle for sending messages to the actor
#[derive(Debug, Clone)]
pub struct LibraryHandle {
    sender: mpsc::Sender<LendingMessage>,
}

impl LibraryHandle {
    /// Create new handle
    pub fn new(sender: mpsc::Sender<LendingMessage>) -> Self {
        Self { sender }
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> LendingMessage,
    ) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(build(tx))
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;

        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))
    }

    /// Lend `item_id` to `patron_id`
    pub async fn borrow(
        &self,
        patron_id: PatronId,
        item_id: ItemId,
        now: DateTime<Utc>,
        due_at: Option<DateTime<Utc>>,
    ) -> Result<Loan> {
        self.request(|response| LendingMessage::Borrow {
            patron_id,
            item_id,
            now,
            due_at,
            response,
        })
        .await?
    }

    /// Close a loan, returning the fine
    pub async fn return_loan(
        &self,
        loan_id: LoanId,
        returned_at: DateTime<Utc>,
        notes: Option<String>,
    ) -> Result<Decimal> {
        self.request(|response| LendingMessage::Return {
            loan_id,
            returned_at,
            notes,
            response,
        })
        .await?
    }

    /// Get a loan
    pub async fn get_loan(&self, loan_id: LoanId) -> Result<Loan> {
        self.request(|response| LendingMessage::GetLoan { loan_id, response })
            .await?
    }

    /// Get an item
    pub async fn get_item(&self, item_id: ItemId) -> Result<Item> {
        self.request(|response| LendingMessage::GetItem { item_id, response })
            .await?
    }

    /// Advisory eligibility check
    pub async fn check_eligibility(
        &self,
        patron_id: PatronId,
        now: DateTime<Utc>,
    ) -> Result<Eligibility> {
        self.request(|response| LendingMessage::Eligibility {
            patron_id,
            now,
            response,
        })
        .await
    }

    /// Library-wide overview
    pub async fn dashboard(&self, now: DateTime<Utc>) -> Result<Dashboard> {
        self.request(|response| LendingMessage::Dashboard { now, response })
            .await
    }

    /// One patron's standing
    pub async fn patron_summary(
        &self,
        patron_id: PatronId,
        now: DateTime<Utc>,
    ) -> Result<PatronSummary> {
        self.request(|response| LendingMessage::PatronSummary {
            patron_id,
            now,
            response,
        })
        .await?
    }

    /// Active loans past due, most overdue first
    pub async fn overdue_loans(&self, now: DateTime<Utc>) -> Result<Vec<Loan>> {
        self.request(|response| LendingMessage::OverdueLoans { now, response })
            .await
    }

    /// Register an item
    pub async fn add_item(&self, item: NewItem) -> Result<Item> {
        self.request(|response| LendingMessage::AddItem { item, response })
            .await?
    }

    /// Register a patron
    pub async fn register_patron(&self, patron: NewPatron) -> Result<Patron> {
        self.request(|response| LendingMessage::RegisterPatron { patron, response })
            .await?
    }

    /// Shutdown actor
    pub async fn shutdown(&self) -> Result<()> {
        self.sender
            .send(LendingMessage::Shutdown)
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;
        Ok(())
    }
}

/// Spawn the lending actor.
///
/// The join handle yields the library once the actor stops.
pub fn spawn_library_actor(
    library: Library,
    mailbox_capacity: usize,
) -> (LibraryHandle, tokio::task::JoinHandle<Library>) {
    let (tx, rx) = mpsc::channel(mailbox_capacity.max(1));
    let actor = LendingActor::new(library, rx);
    let task = tokio::spawn(actor.run());
    (LibraryHandle::new(tx), task)
}
