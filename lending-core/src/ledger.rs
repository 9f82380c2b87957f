//! Lending ledger
//!
//! The loan state machine. Owns every [`Loan`] record and is the only caller
//! of the catalog's availability entry point.
//!
//! # State machine
//!
//! ```text
//!   borrow()            return_loan()
//!  ─────────▶  Active  ──────────────▶  Returned (terminal)
//! ```
//!
//! Loans live in an append-only arena indexed by [`LoanId`]. They are never
//! deleted; the only in-place change is the `Active -> Returned` transition.
//!
//! # Invariants
//!
//! - At most one active loan per (patron, item) pair
//! - A patron's active count is checked against their limit before every borrow
//! - Every loan creation/closure moves the item's availability by exactly one
//! - A failed call leaves both the ledger and the catalog unchanged

use crate::{
    catalog::CatalogStore,
    config::LendingPolicy,
    directory::PatronDirectory,
    types::{ItemId, Loan, LoanId, LoanKind, LoanStatus, PatronId},
    Error, Result,
};
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Fine owed for an item due at `due_at` and returned at `returned_at`.
///
/// Every started day past the due date is charged at
/// `policy.fine_rate_per_day`, capped at `policy.max_fine` when set. Early or
/// on-time returns cost nothing. A fine too large for a `Decimal` resolves to
/// the cap, or is an [`Error::Config`] when there is none.
pub fn compute_fine(
    policy: &LendingPolicy,
    due_at: DateTime<Utc>,
    returned_at: DateTime<Utc>,
) -> Result<Decimal> {
    if returned_at <= due_at {
        return Ok(Decimal::ZERO);
    }

    let late = returned_at - due_at;
    let mut days_overdue = late.num_days();
    if late > Duration::days(days_overdue) {
        days_overdue += 1;
    }

    match (
        Decimal::from(days_overdue).checked_mul(policy.fine_rate_per_day),
        policy.max_fine,
    ) {
        (Some(fine), Some(cap)) => Ok(fine.min(cap)),
        (Some(fine), None) => Ok(fine),
        (None, Some(cap)) => Ok(cap),
        (None, None) => Err(Error::Config(format!(
            "fine for {} days at {} per day overflows",
            days_overdue, policy.fine_rate_per_day
        ))),
    }
}

/// Why a patron may not borrow right now
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IneligibleReason {
    /// No such patron
    PatronNotFound,
    /// Patron account suspended
    PatronInactive,
    /// Active loans already at the borrow limit
    LimitReached {
        /// The patron's borrow limit
        limit: u32,
    },
    /// Patron holds loans past their due date
    OverdueLoans {
        /// Number of overdue loans
        count: usize,
    },
}

impl fmt::Display for IneligibleReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IneligibleReason::PatronNotFound => write!(f, "patron not found"),
            IneligibleReason::PatronInactive => write!(f, "patron account is inactive"),
            IneligibleReason::LimitReached { limit } => {
                write!(f, "borrow limit reached ({} items)", limit)
            }
            IneligibleReason::OverdueLoans { count } => {
                write!(f, "{} overdue loan(s) must be returned first", count)
            }
        }
    }
}

/// Answer to "can this patron borrow more?"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Eligibility {
    /// Patron may borrow
    Eligible,
    /// Patron may not borrow, with the first reason found
    Ineligible(IneligibleReason),
}

impl Eligibility {
    /// Whether the patron may borrow
    pub fn can_borrow(&self) -> bool {
        matches!(self, Eligibility::Eligible)
    }
}

/// Loan table and state machine
#[derive(Debug, Clone)]
pub struct Ledger {
    /// Append-only arena
    loans: Vec<Loan>,

    /// Loan ID -> arena slot
    index: HashMap<LoanId, usize>,

    /// Loan period and fine policy
    policy: LendingPolicy,
}

impl Ledger {
    /// Empty ledger
    pub fn new(policy: LendingPolicy) -> Self {
        Self {
            loans: Vec::new(),
            index: HashMap::new(),
            policy,
        }
    }

    /// Rebuild from persisted loans.
    ///
    /// Loans are ordered by ID (creation time). Rejects duplicate IDs and
    /// more than one active loan for the same (patron, item) pair.
    pub fn from_loans(
        policy: LendingPolicy,
        loans: impl IntoIterator<Item = Loan>,
    ) -> Result<Self> {
        let mut loans: Vec<Loan> = loans.into_iter().collect();
        loans.sort_by_key(|loan| loan.id);

        let mut ledger = Self::new(policy);
        let mut active_pairs = HashSet::new();
        for loan in loans {
            if loan.is_active()
                && !active_pairs.insert((loan.patron_id.clone(), loan.item_id.clone()))
            {
                return Err(Error::InvariantViolation(format!(
                    "patron {} has two active loans for item {}",
                    loan.patron_id, loan.item_id
                )));
            }
            if ledger.index.insert(loan.id, ledger.loans.len()).is_some() {
                return Err(Error::DuplicateId(format!("loan {}", loan.id)));
            }
            ledger.loans.push(loan);
        }
        Ok(ledger)
    }

    /// Loan period and fine policy
    pub fn policy(&self) -> &LendingPolicy {
        &self.policy
    }

    /// Get loan by ID
    pub fn get(&self, loan_id: LoanId) -> Result<&Loan> {
        self.index
            .get(&loan_id)
            .map(|&slot| &self.loans[slot])
            .ok_or_else(|| Error::NotFound(format!("loan {}", loan_id)))
    }

    /// All loans, oldest first
    pub fn loans(&self) -> impl Iterator<Item = &Loan> {
        self.loans.iter()
    }

    /// Number of loans ever created
    pub fn len(&self) -> usize {
        self.loans.len()
    }

    /// Whether no loan was ever created
    pub fn is_empty(&self) -> bool {
        self.loans.is_empty()
    }

    /// Active loans held by `patron_id`, oldest first
    pub fn active_loans_for<'a>(
        &'a self,
        patron_id: &'a PatronId,
    ) -> impl Iterator<Item = &'a Loan> {
        self.loans
            .iter()
            .filter(move |loan| loan.is_active() && &loan.patron_id == patron_id)
    }

    /// Number of active loans held by `patron_id` (rescanned on every call)
    pub fn active_loan_count(&self, patron_id: &PatronId) -> usize {
        self.active_loans_for(patron_id).count()
    }

    /// Number of active loans on `item_id`
    pub fn active_loan_count_for_item(&self, item_id: &ItemId) -> usize {
        self.loans
            .iter()
            .filter(|loan| loan.is_active() && &loan.item_id == item_id)
            .count()
    }

    /// Every loan `patron_id` ever held, oldest first
    pub fn history_for<'a>(
        &'a self,
        patron_id: &'a PatronId,
    ) -> impl Iterator<Item = &'a Loan> {
        self.loans
            .iter()
            .filter(move |loan| &loan.patron_id == patron_id)
    }

    /// The `limit` most recently borrowed loans, newest first
    pub fn recent(&self, limit: usize) -> Vec<&Loan> {
        let mut loans: Vec<&Loan> = self.loans.iter().collect();
        loans.sort_by(|a, b| b.borrowed_at.cmp(&a.borrowed_at).then(b.id.cmp(&a.id)));
        loans.truncate(limit);
        loans
    }

    /// Active loan for this exact (patron, item) pair, if any
    pub fn find_active(&self, patron_id: &PatronId, item_id: &ItemId) -> Option<&Loan> {
        self.loans.iter().find(|loan| {
            loan.is_active() && &loan.patron_id == patron_id && &loan.item_id == item_id
        })
    }

    /// Advisory eligibility check.
    ///
    /// Stricter than [`Ledger::borrow`]: a patron holding overdue loans is
    /// reported ineligible even though `borrow` itself does not refuse them.
    pub fn check_eligibility(
        &self,
        directory: &PatronDirectory,
        patron_id: &PatronId,
        now: DateTime<Utc>,
    ) -> Eligibility {
        let patron = match directory.get(patron_id) {
            Ok(patron) => patron,
            Err(_) => return Eligibility::Ineligible(IneligibleReason::PatronNotFound),
        };
        if !patron.active {
            return Eligibility::Ineligible(IneligibleReason::PatronInactive);
        }
        if self.active_loan_count(patron_id) >= patron.borrow_limit as usize {
            return Eligibility::Ineligible(IneligibleReason::LimitReached {
                limit: patron.borrow_limit,
            });
        }
        let overdue = self
            .active_loans_for(patron_id)
            .filter(|loan| loan.is_overdue(now))
            .count();
        if overdue > 0 {
            return Eligibility::Ineligible(IneligibleReason::OverdueLoans { count: overdue });
        }
        Eligibility::Eligible
    }

    /// Lend one copy of `item_id` to `patron_id`.
    ///
    /// Checks, in order: patron active, under borrow limit, no active loan
    /// for the same pair, item lendable. The loan is due at `due_at` or, if
    /// absent, `now` plus the policy's loan period.
    pub fn borrow(
        &mut self,
        directory: &PatronDirectory,
        catalog: &mut CatalogStore,
        patron_id: &PatronId,
        item_id: &ItemId,
        now: DateTime<Utc>,
        due_at: Option<DateTime<Utc>>,
    ) -> Result<Loan> {
        let patron = match directory.get(patron_id) {
            Ok(patron) if patron.active => patron,
            Ok(_) => {
                tracing::debug!(patron_id = %patron_id, "Borrow rejected: patron inactive");
                return Err(Error::PatronNotEligible(format!(
                    "patron {} is inactive",
                    patron_id
                )));
            }
            Err(_) => {
                tracing::debug!(patron_id = %patron_id, "Borrow rejected: unknown patron");
                return Err(Error::PatronNotEligible(format!(
                    "patron {} not found",
                    patron_id
                )));
            }
        };

        let active_count = self.active_loan_count(patron_id);
        if active_count >= patron.borrow_limit as usize {
            tracing::debug!(
                patron_id = %patron_id,
                active_count,
                limit = patron.borrow_limit,
                "Borrow rejected: limit reached"
            );
            return Err(Error::BorrowLimitExceeded {
                limit: patron.borrow_limit,
            });
        }

        if self.find_active(patron_id, item_id).is_some() {
            tracing::debug!(
                patron_id = %patron_id,
                item_id = %item_id,
                "Borrow rejected: already borrowed"
            );
            return Err(Error::AlreadyBorrowed {
                patron_id: patron_id.to_string(),
                item_id: item_id.to_string(),
            });
        }

        match catalog.get(item_id) {
            Ok(item) if item.is_lendable() => {}
            Ok(item) => {
                let reason = if item.active {
                    "no copies available"
                } else {
                    "withdrawn from circulation"
                };
                tracing::debug!(item_id = %item_id, reason, "Borrow rejected: item unavailable");
                return Err(Error::ItemUnavailable(format!("item {}: {}", item_id, reason)));
            }
            Err(_) => {
                tracing::debug!(item_id = %item_id, "Borrow rejected: unknown item");
                return Err(Error::ItemUnavailable(format!("item {} not found", item_id)));
            }
        }

        let due_at = match due_at {
            Some(due_at) => due_at,
            None => now.checked_add_signed(self.policy.loan_period()).ok_or_else(|| {
                Error::Config(format!(
                    "due date {} days after {} is out of range",
                    self.policy.loan_period_days, now
                ))
            })?,
        };

        let loan = Loan {
            id: LoanId::generate(),
            patron_id: patron_id.clone(),
            item_id: item_id.clone(),
            kind: LoanKind::Borrow,
            borrowed_at: now,
            due_at,
            returned_at: None,
            status: LoanStatus::Active,
            fine: Decimal::ZERO,
            notes: None,
        };

        self.index.insert(loan.id, self.loans.len());
        self.loans.push(loan.clone());

        if let Err(e) = catalog.adjust_availability(item_id, -1) {
            self.loans.pop();
            self.index.remove(&loan.id);
            return Err(e);
        }

        tracing::debug!(
            loan_id = %loan.id,
            patron_id = %patron_id,
            item_id = %item_id,
            due_at = %loan.due_at,
            "Loan created"
        );

        Ok(loan)
    }

    /// Close an active loan and assess its fine.
    ///
    /// Returns the fine. A loan can be returned once; later calls fail with
    /// [`Error::AlreadyReturned`] and change nothing.
    pub fn return_loan(
        &mut self,
        catalog: &mut CatalogStore,
        loan_id: LoanId,
        returned_at: DateTime<Utc>,
        notes: Option<String>,
    ) -> Result<Decimal> {
        let slot = *self
            .index
            .get(&loan_id)
            .ok_or_else(|| Error::NotFound(format!("loan {}", loan_id)))?;

        let loan = &self.loans[slot];
        if !loan.is_active() {
            tracing::debug!(loan_id = %loan_id, "Return rejected: already returned");
            return Err(Error::AlreadyReturned(loan_id.to_string()));
        }

        let fine = compute_fine(&self.policy, loan.due_at, returned_at)?;

        // Catalog first: if it refuses, the loan is still untouched.
        catalog.adjust_availability(&loan.item_id, 1)?;

        let loan = &mut self.loans[slot];
        loan.returned_at = Some(returned_at);
        loan.status = LoanStatus::Returned;
        loan.fine = fine;
        loan.notes = notes;

        tracing::debug!(
            loan_id = %loan_id,
            item_id = %loan.item_id,
            fine = %fine,
            "Loan closed"
        );

        Ok(fine)
    }

    /// Undo the borrow that created `loan_id`. Only valid for the most
    /// recent loan.
    pub(crate) fn undo_borrow(
        &mut self,
        catalog: &mut CatalogStore,
        loan_id: LoanId,
    ) -> Result<()> {
        match self.loans.last() {
            Some(last) if last.id == loan_id && last.is_active() => {
                catalog.adjust_availability(&last.item_id, 1)?;
                self.loans.pop();
                self.index.remove(&loan_id);
                Ok(())
            }
            _ => Err(Error::InvariantViolation(format!(
                "loan {} is not the latest active loan",
                loan_id
            ))),
        }
    }

    /// Reopen a loan closed by [`Ledger::return_loan`], restoring `previous`
    pub(crate) fn undo_return(&mut self, catalog: &mut CatalogStore, previous: Loan) -> Result<()> {
        let slot = *self
            .index
            .get(&previous.id)
            .ok_or_else(|| Error::NotFound(format!("loan {}", previous.id)))?;

        if self.loans[slot].is_active() || !previous.is_active() {
            return Err(Error::InvariantViolation(format!(
                "loan {} was not closed by the undone return",
                previous.id
            )));
        }

        catalog.adjust_availability(&previous.item_id, -1)?;
        self.loans[slot] = previous;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{NewItem, NewPatron};
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap()
    }

    struct Fixture {
        directory: PatronDirectory,
        catalog: CatalogStore,
        ledger: Ledger,
    }

    impl Fixture {
        fn new() -> Self {
            let mut directory = PatronDirectory::new(3);
            directory
                .register(NewPatron {
                    id: PatronId::new("P-1"),
                    name: "John Doe".to_string(),
                    email: "john@example.com".to_string(),
                    borrow_limit: Some(3),
                })
                .unwrap();

            let mut catalog = CatalogStore::new();
            for (id, copies) in [("B-1", 1), ("B-2", 2), ("B-3", 2), ("B-4", 2), ("B-5", 0)] {
                catalog
                    .add_item(NewItem {
                        id: ItemId::new(id),
                        title: format!("Title {}", id),
                        author: "Author".to_string(),
                        isbn: String::new(),
                        genre: "Fiction".to_string(),
                        total_copies: copies,
                    })
                    .unwrap();
            }

            Self {
                directory,
                catalog,
                ledger: Ledger::new(LendingPolicy::default()),
            }
        }

        fn borrow(&mut self, item: &str) -> Result<Loan> {
            self.ledger.borrow(
                &self.directory,
                &mut self.catalog,
                &PatronId::new("P-1"),
                &ItemId::new(item),
                t0(),
                None,
            )
        }

        fn available(&self, item: &str) -> u32 {
            self.catalog.get(&ItemId::new(item)).unwrap().available_copies
        }
    }

    #[test]
    fn test_fine_on_due_date_is_zero() {
        let policy = LendingPolicy::default();
        assert_eq!(compute_fine(&policy, t0(), t0()).unwrap(), Decimal::ZERO);
        assert_eq!(
            compute_fine(&policy, t0(), t0() - Duration::days(2)).unwrap(),
            Decimal::ZERO
        );
    }

    #[test]
    fn test_fine_whole_days() {
        let policy = LendingPolicy::default();
        assert_eq!(
            compute_fine(&policy, t0(), t0() + Duration::days(3)).unwrap(),
            Decimal::from(3)
        );
    }

    #[test]
    fn test_fine_partial_day_rounds_up() {
        let policy = LendingPolicy::default();
        assert_eq!(
            compute_fine(&policy, t0(), t0() + Duration::seconds(1)).unwrap(),
            Decimal::ONE
        );
        assert_eq!(
            compute_fine(&policy, t0(), t0() + Duration::days(2) + Duration::hours(1))
                .unwrap(),
            Decimal::from(3)
        );
    }

    #[test]
    fn test_fine_rate_and_cap() {
        let policy = LendingPolicy {
            fine_rate_per_day: Decimal::new(50, 2),
            max_fine: Some(Decimal::from(2)),
            ..LendingPolicy::default()
        };
        assert_eq!(
            compute_fine(&policy, t0(), t0() + Duration::days(3)).unwrap(),
            Decimal::new(150, 2)
        );
        assert_eq!(
            compute_fine(&policy, t0(), t0() + Duration::days(30)).unwrap(),
            Decimal::from(2)
        );
    }

    #[test]
    fn test_fine_overflow_falls_back_to_cap() {
        let uncapped = LendingPolicy {
            fine_rate_per_day: Decimal::MAX,
            ..LendingPolicy::default()
        };
        let late = t0() + Duration::days(3);
        assert!(matches!(
            compute_fine(&uncapped, t0(), late),
            Err(Error::Config(_))
        ));

        let capped = LendingPolicy {
            max_fine: Some(Decimal::from(40)),
            ..uncapped
        };
        assert_eq!(compute_fine(&capped, t0(), late).unwrap(), Decimal::from(40));
    }

    #[test]
    fn test_return_with_overflowing_fine_changes_nothing() {
        let mut fx = Fixture::new();
        fx.ledger = Ledger::new(LendingPolicy {
            fine_rate_per_day: Decimal::MAX,
            ..LendingPolicy::default()
        });
        let loan = fx.borrow("B-2").unwrap();

        let result = fx.ledger.return_loan(
            &mut fx.catalog,
            loan.id,
            loan.due_at + Duration::days(3),
            None,
        );
        assert!(matches!(result, Err(Error::Config(_))));
        assert!(fx.ledger.get(loan.id).unwrap().is_active());
        assert_eq!(fx.available("B-2"), 1);
    }

    #[test]
    fn test_due_date_out_of_range_rejected() {
        let mut fx = Fixture::new();
        let now = DateTime::<Utc>::MAX_UTC - Duration::days(1);

        let result = fx.ledger.borrow(
            &fx.directory,
            &mut fx.catalog,
            &PatronId::new("P-1"),
            &ItemId::new("B-2"),
            now,
            None,
        );
        assert!(matches!(result, Err(Error::Config(_))));
        assert!(fx.ledger.is_empty());
        assert_eq!(fx.available("B-2"), 2);
    }

    #[test]
    fn test_borrow_success_decrements_availability() {
        let mut fx = Fixture::new();
        let loan = fx.borrow("B-1").unwrap();

        assert_eq!(loan.status, LoanStatus::Active);
        assert_eq!(loan.kind, LoanKind::Borrow);
        assert_eq!(loan.borrowed_at, t0());
        assert_eq!(loan.due_at, t0() + Duration::days(30));
        assert_eq!(loan.fine, Decimal::ZERO);
        assert_eq!(fx.available("B-1"), 0);
        assert_eq!(fx.ledger.get(loan.id).unwrap(), &loan);
    }

    #[test]
    fn test_borrow_due_date_override() {
        let mut fx = Fixture::new();
        let due = t0() + Duration::days(7);
        let loan = fx
            .ledger
            .borrow(
                &fx.directory,
                &mut fx.catalog,
                &PatronId::new("P-1"),
                &ItemId::new("B-2"),
                t0(),
                Some(due),
            )
            .unwrap();
        assert_eq!(loan.due_at, due);
    }

    #[test]
    fn test_borrow_same_item_twice() {
        let mut fx = Fixture::new();
        fx.borrow("B-2").unwrap();

        let result = fx.borrow("B-2");
        assert!(matches!(result, Err(Error::AlreadyBorrowed { .. })));
        assert_eq!(fx.available("B-2"), 1);
        assert_eq!(fx.ledger.len(), 1);
    }

    #[test]
    fn test_borrow_limit() {
        let mut fx = Fixture::new();
        fx.borrow("B-1").unwrap();
        fx.borrow("B-2").unwrap();
        fx.borrow("B-3").unwrap();

        let result = fx.borrow("B-4");
        match result {
            Err(Error::BorrowLimitExceeded { limit }) => assert_eq!(limit, 3),
            other => panic!("expected limit error, got {:?}", other),
        }
        assert_eq!(fx.available("B-4"), 2);
    }

    #[test]
    fn test_limit_checked_before_duplicate() {
        let mut fx = Fixture::new();
        fx.directory
            .set_borrow_limit(&PatronId::new("P-1"), 1)
            .unwrap();
        fx.borrow("B-2").unwrap();

        // Same pair again, but the limit check comes first
        let result = fx.borrow("B-2");
        assert!(matches!(result, Err(Error::BorrowLimitExceeded { limit: 1 })));
    }

    #[test]
    fn test_borrow_unavailable_item() {
        let mut fx = Fixture::new();
        let result = fx.borrow("B-5");
        assert!(matches!(result, Err(Error::ItemUnavailable(_))));
        assert!(fx.ledger.is_empty());

        let result = fx.borrow("missing");
        assert!(matches!(result, Err(Error::ItemUnavailable(_))));

        fx.catalog.deactivate(&ItemId::new("B-2")).unwrap();
        let result = fx.borrow("B-2");
        assert!(matches!(result, Err(Error::ItemUnavailable(_))));
        assert_eq!(fx.available("B-2"), 2);
    }

    #[test]
    fn test_borrow_ineligible_patron() {
        let mut fx = Fixture::new();
        let result = fx.ledger.borrow(
            &fx.directory,
            &mut fx.catalog,
            &PatronId::new("ghost"),
            &ItemId::new("B-1"),
            t0(),
            None,
        );
        assert!(matches!(result, Err(Error::PatronNotEligible(_))));

        fx.directory
            .set_active(&PatronId::new("P-1"), false)
            .unwrap();
        let result = fx.borrow("B-1");
        assert!(matches!(result, Err(Error::PatronNotEligible(_))));
        assert_eq!(fx.available("B-1"), 1);
    }

    #[test]
    fn test_return_late_assesses_fine() {
        let mut fx = Fixture::new();
        let loan = fx.borrow("B-1").unwrap();

        let returned_at = loan.due_at + Duration::days(5);
        let fine = fx
            .ledger
            .return_loan(&mut fx.catalog, loan.id, returned_at, Some("cover torn".to_string()))
            .unwrap();

        assert_eq!(fine, Decimal::from(5));
        assert_eq!(fx.available("B-1"), 1);

        let closed = fx.ledger.get(loan.id).unwrap();
        assert_eq!(closed.status, LoanStatus::Returned);
        assert_eq!(closed.returned_at, Some(returned_at));
        assert_eq!(closed.fine, Decimal::from(5));
        assert_eq!(closed.notes.as_deref(), Some("cover torn"));
    }

    #[test]
    fn test_return_twice() {
        let mut fx = Fixture::new();
        let loan = fx.borrow("B-2").unwrap();
        fx.ledger
            .return_loan(&mut fx.catalog, loan.id, loan.due_at, None)
            .unwrap();
        assert_eq!(fx.available("B-2"), 2);

        let result = fx.ledger.return_loan(
            &mut fx.catalog,
            loan.id,
            loan.due_at + Duration::days(10),
            None,
        );
        assert!(matches!(result, Err(Error::AlreadyReturned(_))));
        assert_eq!(fx.available("B-2"), 2);
        assert_eq!(fx.ledger.get(loan.id).unwrap().fine, Decimal::ZERO);
    }

    #[test]
    fn test_return_unknown_loan() {
        let mut fx = Fixture::new();
        let result = fx
            .ledger
            .return_loan(&mut fx.catalog, LoanId::generate(), t0(), None);
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[test]
    fn test_return_with_corrupt_catalog_changes_nothing() {
        let mut fx = Fixture::new();
        let loan = fx.borrow("B-1").unwrap();

        // Catalog that never saw the borrow: B-1 is fully on the shelf
        let mut stale_catalog = Fixture::new().catalog;
        let result = fx
            .ledger
            .return_loan(&mut stale_catalog, loan.id, loan.due_at, None);

        assert!(matches!(result, Err(Error::InvariantViolation(_))));
        assert!(fx.ledger.get(loan.id).unwrap().is_active());
    }

    #[test]
    fn test_undo_borrow_and_return() {
        let mut fx = Fixture::new();
        let loan = fx.borrow("B-1").unwrap();
        fx.ledger.undo_borrow(&mut fx.catalog, loan.id).unwrap();
        assert!(fx.ledger.is_empty());
        assert_eq!(fx.available("B-1"), 1);

        let loan = fx.borrow("B-1").unwrap();
        let before = loan.clone();
        fx.ledger
            .return_loan(&mut fx.catalog, loan.id, loan.due_at, None)
            .unwrap();
        fx.ledger.undo_return(&mut fx.catalog, before.clone()).unwrap();
        assert_eq!(fx.ledger.get(loan.id).unwrap(), &before);
        assert_eq!(fx.available("B-1"), 0);
    }

    #[test]
    fn test_eligibility_reasons() {
        let mut fx = Fixture::new();
        let patron = PatronId::new("P-1");
        let due = t0() + Duration::days(1);

        assert_eq!(
            fx.ledger.check_eligibility(&fx.directory, &patron, t0()),
            Eligibility::Eligible
        );

        fx.ledger
            .borrow(
                &fx.directory,
                &mut fx.catalog,
                &patron,
                &ItemId::new("B-2"),
                t0(),
                Some(due),
            )
            .unwrap();
        assert_eq!(
            fx.ledger
                .check_eligibility(&fx.directory, &patron, due + Duration::hours(1)),
            Eligibility::Ineligible(IneligibleReason::OverdueLoans { count: 1 })
        );

        assert_eq!(
            fx.ledger
                .check_eligibility(&fx.directory, &PatronId::new("ghost"), t0()),
            Eligibility::Ineligible(IneligibleReason::PatronNotFound)
        );

        fx.directory.set_borrow_limit(&patron, 1).unwrap();
        assert_eq!(
            fx.ledger.check_eligibility(&fx.directory, &patron, t0()),
            Eligibility::Ineligible(IneligibleReason::LimitReached { limit: 1 })
        );
    }

    #[test]
    fn test_from_loans_rejects_duplicate_active_pair() {
        let mut fx = Fixture::new();
        let loan = fx.borrow("B-2").unwrap();
        let mut twin = loan.clone();
        twin.id = LoanId::generate();

        let result = Ledger::from_loans(LendingPolicy::default(), vec![loan, twin]);
        assert!(matches!(result, Err(Error::InvariantViolation(_))));
    }

    #[test]
    fn test_recent_newest_first() {
        let mut fx = Fixture::new();
        let patron = PatronId::new("P-1");
        for (offset, item) in ["B-2", "B-3", "B-4"].iter().enumerate() {
            fx.ledger
                .borrow(
                    &fx.directory,
                    &mut fx.catalog,
                    &patron,
                    &ItemId::new(*item),
                    t0() + Duration::days(offset as i64),
                    None,
                )
                .unwrap();
        }

        let recent = fx.ledger.recent(2);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].item_id, ItemId::new("B-4"));
        assert_eq!(recent[1].item_id, ItemId::new("B-3"));
        assert_eq!(fx.ledger.history_for(&patron).count(), 3);
    }
}
