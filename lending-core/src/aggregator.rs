//! Read-only reporting
//!
//! Everything here is recomputed from the current tables on each call.
//! Nothing is cached, so reports can never drift from the loan table.

use crate::{
    catalog::CatalogStore,
    directory::PatronDirectory,
    ledger::Ledger,
    types::{ItemId, Loan, PatronId},
    Result,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Loan-table totals
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanSummary {
    /// Loans ever created
    pub total_borrowed: usize,
    /// Loans closed
    pub total_returned: usize,
    /// Loans still out
    pub currently_borrowed: usize,
    /// Loans out and past due
    pub overdue: usize,
    /// Fines assessed so far
    pub total_fines: Decimal,
}

/// One patron's standing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatronSummary {
    /// Patron
    pub patron_id: PatronId,
    /// Borrow limit
    pub borrow_limit: u32,
    /// Loans currently out
    pub active_loans: usize,
    /// Loans out and past due
    pub overdue_loans: usize,
    /// Loans ever taken
    pub lifetime_loans: usize,
    /// Further loans allowed before hitting the limit
    pub headroom: u32,
    /// Fines assessed on this patron's returned loans
    pub total_fines: Decimal,
}

/// Catalog totals over active items
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogSummary {
    /// Active titles
    pub titles: usize,
    /// Copies owned
    pub total_copies: u64,
    /// Copies on the shelf
    pub available_copies: u64,
    /// Copies out on loan
    pub checked_out_copies: u64,
    /// Active titles per genre
    pub genres: BTreeMap<String, usize>,
}

/// Combined overview
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dashboard {
    /// Report time
    pub as_of: DateTime<Utc>,
    /// Catalog totals
    pub catalog: CatalogSummary,
    /// Loan totals
    pub loans: LoanSummary,
    /// Registered patrons
    pub total_patrons: usize,
    /// Patrons allowed to borrow
    pub active_patrons: usize,
}

/// Reporting view over the three tables
#[derive(Debug, Clone, Copy)]
pub struct Aggregator<'a> {
    catalog: &'a CatalogStore,
    directory: &'a PatronDirectory,
    ledger: &'a Ledger,
}

impl<'a> Aggregator<'a> {
    /// Create a view
    pub fn new(
        catalog: &'a CatalogStore,
        directory: &'a PatronDirectory,
        ledger: &'a Ledger,
    ) -> Self {
        Self {
            catalog,
            directory,
            ledger,
        }
    }

    /// Active loan count for every registered patron (zero included)
    pub fn active_loans_per_patron(&self) -> BTreeMap<PatronId, usize> {
        let mut counts: BTreeMap<PatronId, usize> = self
            .directory
            .iter()
            .map(|patron| (patron.id.clone(), 0))
            .collect();
        for loan in self.ledger.loans().filter(|loan| loan.is_active()) {
            *counts.entry(loan.patron_id.clone()).or_insert(0) += 1;
        }
        counts
    }

    /// `limit - active loans`, floored at zero
    pub fn headroom(&self, patron_id: &PatronId) -> Result<u32> {
        let patron = self.directory.get(patron_id)?;
        let active = self.ledger.active_loan_count(patron_id);
        Ok(patron
            .borrow_limit
            .saturating_sub(u32::try_from(active).unwrap_or(u32::MAX)))
    }

    /// Active loans past due at `now`, most overdue first
    pub fn overdue_loans(&self, now: DateTime<Utc>) -> Vec<&'a Loan> {
        let mut overdue: Vec<&Loan> = self
            .ledger
            .loans()
            .filter(|loan| loan.is_overdue(now))
            .collect();
        overdue.sort_by_key(|loan| loan.due_at);
        overdue
    }

    /// Sum of fines over every loan (active loans contribute zero)
    pub fn total_fines(&self) -> Decimal {
        self.ledger.loans().map(|loan| loan.fine).sum()
    }

    /// Copies on the shelf per item
    pub fn availability(&self) -> BTreeMap<ItemId, u32> {
        self.catalog
            .iter()
            .map(|item| (item.id.clone(), item.available_copies))
            .collect()
    }

    /// Loan-table totals at `now`
    pub fn loan_summary(&self, now: DateTime<Utc>) -> LoanSummary {
        let mut summary = LoanSummary {
            total_borrowed: 0,
            total_returned: 0,
            currently_borrowed: 0,
            overdue: 0,
            total_fines: Decimal::ZERO,
        };

        for loan in self.ledger.loans() {
            summary.total_borrowed += 1;
            if loan.is_active() {
                summary.currently_borrowed += 1;
            } else {
                summary.total_returned += 1;
            }
            if loan.is_overdue(now) {
                summary.overdue += 1;
            }
            summary.total_fines += loan.fine;
        }

        summary
    }

    /// One patron's standing at `now`
    pub fn patron_summary(
        &self,
        patron_id: &PatronId,
        now: DateTime<Utc>,
    ) -> Result<PatronSummary> {
        let patron = self.directory.get(patron_id)?;

        let mut active_loans = 0;
        let mut overdue_loans = 0;
        let mut lifetime_loans = 0;
        let mut total_fines = Decimal::ZERO;
        for loan in self.ledger.history_for(patron_id) {
            lifetime_loans += 1;
            if loan.is_active() {
                active_loans += 1;
            }
            if loan.is_overdue(now) {
                overdue_loans += 1;
            }
            total_fines += loan.fine;
        }

        Ok(PatronSummary {
            patron_id: patron.id.clone(),
            borrow_limit: patron.borrow_limit,
            active_loans,
            overdue_loans,
            lifetime_loans,
            headroom: self.headroom(patron_id)?,
            total_fines,
        })
    }

    /// Totals over active catalog items
    pub fn catalog_summary(&self) -> CatalogSummary {
        let mut summary = CatalogSummary {
            titles: 0,
            total_copies: 0,
            available_copies: 0,
            checked_out_copies: 0,
            genres: BTreeMap::new(),
        };

        for item in self.catalog.iter().filter(|item| item.active) {
            summary.titles += 1;
            summary.total_copies += u64::from(item.total_copies);
            summary.available_copies += u64::from(item.available_copies);
            summary.checked_out_copies += u64::from(item.checked_out());
            *summary.genres.entry(item.genre.clone()).or_insert(0) += 1;
        }

        summary
    }

    /// Combined overview at `now`
    pub fn dashboard(&self, now: DateTime<Utc>) -> Dashboard {
        Dashboard {
            as_of: now,
            catalog: self.catalog_summary(),
            loans: self.loan_summary(now),
            total_patrons: self.directory.len(),
            active_patrons: self.directory.iter().filter(|patron| patron.active).count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LendingPolicy;
    use crate::types::{NewItem, NewPatron};
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 10, 0, 0, 0).unwrap()
    }

    fn setup() -> (CatalogStore, PatronDirectory, Ledger) {
        let mut catalog = CatalogStore::new();
        let stock = [
            ("B-1", "Fiction", 5),
            ("B-3", "Technology", 3),
            ("B-5", "History", 4),
        ];
        for (id, genre, copies) in stock {
            catalog
                .add_item(NewItem {
                    id: ItemId::new(id),
                    title: id.to_string(),
                    author: "Author".to_string(),
                    isbn: String::new(),
                    genre: genre.to_string(),
                    total_copies: copies,
                })
                .unwrap();
        }

        let mut directory = PatronDirectory::new(3);
        for id in ["P-1", "P-2"] {
            directory
                .register(NewPatron {
                    id: PatronId::new(id),
                    name: id.to_string(),
                    email: format!("{}@example.com", id),
                    borrow_limit: None,
                })
                .unwrap();
        }

        let mut ledger = Ledger::new(LendingPolicy::default());
        let p2 = PatronId::new("P-2");
        let first = ledger
            .borrow(&directory, &mut catalog, &p2, &ItemId::new("B-1"), t0(), None)
            .unwrap();
        ledger
            .borrow(
                &directory,
                &mut catalog,
                &p2,
                &ItemId::new("B-3"),
                t0() + Duration::days(5),
                None,
            )
            .unwrap();
        ledger
            .return_loan(&mut catalog, first.id, first.due_at + Duration::days(2), None)
            .unwrap();
        ledger
            .borrow(
                &directory,
                &mut catalog,
                &p2,
                &ItemId::new("B-1"),
                t0() + Duration::days(40),
                None,
            )
            .unwrap();

        (catalog, directory, ledger)
    }

    #[test]
    fn test_loan_summary() {
        let (catalog, directory, ledger) = setup();
        let reports = Aggregator::new(&catalog, &directory, &ledger);

        // B-3 was due at t0 + 35 days; the second B-1 loan at t0 + 70 days
        let summary = reports.loan_summary(t0() + Duration::days(50));
        assert_eq!(summary.total_borrowed, 3);
        assert_eq!(summary.total_returned, 1);
        assert_eq!(summary.currently_borrowed, 2);
        assert_eq!(summary.overdue, 1);
        assert_eq!(summary.total_fines, Decimal::from(2));
        assert_eq!(reports.total_fines(), Decimal::from(2));
    }

    #[test]
    fn test_overdue_and_headroom() {
        let (catalog, directory, ledger) = setup();
        let reports = Aggregator::new(&catalog, &directory, &ledger);

        let overdue = reports.overdue_loans(t0() + Duration::days(80));
        assert_eq!(overdue.len(), 2);
        assert_eq!(overdue[0].item_id, ItemId::new("B-3"));

        assert_eq!(reports.headroom(&PatronId::new("P-2")).unwrap(), 1);
        assert_eq!(reports.headroom(&PatronId::new("P-1")).unwrap(), 3);
        assert!(reports.headroom(&PatronId::new("ghost")).is_err());

        let counts = reports.active_loans_per_patron();
        assert_eq!(counts[&PatronId::new("P-1")], 0);
        assert_eq!(counts[&PatronId::new("P-2")], 2);
    }

    #[test]
    fn test_patron_summary() {
        let (catalog, directory, ledger) = setup();
        let reports = Aggregator::new(&catalog, &directory, &ledger);

        let summary = reports
            .patron_summary(&PatronId::new("P-2"), t0() + Duration::days(50))
            .unwrap();
        assert_eq!(summary.active_loans, 2);
        assert_eq!(summary.overdue_loans, 1);
        assert_eq!(summary.lifetime_loans, 3);
        assert_eq!(summary.headroom, 1);
        assert_eq!(summary.total_fines, Decimal::from(2));
    }

    #[test]
    fn test_catalog_summary_and_availability() {
        let (catalog, directory, ledger) = setup();
        let reports = Aggregator::new(&catalog, &directory, &ledger);

        let summary = reports.catalog_summary();
        assert_eq!(summary.titles, 3);
        assert_eq!(summary.total_copies, 12);
        assert_eq!(summary.available_copies, 10);
        assert_eq!(summary.checked_out_copies, 2);
        assert_eq!(summary.genres["Fiction"], 1);

        let availability = reports.availability();
        assert_eq!(availability[&ItemId::new("B-1")], 4);
        assert_eq!(availability[&ItemId::new("B-3")], 2);

        let dashboard = reports.dashboard(t0());
        assert_eq!(dashboard.total_patrons, 2);
        assert_eq!(dashboard.active_patrons, 2);
        assert_eq!(dashboard.loans.currently_borrowed, 2);
    }
}
