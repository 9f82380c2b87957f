//! Metrics collection for observability
//!
//! Prometheus metrics for the lending engine, kept in a per-library
//! registry.
//!
//! # Metrics
//!
//! - `lending_loans_borrowed_total` - Loans created
//! - `lending_loans_returned_total` - Loans closed
//! - `lending_borrow_rejections_total{reason}` - Refused borrow requests
//! - `lending_fines_assessed_total` - Sum of fines assessed at return
//! - `lending_active_loans` - Loans currently out

use crate::Error;
use prometheus::{
    Counter, Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

/// Metrics collector
#[derive(Clone, Debug)]
pub struct Metrics {
    /// Loans created
    pub loans_borrowed: IntCounter,

    /// Loans closed
    pub loans_returned: IntCounter,

    /// Refused borrow requests, by reason
    pub borrow_rejections: IntCounterVec,

    /// Sum of assessed fines
    pub fines_assessed: Counter,

    /// Loans currently out
    pub active_loans: IntGauge,

    /// Prometheus registry
    registry: Registry,
}

impl Metrics {
    /// Create new metrics collector
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let loans_borrowed = IntCounter::new("lending_loans_borrowed_total", "Loans created")?;
        registry.register(Box::new(loans_borrowed.clone()))?;

        let loans_returned = IntCounter::new("lending_loans_returned_total", "Loans closed")?;
        registry.register(Box::new(loans_returned.clone()))?;

        let borrow_rejections = IntCounterVec::new(
            Opts::new(
                "lending_borrow_rejections_total",
                "Refused borrow requests",
            ),
            &["reason"],
        )?;
        registry.register(Box::new(borrow_rejections.clone()))?;

        let fines_assessed = Counter::new(
            "lending_fines_assessed_total",
            "Sum of fines assessed at return",
        )?;
        registry.register(Box::new(fines_assessed.clone()))?;

        let active_loans = IntGauge::new("lending_active_loans", "Loans currently out")?;
        registry.register(Box::new(active_loans.clone()))?;

        Ok(Self {
            loans_borrowed,
            loans_returned,
            borrow_rejections,
            fines_assessed,
            active_loans,
            registry,
        })
    }

    /// Record a committed borrow
    pub fn record_borrow(&self) {
        self.loans_borrowed.inc();
        self.active_loans.inc();
    }

    /// Record a committed return and its fine
    pub fn record_return(&self, fine: Decimal) {
        self.loans_returned.inc();
        self.active_loans.dec();
        if let Some(fine) = fine.to_f64() {
            if fine > 0.0 {
                self.fines_assessed.inc_by(fine);
            }
        }
    }

    /// Record a refused borrow
    pub fn record_rejection(&self, error: &Error) {
        let reason = match error {
            Error::PatronNotEligible(_) => "patron_not_eligible",
            Error::BorrowLimitExceeded { .. } => "borrow_limit_exceeded",
            Error::AlreadyBorrowed { .. } => "already_borrowed",
            Error::ItemUnavailable(_) => "item_unavailable",
            _ => "other",
        };
        self.borrow_rejections.with_label_values(&[reason]).inc();
    }

    /// Reset the active-loans gauge (after loading persisted state)
    pub fn set_active_loans(&self, count: usize) {
        self.active_loans.set(count as i64);
    }

    /// Get metrics registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Export all metrics in Prometheus text format
    pub fn export(&self) -> prometheus::Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
