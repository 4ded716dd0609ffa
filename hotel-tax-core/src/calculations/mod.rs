//! Tax calculation and reporting.
//!
//! The pure parts ([`engine`], [`report`]) work over in-memory slices; the
//! services ([`TaxCalculator`], [`ReportGenerator`]) load a snapshot through
//! a [`TaxRepository`](crate::TaxRepository), call them, and persist.

pub mod calculator;
pub mod common;
pub mod engine;
pub mod report;

pub use calculator::TaxCalculator;
pub use engine::{ACCOMMODATION_CATEGORIES, compute_breakdown, price_items};
pub use report::{ReportAccumulator, ReportGenerator};
