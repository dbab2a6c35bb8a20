//! Analysis modules.
//!
//! Dashboard aggregation over patients and orders, and category grouping
//! of lab report results.

pub mod aggregator;
pub mod grouper;
pub mod ranking;
pub mod reference_range;

pub use aggregator::*;
pub use grouper::*;
