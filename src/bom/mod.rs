//! Bill-of-materials fulfillment math.
//!
//! Everything here is pure: callers load BOM rows and part quantities, the
//! functions in [`fulfillment`] turn them into per-item, per-subsystem and
//! overall progress plus a shortage list.

pub mod fulfillment;

pub use fulfillment::{
    calculate, evaluate_line, round_percent, shortages, BomLine, FulfillmentReport,
    FulfillmentState, ItemFulfillment, SubsystemProgress,
};
