//! Series reconciliation and flow derivation

pub mod flows;
pub mod merge;
pub mod rolling;

pub use flows::{derive, summarize, window_records, FlowWindow, DEFAULT_WINDOW_DAYS};
pub use merge::merge;
pub use rolling::{cumulative_sum, rolling_sum};
