//! Domain types for the fund flow pipeline

pub mod flow;
pub mod price;
pub mod shares;

pub use flow::{FlowRecord, FlowSummary, MergedRow, MergedSeries, SeriesError};
pub use price::{PriceBar, PriceObservation};
pub use shares::{ShareKey, SharesObservation, SharesPoint, SharesSnapshot};

/// Symbol type alias
pub type Symbol = String;
