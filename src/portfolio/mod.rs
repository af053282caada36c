mod holdings;
mod lots;
mod models;
mod valuation;

pub use holdings::{HoldingsAggregator, HoldingsService};
pub use lots::{build_positions, Position};
pub use models::*;
pub use valuation::{fold_total, TotalValuationService};
