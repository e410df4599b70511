//! Projection engine: ordering, per-account year processing, and the year loop

mod engine;
mod order;
mod processor;
mod results;
mod totals;

pub use engine::{ProjectionConfig, ProjectionEngine};
pub use order::processing_order;
pub use processor::{AccountYear, YearProcessor};
pub use results::{AccountSeries, ProjectionResult, ProjectionSummary, YearSummary};
pub use totals::YearTotals;
