//! Raw rows to period series: fiscal calendar, aggregation, alignment, and
//! ledger account splitting.

pub mod builder;
pub mod calendar;
pub mod ledger;

pub use builder::{align_series, prepare_time_series, AlignedSeriesSet, SeriesSpec};
pub use calendar::FiscalCalendar;
pub use ledger::{LedgerLayout, LedgerSeries, REVENUE_SERIES};
