//! Fetch history: the day-partitioned log and the statistics derived from it

pub mod event;
pub mod stats;
pub mod store;

pub use event::{EventKind, LogEvent};
pub use stats::{compute_stats, RunStats};
pub use store::LogStore;
