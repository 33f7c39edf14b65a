//! apt-fetch - scheduled apt package prefetcher
//!
//! Refreshes the package index and downloads pending upgrades into the apt
//! cache without installing them, under a single-instance lock. Keeps a
//! day-of-week history log and reports status or prunes archives that are
//! already installed.

pub mod apt;
pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod fetch;
pub mod history;
pub mod lock;
pub mod ui;

pub use error::{AptFetchError, AptFetchResult};
