//! apt archive cache inspection and pruning
//!
//! The cache directory is shared with apt itself and with concurrently
//! running fetches, so every operation here tolerates files appearing or
//! disappearing underneath it.
//!
//! # Record states
//!
//! | name/version | installed | Meaning |
//! |--------------|-----------|---------|
//! | declared | true | Exactly this version is installed, safe to prune |
//! | declared | false | Pending upgrade (or a different version installed) |
//! | `Not available` | false | Metadata could not be read |

pub mod inspector;
pub mod prune;

pub use inspector::{count_partial, find_archives, CacheInspector, PackageRecord, NOT_AVAILABLE};
pub use prune::{prune_installed, PruneEntry, PruneOutcome, PruneReport};
