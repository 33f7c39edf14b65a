//! CLI command implementations

pub mod fetch;
pub mod prune;
pub mod status;

pub use fetch::execute as fetch;
pub use prune::execute as prune;
pub use status::execute as status;
