//! External package manager integration

#[cfg(test)]
pub(crate) mod fake;
pub mod native;
pub mod tool;

pub use native::AptTool;
pub use tool::{ArchiveMetadata, PackageTool, ToolExit, ToolOutput};
