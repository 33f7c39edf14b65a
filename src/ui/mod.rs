//! Terminal output helpers
//!
//! Uses `cliclack` for interactive terminals with automatic fallback to
//! plain, colour-tagged lines when running from cron or a pipe.

mod context;
mod output;
mod progress;

pub use context::UiContext;
pub use output::{intro, key_value, key_value_tone, outro, remark, section, step, Tone};
pub use progress::TaskSpinner;
