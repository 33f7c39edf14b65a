//! Progress spinner for interactive fetch runs

use super::context::UiContext;
use console::style;

/// A task spinner that stays silent outside a terminal
///
/// Fetches normally run from cron, where any stdout becomes mail, so the
/// plain fallback prints only the final outcome.
pub struct TaskSpinner {
    spinner: Option<cliclack::ProgressBar>,
    interactive: bool,
}

impl TaskSpinner {
    /// Create a new spinner
    pub fn new(ctx: &UiContext) -> Self {
        Self {
            spinner: None,
            interactive: ctx.use_fancy_output(),
        }
    }

    /// Start the spinner, or update its message if already running
    pub fn message(&mut self, message: &str) {
        if !self.interactive {
            return;
        }

        match self.spinner {
            Some(ref spinner) => spinner.start(message),
            None => {
                let spinner = cliclack::spinner();
                spinner.start(message);
                self.spinner = Some(spinner);
            }
        }
    }

    /// Stop with success message
    pub fn stop(&mut self, message: &str) {
        if let Some(spinner) = self.spinner.take() {
            spinner.stop(message);
        } else if self.interactive {
            println!("{} {}", style("✓").green(), message);
        }
    }

    /// Stop with warning message
    pub fn stop_warn(&mut self, message: &str) {
        if let Some(spinner) = self.spinner.take() {
            spinner.error(message);
        } else if self.interactive {
            println!("{} {}", style("!").yellow(), message);
        }
    }

    /// Clear the spinner without any message
    pub fn clear(&mut self) {
        if let Some(spinner) = self.spinner.take() {
            spinner.clear();
        }
    }
}
