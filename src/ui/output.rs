//! Report formatting for status and prune output
//!
//! Interactive terminals get cliclack's log glyphs. Plain output is what cron
//! mails or a script greps, so it stays one fact per line with a lowercase
//! tag and key columns aligned.

use super::context::UiContext;
use console::{style, Style};

/// Width keys are padded to in plain output
const KEY_WIDTH: usize = 22;

/// How a reported line should read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Ok,
    Warn,
    Fail,
}

impl Tone {
    fn tag(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Warn => "warn",
            Self::Fail => "fail",
        }
    }

    fn style(self) -> Style {
        match self {
            Self::Ok => Style::new().green(),
            Self::Warn => Style::new().yellow(),
            Self::Fail => Style::new().red(),
        }
    }

    /// The tone for a count where zero is good news
    pub fn of_count(count: u32) -> Self {
        if count == 0 {
            Self::Ok
        } else {
            Self::Warn
        }
    }
}

fn plain_line(tone: Tone, message: &str) -> String {
    let tag = format!("{:<5}", tone.tag());
    format!("{}{}", tone.style().apply_to(tag), message)
}

/// Report title
pub fn intro(ctx: &UiContext, title: &str) {
    if ctx.use_fancy_output() {
        cliclack::intro(style(title).cyan().bold()).ok();
    } else {
        println!("{}", style(title).bold());
    }
}

/// Closing summary line
pub fn outro(ctx: &UiContext, tone: Tone, message: &str) {
    if ctx.use_fancy_output() {
        cliclack::outro(tone.style().bold().apply_to(message)).ok();
    } else {
        println!("{}", plain_line(tone, message));
    }
}

pub fn section(ctx: &UiContext, title: &str) {
    if ctx.use_fancy_output() {
        println!();
        cliclack::log::info(style(title).bold()).ok();
    } else {
        println!();
        println!("{}:", title);
    }
}

/// One outcome, e.g. a single archive in a prune pass
pub fn step(ctx: &UiContext, tone: Tone, message: &str) {
    if !ctx.use_fancy_output() {
        println!("  {}", plain_line(tone, message));
        return;
    }
    match tone {
        Tone::Ok => cliclack::log::success(message).ok(),
        Tone::Warn => cliclack::log::warning(message).ok(),
        Tone::Fail => cliclack::log::error(message).ok(),
    };
}

pub fn remark(ctx: &UiContext, message: &str) {
    if ctx.use_fancy_output() {
        cliclack::log::remark(message).ok();
    } else {
        println!("  {}", style(message).dim());
    }
}

pub fn key_value(ctx: &UiContext, key: &str, value: &str) {
    if ctx.use_fancy_output() {
        println!("  {}: {}", style(key).dim(), value);
    } else {
        println!("  {}", plain_pair(key, value));
    }
}

/// Key-value pair whose value is coloured by `tone`
pub fn key_value_tone(ctx: &UiContext, key: &str, value: &str, tone: Tone) {
    let value = tone.style().apply_to(value);
    if ctx.use_fancy_output() {
        println!("  {}: {}", style(key).dim(), value);
    } else {
        println!("  {}", plain_pair(key, &value.to_string()));
    }
}

fn plain_pair(key: &str, value: &str) -> String {
    format!("{:<width$}{}", format!("{}:", key), value, width = KEY_WIDTH)
}
