//! Prune command - delete cached archives that are already installed

use crate::apt::AptTool;
use crate::cache::{prune_installed, CacheInspector, PruneOutcome, PruneReport};
use crate::cli::args::OutputFormat;
use crate::config::Config;
use crate::error::AptFetchResult;
use crate::ui::{self, Tone, UiContext};
use tracing::info;

/// Execute the prune command
pub async fn execute(format: OutputFormat, config: &Config) -> AptFetchResult<()> {
    let tool = AptTool::new();
    let records = CacheInspector::new(&tool)
        .scan(&config.paths.cache_dir)
        .await;
    let report = prune_installed(&records).await;
    info!(
        "Pruned {} of {} cached archives",
        report.cleaned,
        records.len()
    );

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Human => print_human(&UiContext::detect(), &report),
    }

    Ok(())
}

fn print_human(ctx: &UiContext, report: &PruneReport) {
    ui::intro(ctx, "apt-fetch prune");

    if report.entries.is_empty() {
        ui::outro(ctx, Tone::Ok, "No cached archives are already installed");
        return;
    }

    for entry in &report.entries {
        let (tone, message) = match entry.outcome {
            PruneOutcome::Cleaned => (
                Tone::Ok,
                format!("Removed {} {} ({})", entry.name, entry.version, entry.filename),
            ),
            PruneOutcome::NotFound => (Tone::Warn, format!("{} was already gone", entry.filename)),
            PruneOutcome::OtherError => (
                Tone::Fail,
                format!(
                    "Could not remove {}: {}",
                    entry.filename,
                    entry.error.as_deref().unwrap_or("unknown error")
                ),
            ),
        };
        ui::step(ctx, tone, &message);
    }

    let summary = format!(
        "{} removed, {} missing, {} errors",
        report.cleaned, report.not_found, report.errors
    );
    let tone = if report.errors == 0 { Tone::Ok } else { Tone::Warn };
    ui::outro(ctx, tone, &summary);
}
