//! CLI command handlers.

mod commands;
mod plugins;

pub(crate) use commands::{cmd_commands, cmd_voice};
pub(crate) use plugins::{cmd_plugins, cmd_status};

use anyhow::{Context, Result};

use widgetdeck::builtin::builtin_catalog;
use widgetdeck::context::LoadReport;
use widgetdeck::{DeckConfig, DeckContext};

/// Build a dashboard and load bundled plus discovered plugins.
///
/// Load failures are reported on stderr but do not abort the command.
pub(crate) async fn open_deck(config: DeckConfig) -> Result<DeckContext> {
    let ctx = DeckContext::new(config, builtin_catalog())
        .with_context(|| "Failed to initialize dashboard")?;

    let mut reports = ctx.load_bundled().await;
    reports.extend(
        ctx.load_discovered()
            .await
            .with_context(|| "Failed to scan plugin directories")?,
    );
    report_failures(&reports);
    Ok(ctx)
}

fn report_failures(reports: &[LoadReport]) {
    for report in reports {
        if let Err(e) = &report.result {
            match &report.path {
                Some(path) => eprintln!("  [!] {} ({}): {}", report.id, path.display(), e),
                None => eprintln!("  [!] {}: {}", report.id, e),
            }
        }
    }
}
