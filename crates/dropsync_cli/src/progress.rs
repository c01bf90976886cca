//! Progress reporting for sync runs.
//!
//! Two modes, chosen by TTY detection:
//! - Interactive: an animated spinner updated per progress event
//! - Logging: structured tracing lines for CI and pipes

use console::{Term, style};
use indicatif::{ProgressBar, ProgressStyle};

use dropsync::{SyncEvent, SyncEventKind};

/// Progress reporter that handles both interactive and logging modes.
pub enum ProgressReporter {
    /// Animated spinner for a TTY.
    Interactive(ProgressBar),
    /// Structured logging for non-TTY output.
    Logging,
}

impl ProgressReporter {
    /// Create a reporter, auto-detecting TTY mode.
    pub fn new() -> Self {
        if Term::stdout().is_term() {
            let bar = ProgressBar::new_spinner();
            bar.set_style(
                ProgressStyle::with_template("{spinner} {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            );
            bar.enable_steady_tick(std::time::Duration::from_millis(120));
            Self::Interactive(bar)
        } else {
            Self::Logging
        }
    }

    /// Render one event.
    pub fn handle(&self, event: &SyncEvent) {
        match self {
            Self::Interactive(bar) => match event.kind {
                SyncEventKind::Started => {
                    bar.set_message(format!(
                        "syncing {} ({} so far)",
                        event.shop, event.synced_so_far
                    ));
                }
                SyncEventKind::Progress => {
                    bar.set_message(format!(
                        "syncing {} ({} orders)",
                        event.shop, event.synced_so_far
                    ));
                }
                SyncEventKind::Complete => {
                    bar.finish_and_clear();
                    println!(
                        "{} synced {} orders for {}",
                        style("done:").green().bold(),
                        event.total_if_known.unwrap_or(event.synced_so_far),
                        event.shop
                    );
                }
                SyncEventKind::Error => {
                    bar.finish_and_clear();
                    eprintln!(
                        "{} {} ({} orders persisted)",
                        style("sync stopped:").yellow().bold(),
                        event.message.as_deref().unwrap_or("unknown failure"),
                        event.synced_so_far
                    );
                }
            },
            Self::Logging => match event.kind {
                SyncEventKind::Started => {
                    tracing::info!(shop = %event.shop, synced = event.synced_so_far, "sync started");
                }
                SyncEventKind::Progress => {
                    tracing::info!(shop = %event.shop, synced = event.synced_so_far, "sync progress");
                }
                SyncEventKind::Complete => {
                    tracing::info!(
                        shop = %event.shop,
                        total = event.total_if_known.unwrap_or(event.synced_so_far),
                        "sync complete"
                    );
                }
                SyncEventKind::Error => {
                    tracing::warn!(
                        shop = %event.shop,
                        synced = event.synced_so_far,
                        message = event.message.as_deref().unwrap_or(""),
                        "sync stopped"
                    );
                }
            },
        }
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}
