//! Ctrl+C handling: first press requests cooperative cancellation, second
//! press force-quits.

use console::Term;
use dropsync::SyncService;

/// Install the Ctrl+C handler for a running sync.
///
/// The first Ctrl+C asks the service to cancel the shop's run; the run
/// finishes its in-flight page, persists its cursor, and exits cleanly. A
/// second Ctrl+C exits immediately.
pub fn setup_cancel_handler(service: SyncService, shop: String) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            tracing::warn!("failed to install Ctrl+C handler");
            return;
        }

        let cancelled = service.cancel_sync(&shop);
        let is_tty = Term::stdout().is_term();
        if is_tty {
            if cancelled {
                eprintln!("\nCancelling after the current page; progress is preserved.");
                eprintln!("Press Ctrl+C again to force quit.");
            } else {
                eprintln!("\nNo sync in progress.");
            }
        } else {
            tracing::warn!(shop = %shop, cancelled, "cancellation requested");
        }

        if tokio::signal::ctrl_c().await.is_ok() {
            if is_tty {
                eprintln!("Force quit!");
            }
            std::process::exit(130);
        }
    });
}
