//! Console stand-ins for the display and the hardware watchdog.

use std::time::Duration;

use tapterm_core::constants::DISPLAY_COLUMNS;
use tapterm_hardware::StatusDisplay;
use tapterm_hardware::mock::MockWatchdogHandle;
use tokio::task::JoinHandle;
use tracing::error;

/// Prints each frame as a boxed two-line panel on stdout.
#[derive(Debug, Default)]
pub struct ConsoleDisplay;

impl StatusDisplay for ConsoleDisplay {
    async fn show(&mut self, line1: &str, line2: &str) -> tapterm_hardware::Result<()> {
        println!("{}", frame(line1, line2));
        Ok(())
    }
}

fn frame(line1: &str, line2: &str) -> String {
    let border = format!("+{}+", "-".repeat(DISPLAY_COLUMNS));
    format!(
        "{border}\n|{line1:<width$}|\n|{line2:<width$}|\n{border}",
        width = DISPLAY_COLUMNS
    )
}

/// Report a stalled control loop.
///
/// A real watchdog would reset the device; here a missed deadline is logged
/// so a hung loop is visible.
pub fn spawn_watchdog_monitor(feeds: MockWatchdogHandle, timeout: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut last = feeds.feed_count();
        let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + timeout, timeout);
        loop {
            interval.tick().await;
            let count = feeds.feed_count();
            if count == last {
                error!(timeout_ms = timeout.as_millis() as u64, "Watchdog not fed");
            }
            last = count;
        }
    })
}
