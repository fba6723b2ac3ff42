//! Runs the timed accumulation probe once on the main thread.
//!
//! Prints exactly two lines to stdout:
//!
//! ```text
//! C: <accumulated value>
//! C: <elapsed> msec
//! ```

use anyhow::Context;
use tls_probe::{stats, Probe};

fn main() -> anyhow::Result<()> {
    tls_probe::init_logging();

    let report = Probe::new()
        .run()
        .context("timed accumulation into the local thread local failed")?;
    println!("{}", report);

    stats::thread_flush();
    if let Some(stats) = stats::stats() {
        log::info!("{:#?}", *stats);
    }
    Ok(())
}
