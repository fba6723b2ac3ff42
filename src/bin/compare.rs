//! Runs the accumulation loop through every thread local access path on the main thread, so the
//! overheads can be read side by side.

use anyhow::Context;
use tls_probe::{stats, Probe, Variant};

fn main() -> anyhow::Result<()> {
    tls_probe::init_logging();

    let probe = Probe::new();
    let mut values = Vec::with_capacity(Variant::ALL.len());
    for &variant in Variant::ALL.iter() {
        let report = probe
            .run_variant(variant)
            .with_context(|| format!("`{}` run failed", variant.label()))?;
        println!("{}", report);
        values.push(report.value);
    }

    if values.windows(2).any(|pair| pair[0] != pair[1]) {
        log::error!("access paths disagree on the accumulated value: {:?}", values);
        anyhow::bail!("access paths disagree on the accumulated value");
    }

    stats::thread_flush();
    if let Some(stats) = stats::stats() {
        log::info!("{:#?}", *stats);
    }
    Ok(())
}
