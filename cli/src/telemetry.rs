use std::{fs::File, path::Path};

use anyhow::{Context, Result};
use pprof::{ProfilerGuard, ProfilerGuardBuilder};
use tracing::warn;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialise tracing output and, when requested, start a CPU profiler.
pub fn init_telemetry(profile: bool) -> Option<ProfilerGuard<'static>> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = fmt::layer().with_target(false);
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();

    if !profile {
        return None;
    }
    match ProfilerGuardBuilder::default()
        .frequency(1000)
        .blocklist(&["libc", "libpthread", "libgcc", "libm"])
        .build()
    {
        Ok(guard) => Some(guard),
        Err(error) => {
            warn!(%error, "cpu profiler unavailable, continuing without it");
            None
        }
    }
}

/// Render the collected CPU profile as a flamegraph.
pub fn write_profile(guard: ProfilerGuard<'_>, output_path: &Path) -> Result<()> {
    let report = guard
        .report()
        .build()
        .context("failed to build cpu profile report")?;
    let mut file = File::create(output_path)
        .with_context(|| format!("failed to create {}", output_path.display()))?;
    report
        .flamegraph(&mut file)
        .with_context(|| format!("failed to write flamegraph to {}", output_path.display()))?;
    Ok(())
}
