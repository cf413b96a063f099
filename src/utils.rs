use anyhow::Result;
use sysinfo::{Pid, System};
use tracing::Level;
use tracing_subscriber::{fmt, EnvFilter};

use crate::constants::{BYTES_PER_GB, BYTES_PER_KB, BYTES_PER_MB};

pub fn setup_logging(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };

    let filter = EnvFilter::from_default_env()
        .add_directive(format!("linesort={}", level).parse()?);

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    Ok(())
}

/// Resident set size of the current process, in bytes. Zero when the
/// platform refuses to answer.
pub fn process_rss_bytes() -> u64 {
    let mut system = System::new();
    let pid = Pid::from_u32(std::process::id());
    system.refresh_process(pid);
    system.process(pid).map(|p| p.memory()).unwrap_or(0)
}

/// Renders a byte count in the largest unit it fills. Sub-gigabyte values
/// get one decimal; gigabytes get two, since that is the scale run reports
/// care about.
pub fn format_bytes(bytes: u64) -> String {
    let value = bytes as f64;
    if bytes < BYTES_PER_KB as u64 {
        format!("{} B", bytes)
    } else if bytes < BYTES_PER_MB as u64 {
        format!("{:.1} KB", value / BYTES_PER_KB as f64)
    } else if bytes < BYTES_PER_GB {
        format!("{:.1} MB", value / BYTES_PER_MB as f64)
    } else {
        format!("{:.2} GB", value / BYTES_PER_GB as f64)
    }
}

/// Renders a millisecond count at the coarsest useful resolution:
/// fractional seconds under a minute, `MmSSs` under an hour, `HhMMm` above.
pub fn format_duration(ms: u64) -> String {
    let seconds = ms as f64 / 1000.0;
    if seconds < 60.0 {
        return format!("{seconds:.1}s");
    }

    let total_secs = ms / 1000;
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    if hours > 0 {
        format!("{hours}h{minutes:02}m")
    } else {
        format!("{minutes}m{:02}s", total_secs % 60)
    }
}
