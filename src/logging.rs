use anyhow::{anyhow, Context, Result};
use std::{fs, fs::OpenOptions, path::Path, sync::Mutex};
use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "FF7_CONVERT_LOG";

/// Routes `tracing` output into `log_path`, appending across runs.
/// The filter comes from `FF7_CONVERT_LOG` and defaults to `info`.
pub fn init(log_path: &Path) -> Result<()> {
    if let Some(parent) = log_path.parent() {
        fs::create_dir_all(parent).context("create log dir")?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
        .with_context(|| format!("open log file {:?}", log_path))?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_ansi(false)
        .with_target(false)
        .with_writer(Mutex::new(file))
        .try_init()
        .map_err(|err| anyhow!("install log subscriber: {err}"))?;
    Ok(())
}
