//! Process-wide tracing setup for a run

use std::fs::File;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::error::{Error, Result};
use crate::settings::Settings;

/// Install the console layer and a JSON file layer at
/// `<log_path>/<run id>/<run id>.log`.
///
/// `RUST_LOG` wins over the configured level; `verbose` forces `debug`.
/// Returns the path of the run log file.
pub fn init_tracing(settings: &Settings, run_id: &str, verbose: bool) -> Result<PathBuf> {
    let dir = settings.run_log_dir(run_id);
    std::fs::create_dir_all(&dir)?;
    let path = dir.join(format!("{}.log", run_id));
    let file = File::create(&path)?;

    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.log_level))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .with(
            fmt::layer()
                .json()
                .with_ansi(false)
                .with_writer(Mutex::new(file)),
        )
        .try_init()
        .map_err(|e| Error::Logging(e.to_string()))?;

    Ok(path)
}
