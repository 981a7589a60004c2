//! Run log: every event goes to the console and to the log file as soon as it is emitted.
//!
//! Lines are written verbatim, without timestamp, level or target.

use std::fs::File;
use std::io;
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Installs the global subscriber, truncating the log file at `log_path`.
///
/// `RUST_LOG` overrides the level; otherwise `info`, or `debug` when `verbose`. Returns false when
/// a subscriber was already installed.
pub fn init_audit_trail(log_path: &Path, verbose: bool) -> io::Result<bool> {
    if let Some(parent) = log_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let log_file = File::create(log_path)?;

    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let console = fmt::layer().with_target(false).with_level(false).without_time();
    let file = fmt::layer()
        .with_target(false)
        .with_level(false)
        .without_time()
        .with_ansi(false)
        .with_writer(Mutex::new(log_file));

    Ok(tracing_subscriber::registry().with(filter).with(console).with(file).try_init().is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_reach_the_log_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("LogFile.txt");

        let installed = init_audit_trail(&path, false).unwrap();
        tracing::info!("Finish reading meter");

        assert!(path.exists());
        if installed {
            let contents = std::fs::read_to_string(&path).unwrap();
            assert!(contents.lines().any(|line| line == "Finish reading meter"));
        }
    }
}
