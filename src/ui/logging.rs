// Logging setup
//
// Two layers share one filter: human-readable events on stderr and the same
// events appended (no ANSI) to a single log file opened once per process.
// Progress lines never go through here, they are written to stdout directly.

use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{InitError, RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

pub const DEFAULT_LOG_FILE: &str = "/var/log/bulkwipe.log";

#[derive(Debug, Clone)]
pub struct LogSettings {
    pub file: PathBuf,
    pub debug: bool,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            file: PathBuf::from(DEFAULT_LOG_FILE),
            debug: false,
        }
    }
}

/// Install the global subscriber.
///
/// The returned guard flushes the file writer on drop, so it has to live
/// until the end of `main`. `None` means file logging is off.
pub fn init(settings: &LogSettings) -> Option<WorkerGuard> {
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    match file_writer(&settings.file) {
        Ok((writer, guard)) => {
            let file_layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false);

            let _ = tracing_subscriber::registry()
                .with(env_filter(settings.debug))
                .with(stderr_layer)
                .with(file_layer)
                .try_init();

            tracing::debug!(log_file = %settings.file.display(), "File logging enabled");
            Some(guard)
        }
        Err(e) => {
            let _ = tracing_subscriber::registry()
                .with(env_filter(settings.debug))
                .with(stderr_layer)
                .try_init();

            tracing::warn!(
                "Cannot open log file {} ({}); logging to stderr only",
                settings.file.display(),
                e
            );
            None
        }
    }
}

/// `RUST_LOG` wins; otherwise info, or debug with `--debug`
fn env_filter(debug: bool) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if debug { "debug" } else { "info" }))
}

fn file_writer(path: &Path) -> Result<(NonBlocking, WorkerGuard), InitError> {
    let (dir, file_name) = split_log_path(path);
    let appender = RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(file_name)
        .build(dir)?;
    Ok(tracing_appender::non_blocking(appender))
}

/// Directory and file name for the appender; a bare name lands in the cwd
fn split_log_path(path: &Path) -> (PathBuf, String) {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "bulkwipe.log".to_string());
    (dir, file_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_split_log_path() {
        assert_eq!(
            split_log_path(Path::new("/var/log/bulkwipe.log")),
            (PathBuf::from("/var/log"), "bulkwipe.log".to_string())
        );
        assert_eq!(
            split_log_path(Path::new("wipe.log")),
            (PathBuf::from("."), "wipe.log".to_string())
        );
    }

    #[test]
    fn test_file_writer_appends_to_exact_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wipe.log");
        std::fs::write(&path, "earlier run\n").unwrap();

        {
            let (mut writer, _guard) = file_writer(&path).unwrap();
            writer.write_all(b"this run\n").unwrap();
        }

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "earlier run\nthis run\n");
    }

    #[test]
    fn test_file_writer_fails_under_regular_file() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, "").unwrap();

        assert!(file_writer(&blocker.join("wipe.log")).is_err());
    }
}
