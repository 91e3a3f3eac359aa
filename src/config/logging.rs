use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::LoggingConfig;

/// Initialize logging.
///
/// `RUST_LOG` wins over the configured level; `debug` forces the debug level.
/// A global subscriber that is already installed is left in place, so this is
/// safe to call more than once. Keep the returned guard alive while logging to
/// a file.
pub fn init_logging(config: &LoggingConfig, debug: bool) -> Option<WorkerGuard> {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level))
    };

    let registry = tracing_subscriber::registry().with(filter);

    let (result, guard) = match config.file.as_deref().and_then(split_log_path) {
        Some((dir, file_name)) => {
            let appender = tracing_appender::rolling::never(dir, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let result = registry
                .with(
                    fmt::layer()
                        .with_writer(writer)
                        .with_ansi(false)
                        .with_thread_names(true)
                        .with_target(true),
                )
                .try_init();
            (result, Some(guard))
        }
        None => {
            let result = registry
                .with(
                    fmt::layer()
                        .with_writer(std::io::stderr)
                        .with_thread_names(true)
                        .with_target(true)
                        .with_line_number(true),
                )
                .try_init();
            (result, None)
        }
    };

    match result {
        Ok(()) => {
            tracing::info!("Logging initialized with level: {}", config.level);
            guard
        }
        Err(e) => {
            tracing::debug!("Logging already initialized: {}", e);
            None
        }
    }
}

fn split_log_path(path: &Path) -> Option<(&Path, &std::ffi::OsStr)> {
    let file_name = path.file_name()?;
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    Some((dir, file_name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_log_path() {
        let (dir, name) = split_log_path(Path::new("/var/log/term_embed.log")).unwrap();
        assert_eq!(dir, Path::new("/var/log"));
        assert_eq!(name, "term_embed.log");

        let (dir, _) = split_log_path(Path::new("embed.log")).unwrap();
        assert_eq!(dir, Path::new("."));

        assert!(split_log_path(Path::new("/")).is_none());
    }

    #[test]
    fn repeated_initialization_is_harmless() {
        let config = LoggingConfig::default();
        let _first = init_logging(&config, false);
        assert!(init_logging(&config, false).is_none());
    }
}
