use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use anyhow::Context;
use tracing::Subscriber;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

// ── Logging bootstrap ──────────────────────────────────────────────────────────

/// Map a CLI log-level name onto a tracing filter directive.
///
/// Unknown names fall back to `"info"`.
pub fn level_directive(log_level: &str) -> &'static str {
    match log_level.to_uppercase().as_str() {
        "DEBUG" => "debug",
        "INFO" => "info",
        "WARNING" | "WARN" => "warn",
        "ERROR" | "CRITICAL" => "error",
        _ => "info",
    }
}

/// Build the `tracing` subscriber for one command.
///
/// Output goes to stderr, or is appended to `log_file` (created with its
/// parent directory if needed). The caller installs the result with
/// [`tracing::subscriber::with_default`] for the duration of the command.
pub fn build_subscriber(
    log_level: &str,
    log_file: Option<&Path>,
) -> anyhow::Result<impl Subscriber + Send + Sync + 'static> {
    let filter = EnvFilter::try_new(level_directive(log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let (writer, ansi) = match log_file {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("creating log directory {}", parent.display()))?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("opening log file {}", path.display()))?;
            (BoxMakeWriter::new(Mutex::new(file)), false)
        }
        None => (BoxMakeWriter::new(std::io::stderr), true),
    };

    let layer = fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_ansi(ansi)
        .with_writer(writer);

    Ok(tracing_subscriber::registry().with(filter).with(layer))
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_level_directive_mapping() {
        assert_eq!(level_directive("DEBUG"), "debug");
        assert_eq!(level_directive("INFO"), "info");
        assert_eq!(level_directive("WARNING"), "warn");
        assert_eq!(level_directive("ERROR"), "error");
        assert_eq!(level_directive("warning"), "warn");
        assert_eq!(level_directive("verbose"), "info");
    }

    #[test]
    fn test_log_file_receives_events_at_level() {
        let tmp = TempDir::new().expect("tempdir");
        let log = tmp.path().join("logs").join("pipeline.log");

        let subscriber = build_subscriber("WARNING", Some(&log)).expect("subscriber");
        tracing::subscriber::with_default(subscriber, || {
            tracing::info!("hidden info line");
            tracing::warn!("visible warning line");
        });

        let text = std::fs::read_to_string(&log).expect("log written");
        assert!(text.contains("visible warning line"));
        assert!(!text.contains("hidden info line"));
        assert!(!text.contains('\u{1b}'), "no ANSI escapes in files");
    }

    #[test]
    fn test_log_file_appends() {
        let tmp = TempDir::new().expect("tempdir");
        let log = tmp.path().join("pipeline.log");
        std::fs::write(&log, "earlier run\n").unwrap();

        let subscriber = build_subscriber("INFO", Some(&log)).expect("subscriber");
        tracing::subscriber::with_default(subscriber, || tracing::info!("second run"));

        let text = std::fs::read_to_string(&log).unwrap();
        assert!(text.starts_with("earlier run\n"));
        assert!(text.contains("second run"));
    }
}
