//! Buffered logger for modules applying concurrently.
use std::sync::{Arc, Mutex};

use super::logger::Logger;
use super::types::Log;
use crate::modules::ModuleState;

/// A single buffered log entry, replayed when flushed.
#[derive(Debug, Clone)]
enum LogEntry {
    Stage(String),
    Info(String),
    Debug(String),
    Warn(String),
    Error(String),
}

impl LogEntry {
    /// Emit this entry through tracing, tagged with the module it came from.
    fn replay(&self, module: &str) {
        match self {
            Self::Stage(msg) => tracing::info!(target: "ricer::stage", module, "{msg}"),
            Self::Info(msg) => tracing::info!(module, "{msg}"),
            Self::Debug(msg) => tracing::debug!(module, "{msg}"),
            Self::Warn(msg) => tracing::warn!(module, "{msg}"),
            Self::Error(msg) => tracing::error!(module, "{msg}"),
        }
    }
}

/// Implement the display methods of [`Log`] by buffering each message into
/// `self.entries` as the corresponding [`LogEntry`] variant.
macro_rules! buffer_log_methods {
    ($($method:ident => $variant:ident),+ $(,)?) => {
        $(
            fn $method(&self, msg: &str) {
                if let Ok(mut guard) = self.entries.lock() {
                    guard.push(LogEntry::$variant(msg.to_string()));
                }
            }
        )+
    };
}

/// Log of one module during stage 2.
///
/// Output is held in memory while the module runs, so modules applying in
/// parallel never interleave, and replayed in order, tagged with the module
/// name, by [`flush_and_complete`](Self::flush_and_complete).
/// [`record_module`](Log::record_module) goes straight to the [`Logger`].
#[derive(Debug)]
pub struct BufferedLog {
    inner: Arc<Logger>,
    module: String,
    entries: Mutex<Vec<LogEntry>>,
}

impl BufferedLog {
    /// Create a buffer for `module` backed by `inner`.
    #[must_use]
    pub fn new(inner: Arc<Logger>, module: impl Into<String>) -> Self {
        Self {
            inner,
            module: module.into(),
            entries: Mutex::new(Vec::new()),
        }
    }

    /// Name of the module this buffer belongs to.
    #[must_use]
    pub fn module(&self) -> &str {
        &self.module
    }

    /// Replay all buffered entries without touching the progress display.
    #[cfg(test)]
    pub fn flush(&self) {
        let entries = match self.entries.lock() {
            Ok(guard) => guard.clone(),
            Err(_) => return,
        };
        for entry in &entries {
            entry.replay(&self.module);
        }
    }

    /// Replay the buffer and drop the module from the progress line.
    ///
    /// Holds the logger's flush lock, so modules finishing together replay
    /// one after another.
    pub fn flush_and_complete(&self) {
        let _guard = self
            .inner
            .flush_lock
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        self.inner.clear_progress();
        let entries = match self.entries.lock() {
            Ok(guard) => guard.clone(),
            Err(_) => return,
        };
        for entry in &entries {
            entry.replay(&self.module);
        }
        let remaining = self.inner.active_modules.lock().ok().and_then(|mut active| {
            active.retain(|n| *n != self.module);
            (!active.is_empty()).then(|| active.join(", "))
        });
        if let Some(names) = remaining {
            self.inner.draw_progress(&names);
        }
    }
}

impl Log for BufferedLog {
    buffer_log_methods! {
        stage => Stage,
        info  => Info,
        debug => Debug,
        warn  => Warn,
        error => Error,
    }

    fn record_module(&self, name: &str, state: ModuleState, message: Option<&str>) {
        self.inner.record_module(name, state, message);
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::logging::isolated_logger;
    use std::fs;

    #[test]
    fn record_module_forwards_to_logger() {
        let (log, _tmp, _guard) = isolated_logger();
        let log = Arc::new(log);
        let buf = BufferedLog::new(Arc::clone(&log), "kitty");
        buf.record_module("dunst", ModuleState::Completed, None);
        assert_eq!(log.module_entries().len(), 1);
        assert_eq!(log.module_entries()[0].name, "dunst");
    }

    #[test]
    fn flush_replays_to_file() {
        let (log, _tmp, _guard) = isolated_logger();
        let log = Arc::new(log);
        let buf = BufferedLog::new(Arc::clone(&log), "kitty");
        let marker = format!("buf-marker-{}", std::process::id());
        buf.info(&marker);
        let path = log.log_path().expect("log path");
        let before = fs::read_to_string(path).unwrap();
        assert!(
            !before.contains(&marker),
            "buffered output should not be written before flush"
        );
        buf.flush();
        let after = fs::read_to_string(path).unwrap();
        assert!(after.contains(&marker), "buffered output should appear after flush");
    }

    #[test]
    fn replayed_lines_name_the_module() {
        let (log, _tmp, _guard) = isolated_logger();
        let log = Arc::new(log);
        let buf = BufferedLog::new(Arc::clone(&log), "kitty");
        buf.warn("reload skipped");
        buf.flush();
        let contents = fs::read_to_string(log.log_path().expect("log path")).unwrap();
        assert!(contents.contains("[kitty] [warn] reload skipped"), "{contents}");
        assert_eq!(buf.module(), "kitty");
    }

    #[test]
    fn preserves_entry_order() {
        let (log, _tmp, _guard) = isolated_logger();
        let log = Arc::new(log);
        let buf = BufferedLog::new(Arc::clone(&log), "kitty");
        buf.stage("stage-1");
        buf.info("info-1");
        buf.debug("debug-1");
        buf.warn("warn-1");
        buf.error("error-1");
        buf.flush();
        let contents = fs::read_to_string(log.log_path().expect("log path")).unwrap();
        let positions: Vec<usize> = ["stage-1", "info-1", "debug-1", "warn-1", "error-1"]
            .iter()
            .map(|m| contents.find(m).expect("marker in log"))
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]), "entries out of order");
    }

    #[test]
    fn flush_and_complete_clears_progress_rows() {
        let (log, _tmp, _guard) = isolated_logger();
        let log = Arc::new(log);
        log.notify_module_start("kitty");
        let buf = BufferedLog::new(Arc::clone(&log), "kitty");
        buf.flush_and_complete();
        assert_eq!(log.progress_rows_count(), 0);
    }

    #[test]
    #[allow(clippy::significant_drop_tightening)]
    fn flush_and_complete_keeps_other_active_modules() {
        let (log, _tmp, _guard) = isolated_logger();
        let log = Arc::new(log);
        log.notify_module_start("kitty");
        log.notify_module_start("waybar");
        let buf = BufferedLog::new(Arc::clone(&log), "kitty");
        buf.flush_and_complete();
        let active = log.active_modules.lock().unwrap();
        assert_eq!(*active, vec!["waybar".to_string()]);
    }
}
