//! Structured logger with module summary collection.
use std::io::Write as _;
use std::path::PathBuf;
use std::sync::Mutex;

use super::types::{Log, ModuleEntry};
use super::utils::terminal_columns;
use crate::modules::ModuleState;

/// Implement the display methods of [`Log`] by delegating to inherent methods
/// of the same name on the implementing type.
macro_rules! forward_log_methods {
    ($($method:ident),+ $(,)?) => {
        $(
            fn $method(&self, msg: &str) {
                self.$method(msg);
            }
        )+
    };
}

/// Console logger that also collects module outcomes for the run summary.
///
/// Every message goes through [`tracing`]; the file layer installed by
/// [`init_subscriber`](super::subscriber::init_subscriber) copies it to the
/// log file named here, regardless of verbosity.
#[derive(Debug, Default)]
pub struct Logger {
    modules: Mutex<Vec<ModuleEntry>>,
    log_file: Option<PathBuf>,
    /// Serializes console output from concurrent module flushes.
    pub(super) flush_lock: Mutex<()>,
    /// Names of modules currently applying in parallel.
    pub(super) active_modules: Mutex<Vec<String>>,
    /// Whether the single-row progress line is on screen (`0` or `1`).
    pub(super) progress_rows: Mutex<u16>,
}

impl Logger {
    /// Create a logger whose summary points at `log_file`.
    #[must_use]
    pub fn new(log_file: Option<PathBuf>) -> Self {
        Self {
            log_file,
            ..Self::default()
        }
    }

    /// Path of the log file, if any.
    #[must_use]
    pub const fn log_path(&self) -> Option<&PathBuf> {
        self.log_file.as_ref()
    }

    /// Return a clone of all recorded module entries.
    #[must_use]
    pub fn module_entries(&self) -> Vec<ModuleEntry> {
        self.modules.lock().map_or_else(|_| vec![], |g| g.clone())
    }

    /// Return the current value of `progress_rows` (test-only).
    #[cfg(test)]
    pub(crate) fn progress_rows_count(&self) -> u16 {
        *self
            .progress_rows
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Log an error message.
    pub fn error(&self, msg: &str) {
        tracing::error!("{msg}");
    }

    /// Log a warning message.
    pub fn warn(&self, msg: &str) {
        tracing::warn!("{msg}");
    }

    /// Log a stage header (major section).
    pub fn stage(&self, msg: &str) {
        tracing::info!(target: "ricer::stage", "{msg}");
    }

    /// Log an informational message.
    pub fn info(&self, msg: &str) {
        tracing::info!("{msg}");
    }

    /// Log a debug message (suppressed on console unless verbose; always
    /// written to the log file).
    pub fn debug(&self, msg: &str) {
        tracing::debug!("{msg}");
    }

    /// Record a module outcome for the summary.
    ///
    /// A module recorded twice keeps only its latest state.
    pub fn record_module(&self, name: &str, state: ModuleState, message: Option<&str>) {
        if let Ok(mut guard) = self.modules.lock() {
            guard.retain(|m| m.name != name);
            guard.push(ModuleEntry {
                name: name.to_string(),
                state,
                message: message.map(String::from),
            });
        }
    }

    /// Count the number of failed modules.
    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.modules.lock().map_or(0, |guard| {
            guard
                .iter()
                .filter(|m| m.state == ModuleState::Failed)
                .count()
        })
    }

    /// Print the summary of all recorded modules.
    pub fn print_summary(&self) {
        let mut modules = self.module_entries();
        if modules.is_empty() {
            return;
        }
        modules.sort_by(|a, b| a.name.cmp(&b.name));

        writeln!(std::io::stdout()).ok();
        self.stage("Summary");
        for module in &modules {
            let (icon, color) = marker(module.state);
            let suffix = module
                .message
                .as_ref()
                .map_or_else(String::new, |msg| format!(" ({msg})"));
            self.info(&format!("{color}{icon} {}{suffix}\x1b[0m", module.name));
        }

        let count = |state| modules.iter().filter(|m| m.state == state).count();
        writeln!(std::io::stdout()).ok();
        self.info(&format!(
            "{} modules: \x1b[32m{} completed\x1b[0m, \x1b[2m{} skipped\x1b[0m, \x1b[31m{} failed\x1b[0m",
            modules.len(),
            count(ModuleState::Completed),
            count(ModuleState::Skipped),
            count(ModuleState::Failed),
        ));

        if let Some(path) = &self.log_file {
            self.info(&format!("\x1b[2mlog: {}\x1b[0m", path.display()));
        }
    }

    /// Erase the in-progress status line from the console.
    ///
    /// Must be called while holding `flush_lock`.
    pub(super) fn clear_progress(&self) {
        let mut guard = self
            .progress_rows
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if *guard > 0 {
            let mut out = std::io::stdout();
            write!(out, "\r\x1b[K").and_then(|()| out.flush()).ok();
            *guard = 0;
        }
    }

    /// Print an in-progress status line listing running modules.
    ///
    /// Must be called while holding `flush_lock`.
    pub(super) fn draw_progress(&self, names: &str) {
        let cols = terminal_columns();
        let max_name_chars = cols.saturating_sub(4);
        let display_names = if names.chars().count() > max_name_chars {
            let truncated: String = names
                .chars()
                .take(max_name_chars.saturating_sub(1))
                .collect();
            format!("{truncated}…")
        } else {
            names.to_string()
        };
        let mut out = std::io::stdout();
        write!(out, "  \x1b[2m▹ {display_names}\x1b[0m")
            .and_then(|()| out.flush())
            .ok();
        let mut guard = self
            .progress_rows
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        *guard = 1;
    }

    /// Record that a module has started applying concurrently.
    pub fn notify_module_start(&self, name: &str) {
        let _guard = self
            .flush_lock
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        self.clear_progress();
        let names = self.active_modules.lock().map_or_else(
            |_| name.to_string(),
            |mut active| {
                active.push(name.to_string());
                active.join(", ")
            },
        );
        self.draw_progress(&names);
    }
}

/// Summary glyph and colour for a module state.
const fn marker(state: ModuleState) -> (&'static str, &'static str) {
    match state {
        ModuleState::Completed => ("✓", "\x1b[32m"),
        ModuleState::Skipped => ("○", "\x1b[2m"),
        ModuleState::Failed => ("✗", "\x1b[31m"),
        ModuleState::Pending | ModuleState::Running => ("~", "\x1b[33m"),
    }
}

impl Log for Logger {
    forward_log_methods!(stage, info, debug, warn, error);

    fn record_module(&self, name: &str, state: ModuleState, message: Option<&str>) {
        self.record_module(name, state, message);
    }
}
