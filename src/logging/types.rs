//! Core logging types: module entries and the [`Log`] trait.
use crate::modules::ModuleState;

/// Module outcome recorded for the run summary.
#[derive(Debug, Clone)]
pub struct ModuleEntry {
    /// Module name.
    pub name: String,
    /// Final state of the module in this run.
    pub state: ModuleState,
    /// Optional detail (skip reason, failure cause, elapsed time).
    pub message: Option<String>,
}

/// Abstraction over logging backends.
///
/// Both [`Logger`](super::logger::Logger) (direct output) and
/// [`BufferedLog`](super::buffered::BufferedLog) (deferred output for
/// modules running concurrently) implement this trait, so module code can
/// log without knowing whether output is immediate or buffered.
pub trait Log: Send + Sync + std::fmt::Debug {
    /// Log a stage header (major section).
    fn stage(&self, msg: &str);
    /// Log an informational message.
    fn info(&self, msg: &str);
    /// Log a debug message (may be suppressed on console).
    fn debug(&self, msg: &str);
    /// Log a warning message.
    fn warn(&self, msg: &str);
    /// Log an error message.
    fn error(&self, msg: &str);
    /// Record a module outcome for the summary.
    fn record_module(&self, name: &str, state: ModuleState, message: Option<&str>);
}
