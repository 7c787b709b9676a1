use std::sync::Arc;

use crate::actions::{CallbackHost, ProcessCallbackHost, ProcessTable, SystemProcessTable};
use crate::config::paths::Paths;
use crate::document::template::{Evaluator, PathEvaluator};
use crate::exec::Executor;
use crate::logging::Log;
use crate::platform::Platform;

/// Shared services for loading modules and running their actions.
pub struct Context {
    /// Resolved filesystem locations.
    pub paths: Arc<Paths>,
    /// Detected platform information.
    pub platform: Arc<Platform>,
    /// Logger for output and module recording.
    pub log: Arc<dyn Log>,
    /// Command executor (for testing or real system calls).
    pub executor: Arc<dyn Executor>,
    /// Runs callback actions.
    pub callbacks: Arc<dyn CallbackHost>,
    /// Answers "is this program running?".
    pub processes: Arc<dyn ProcessTable>,
    /// Evaluates `{{ expr }}` in action strings and templates.
    pub evaluator: Arc<dyn Evaluator>,
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("paths", &self.paths)
            .field("platform", &self.platform)
            .field("log", &"<dyn Log>")
            .field("executor", &"<dyn Executor>")
            .field("callbacks", &"<dyn CallbackHost>")
            .field("processes", &"<dyn ProcessTable>")
            .field("evaluator", &"<dyn Evaluator>")
            .finish()
    }
}

impl Context {
    /// Creates a context backed by the system's process table, executable
    /// callbacks, and the built-in expression evaluator.
    #[must_use]
    pub fn new(
        paths: Arc<Paths>,
        platform: Arc<Platform>,
        log: Arc<dyn Log>,
        executor: Arc<dyn Executor>,
    ) -> Self {
        Self {
            paths,
            platform,
            log,
            callbacks: Arc::new(ProcessCallbackHost::new(Arc::clone(&executor))),
            processes: Arc::new(SystemProcessTable::new(Arc::clone(&executor))),
            executor,
            evaluator: Arc::new(PathEvaluator),
        }
    }

    /// Create a copy of this context with a different logger.
    ///
    /// All other fields are cloned by reference (via `Arc`). This is used by
    /// the orchestrator to give each concurrently applying module its own
    /// buffered logger while sharing the rest of the context.
    #[must_use]
    pub fn with_log(&self, log: Arc<dyn Log>) -> Self {
        Self {
            paths: Arc::clone(&self.paths),
            platform: Arc::clone(&self.platform),
            log,
            executor: Arc::clone(&self.executor),
            callbacks: Arc::clone(&self.callbacks),
            processes: Arc::clone(&self.processes),
            evaluator: Arc::clone(&self.evaluator),
        }
    }

    /// Replace the callback host.
    #[must_use]
    pub fn with_callbacks(mut self, callbacks: Arc<dyn CallbackHost>) -> Self {
        self.callbacks = callbacks;
        self
    }

    /// Replace the process table.
    #[must_use]
    pub fn with_processes(mut self, processes: Arc<dyn ProcessTable>) -> Self {
        self.processes = processes;
        self
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::modules::test_helpers::{FakeProcessTable, test_context};

    #[test]
    fn with_log_shares_services() {
        let (ctx, _tmp) = test_context();
        let (log, _log_tmp, _guard) = crate::logging::isolated_logger();
        let other = ctx.with_log(Arc::new(log));
        assert!(Arc::ptr_eq(&ctx.paths, &other.paths));
        assert!(Arc::ptr_eq(&ctx.executor, &other.executor));
        assert!(Arc::ptr_eq(&ctx.callbacks, &other.callbacks));
    }

    #[test]
    fn with_processes_replaces_table() {
        let (ctx, _tmp) = test_context();
        let table: Arc<dyn ProcessTable> = Arc::new(FakeProcessTable::running(&["kitty"]));
        let ctx = ctx.with_processes(Arc::clone(&table));
        assert!(ctx.processes.is_running("kitty").unwrap());
        assert!(!ctx.processes.is_running("waybar").unwrap());
    }

    #[test]
    fn debug_hides_trait_objects() {
        let (ctx, _tmp) = test_context();
        let text = format!("{ctx:?}");
        assert!(text.contains("<dyn Executor>"));
    }
}
