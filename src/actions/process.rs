//! Process inspection and the running-check action.
use anyhow::{Result, bail};
use std::sync::Arc;

use super::{ActionContext, ActionResult};
use crate::exec::Executor;

/// Longest process name the kernel keeps in `/proc/<pid>/comm`.
const COMM_LEN: usize = 15;

/// Read-only view of the host's processes.
pub trait ProcessTable: Send + Sync + std::fmt::Debug {
    /// Whether a process with this exact name is running.
    ///
    /// # Errors
    ///
    /// Returns an error if the process list cannot be inspected.
    fn is_running(&self, name: &str) -> Result<bool>;

    /// Whether a process with this PID is alive.
    fn is_alive(&self, pid: u32) -> bool;
}

/// [`ProcessTable`] backed by `/proc` where available, otherwise by
/// `pgrep`/`kill -0` on Unix and `tasklist` on Windows.
#[derive(Debug)]
pub struct SystemProcessTable {
    executor: Arc<dyn Executor>,
}

impl SystemProcessTable {
    /// Create a process table that shells out through `executor`.
    #[must_use]
    pub const fn new(executor: Arc<dyn Executor>) -> Self {
        Self { executor }
    }

    fn proc_names() -> Option<Vec<String>> {
        let entries = std::fs::read_dir("/proc").ok()?;
        let names = entries
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().bytes().all(|b| b.is_ascii_digit()))
            .filter_map(|e| std::fs::read_to_string(e.path().join("comm")).ok())
            .map(|comm| comm.trim_end().to_string())
            .collect();
        Some(names)
    }
}

impl ProcessTable for SystemProcessTable {
    fn is_running(&self, name: &str) -> Result<bool> {
        if cfg!(windows) {
            let image = if name.to_ascii_lowercase().ends_with(".exe") {
                name.to_string()
            } else {
                format!("{name}.exe")
            };
            let filter = format!("IMAGENAME eq {image}");
            let out = self
                .executor
                .run("tasklist", &["/FI", &filter, "/NH", "/FO", "CSV"])?;
            return Ok(out
                .stdout
                .to_ascii_lowercase()
                .contains(&format!("\"{}\"", image.to_ascii_lowercase())));
        }
        if let Some(names) = Self::proc_names() {
            let wanted: String = name.chars().take(COMM_LEN).collect();
            return Ok(names.iter().any(|n| *n == wanted));
        }
        let out = self.executor.run_unchecked("pgrep", &["-x", name])?;
        match out.code {
            Some(0) => Ok(true),
            Some(1) => Ok(false),
            _ => bail!("pgrep failed: {}", out.stderr.trim()),
        }
    }

    fn is_alive(&self, pid: u32) -> bool {
        if cfg!(windows) {
            let filter = format!("PID eq {pid}");
            return self
                .executor
                .run("tasklist", &["/FI", &filter, "/NH", "/FO", "CSV"])
                .is_ok_and(|out| out.stdout.contains(&format!("\"{pid}\"")));
        }
        let proc = std::path::Path::new("/proc");
        if proc.is_dir() {
            return proc.join(pid.to_string()).exists();
        }
        self.executor
            .run_unchecked("kill", &["-0", &pid.to_string()])
            .is_ok_and(|out| out.success)
    }
}

pub(super) fn run(
    module: &str,
    program_name: &str,
    should_be_running: bool,
    ctx: &ActionContext<'_>,
) -> ActionResult {
    let mut res = ActionResult::new(module);
    match ctx.env.processes.is_running(program_name) {
        Ok(running) if running == should_be_running => {
            res.succeed();
        }
        Ok(running) => {
            let state = if running { "running" } else { "not running" };
            res.debug(format!("\"{program_name}\" is {state}, skipping remaining actions"));
        }
        Err(e) => {
            res.error(format!("cannot inspect processes: {e:#}"));
        }
    }
    res
}
