//! Shared test doubles for actions, modules, and the orchestrator.
#![allow(clippy::unwrap_used, clippy::expect_used)]

use anyhow::{Result, bail};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use super::{Context, ModuleStates};
use crate::actions::{ActionKind, CallbackHost, CallbackRequest, ProcessTable};
use crate::config::paths::Paths;
use crate::document::Mapping;
use crate::exec::{ExecResult, Executor};
use crate::logging::Logger;
use crate::platform::{Os, Platform};

/// A shell action running `command`.
pub fn shell(command: &str) -> ActionKind {
    ActionKind::Shell {
        command: command.to_string(),
    }
}

/// Executor that records every call and succeeds without running anything.
#[derive(Debug, Default)]
pub struct RecordingExecutor {
    shell: Mutex<Vec<String>>,
    detached: Mutex<Vec<String>>,
    programs: Mutex<Vec<String>>,
    shell_stderr: Option<String>,
}

impl RecordingExecutor {
    /// An executor whose shell commands exit 1 and print `stderr`.
    pub fn failing_shell(stderr: &str) -> Self {
        Self {
            shell_stderr: Some(stderr.to_string()),
            ..Self::default()
        }
    }

    /// Command lines passed to [`Executor::run_shell`].
    pub fn shell_calls(&self) -> Vec<String> {
        self.shell.lock().unwrap().clone()
    }

    /// Command lines passed to [`Executor::spawn_detached`].
    pub fn detached_calls(&self) -> Vec<String> {
        self.detached.lock().unwrap().clone()
    }

    /// Programs passed to [`Executor::run`] and friends, with their arguments.
    pub fn program_calls(&self) -> Vec<String> {
        self.programs.lock().unwrap().clone()
    }

    fn record_program(&self, program: &str, args: &[&str]) -> ExecResult {
        let mut line = program.to_string();
        for arg in args {
            line.push(' ');
            line.push_str(arg);
        }
        self.programs.lock().unwrap().push(line);
        ExecResult {
            success: true,
            code: Some(0),
            ..ExecResult::default()
        }
    }
}

impl Executor for RecordingExecutor {
    fn run(&self, program: &str, args: &[&str]) -> Result<ExecResult> {
        Ok(self.record_program(program, args))
    }

    fn run_unchecked(&self, program: &str, args: &[&str]) -> Result<ExecResult> {
        Ok(self.record_program(program, args))
    }

    fn run_with_input(&self, program: &str, args: &[&str], _input: &str) -> Result<ExecResult> {
        Ok(self.record_program(program, args))
    }

    fn run_shell(&self, command: &str) -> Result<ExecResult> {
        self.shell.lock().unwrap().push(command.to_string());
        Ok(match &self.shell_stderr {
            Some(stderr) => ExecResult {
                stderr: stderr.clone(),
                success: false,
                code: Some(1),
                ..ExecResult::default()
            },
            None => ExecResult {
                success: true,
                code: Some(0),
                ..ExecResult::default()
            },
        })
    }

    fn spawn_detached(&self, command: &str) -> Result<()> {
        self.detached.lock().unwrap().push(command.to_string());
        Ok(())
    }

    fn which(&self, _program: &str) -> bool {
        true
    }
}

/// What a callback host saw for one call.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub module: String,
    pub file: PathBuf,
    pub function: String,
    pub document: Mapping,
    pub peers: Option<ModuleStates>,
}

/// Callback host returning a fixed value (or error) and recording calls.
#[derive(Debug, Default)]
pub struct StaticCallbackHost {
    value: Option<Value>,
    error: Option<String>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl StaticCallbackHost {
    /// Every call returns `value`.
    pub fn returning(value: Value) -> Self {
        Self {
            value: Some(value),
            ..Self::default()
        }
    }

    /// Every call fails with `message`.
    pub fn failing(message: &str) -> Self {
        Self {
            error: Some(message.to_string()),
            ..Self::default()
        }
    }

    /// `(file, function)` of every call so far.
    pub fn calls(&self) -> Vec<(PathBuf, String)> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|c| (c.file.clone(), c.function.clone()))
            .collect()
    }

    /// Every call so far, in call order.
    pub fn requests(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }
}

impl CallbackHost for StaticCallbackHost {
    fn call(&self, request: &CallbackRequest<'_>) -> Result<Option<Value>> {
        self.calls.lock().unwrap().push(RecordedCall {
            module: request.module.to_string(),
            file: request.file.to_path_buf(),
            function: request.function.to_string(),
            document: request.document.clone(),
            peers: request.peers.cloned(),
        });
        if let Some(message) = &self.error {
            bail!("{message}");
        }
        Ok(self.value.clone())
    }
}

/// Process table with a fixed set of running program names.
#[derive(Debug, Default)]
pub struct FakeProcessTable {
    running: Vec<String>,
    live_pids: Vec<u32>,
    broken: bool,
}

impl FakeProcessTable {
    /// Only `names` are running.
    pub fn running(names: &[&str]) -> Self {
        Self {
            running: names.iter().map(|n| (*n).to_string()).collect(),
            ..Self::default()
        }
    }

    /// Only `pids` are alive.
    pub fn alive(pids: &[u32]) -> Self {
        Self {
            live_pids: pids.to_vec(),
            ..Self::default()
        }
    }

    /// Every inspection fails.
    pub fn broken() -> Self {
        Self {
            broken: true,
            ..Self::default()
        }
    }
}

impl ProcessTable for FakeProcessTable {
    fn is_running(&self, name: &str) -> Result<bool> {
        if self.broken {
            bail!("process table unavailable");
        }
        Ok(self.running.iter().any(|n| n == name))
    }

    fn is_alive(&self, pid: u32) -> bool {
        self.live_pids.contains(&pid)
    }
}

/// A context sandboxed in a temp dir, using a [`RecordingExecutor`].
pub fn test_context() -> (Context, tempfile::TempDir) {
    test_context_with(Arc::new(RecordingExecutor::default()))
}

/// A context sandboxed in a temp dir, using `executor`.
pub fn test_context_with(executor: Arc<dyn Executor>) -> (Context, tempfile::TempDir) {
    let tmp = tempfile::tempdir().expect("temp dir");
    let paths = Arc::new(Paths::sandboxed(tmp.path()));
    let ctx = Context::new(
        paths,
        Arc::new(Platform::new(Os::Linux)),
        Arc::new(Logger::default()),
        executor,
    );
    (ctx, tmp)
}
