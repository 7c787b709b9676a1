//! Callback action and the host that runs callbacks.
use anyhow::{Context as _, Result, bail};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::{ActionContext, ActionResult};
use crate::document::Mapping;
use crate::exec::Executor;
use crate::modules::ModuleStates;

/// One callback invocation.
#[derive(Debug, Clone, Copy)]
pub struct CallbackRequest<'a> {
    /// Module that owns the callback.
    pub module: &'a str,
    /// Callback file, already resolved against the module directory.
    pub file: &'a Path,
    /// Entry point name.
    pub function: &'a str,
    /// Document passed to the entry point.
    pub document: &'a Mapping,
    /// States of every module in the current run, when there is one.
    pub peers: Option<&'a ModuleStates>,
    /// Arguments of an on-demand script.
    pub args: &'a [String],
}

/// Loads and calls module callbacks.
pub trait CallbackHost: Send + Sync + std::fmt::Debug {
    /// Invoke the entry point and return what it returned.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be loaded, the entry point is
    /// missing, or the callback itself fails.
    fn call(&self, request: &CallbackRequest<'_>) -> Result<Option<Value>>;
}

/// Runs a callback file as an executable: `<file> <function> [args...]`.
///
/// The request is written to stdin as JSON
/// (`{"module", "function", "document", "peers", "args"}`). Anything printed
/// on stdout is parsed as the returned JSON value; empty stdout returns
/// nothing. A non-zero exit is a callback error.
#[derive(Debug)]
pub struct ProcessCallbackHost {
    executor: Arc<dyn Executor>,
}

impl ProcessCallbackHost {
    /// Create a host that runs callbacks through `executor`.
    #[must_use]
    pub const fn new(executor: Arc<dyn Executor>) -> Self {
        Self { executor }
    }
}

impl CallbackHost for ProcessCallbackHost {
    fn call(&self, request: &CallbackRequest<'_>) -> Result<Option<Value>> {
        if !request.file.is_file() {
            bail!("could not load \"{}\"", request.file.display());
        }
        let input = serde_json::json!({
            "module": request.module,
            "function": request.function,
            "document": request.document,
            "peers": request.peers,
            "args": request.args,
        });
        let program = request.file.to_string_lossy();
        let mut args: Vec<&str> = vec![request.function];
        args.extend(request.args.iter().map(String::as_str));
        let out = self
            .executor
            .run_with_input(&program, &args, &input.to_string())?;
        if !out.success {
            bail!(
                "{}:{} exited with {}: {}",
                request.file.display(),
                request.function,
                out.code.map_or_else(|| "a signal".to_string(), |c| c.to_string()),
                out.stderr.trim()
            );
        }
        let stdout = out.stdout.trim();
        if stdout.is_empty() {
            return Ok(None);
        }
        let value = serde_json::from_str(stdout).with_context(|| {
            format!(
                "{}:{} printed invalid JSON",
                request.file.display(),
                request.function
            )
        })?;
        Ok(Some(value))
    }
}

pub(super) fn run(module: &str, file: &str, function: &str, ctx: &ActionContext<'_>) -> ActionResult {
    let mut res = ActionResult::new(module);
    let path = PathBuf::from(file);
    let path = if path.is_absolute() {
        path
    } else {
        ctx.module_dir(module).join(path)
    };
    let name = path
        .file_name()
        .map_or_else(String::new, |n| n.to_string_lossy().into_owned());

    let request = CallbackRequest {
        module,
        file: &path,
        function,
        document: ctx.document,
        peers: ctx.peers,
        args: ctx.args,
    };
    match ctx.env.callbacks.call(&request) {
        Ok(value) => {
            match &value {
                Some(v) => res.debug(format!("{name}:{function} returned:\n{v}")),
                None => res.debug(format!("{name}:{function} returned nothing")),
            };
            res.value = value;
            res.succeed();
        }
        Err(e) => {
            res.error(format!("{name}:{function} failed: {e:#}"));
        }
    }
    res
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::actions::{Action, ActionKind};
    use crate::mapping;
    use crate::modules::test_helpers::{StaticCallbackHost, test_context};

    fn callback(file: &str, function: &str) -> Action {
        Action::new(
            "wal",
            ActionKind::Callback {
                file: file.to_string(),
                function: function.to_string(),
            },
        )
    }

    #[test]
    fn returned_value_flows_back() {
        let (env, _tmp) = test_context();
        let host = Arc::new(StaticCallbackHost::returning(serde_json::json!({"x": 1})));
        let env = env.with_callbacks(Arc::clone(&host) as Arc<dyn CallbackHost>);
        let doc = mapping!({"theme_name": "nord"});
        let res = callback("apply.py", "main").run(&ActionContext::new(&env, &doc));
        assert!(res.ok);
        assert_eq!(res.value, Some(serde_json::json!({"x": 1})));
        let calls = host.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, env.paths.module_dir("wal").join("apply.py"));
        assert_eq!(calls[0].1, "main");
    }

    #[test]
    fn callback_error_fails_action() {
        let (env, _tmp) = test_context();
        let env = env.with_callbacks(Arc::new(StaticCallbackHost::failing("boom")));
        let doc = Mapping::new();
        let res = callback("apply.py", "main").run(&ActionContext::new(&env, &doc));
        assert!(res.failed());
        assert!(res.first_error().unwrap().contains("boom"));
    }

    #[test]
    fn process_host_reports_missing_file() {
        let (env, _tmp) = test_context();
        let doc = Mapping::new();
        let res = callback("absent.sh", "main").run(&ActionContext::new(&env, &doc));
        assert!(res.failed());
        assert!(res.first_error().unwrap().contains("could not load"));
    }

    #[cfg(unix)]
    #[test]
    fn process_host_runs_executable_and_parses_stdout() {
        use std::os::unix::fs::PermissionsExt as _;
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("cb.sh");
        std::fs::write(
            &script,
            "#!/bin/sh\ncat > /dev/null\nprintf '{\"entry\": \"%s\"}' \"$1\"\n",
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let host = ProcessCallbackHost::new(Arc::new(crate::exec::SystemExecutor));
        let doc = mapping!({"a": 1});
        let value = host
            .call(&CallbackRequest {
                module: "m",
                file: &script,
                function: "main",
                document: &doc,
                peers: None,
                args: &[],
            })
            .unwrap();
        assert_eq!(value, Some(serde_json::json!({"entry": "main"})));
    }
}
