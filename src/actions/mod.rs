//! Module actions: a closed set of steps sharing one `run` entry point.
//!
//! Every variant reports through an [`ActionResult`]; running an action
//! never panics and never returns an error to the caller.
mod callback;
mod file;
mod link;
mod process;
mod result;
mod shell;

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::document::Mapping;
use crate::document::template::{EvalError, render_str};
use crate::modules::{Context, ModuleStates};

pub use callback::{CallbackHost, CallbackRequest, ProcessCallbackHost};
pub use process::{ProcessTable, SystemProcessTable};
pub use result::{ActionResult, Level, Message};

const fn default_true() -> bool {
    true
}

/// What an action does, as written in a module manifest.
///
/// ```toml
/// [[on_events.theme_apply]]
/// action = "file"
/// target = "{{ config_dir }}/kitty/theme.conf"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ActionKind {
    /// Run a command line through the system shell; a trailing `&` detaches it.
    Shell {
        /// Command line, templated.
        command: String,
    },
    /// Render a template from the module's `templates/` into `target`.
    File {
        /// Output path, templated.
        target: String,
        /// Template path relative to `templates/`, templated; defaults to
        /// `<target file name>.j2`.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        template: Option<String>,
    },
    /// Call an entry point of an executable in the module directory with the
    /// document.
    #[serde(alias = "python")]
    Callback {
        /// Executable, relative to the module directory unless absolute.
        file: String,
        /// Entry point name passed to the executable.
        function: String,
    },
    /// Continue only if a program's running state matches.
    IfRunning {
        /// Process name to look for.
        program_name: String,
        /// Expected state.
        #[serde(default = "default_true")]
        should_be_running: bool,
    },
    /// Symlink `destination` to `origin`.
    Link {
        /// Source, relative to the module's `files/` unless absolute.
        origin: String,
        /// Link path, templated.
        destination: String,
    },
}

/// An action bound to the module that owns it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Action {
    /// Owning module name.
    pub module: String,
    /// What the action does.
    pub kind: ActionKind,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ActionKind::Shell { command } => write!(f, "shell \"{command}\""),
            ActionKind::File { target, .. } => write!(f, "file \"{target}\""),
            ActionKind::Callback { file, function } => write!(f, "callback {file}:{function}"),
            ActionKind::IfRunning {
                program_name,
                should_be_running,
            } => {
                let state = if *should_be_running { "running" } else { "not running" };
                write!(f, "if \"{program_name}\" {state}")
            }
            ActionKind::Link {
                origin,
                destination,
            } => write!(f, "link \"{destination}\" -> \"{origin}\""),
        }
    }
}

/// Everything an action can see while it runs.
#[derive(Debug, Clone, Copy)]
pub struct ActionContext<'a> {
    /// Shared services.
    pub env: &'a Context,
    /// Document the action renders against.
    pub document: &'a Mapping,
    /// Redirects `file` outputs to `<out_dir>/<module>/` when set.
    pub out_dir: Option<&'a Path>,
    /// States of every module in the current run, when there is one.
    pub peers: Option<&'a ModuleStates>,
    /// Arguments of an on-demand script.
    pub args: &'a [String],
}

impl<'a> ActionContext<'a> {
    /// Context for actions outside of an apply run (install, scripts).
    #[must_use]
    pub const fn new(env: &'a Context, document: &'a Mapping) -> Self {
        Self {
            env,
            document,
            out_dir: None,
            peers: None,
            args: &[],
        }
    }

    /// Directory of `module`.
    #[must_use]
    pub fn module_dir(&self, module: &str) -> PathBuf {
        self.env.paths.module_dir(module)
    }

    /// The document extended with the path variables of `module`.
    ///
    /// Variables win over document keys of the same name.
    #[must_use]
    pub fn variables(&self, module: &str) -> Mapping {
        let module_dir = self.module_dir(module);
        let path = |p: &Path| Value::String(p.to_string_lossy().into_owned());
        let mut vars = self.document.clone();
        vars.insert("home_dir", path(&self.env.paths.home));
        vars.insert("config_dir", path(&self.env.paths.config_dir));
        vars.insert("module_dir", path(&module_dir));
        vars.insert("templates_dir", path(&module_dir.join("templates")));
        vars.insert("files_dir", path(&module_dir.join("files")));
        if !self.args.is_empty() {
            vars.insert("args", Value::from(self.args.to_vec()));
        }
        vars
    }

    /// Render `text` for `module`, then expand a leading `~`.
    ///
    /// # Errors
    ///
    /// Returns the evaluator's error if an expression cannot be rendered.
    pub fn render(&self, module: &str, text: &str) -> Result<String, EvalError> {
        let rendered = render_str(text, &self.variables(module), self.env.evaluator.as_ref())?;
        Ok(self
            .env
            .paths
            .expand_user(&rendered)
            .to_string_lossy()
            .into_owned())
    }
}

impl Action {
    /// Bind `kind` to `module`.
    #[must_use]
    pub fn new(module: impl Into<String>, kind: ActionKind) -> Self {
        Self {
            module: module.into(),
            kind,
        }
    }

    /// Run the action and time it.
    #[must_use]
    pub fn run(&self, ctx: &ActionContext<'_>) -> ActionResult {
        let start = Instant::now();
        let mut res = match &self.kind {
            ActionKind::Shell { command } => shell::run(&self.module, command, ctx),
            ActionKind::File { target, template } => {
                file::run(&self.module, target, template.as_deref(), ctx)
            }
            ActionKind::Callback { file, function } => {
                callback::run(&self.module, file, function, ctx)
            }
            ActionKind::IfRunning {
                program_name,
                should_be_running,
            } => process::run(&self.module, program_name, *should_be_running, ctx),
            ActionKind::Link {
                origin,
                destination,
            } => link::run(&self.module, origin, destination, ctx),
        };
        res.elapsed = start.elapsed();
        res
    }
}
