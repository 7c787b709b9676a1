//! Modules: named bundles of actions bound to lifecycle events.
mod context;
pub mod registry;
#[cfg(test)]
pub(crate) mod test_helpers;

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::Serialize;

use crate::actions::{Action, ActionContext, ActionKind, ActionResult};
use crate::config::manifest::ModuleManifest;
use crate::document::Mapping;
use crate::error::{ConfigError, ModuleError};
use crate::platform::{Os, Platform};

pub use context::Context;
pub use registry::ModuleRegistry;

/// Key under which the document carries per-module style overrides.
pub const MODULES_STYLES: &str = "modules_styles";

/// Lifecycle events a module can bind actions to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Event {
    /// Once, after the module is installed.
    ModuleInstall,
    /// Stage 1 of a run: sequential, may transform the document.
    BeforeThemeApply,
    /// Stage 2 of a run: concurrent with other modules.
    ThemeApply,
    /// Stage 3 of a run: sequential, after every module applied.
    AfterThemeApply,
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ModuleInstall => write!(f, "module_install"),
            Self::BeforeThemeApply => write!(f, "before_theme_apply"),
            Self::ThemeApply => write!(f, "theme_apply"),
            Self::AfterThemeApply => write!(f, "after_theme_apply"),
        }
    }
}

/// Per-run state of a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ModuleState {
    /// Eligible, not started.
    Pending,
    /// Started, with stages left to run.
    Running,
    /// Every stage finished without error.
    Completed,
    /// Not eligible for this run.
    Skipped,
    /// A stage recorded an error.
    Failed,
}

impl fmt::Display for ModuleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "PENDING"),
            Self::Running => write!(f, "RUNNING"),
            Self::Completed => write!(f, "COMPLETED"),
            Self::Skipped => write!(f, "SKIPPED"),
            Self::Failed => write!(f, "FAILED"),
        }
    }
}

/// State of every module in a run, keyed by module name.
pub type ModuleStates = BTreeMap<String, ModuleState>;

/// A loaded module.
#[derive(Debug, Clone)]
pub struct Module {
    /// Module name (its directory name).
    pub name: String,
    /// Module directory.
    pub dir: PathBuf,
    /// Manifest as written on disk.
    pub manifest: ModuleManifest,
    /// Whether the module takes part in runs: enabled in the manifest and
    /// compatible with this platform.
    pub enabled: bool,
    install: Vec<Action>,
    before_theme_apply: Vec<Action>,
    theme_apply: Vec<Action>,
    after_theme_apply: Vec<Action>,
    scripts: BTreeMap<String, Vec<Action>>,
}

fn bind(module: &str, kinds: &[ActionKind]) -> Vec<Action> {
    kinds
        .iter()
        .map(|kind| Action::new(module, kind.clone()))
        .collect()
}

impl Module {
    /// Build a module named `name` from its manifest.
    #[must_use]
    pub fn new(name: impl Into<String>, dir: PathBuf, manifest: ModuleManifest, os: Os) -> Self {
        let name = name.into();
        let events = &manifest.on_events;
        Self {
            install: bind(&name, &events.module_install),
            before_theme_apply: bind(&name, &events.before_theme_apply),
            theme_apply: bind(&name, &events.theme_apply),
            after_theme_apply: bind(&name, &events.after_theme_apply),
            scripts: manifest
                .scripts
                .iter()
                .map(|(script, kinds)| (script.clone(), bind(&name, kinds)))
                .collect(),
            enabled: manifest.enabled && manifest.os.contains(&os),
            name,
            dir,
            manifest,
        }
    }

    /// Load the module in `dir`, named after the directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the manifest is missing or malformed.
    pub fn load(dir: &Path, platform: &Platform) -> Result<Self, ConfigError> {
        let manifest = ModuleManifest::load(dir)?;
        let name = dir
            .file_name()
            .map_or_else(String::new, |n| n.to_string_lossy().into_owned());
        Ok(Self::new(name, dir.to_path_buf(), manifest, platform.os))
    }

    /// Whether the manifest excludes `os`.
    #[must_use]
    pub fn incompatible_with(&self, os: Os) -> bool {
        !self.manifest.os.contains(&os)
    }

    /// Change the manifest's enabled flag.
    pub fn set_enabled(&mut self, enabled: bool, os: Os) {
        self.manifest.enabled = enabled;
        self.enabled = enabled && !self.incompatible_with(os);
    }

    /// Actions bound to `event`, in manifest order.
    #[must_use]
    pub fn actions(&self, event: Event) -> &[Action] {
        match event {
            Event::ModuleInstall => &self.install,
            Event::BeforeThemeApply => &self.before_theme_apply,
            Event::ThemeApply => &self.theme_apply,
            Event::AfterThemeApply => &self.after_theme_apply,
        }
    }

    /// Whether any apply stage has actions.
    #[must_use]
    pub fn has_apply_actions(&self) -> bool {
        !(self.before_theme_apply.is_empty()
            && self.theme_apply.is_empty()
            && self.after_theme_apply.is_empty())
    }

    /// Whether stage 2 or 3 has actions.
    #[must_use]
    pub fn has_later_stages(&self) -> bool {
        !(self.theme_apply.is_empty() && self.after_theme_apply.is_empty())
    }

    /// Why the module sits out a run filtered by `include` (when not empty)
    /// and `exclude`, or `None` if it takes part.
    #[must_use]
    pub fn skip_reason(&self, include: &[String], exclude: &[String]) -> Option<&'static str> {
        if !include.is_empty() && !include.contains(&self.name) {
            Some("not included")
        } else if exclude.contains(&self.name) {
            Some("excluded")
        } else if !self.enabled {
            Some("disabled")
        } else if !self.has_apply_actions() {
            Some("no apply actions")
        } else {
            None
        }
    }

    /// Names of the module's scripts.
    #[must_use]
    pub fn script_names(&self) -> Vec<&str> {
        self.scripts.keys().map(String::as_str).collect()
    }

    /// Run `actions` in order, stopping after the first one that is not ok,
    /// and replay each action's messages through the context's logger.
    fn run_chain(&self, actions: &[Action], ctx: &ActionContext<'_>) -> ActionResult {
        let mut total = ActionResult::success(&self.name);
        for action in actions {
            ctx.env.log.debug(&format!("{}: running {action}", self.name));
            let res = action.run(ctx);
            res.replay(ctx.env.log.as_ref());
            let ok = res.ok;
            total += res;
            if !ok {
                break;
            }
        }
        total
    }

    /// Run the install actions.
    #[must_use]
    pub fn execute_install(&self, env: &Context) -> ActionResult {
        let doc = Mapping::new();
        self.run_chain(&self.install, &ActionContext::new(env, &doc))
    }

    /// Run stage 1 on `document`.
    ///
    /// An action that returns a mapping replaces the document for the next
    /// action. The returned document keeps every transformation made before
    /// a failure.
    #[must_use]
    pub fn execute_before_theme_apply(
        &self,
        env: &Context,
        mut document: Mapping,
    ) -> (Mapping, ActionResult) {
        let mut total = ActionResult::success(&self.name);
        for action in &self.before_theme_apply {
            env.log.debug(&format!("{}: running {action}", self.name));
            let res = action.run(&ActionContext::new(env, &document));
            res.replay(env.log.as_ref());
            let ok = res.ok;
            if let Some(next) = res.value.clone().and_then(|v| Mapping::try_from(v).ok()) {
                document = next;
            }
            total += res;
            if !ok {
                break;
            }
        }
        (document, total)
    }

    /// Run stage 2 against a private copy of `document` with
    /// `modules_styles.<name>` merged on top.
    #[must_use]
    pub fn execute_theme_apply(
        &self,
        env: &Context,
        document: &Mapping,
        peers: &ModuleStates,
        out_dir: Option<&Path>,
    ) -> ActionResult {
        let start = Instant::now();
        let own = self.module_document(document);
        let ctx = ActionContext {
            out_dir,
            peers: Some(peers),
            ..ActionContext::new(env, &own)
        };
        let mut res = self.run_chain(&self.theme_apply, &ctx);
        res.elapsed = start.elapsed();
        let done = format!("done in {:.2} sec", res.elapsed.as_secs_f64());
        env.log.info(&format!("{}: {done}", self.name));
        res.info(done);
        res
    }

    /// Run stage 3; `peers` reflects every module's state after stage 2.
    #[must_use]
    pub fn execute_after_theme_apply(
        &self,
        env: &Context,
        document: &Mapping,
        peers: &ModuleStates,
    ) -> ActionResult {
        let ctx = ActionContext {
            peers: Some(peers),
            ..ActionContext::new(env, document)
        };
        self.run_chain(&self.after_theme_apply, &ctx)
    }

    /// Run the actions of the script called `script` in order with `args`,
    /// stopping at the first one that is not ok.
    ///
    /// # Errors
    ///
    /// Returns [`ModuleError::UnknownScript`] if the module has no such script.
    pub fn execute_script(
        &self,
        env: &Context,
        script: &str,
        args: &[String],
        document: &Mapping,
    ) -> Result<ActionResult, ModuleError> {
        let actions = self
            .scripts
            .get(script)
            .ok_or_else(|| ModuleError::UnknownScript {
                script: script.to_string(),
                known: self.script_names().join(", "),
            })?;
        let ctx = ActionContext {
            args,
            ..ActionContext::new(env, document)
        };
        Ok(self.run_chain(actions, &ctx))
    }

    /// The document this module applies: `document` with
    /// `modules_styles.<name>` merged on top.
    #[must_use]
    pub fn module_document(&self, document: &Mapping) -> Mapping {
        let overlay = document
            .get(MODULES_STYLES)
            .and_then(|styles| styles.get(&self.name))
            .and_then(|style| Mapping::try_from(style.clone()).ok());
        match overlay {
            Some(style) => document.merged(&style),
            None => document.clone(),
        }
    }
}
