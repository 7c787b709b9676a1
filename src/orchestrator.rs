//! Staged execution of every eligible module against a composed document.
//!
//! A run has three stages separated by full barriers:
//!
//! 1. `before_theme_apply`, one module at a time in registration order. A
//!    module may replace the shared document.
//! 2. `theme_apply`, every participating module on its own OS thread (via
//!    `std::thread::scope`) against the now stable document. Output is
//!    buffered per module and flushed when the module finishes.
//! 3. `after_theme_apply`, one module at a time, seeing every module's state
//!    after stage 2.
//!
//! A module that fails in a stage takes no part in later stages. The run
//! lock is held from before eligibility is computed until the run returns.
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::actions::ActionResult;
use crate::document::Mapping;
use crate::error::{ModuleError, OrchestrateError};
use crate::lock::RunLock;
use crate::logging::{BufferedLog, Log, Logger};
use crate::modules::{Context, Event, Module, ModuleRegistry, ModuleState, ModuleStates};

/// Which modules take part in a run and where files go.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions<'a> {
    /// Only these modules, when not empty.
    pub include: &'a [String],
    /// Never these modules.
    pub exclude: &'a [String],
    /// Write generated files under `<out_dir>/<module>/` instead of their targets.
    pub out_dir: Option<&'a Path>,
}

/// Outcome of a run.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Final state of every registered module.
    pub states: ModuleStates,
    /// The shared document after stage 1.
    pub document: Mapping,
    /// Wall time of the run.
    pub elapsed: Duration,
}

impl RunReport {
    /// Number of modules in `state`.
    #[must_use]
    pub fn count(&self, state: ModuleState) -> usize {
        self.states.values().filter(|s| **s == state).count()
    }
}

fn check_known(registry: &ModuleRegistry, names: &[String]) -> Result<(), OrchestrateError> {
    match names.iter().find(|name| !registry.contains(name)) {
        Some(name) => Err(ModuleError::NotFound(name.clone()).into()),
        None => Ok(()),
    }
}

/// State after a stage: failed on error, still running if a later stage
/// has work for it, else completed.
fn settle(res: &ActionResult, later_work: bool) -> ModuleState {
    if res.failed() {
        ModuleState::Failed
    } else if later_work {
        ModuleState::Running
    } else {
        ModuleState::Completed
    }
}

/// Summary detail for a module that finished a run.
fn outcome_message(res: Option<&ActionResult>) -> Option<String> {
    let res = res?;
    res.first_error()
        .map(str::to_string)
        .or_else(|| Some(format!("{:.2} sec", res.elapsed.as_secs_f64())))
}

/// Run every eligible module through the three stages.
///
/// `logger` backs the per-module buffers of stage 2; `ctx.log` is used for
/// everything else and normally is the same logger.
///
/// # Errors
///
/// Returns an error, before any action runs, if another live process holds
/// the run lock, an `include` or `exclude` name is not a loaded module, or no
/// module is eligible.
pub fn run_modules(
    ctx: &Context,
    logger: &Arc<Logger>,
    registry: &ModuleRegistry,
    document: Mapping,
    options: RunOptions<'_>,
) -> Result<RunReport, OrchestrateError> {
    let start = Instant::now();
    let lock = RunLock::acquire(&ctx.paths.lock_file(), ctx.processes.as_ref())?;
    ctx.log
        .debug(&format!("run lock acquired at {}", lock.path().display()));

    check_known(registry, options.include)?;
    check_known(registry, options.exclude)?;

    let mut states = registry.eligibility(options.include, options.exclude);
    if !states.values().any(|s| *s == ModuleState::Pending) {
        return Err(OrchestrateError::NothingToRun);
    }
    for module in registry.iter() {
        if let Some(reason) = module.skip_reason(options.include, options.exclude) {
            ctx.log.debug(&format!("{}: skipped ({reason})", module.name));
            ctx.log.record_module(&module.name, ModuleState::Skipped, Some(reason));
        }
    }

    let mut results: BTreeMap<String, ActionResult> = BTreeMap::new();
    let mut record = |name: &str, res: ActionResult| match results.entry(name.to_string()) {
        Entry::Occupied(mut total) => *total.get_mut() += res,
        Entry::Vacant(slot) => {
            slot.insert(res);
        }
    };

    // Stage 1
    let mut document = document;
    let stage1: Vec<&Module> = registry
        .iter()
        .filter(|m| states.get(&m.name) == Some(&ModuleState::Pending))
        .collect();
    if stage1.iter().any(|m| !m.actions(Event::BeforeThemeApply).is_empty()) {
        ctx.log.stage(&format!("Running {}", Event::BeforeThemeApply));
    }
    for module in stage1 {
        states.insert(module.name.clone(), ModuleState::Running);
        if module.actions(Event::BeforeThemeApply).is_empty() {
            continue;
        }
        let (next, res) = module.execute_before_theme_apply(ctx, document);
        document = next;
        states.insert(module.name.clone(), settle(&res, module.has_later_stages()));
        record(&module.name, res);
    }

    // Stage 2
    let stage2: Vec<&Module> = registry
        .iter()
        .filter(|m| {
            states.get(&m.name) == Some(&ModuleState::Running)
                && !m.actions(Event::ThemeApply).is_empty()
        })
        .collect();
    if !stage2.is_empty() {
        ctx.log.stage(&format!(
            "Running {} for {} modules",
            Event::ThemeApply,
            stage2.len()
        ));
        let peers = states.clone();
        let outcomes = apply_concurrently(ctx, logger, &stage2, &document, &peers, options.out_dir);
        for (module, res) in stage2.iter().zip(outcomes) {
            let later = !module.actions(Event::AfterThemeApply).is_empty();
            states.insert(module.name.clone(), settle(&res, later));
            record(&module.name, res);
        }
    }

    // Stage 3
    let stage3: Vec<&Module> = registry
        .iter()
        .filter(|m| {
            states.get(&m.name) == Some(&ModuleState::Running)
                && !m.actions(Event::AfterThemeApply).is_empty()
        })
        .collect();
    if !stage3.is_empty() {
        ctx.log.stage(&format!("Running {}", Event::AfterThemeApply));
    }
    for module in stage3 {
        let res = module.execute_after_theme_apply(ctx, &document, &states);
        states.insert(module.name.clone(), settle(&res, false));
        record(&module.name, res);
    }

    for state in states.values_mut() {
        if matches!(state, ModuleState::Running | ModuleState::Pending) {
            *state = ModuleState::Completed;
        }
    }
    for (name, state) in &states {
        if *state != ModuleState::Skipped {
            let message = outcome_message(results.get(name));
            ctx.log.record_module(name, *state, message.as_deref());
        }
    }

    let report = RunReport {
        states,
        document,
        elapsed: start.elapsed(),
    };
    ctx.log.info(&format!(
        "{} modules applied in {:.2} sec: {} completed, {} skipped, {} failed",
        report.states.len(),
        report.elapsed.as_secs_f64(),
        report.count(ModuleState::Completed),
        report.count(ModuleState::Skipped),
        report.count(ModuleState::Failed),
    ));
    drop(lock);
    Ok(report)
}

/// Run stage 2 for `modules`, one scoped thread each, and return their
/// results in the same order.
///
/// Every thread logs into its own [`BufferedLog`], flushed as soon as the
/// module finishes so concurrent output never interleaves.
fn apply_concurrently(
    ctx: &Context,
    logger: &Arc<Logger>,
    modules: &[&Module],
    document: &Mapping,
    peers: &ModuleStates,
    out_dir: Option<&Path>,
) -> Vec<ActionResult> {
    std::thread::scope(|s| {
        let handles: Vec<_> = modules
            .iter()
            .map(|module| {
                let module = *module;
                s.spawn(move || {
                    logger.notify_module_start(&module.name);
                    let buf = Arc::new(BufferedLog::new(Arc::clone(logger), &module.name));
                    let module_ctx = ctx.with_log(buf.clone() as Arc<dyn Log>);
                    let res = module.execute_theme_apply(&module_ctx, document, peers, out_dir);
                    buf.flush_and_complete();
                    res
                })
            })
            .collect();
        handles
            .into_iter()
            .zip(modules)
            .map(|(handle, module)| {
                handle.join().unwrap_or_else(|_| {
                    let mut res = ActionResult::new(&module.name);
                    res.error("panicked while applying");
                    ctx.log
                        .error(&format!("{}: panicked while applying", module.name));
                    res
                })
            })
            .collect()
    })
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::actions::ActionKind;
    use crate::config::manifest::{ModuleManifest, OnEvents};
    use crate::mapping;
    use crate::modules::test_helpers::{
        FakeProcessTable, RecordingExecutor, StaticCallbackHost, shell, test_context_with,
    };
    use crate::platform::Os;
    use serde_json::json;
    use std::fs;

    fn module(ctx: &Context, name: &str, events: OnEvents) -> Module {
        let manifest = ModuleManifest {
            on_events: events,
            ..ModuleManifest::default()
        };
        Module::new(name, ctx.paths.module_dir(name), manifest, Os::Linux)
    }

    fn callback(function: &str) -> ActionKind {
        ActionKind::Callback {
            file: "hooks.sh".to_string(),
            function: function.to_string(),
        }
    }

    fn file_action(target: &str) -> ActionKind {
        ActionKind::File {
            target: target.to_string(),
            template: Some("conf.j2".to_string()),
        }
    }

    fn write_template(ctx: &Context, module: &str, body: &str) {
        let dir = ctx.paths.module_dir(module).join("templates");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("conf.j2"), body).unwrap();
    }

    fn logger() -> Arc<Logger> {
        Arc::new(Logger::default())
    }

    #[test]
    fn stages_run_in_order_with_barriers() {
        let host = Arc::new(StaticCallbackHost::default());
        let (ctx, _tmp) = test_context_with(Arc::new(RecordingExecutor::default()));
        let ctx = ctx.with_callbacks(host.clone());
        let registry = ModuleRegistry::from_modules([
            module(
                &ctx,
                "bar",
                OnEvents {
                    theme_apply: vec![shell("true")],
                    ..OnEvents::default()
                },
            ),
            module(
                &ctx,
                "foo",
                OnEvents {
                    theme_apply: vec![shell("true")],
                    after_theme_apply: vec![callback("after")],
                    ..OnEvents::default()
                },
            ),
        ]);

        let report = run_modules(
            &ctx,
            &logger(),
            &registry,
            mapping!({"theme_name": "t"}),
            RunOptions::default(),
        )
        .unwrap();

        assert_eq!(report.states["bar"], ModuleState::Completed);
        assert_eq!(report.states["foo"], ModuleState::Completed);
        let calls = host.requests();
        assert_eq!(calls.len(), 1);
        let peers = calls[0].peers.clone().unwrap();
        assert_eq!(peers["bar"], ModuleState::Completed);
        assert_eq!(peers["foo"], ModuleState::Running);
    }

    /// Callback host whose calls all wait on one shared barrier.
    #[derive(Debug)]
    struct BarrierHost(std::sync::Barrier);

    impl crate::actions::CallbackHost for BarrierHost {
        fn call(
            &self,
            _request: &crate::actions::CallbackRequest<'_>,
        ) -> anyhow::Result<Option<serde_json::Value>> {
            self.0.wait();
            Ok(None)
        }
    }

    #[test]
    fn stage_two_modules_apply_concurrently() {
        let host = Arc::new(BarrierHost(std::sync::Barrier::new(2)));
        let (ctx, _tmp) = test_context_with(Arc::new(RecordingExecutor::default()));
        let ctx = ctx.with_callbacks(host);
        let registry = ModuleRegistry::from_modules(["left", "right"].map(|name| {
            module(
                &ctx,
                name,
                OnEvents {
                    theme_apply: vec![callback("meet")],
                    ..OnEvents::default()
                },
            )
        }));

        // Each callback blocks until the other one arrives.
        let report = run_modules(
            &ctx,
            &logger(),
            &registry,
            mapping!({"theme_name": "t"}),
            RunOptions::default(),
        )
        .unwrap();

        assert_eq!(report.states["left"], ModuleState::Completed);
        assert_eq!(report.states["right"], ModuleState::Completed);
    }

    #[test]
    fn stage_one_document_reaches_stage_two() {
        let host = Arc::new(StaticCallbackHost::returning(json!({ "accent": "#ff0000" })));
        let (ctx, tmp) = test_context_with(Arc::new(RecordingExecutor::default()));
        let ctx = ctx.with_callbacks(host);
        let out = tmp.path().join("out").join("kitty.conf");
        write_template(&ctx, "kitty", "color={{ accent }}");
        let registry = ModuleRegistry::from_modules([
            module(
                &ctx,
                "alacritty",
                OnEvents {
                    before_theme_apply: vec![callback("tweak")],
                    ..OnEvents::default()
                },
            ),
            module(
                &ctx,
                "kitty",
                OnEvents {
                    theme_apply: vec![file_action(&out.to_string_lossy())],
                    ..OnEvents::default()
                },
            ),
        ]);

        let report = run_modules(
            &ctx,
            &logger(),
            &registry,
            mapping!({"accent": "#000000"}),
            RunOptions::default(),
        )
        .unwrap();

        assert_eq!(report.states["alacritty"], ModuleState::Completed);
        assert_eq!(report.states["kitty"], ModuleState::Completed);
        assert_eq!(report.document["accent"], json!("#ff0000"));
        assert_eq!(fs::read_to_string(&out).unwrap(), "color=#ff0000");
    }

    #[test]
    fn stage_two_failure_is_isolated() {
        let (ctx, tmp) = test_context_with(Arc::new(RecordingExecutor::default()));
        let ok_target = tmp.path().join("good.conf");
        write_template(&ctx, "good", "fine");
        let registry = ModuleRegistry::from_modules([
            module(
                &ctx,
                "bad",
                OnEvents {
                    theme_apply: vec![ActionKind::File {
                        target: tmp.path().join("bad.conf").to_string_lossy().into_owned(),
                        template: Some("missing.j2".to_string()),
                    }],
                    after_theme_apply: vec![shell("echo never")],
                    ..OnEvents::default()
                },
            ),
            module(
                &ctx,
                "good",
                OnEvents {
                    theme_apply: vec![file_action(&ok_target.to_string_lossy())],
                    ..OnEvents::default()
                },
            ),
        ]);

        let report = run_modules(
            &ctx,
            &logger(),
            &registry,
            Mapping::new(),
            RunOptions::default(),
        )
        .unwrap();

        assert_eq!(report.states["bad"], ModuleState::Failed);
        assert_eq!(report.states["good"], ModuleState::Completed);
        assert_eq!(fs::read_to_string(ok_target).unwrap(), "fine");
    }

    #[test]
    fn failed_module_skips_later_stages() {
        let executor = Arc::new(RecordingExecutor::default());
        let host = Arc::new(StaticCallbackHost::failing("boom"));
        let (ctx, _tmp) = test_context_with(executor.clone());
        let ctx = ctx.with_callbacks(host);
        let registry = ModuleRegistry::from_modules([module(
            &ctx,
            "waybar",
            OnEvents {
                before_theme_apply: vec![callback("prepare")],
                theme_apply: vec![shell("echo apply")],
                ..OnEvents::default()
            },
        )]);

        let report = run_modules(
            &ctx,
            &logger(),
            &registry,
            Mapping::new(),
            RunOptions::default(),
        )
        .unwrap();

        assert_eq!(report.states["waybar"], ModuleState::Failed);
        assert!(executor.shell_calls().is_empty());
    }

    #[test]
    fn unmet_condition_is_not_a_failure() {
        let executor = Arc::new(RecordingExecutor::default());
        let (ctx, _tmp) = test_context_with(executor.clone());
        let ctx = ctx.with_processes(Arc::new(FakeProcessTable::running(&[])));
        let registry = ModuleRegistry::from_modules([module(
            &ctx,
            "kitty",
            OnEvents {
                theme_apply: vec![
                    ActionKind::IfRunning {
                        program_name: "kitty".to_string(),
                        should_be_running: true,
                    },
                    shell("pkill -USR1 kitty"),
                ],
                ..OnEvents::default()
            },
        )]);

        let report = run_modules(
            &ctx,
            &logger(),
            &registry,
            Mapping::new(),
            RunOptions::default(),
        )
        .unwrap();

        assert_eq!(report.states["kitty"], ModuleState::Completed);
        assert!(executor.shell_calls().is_empty());
    }

    #[test]
    fn live_lock_holder_blocks_the_run() {
        let executor = Arc::new(RecordingExecutor::default());
        let (ctx, _tmp) = test_context_with(executor.clone());
        let ctx = ctx.with_processes(Arc::new(FakeProcessTable::alive(&[4242])));
        let lock = ctx.paths.lock_file();
        fs::create_dir_all(lock.parent().unwrap()).unwrap();
        fs::write(&lock, "4242").unwrap();
        let registry = ModuleRegistry::from_modules([module(
            &ctx,
            "kitty",
            OnEvents {
                theme_apply: vec![shell("echo hi")],
                ..OnEvents::default()
            },
        )]);

        let err = run_modules(
            &ctx,
            &logger(),
            &registry,
            Mapping::new(),
            RunOptions::default(),
        )
        .unwrap_err();

        assert!(matches!(err, OrchestrateError::Locked(4242)));
        assert!(executor.shell_calls().is_empty());
        assert_eq!(fs::read_to_string(&lock).unwrap(), "4242");
    }

    #[test]
    fn lock_is_released_after_run() {
        let (ctx, _tmp) = test_context_with(Arc::new(RecordingExecutor::default()));
        let registry = ModuleRegistry::from_modules([module(
            &ctx,
            "kitty",
            OnEvents {
                theme_apply: vec![shell("echo hi")],
                ..OnEvents::default()
            },
        )]);
        run_modules(
            &ctx,
            &logger(),
            &registry,
            Mapping::new(),
            RunOptions::default(),
        )
        .unwrap();
        assert!(!ctx.paths.lock_file().exists());
    }

    #[test]
    fn unknown_module_name_is_rejected() {
        let executor = Arc::new(RecordingExecutor::default());
        let (ctx, _tmp) = test_context_with(executor.clone());
        let registry = ModuleRegistry::from_modules([module(
            &ctx,
            "kitty",
            OnEvents {
                theme_apply: vec![shell("echo hi")],
                ..OnEvents::default()
            },
        )]);
        let exclude = vec!["nope".to_string()];

        let err = run_modules(
            &ctx,
            &logger(),
            &registry,
            Mapping::new(),
            RunOptions {
                exclude: &exclude,
                ..RunOptions::default()
            },
        )
        .unwrap_err();

        assert!(matches!(
            err,
            OrchestrateError::UnknownModule(ModuleError::NotFound(ref name)) if name == "nope"
        ));
        assert!(executor.shell_calls().is_empty());
        assert!(!ctx.paths.lock_file().exists());
    }

    #[test]
    fn nothing_eligible_is_an_error() {
        let (ctx, _tmp) = test_context_with(Arc::new(RecordingExecutor::default()));
        let mut idle = module(&ctx, "idle", OnEvents::default());
        idle.set_enabled(true, Os::Linux);
        let mut off = module(
            &ctx,
            "off",
            OnEvents {
                theme_apply: vec![shell("echo hi")],
                ..OnEvents::default()
            },
        );
        off.set_enabled(false, Os::Linux);
        let registry = ModuleRegistry::from_modules([idle, off]);

        let err = run_modules(
            &ctx,
            &logger(),
            &registry,
            Mapping::new(),
            RunOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, OrchestrateError::NothingToRun));
        assert_eq!(err.to_string(), "no modules to run");
    }

    #[test]
    fn include_list_skips_the_rest() {
        let executor = Arc::new(RecordingExecutor::default());
        let (ctx, _tmp) = test_context_with(executor.clone());
        let registry = ModuleRegistry::from_modules([
            module(
                &ctx,
                "kitty",
                OnEvents {
                    theme_apply: vec![shell("echo kitty")],
                    ..OnEvents::default()
                },
            ),
            module(
                &ctx,
                "waybar",
                OnEvents {
                    theme_apply: vec![shell("echo waybar")],
                    ..OnEvents::default()
                },
            ),
        ]);
        let include = vec!["waybar".to_string()];

        let report = run_modules(
            &ctx,
            &logger(),
            &registry,
            Mapping::new(),
            RunOptions {
                include: &include,
                ..RunOptions::default()
            },
        )
        .unwrap();

        assert_eq!(report.states["kitty"], ModuleState::Skipped);
        assert_eq!(report.states["waybar"], ModuleState::Completed);
        assert_eq!(executor.shell_calls(), vec!["echo waybar"]);
    }

    #[test]
    fn out_dir_redirects_generated_files() {
        let (ctx, tmp) = test_context_with(Arc::new(RecordingExecutor::default()));
        write_template(&ctx, "kitty", "x");
        let target = tmp.path().join("real").join("kitty.conf");
        let out_dir = tmp.path().join("out");
        let registry = ModuleRegistry::from_modules([module(
            &ctx,
            "kitty",
            OnEvents {
                theme_apply: vec![file_action(&target.to_string_lossy())],
                ..OnEvents::default()
            },
        )]);

        run_modules(
            &ctx,
            &logger(),
            &registry,
            Mapping::new(),
            RunOptions {
                out_dir: Some(&out_dir),
                ..RunOptions::default()
            },
        )
        .unwrap();

        assert!(!target.exists());
        assert_eq!(
            fs::read_to_string(out_dir.join("kitty").join("kitty.conf")).unwrap(),
            "x"
        );
    }
}
