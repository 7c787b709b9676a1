//! Command: module management (`module enable|disable|install|init|run|delete|rewrite`).
use anyhow::{Result, bail};

use super::CommandSetup;
use crate::cli::ModuleCommand;
use crate::document::Mapping;
use crate::document::compose::{ComposeRequest, compose_document};

/// The document a script runs against: the current theme composed in the
/// current mode, or an empty document when no theme is selected.
fn current_document(setup: &CommandSetup) -> Result<Mapping> {
    let library = setup.library()?;
    if library.selection.theme.is_none() {
        setup
            .ctx
            .log
            .debug("no current theme, running script with an empty document");
        return Ok(Mapping::new());
    }
    let composition = compose_document(
        &library,
        ComposeRequest::default(),
        setup.ctx.evaluator.as_ref(),
        setup.ctx.log.as_ref(),
    )?;
    Ok(composition.document)
}

/// Run a `module` subcommand.
///
/// # Errors
///
/// Returns an error if the module is unknown, a manifest cannot be written,
/// installation fails, or a script fails.
pub fn run(setup: &CommandSetup, command: &ModuleCommand) -> Result<()> {
    let ctx = &setup.ctx;
    let mut registry = setup.registry();
    match command {
        ModuleCommand::Enable { name } => registry.set_enabled(ctx, name, true)?,
        ModuleCommand::Disable { name } => registry.set_enabled(ctx, name, false)?,
        ModuleCommand::Install { source } => {
            let name = registry.install(ctx, source)?;
            ctx.log.info(&format!("module \"{name}\" installed"));
        }
        ModuleCommand::Init { name } => {
            registry.init(ctx, name)?;
            ctx.log.info(&format!("module \"{name}\" initialized"));
        }
        ModuleCommand::Run { name, script, args } => {
            registry.get(name)?;
            let document = current_document(setup)?;
            let res = registry.run_script(ctx, name, script, args, &document)?;
            if res.failed() {
                bail!("script \"{script}\" of module \"{name}\" failed");
            }
        }
        ModuleCommand::Delete { name } => registry.delete(ctx, name)?,
        ModuleCommand::Rewrite { name_includes } => {
            let count = registry.rewrite(ctx, name_includes.as_deref())?;
            ctx.log.info(&format!("{count} modules rewritten"));
        }
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::config::Selection;
    use crate::config::manifest::ModuleManifest;
    use crate::config::paths::Paths;
    use crate::config::theme::THEME_FILE;
    use crate::logging::Logger;
    use crate::modules::test_helpers::RecordingExecutor;
    use crate::platform::{Os, Platform};
    use std::fs;
    use std::sync::Arc;

    fn write(path: &std::path::Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    const KITTY: &str = r#"
[[on_events.module_install]]
action = "shell"
command = "echo installing"

[[on_events.theme_apply]]
action = "shell"
command = "echo applying"

[[scripts.reload]]
action = "shell"
command = "reload {{ args.0 }} {{ theme_name }}"
"#;

    fn setup() -> (CommandSetup, Arc<RecordingExecutor>, tempfile::TempDir) {
        let tmp = tempfile::tempdir().unwrap();
        let paths = Paths::sandboxed(tmp.path());
        write(&paths.module_dir("kitty").join("module.toml"), KITTY);
        write(
            &paths.theme_dir("forest").join(THEME_FILE),
            "wallpaper = \"w.png\"\n\n[modes.dark]\n",
        );
        let executor = Arc::new(RecordingExecutor::default());
        let setup = CommandSetup::with(
            paths,
            Platform::new(Os::Linux),
            Arc::new(Logger::default()),
            executor.clone(),
        );
        (setup, executor, tmp)
    }

    #[test]
    fn disable_persists_to_manifest() {
        let (setup, _executor, _tmp) = setup();
        let dir = setup.ctx.paths.module_dir("kitty");
        run(
            &setup,
            &ModuleCommand::Disable {
                name: "kitty".to_string(),
            },
        )
        .unwrap();
        assert!(!ModuleManifest::load(&dir).unwrap().enabled);
        assert!(!setup.registry().get("kitty").unwrap().enabled);

        run(
            &setup,
            &ModuleCommand::Enable {
                name: "kitty".to_string(),
            },
        )
        .unwrap();
        assert!(ModuleManifest::load(&dir).unwrap().enabled);
    }

    #[test]
    fn script_runs_against_current_theme() {
        let (setup, executor, _tmp) = setup();
        Selection {
            theme: Some("forest".to_string()),
            mode: "dark".to_string(),
        }
        .save(&setup.ctx.paths)
        .unwrap();

        run(
            &setup,
            &ModuleCommand::Run {
                name: "kitty".to_string(),
                script: "reload".to_string(),
                args: vec!["now".to_string()],
            },
        )
        .unwrap();

        assert_eq!(executor.shell_calls(), vec!["reload now forest"]);
    }

    #[test]
    fn unknown_script_lists_known_ones() {
        let (setup, _executor, _tmp) = setup();
        let err = run(
            &setup,
            &ModuleCommand::Run {
                name: "kitty".to_string(),
                script: "restart".to_string(),
                args: Vec::new(),
            },
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "script \"restart\" not found in [reload]");
    }

    #[test]
    fn install_copies_and_runs_install_actions() {
        let (setup, executor, tmp) = setup();
        let source = tmp.path().join("downloads").join("waybar");
        write(
            &source.join("module.toml"),
            "[[on_events.module_install]]\naction = \"shell\"\ncommand = \"echo waybar\"\n",
        );
        write(&source.join("templates").join("style.css.j2"), "x");

        run(&setup, &ModuleCommand::Install { source }).unwrap();

        let dest = setup.ctx.paths.module_dir("waybar");
        assert!(dest.join("templates").join("style.css.j2").is_file());
        assert_eq!(executor.shell_calls(), vec!["echo waybar"]);
    }

    #[test]
    fn delete_removes_module_directory() {
        let (setup, _executor, _tmp) = setup();
        run(
            &setup,
            &ModuleCommand::Delete {
                name: "kitty".to_string(),
            },
        )
        .unwrap();
        assert!(!setup.ctx.paths.module_dir("kitty").exists());
        assert!(setup.registry().is_empty());
    }

    #[test]
    fn unknown_module_is_an_error() {
        let (setup, _executor, _tmp) = setup();
        let err = run(
            &setup,
            &ModuleCommand::Init {
                name: "dunst".to_string(),
            },
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "module \"dunst\" not found");
    }
}
