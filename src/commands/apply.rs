//! Commands that compose a theme and run modules: `apply`, `mode`,
//! `toggle`, `random`.
use anyhow::{Context as _, Result, bail};

use super::{CommandSetup, finish};
use crate::cli::{ApplyOpts, ModeOpts, RandomOpts, RunOpts};
use crate::config::{Library, Selection, ThemeFilter};
use crate::document::compose::{ComposeRequest, compose_document};
use crate::error::ComposeError;
use crate::orchestrator::{RunOptions, RunReport, run_modules};

/// Compose `theme` in `mode` (selection defaults for `None`), run every
/// eligible module, and record the selection.
///
/// The selection is not recorded when files are redirected with
/// `--out-dir`.
///
/// # Errors
///
/// Returns an error if composition fails, the run cannot start, or the
/// selection cannot be saved. Module failures are reported in the summary,
/// not here.
pub fn apply_theme(
    setup: &CommandSetup,
    library: &Library,
    theme: Option<&str>,
    mode: Option<&str>,
    run: &RunOpts,
) -> Result<RunReport> {
    let ctx = &setup.ctx;
    let request = ComposeRequest {
        theme,
        mode,
        palette: run.palette.as_deref(),
        styles: &run.style,
    };
    let composition = compose_document(library, request, ctx.evaluator.as_ref(), ctx.log.as_ref())
        .with_context(|| {
            format!(
                "error generating the document for theme \"{}\"",
                theme.or(library.selection.theme.as_deref()).unwrap_or_default()
            )
        })?;

    ctx.log.stage(&format!(
        "Applying theme \"{}\" {}",
        composition.theme, composition.mode
    ));
    if run.print_document {
        let pretty = serde_json::to_string_pretty(&composition.document)?;
        ctx.log.info(&format!("generated document:\n{pretty}"));
    }

    let registry = setup.registry();
    let report = run_modules(
        ctx,
        &setup.logger,
        &registry,
        composition.document,
        RunOptions {
            include: &run.include,
            exclude: &run.exclude,
            out_dir: run.out_dir.as_deref(),
        },
    )?;

    if run.out_dir.is_none() {
        let selection = Selection {
            theme: Some(composition.theme.clone()),
            mode: composition.mode.clone(),
        };
        selection.save(&ctx.paths)?;
    }
    ctx.log.info(&format!(
        "theme \"{}\" {} applied",
        composition.theme, composition.mode
    ));
    Ok(report)
}

/// Run the `apply` command.
///
/// # Errors
///
/// Returns an error if the theme cannot be applied or any module failed.
pub fn run(setup: &CommandSetup, opts: &ApplyOpts) -> Result<()> {
    let library = setup.library()?;
    apply_theme(
        setup,
        &library,
        opts.theme.as_deref(),
        opts.mode.as_deref(),
        &opts.run,
    )?;
    finish(&setup.logger)
}

/// Run the `mode` command: re-apply the current theme in another mode.
///
/// # Errors
///
/// Returns an error if no theme is selected, the theme cannot be applied,
/// or any module failed.
pub fn run_mode(setup: &CommandSetup, opts: &ModeOpts) -> Result<()> {
    let library = setup.library()?;
    if library.selection.theme.is_none() {
        return Err(ComposeError::NoCurrentTheme.into());
    }
    apply_theme(setup, &library, None, Some(&opts.mode), &opts.run)?;
    finish(&setup.logger)
}

/// The mode `toggle` switches to: `light` from `dark`, `dark` from anything
/// else.
fn toggled(mode: &str) -> &'static str {
    if mode == "dark" { "light" } else { "dark" }
}

/// Run the `toggle` command: re-apply the current theme in the other of
/// `dark` and `light`.
///
/// # Errors
///
/// Returns an error if no theme is selected, the theme cannot be applied,
/// or any module failed.
pub fn run_toggle(setup: &CommandSetup, run: &RunOpts) -> Result<()> {
    let library = setup.library()?;
    if library.selection.theme.is_none() {
        return Err(ComposeError::NoCurrentTheme.into());
    }
    let mode = toggled(&library.selection.mode);
    apply_theme(setup, &library, None, Some(mode), run)?;
    finish(&setup.logger)
}

/// Run the `random` command.
///
/// # Errors
///
/// Returns an error if no theme matches the filters, the theme cannot be
/// applied, or any module failed.
pub fn run_random(setup: &CommandSetup, opts: &RandomOpts) -> Result<()> {
    let library = setup.library()?;
    let filter = ThemeFilter {
        name_includes: opts.name_includes.as_deref(),
        include_tags: &opts.include_tags,
        exclude_tags: &opts.exclude_tags,
    };
    let Some(theme) = library.random_theme(&filter) else {
        bail!("no theme found");
    };
    setup.ctx.log.debug(&format!("picked theme \"{}\"", theme.name));
    let name = theme.name.clone();
    apply_theme(setup, &library, Some(&name), opts.mode.as_deref(), &opts.run)?;
    finish(&setup.logger)
}
