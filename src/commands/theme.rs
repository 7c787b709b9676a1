//! Command: manage themes (`theme delete|rename|tag|untag|export`).
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result, bail};

use super::{CommandSetup, finish};
use crate::cli::{ExportOpts, RunOpts, ThemeCommand};
use crate::config::Library;
use crate::config::paths::Paths;
use crate::config::theme::{Theme, valid_theme_name};
use crate::error::ComposeError;
use crate::logging::Log;

fn unknown(name: &str) -> anyhow::Error {
    ComposeError::UnknownTheme(name.to_string()).into()
}

/// Refuse to touch a directory that is not a direct child of the themes
/// directory.
fn ensure_theme_dir(paths: &Paths, dir: &Path) -> Result<()> {
    if dir.parent() != Some(paths.themes_dir().as_path()) {
        bail!("\"{}\" is not inside the themes directory", dir.display());
    }
    Ok(())
}

/// Delete theme `name` and its directory. The selection forgets the theme
/// when it was current.
///
/// # Errors
///
/// Returns an error if the theme does not exist or its files cannot be
/// removed.
pub fn delete_theme(paths: &Paths, library: &mut Library, name: &str) -> Result<()> {
    let theme = library.themes.get(name).ok_or_else(|| unknown(name))?;
    ensure_theme_dir(paths, &theme.dir)?;
    std::fs::remove_dir_all(&theme.dir)
        .with_context(|| format!("removing {}", theme.dir.display()))?;
    library.themes.remove(name);

    if library.selection.theme.as_deref() == Some(name) {
        library.selection.theme = None;
        library.selection.save(paths)?;
    }
    Ok(())
}

/// Rename theme `name`, moving its directory. `new_name` goes through
/// [`valid_theme_name`], so the name actually used is returned. The
/// selection follows the theme when it was current.
///
/// # Errors
///
/// Returns an error if the theme does not exist or its directory cannot be
/// moved.
pub fn rename_theme(
    paths: &Paths,
    library: &mut Library,
    name: &str,
    new_name: &str,
) -> Result<String> {
    let theme = library.themes.get(name).ok_or_else(|| unknown(name))?;
    ensure_theme_dir(paths, &theme.dir)?;
    let themes_dir = paths.themes_dir();
    let new_name = valid_theme_name(new_name, |candidate| {
        candidate != name && themes_dir.join(candidate).exists()
    });
    if new_name == name {
        return Ok(new_name);
    }

    let dir = themes_dir.join(&new_name);
    std::fs::rename(&theme.dir, &dir)
        .with_context(|| format!("moving {} to {}", theme.dir.display(), dir.display()))?;
    library.themes.remove(name);
    library.themes.insert(new_name.clone(), Theme::load(&dir)?);

    if library.selection.theme.as_deref() == Some(name) {
        library.selection.theme = Some(new_name.clone());
        library.selection.save(paths)?;
    }
    Ok(new_name)
}

/// Apply `edit` to the tags of every theme in `names`, saving the themes
/// whose tags changed. Unknown themes are logged and skipped.
fn edit_tags(
    library: &mut Library,
    names: &[String],
    log: &dyn Log,
    edit: impl Fn(&mut BTreeSet<String>),
) -> Result<()> {
    for name in names {
        let Some(theme) = library.themes.get_mut(name) else {
            log.error(&format!("theme \"{name}\" not found"));
            continue;
        };
        let before = theme.tags.clone();
        edit(&mut theme.tags);
        if theme.tags != before {
            theme.save()?;
            log.debug(&format!("tags of \"{name}\" saved"));
        }
    }
    Ok(())
}

/// Add `tags` to each theme in `names`.
///
/// # Errors
///
/// Returns an error if a changed theme cannot be saved.
pub fn add_tags(
    library: &mut Library,
    names: &[String],
    tags: &[String],
    log: &dyn Log,
) -> Result<()> {
    edit_tags(library, names, log, |set| set.extend(tags.iter().cloned()))
}

/// Remove `tags` from each theme in `names`, or from every theme when
/// `names` is empty.
///
/// # Errors
///
/// Returns an error if a changed theme cannot be saved.
pub fn remove_tags(
    library: &mut Library,
    names: &[String],
    tags: &[String],
    log: &dyn Log,
) -> Result<()> {
    let names = if names.is_empty() {
        library.themes.keys().cloned().collect()
    } else {
        names.to_vec()
    };
    edit_tags(library, &names, log, |set| set.retain(|t| !tags.contains(t)))
}

/// Render theme `opts.theme` into `<out-dir>/<theme>_<mode>/` and copy the
/// mode's wallpaper next to the generated files. Real targets and the
/// selection are left alone. Returns the export directory.
///
/// # Errors
///
/// Returns an error if the theme does not exist, the export directory
/// already exists, the theme cannot be composed, or the wallpaper cannot be
/// copied.
pub fn export_theme(
    setup: &CommandSetup,
    library: &Library,
    opts: &ExportOpts,
) -> Result<PathBuf> {
    let theme = library
        .themes
        .get(&opts.theme)
        .ok_or_else(|| unknown(&opts.theme))?;
    let mode = opts.mode.as_deref().unwrap_or(&library.selection.mode);
    let out_dir = opts
        .run
        .out_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from("."));
    let export_dir = out_dir.join(format!("{}_{mode}", theme.name));
    if export_dir.exists() {
        bail!("\"{}\" already exists", export_dir.display());
    }

    let run = RunOpts {
        out_dir: Some(export_dir.clone()),
        ..opts.run.clone()
    };
    super::apply::apply_theme(setup, library, Some(&theme.name), Some(mode), &run)?;

    let wallpaper = theme
        .mode(mode)
        .map_or(&theme.wallpaper, |m| theme.wallpaper_for(m));
    if let Some(file_name) = wallpaper.path.file_name() {
        std::fs::create_dir_all(&export_dir)
            .with_context(|| format!("creating {}", export_dir.display()))?;
        std::fs::copy(&wallpaper.path, export_dir.join(file_name)).with_context(|| {
            format!(
                "copying {} into {}",
                wallpaper.path.display(),
                export_dir.display()
            )
        })?;
    }
    Ok(export_dir)
}

/// Run a `theme` subcommand.
///
/// # Errors
///
/// Returns an error if the library cannot be loaded or the subcommand
/// fails.
pub fn run(setup: &CommandSetup, command: &ThemeCommand) -> Result<()> {
    let ctx = &setup.ctx;
    let mut library = setup.library()?;
    match command {
        ThemeCommand::Delete { name } => {
            delete_theme(&ctx.paths, &mut library, name)?;
            ctx.log.info(&format!("theme \"{name}\" deleted"));
        }
        ThemeCommand::Rename { name, new_name } => {
            let new_name = rename_theme(&ctx.paths, &mut library, name, new_name)?;
            ctx.log.info(&format!("theme \"{name}\" renamed to \"{new_name}\""));
        }
        ThemeCommand::Tag { themes, tags } => {
            add_tags(&mut library, themes, tags, ctx.log.as_ref())?;
        }
        ThemeCommand::Untag { themes, tags } => {
            remove_tags(&mut library, themes, tags, ctx.log.as_ref())?;
        }
        ThemeCommand::Export(opts) => {
            let dir = export_theme(setup, &library, opts)?;
            ctx.log.info(&format!(
                "theme \"{}\" exported to {}",
                opts.theme,
                dir.display()
            ));
            return finish(&setup.logger);
        }
    }
    Ok(())
}
