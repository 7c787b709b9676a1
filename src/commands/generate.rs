//! Command: generate a theme from an image.
use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{Context as _, Result, bail};

use super::{CommandSetup, finish};
use crate::cli::{GenOpts, RunOpts};
use crate::config::palette::{CommandPaletteGenerator, PaletteGenerator, PaletteRef};
use crate::config::theme::{Mode, Theme, Wallpaper, WallpaperMode, valid_theme_name};
use crate::document::Mapping;
use crate::logging::Log;

/// Build and save a theme from `image`, one mode per generator that
/// succeeds. Returns the saved theme.
///
/// # Errors
///
/// Returns an error if the image is missing, every generator fails, or the
/// theme cannot be written.
pub fn generate_theme(
    themes_dir: &Path,
    image: &Path,
    name: Option<&str>,
    tags: &[String],
    generators: &[&dyn PaletteGenerator],
    log: &dyn Log,
) -> Result<Theme> {
    if !image.is_file() {
        bail!("image not found at \"{}\"", image.display());
    }
    let file_name = image
        .file_name()
        .with_context(|| format!("no file name in \"{}\"", image.display()))?;

    let mut palettes = Vec::new();
    for generator in generators {
        match generator.generate(image) {
            Ok(palette) => palettes.push((generator.name().to_string(), palette)),
            Err(e) => log.error(&format!(
                "error generating palette for \"{}\" mode: {e:#}",
                generator.name()
            )),
        }
    }
    if palettes.is_empty() {
        bail!("no palette could be generated for \"{}\"", image.display());
    }

    let stem = image
        .file_stem()
        .map_or_else(String::new, |s| s.to_string_lossy().into_owned());
    let name = valid_theme_name(name.unwrap_or(&stem), |candidate| {
        themes_dir.join(candidate).exists()
    });
    let dir = themes_dir.join(&name);
    std::fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;
    let wallpaper_path = dir.join(file_name);
    std::fs::copy(image, &wallpaper_path)
        .with_context(|| format!("copying {} into {}", image.display(), dir.display()))?;

    let wallpaper = Wallpaper {
        path: wallpaper_path,
        mode: WallpaperMode::Fill,
    };
    let theme = Theme {
        name,
        dir,
        modes: palettes
            .into_iter()
            .map(|(mode, palette)| Mode {
                name: mode,
                palette: PaletteRef::Inline(palette),
                wallpaper: None,
                style: Mapping::new(),
            })
            .collect(),
        wallpaper,
        style: Mapping::new(),
        tags: tags.iter().cloned().collect::<BTreeSet<_>>(),
    };
    theme.save()?;
    Ok(theme)
}

/// Run the `gen` command.
///
/// # Errors
///
/// Returns an error if no generator is installed, the theme cannot be
/// generated, or applying it fails.
pub fn run(setup: &CommandSetup, opts: &GenOpts) -> Result<()> {
    let ctx = &setup.ctx;
    let dir = ctx.paths.generators_dir();
    let discovered = CommandPaletteGenerator::discover(&dir, &ctx.executor);
    if discovered.is_empty() {
        bail!("no palette generators found in {}", dir.display());
    }
    let generators: Vec<&dyn PaletteGenerator> = discovered
        .iter()
        .map(|g| g as &dyn PaletteGenerator)
        .collect();

    let theme = generate_theme(
        &ctx.paths.themes_dir(),
        &opts.image,
        opts.name.as_deref(),
        &opts.tags,
        &generators,
        ctx.log.as_ref(),
    )?;
    ctx.log.info(&format!("theme \"{}\" generated", theme.name));

    if opts.apply {
        let library = setup.library()?;
        super::apply::apply_theme(
            setup,
            &library,
            Some(&theme.name),
            None,
            &RunOpts::default(),
        )?;
        return finish(&setup.logger);
    }
    Ok(())
}
