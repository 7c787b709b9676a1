//! Assembling the theme document from a [`Library`].
//!
//! Layers are applied in this order, later ones winning:
//!
//! 1. the palette (mode palette, or a global palette override)
//! 2. `theme_name`, `wallpaper`, and `mode`
//! 3. the base style
//! 4. the theme style, expanded through `from_global`
//! 5. the mode style, expanded through `from_global`
//! 6. extra global styles, in request order
//!
//! The merged document is then resolved until no `{{ expr }}` leaf is left.
use super::Mapping;
use super::merge::{Layer, expand_global, merge};
use super::resolve::resolve_document;
use super::template::Evaluator;
use crate::config::Library;
use crate::config::palette::{Palette, PaletteRef};
use crate::config::theme::{Mode, Theme};
use crate::error::ComposeError;
use crate::logging::Log;

/// What to compose. Unset fields fall back to the current selection.
#[derive(Debug, Clone, Copy, Default)]
pub struct ComposeRequest<'a> {
    /// Theme name.
    pub theme: Option<&'a str>,
    /// Mode name.
    pub mode: Option<&'a str>,
    /// Global palette replacing the mode's palette.
    pub palette: Option<&'a str>,
    /// Global styles merged last.
    pub styles: &'a [String],
}

/// A composed, fully resolved document.
#[derive(Debug, Clone)]
pub struct Composition {
    /// The document handed to modules.
    pub document: Mapping,
    /// Theme that was composed.
    pub theme: String,
    /// Mode actually used, after any fallback.
    pub mode: String,
}

fn global_palette<'a>(library: &'a Library, name: &str) -> Result<&'a Palette, ComposeError> {
    library
        .palettes
        .get(name)
        .ok_or_else(|| ComposeError::UnknownPalette {
            name: name.to_string(),
            known: library.palettes.keys().cloned().collect(),
        })
}

fn pick_mode<'a>(theme: &'a Theme, wanted: &str, log: &dyn Log) -> Result<&'a Mode, ComposeError> {
    if let Some(mode) = theme.mode(wanted) {
        return Ok(mode);
    }
    let fallback = theme
        .modes
        .first()
        .ok_or_else(|| ComposeError::NoModes(theme.name.clone()))?;
    log.warn(&format!(
        "\"{wanted}\" mode not present in theme, applying \"{}\"",
        fallback.name
    ));
    Ok(fallback)
}

/// Style layers in application order, empty ones left out.
fn style_layers(
    library: &Library,
    theme: &Theme,
    mode: &Mode,
    extra: &[String],
) -> Result<Vec<Layer>, ComposeError> {
    let mut layers = vec![Layer::new("base_style", library.base_style.clone())];
    if !theme.style.is_empty() {
        layers.push(Layer::new(
            "theme",
            expand_global(&theme.style, &library.styles)?,
        ));
    }
    if !mode.style.is_empty() {
        layers.push(Layer::new(
            format!("mode:{}", mode.name),
            expand_global(&mode.style, &library.styles)?,
        ));
    }
    for name in extra {
        let style = library
            .styles
            .get(name)
            .ok_or_else(|| ComposeError::UnknownStyle {
                name: name.clone(),
                known: library.styles.keys().cloned().collect(),
            })?;
        layers.push(Layer::new(format!("style:{name}"), style.clone()));
    }
    Ok(layers)
}

/// Compose and resolve the document for `request`.
///
/// # Errors
///
/// Returns an error if the theme, a referenced style, or a referenced
/// palette is unknown, if no theme is requested or selected, or if
/// references cannot be resolved.
pub fn compose_document(
    library: &Library,
    request: ComposeRequest<'_>,
    evaluator: &dyn Evaluator,
    log: &dyn Log,
) -> Result<Composition, ComposeError> {
    let theme_name = request
        .theme
        .or(library.selection.theme.as_deref())
        .ok_or(ComposeError::NoCurrentTheme)?;
    let theme = library
        .themes
        .get(theme_name)
        .ok_or_else(|| ComposeError::UnknownTheme(theme_name.to_string()))?;
    let mode = pick_mode(
        theme,
        request.mode.unwrap_or(&library.selection.mode),
        log,
    )?;

    let palette = match (request.palette, &mode.palette) {
        (Some(name), _) => global_palette(library, name)?,
        (None, PaletteRef::Link { from_global }) => global_palette(library, from_global)?,
        (None, PaletteRef::Inline(palette)) => palette,
    };

    let mut document = palette.to_mapping();
    document.insert("theme_name", theme.name.as_str());
    document.insert("wallpaper", theme.wallpaper_for(mode).to_value());
    document.insert("mode", mode.name.as_str());

    let layers = style_layers(library, theme, mode, request.styles)?;
    for layer in &layers {
        log.debug(&format!("merging {} ({} keys)", layer.source, layer.mapping.len()));
    }
    let refs: Vec<&Mapping> = layers.iter().map(|l| &l.mapping).collect();
    let merged = merge(&document, &refs);

    let resolution = resolve_document(merged, evaluator)?;
    log.debug(&format!(
        "theme \"{}\" {} resolved in {} passes",
        theme.name, mode.name, resolution.passes
    ));
    Ok(Composition {
        document: resolution.document,
        theme: theme.name.clone(),
        mode: mode.name.clone(),
    })
}

#[cfg(test)]
#[allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::panic
)]
mod tests {
    use super::*;
    use crate::config::paths::Paths;
    use crate::config::theme::THEME_FILE;
    use crate::document::resolve::ResolveError;
    use crate::document::template::PathEvaluator;
    use crate::logging::Logger;
    use serde_json::json;
    use std::fs;

    fn write(path: &std::path::Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    const THEME: &str = r##"
wallpaper = "wall.png"

[style]
from_global = "rounded"
bar = { height = 30 }

[modes.dark.palette.term]
color0 = "#1d2021"
color1 = "#cc241d"

[modes.dark.palette.primary]
bg = "#458588"
fg = "#ebdbb2"

[modes.dark.style.bar]
border = "{{ primary.fg }}"

[modes.light]
palette = { from_global = "paper" }
"##;

    fn library() -> (Library, tempfile::TempDir) {
        let tmp = tempfile::tempdir().unwrap();
        let paths = Paths::sandboxed(tmp.path());
        write(
            &paths.base_style_file(),
            "[bar]\nbg = \"{{ primary.bg }}\"\nheight = 24\n\n[terminal]\nbackground = \"{{ term.color0 }}\"\n",
        );
        write(
            &paths.styles_dir().join("rounded.toml"),
            "[bar]\nradius = 8\n",
        );
        write(&paths.styles_dir().join("loud.toml"), "[bar]\nheight = 48\n");
        write(
            &paths.palettes_dir().join("paper.toml"),
            "[term]\ncolor0 = \"#fbf1c7\"\n\n[primary]\nbg = \"#ffffff\"\nfg = \"#000000\"\n",
        );
        write(&paths.theme_dir("gruvbox").join(THEME_FILE), THEME);
        let library = Library::load(&paths, &Logger::default()).unwrap();
        (library, tmp)
    }

    fn compose(library: &Library, request: ComposeRequest<'_>) -> Result<Composition, ComposeError> {
        compose_document(library, request, &PathEvaluator, &Logger::default())
    }

    #[test]
    fn end_to_end_with_inline_palette() {
        let (library, _tmp) = library();
        let out = compose(
            &library,
            ComposeRequest {
                theme: Some("gruvbox"),
                mode: Some("dark"),
                ..ComposeRequest::default()
            },
        )
        .unwrap();
        let doc = &out.document;

        assert_eq!(out.mode, "dark");
        assert_eq!(doc["theme_name"], json!("gruvbox"));
        assert_eq!(doc["mode"], json!("dark"));
        assert_eq!(doc["wallpaper"]["mode"], json!("fill"));
        assert!(doc["wallpaper"]["path"].as_str().unwrap().ends_with("wall.png"));
        assert_eq!(doc["term"]["color1"], json!("#cc241d"));
        assert_eq!(doc["terminal"]["background"], json!("#1d2021"));
        assert_eq!(doc["bar"]["bg"], json!("#458588"));
        assert_eq!(doc["bar"]["border"], json!("#ebdbb2"));
        assert_eq!(doc["bar"]["radius"], json!(8));
        assert_eq!(doc["bar"]["height"], json!(30));
    }

    #[test]
    fn linked_palette_and_extra_styles() {
        let (library, _tmp) = library();
        let styles = vec!["loud".to_string()];
        let out = compose(
            &library,
            ComposeRequest {
                theme: Some("gruvbox"),
                mode: Some("light"),
                styles: &styles,
                ..ComposeRequest::default()
            },
        )
        .unwrap();
        assert_eq!(out.document["terminal"]["background"], json!("#fbf1c7"));
        assert_eq!(out.document["bar"]["height"], json!(48));
        assert!(out.document.get("term").is_some());
    }

    #[test]
    fn palette_override_replaces_mode_palette() {
        let (library, _tmp) = library();
        let out = compose(
            &library,
            ComposeRequest {
                theme: Some("gruvbox"),
                mode: Some("dark"),
                palette: Some("paper"),
                ..ComposeRequest::default()
            },
        )
        .unwrap();
        assert_eq!(out.document["bar"]["bg"], json!("#ffffff"));
        assert_eq!(out.document["term"].get("color1"), None);
    }

    #[test]
    fn unknown_mode_falls_back_to_first() {
        let (library, _tmp) = library();
        let out = compose(
            &library,
            ComposeRequest {
                theme: Some("gruvbox"),
                mode: Some("sepia"),
                ..ComposeRequest::default()
            },
        )
        .unwrap();
        assert_eq!(out.mode, "dark");
        assert_eq!(out.document["mode"], json!("dark"));
    }

    #[test]
    fn selection_supplies_defaults() {
        let (mut library, _tmp) = library();
        assert!(matches!(
            compose(&library, ComposeRequest::default()),
            Err(ComposeError::NoCurrentTheme)
        ));
        library.selection.theme = Some("gruvbox".to_string());
        library.selection.mode = "light".to_string();
        let out = compose(&library, ComposeRequest::default()).unwrap();
        assert_eq!(out.theme, "gruvbox");
        assert_eq!(out.mode, "light");
    }

    #[test]
    fn unknown_names_are_reported() {
        let (library, _tmp) = library();
        let err = compose(
            &library,
            ComposeRequest {
                theme: Some("nord"),
                ..ComposeRequest::default()
            },
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "theme \"nord\" not found");

        let err = compose(
            &library,
            ComposeRequest {
                theme: Some("gruvbox"),
                palette: Some("neon"),
                ..ComposeRequest::default()
            },
        )
        .unwrap_err();
        assert!(matches!(err, ComposeError::UnknownPalette { ref known, .. } if known == &["paper"]));

        let styles = vec!["flat".to_string()];
        let err = compose(
            &library,
            ComposeRequest {
                theme: Some("gruvbox"),
                styles: &styles,
                ..ComposeRequest::default()
            },
        )
        .unwrap_err();
        assert!(matches!(err, ComposeError::UnknownStyle { ref name, .. } if name == "flat"));
    }

    #[test]
    fn unresolved_reference_is_fatal() {
        let (mut library, _tmp) = library();
        library
            .base_style
            .insert("broken", json!("{{ nowhere.to_be_found }}"));
        let err = compose(
            &library,
            ComposeRequest {
                theme: Some("gruvbox"),
                ..ComposeRequest::default()
            },
        )
        .unwrap_err();
        match err {
            ComposeError::Resolve(ResolveError::Unresolved { unresolved, .. }) => {
                assert_eq!(unresolved.len(), 1);
                assert_eq!(unresolved[0].path, "broken");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
