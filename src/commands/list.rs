//! Command: list library and module contents.
use anyhow::Result;

use super::CommandSetup;
use crate::cli::ListKind;
use crate::config::Library;

/// Lines printed by `list <kind>` for a loaded library.
#[must_use]
pub fn library_lines(library: &Library, kind: ListKind) -> Vec<String> {
    match kind {
        ListKind::Themes => library
            .themes
            .values()
            .map(|theme| {
                let mut line = format!("{} [{}]", theme.name, theme.mode_names().join(", "));
                if !theme.tags.is_empty() {
                    let tags: Vec<&str> = theme.tags.iter().map(String::as_str).collect();
                    line.push_str(&format!(" ({})", tags.join(", ")));
                }
                line
            })
            .collect(),
        ListKind::Styles => library.styles.keys().cloned().collect(),
        ListKind::Palettes => library.palettes.keys().cloned().collect(),
        ListKind::Tags => library.tags().into_iter().map(str::to_string).collect(),
        ListKind::Modules => Vec::new(),
    }
}

/// Run the `list` command.
///
/// # Errors
///
/// Returns an error if the library cannot be loaded.
pub fn run(setup: &CommandSetup, kind: ListKind) -> Result<()> {
    if kind == ListKind::Modules {
        setup.registry().list(&setup.ctx);
        return Ok(());
    }
    let library = setup.library()?;
    for line in library_lines(&library, kind) {
        setup.ctx.log.info(&line);
    }
    Ok(())
}
