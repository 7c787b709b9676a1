//! Command-line interface definition.
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Top-level CLI entry point for the theme engine.
#[derive(Parser, Debug)]
#[command(
    name = "ricer",
    about = "Layered theme compositor and module orchestration engine",
    version
)]
pub struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Options shared across all subcommands.
    #[command(flatten)]
    pub global: GlobalOpts,
}

/// Options shared across all subcommands.
#[derive(Parser, Debug, Clone, Default)]
pub struct GlobalOpts {
    /// Override the configuration directory
    #[arg(long, global = true)]
    pub config_dir: Option<PathBuf>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Compose a theme and apply it through every module
    Apply(ApplyOpts),
    /// Re-apply the current theme in another mode
    Mode(ModeOpts),
    /// Re-apply the current theme, switching between dark and light
    Toggle(RunOpts),
    /// Apply a random theme
    Random(RandomOpts),
    /// List themes, modules, styles, palettes, or tags
    List(ListOpts),
    /// Manage themes
    #[command(subcommand)]
    Theme(ThemeCommand),
    /// Manage modules
    #[command(subcommand)]
    Module(ModuleCommand),
    /// Generate a theme from an image
    Gen(GenOpts),
    /// Print version information
    Version,
}

impl Command {
    /// Subcommand name, used to name the log file.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Apply(_) => "apply",
            Self::Mode(_) => "mode",
            Self::Toggle(_) => "toggle",
            Self::Random(_) => "random",
            Self::List(_) => "list",
            Self::Theme(_) => "theme",
            Self::Module(_) => "module",
            Self::Gen(_) => "gen",
            Self::Version => "version",
        }
    }
}

/// Module selection and output options shared by every applying command.
#[derive(Args, Debug, Clone, Default)]
pub struct RunOpts {
    /// Only run these modules
    #[arg(short, long, value_delimiter = ',')]
    pub include: Vec<String>,

    /// Never run these modules
    #[arg(short, long, value_delimiter = ',')]
    pub exclude: Vec<String>,

    /// Global palette replacing the theme's palette
    #[arg(short, long)]
    pub palette: Option<String>,

    /// Extra global styles, merged last
    #[arg(short, long, value_delimiter = ',')]
    pub style: Vec<String>,

    /// Print the composed document before running modules
    #[arg(long)]
    pub print_document: bool,

    /// Write generated files under this directory instead of their targets
    #[arg(long)]
    pub out_dir: Option<PathBuf>,
}

/// Options for the `apply` subcommand.
#[derive(Args, Debug, Clone, Default)]
pub struct ApplyOpts {
    /// Theme to apply (default: the current theme)
    pub theme: Option<String>,

    /// Mode to apply (default: the current mode)
    #[arg(short, long)]
    pub mode: Option<String>,

    /// Module selection and output.
    #[command(flatten)]
    pub run: RunOpts,
}

/// Options for the `mode` subcommand.
#[derive(Args, Debug, Clone)]
pub struct ModeOpts {
    /// Mode to switch to
    pub mode: String,

    /// Module selection and output.
    #[command(flatten)]
    pub run: RunOpts,
}

/// Options for the `random` subcommand.
#[derive(Args, Debug, Clone, Default)]
pub struct RandomOpts {
    /// Only themes whose name contains this
    #[arg(long)]
    pub name_includes: Option<String>,

    /// Only themes with at least one of these tags
    #[arg(long, value_delimiter = ',')]
    pub include_tags: Vec<String>,

    /// Never themes with any of these tags
    #[arg(long, value_delimiter = ',')]
    pub exclude_tags: Vec<String>,

    /// Mode to apply (default: the current mode)
    #[arg(short, long)]
    pub mode: Option<String>,

    /// Module selection and output.
    #[command(flatten)]
    pub run: RunOpts,
}

/// What `list` prints.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListKind {
    /// Themes with their modes and tags
    Themes,
    /// Modules with their status
    Modules,
    /// Global styles
    Styles,
    /// Global palettes
    Palettes,
    /// Tags used by any theme
    Tags,
}

/// Options for the `list` subcommand.
#[derive(Args, Debug, Clone)]
pub struct ListOpts {
    /// What to list
    #[arg(value_enum)]
    pub kind: ListKind,
}

/// `theme` subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum ThemeCommand {
    /// Delete a theme and its files
    Delete {
        /// Theme name
        name: String,
    },
    /// Rename a theme
    Rename {
        /// Theme name
        name: String,
        /// New name, made safe and unique
        new_name: String,
    },
    /// Add tags to themes
    Tag {
        /// Theme names
        #[arg(required = true)]
        themes: Vec<String>,
        /// Tags to add
        #[arg(short, long, value_delimiter = ',', required = true)]
        tags: Vec<String>,
    },
    /// Remove tags from themes (every theme when none is named)
    Untag {
        /// Theme names
        themes: Vec<String>,
        /// Tags to remove
        #[arg(short, long, value_delimiter = ',', required = true)]
        tags: Vec<String>,
    },
    /// Render a theme into <out-dir>/<theme>_<mode>/ without applying it
    Export(ExportOpts),
}

/// Options for `theme export`.
#[derive(Args, Debug, Clone)]
pub struct ExportOpts {
    /// Theme to export
    pub theme: String,

    /// Mode to export (default: the current mode)
    #[arg(short, long)]
    pub mode: Option<String>,

    /// Module selection and output; `--out-dir` defaults to the current
    /// directory.
    #[command(flatten)]
    pub run: RunOpts,
}

/// `module` subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum ModuleCommand {
    /// Enable a module
    Enable {
        /// Module name
        name: String,
    },
    /// Disable a module
    Disable {
        /// Module name
        name: String,
    },
    /// Copy a module folder into the modules directory and run its install actions
    Install {
        /// Path of the module folder
        source: PathBuf,
    },
    /// Run a module's install actions again
    Init {
        /// Module name
        name: String,
    },
    /// Run a module script against the current theme
    Run {
        /// Module name
        name: String,
        /// Script name
        script: String,
        /// Arguments passed to the script
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Delete a module
    Delete {
        /// Module name
        name: String,
    },
    /// Rewrite module manifests, dropping defaulted fields
    Rewrite {
        /// Only modules whose name contains this
        #[arg(long)]
        name_includes: Option<String>,
    },
}

/// Options for the `gen` subcommand.
#[derive(Args, Debug, Clone)]
pub struct GenOpts {
    /// Image to generate palettes from
    pub image: PathBuf,

    /// Theme name (default: the image file name)
    #[arg(short, long)]
    pub name: Option<String>,

    /// Tags for the new theme
    #[arg(short, long, value_delimiter = ',')]
    pub tags: Vec<String>,

    /// Apply the theme once generated
    #[arg(long)]
    pub apply: bool,
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
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_apply_with_theme_and_mode() {
        let cli = Cli::parse_from(["ricer", "apply", "gruvbox", "-m", "light"]);
        let Command::Apply(opts) = cli.command else {
            panic!("expected apply");
        };
        assert_eq!(opts.theme.as_deref(), Some("gruvbox"));
        assert_eq!(opts.mode.as_deref(), Some("light"));
        assert!(opts.run.include.is_empty());
    }

    #[test]
    fn parse_apply_module_lists() {
        let cli = Cli::parse_from([
            "ricer",
            "apply",
            "--include",
            "kitty,waybar",
            "-e",
            "dunst",
            "--style",
            "rounded",
            "--print-document",
        ]);
        let Command::Apply(opts) = cli.command else {
            panic!("expected apply");
        };
        assert_eq!(opts.theme, None);
        assert_eq!(opts.run.include, vec!["kitty", "waybar"]);
        assert_eq!(opts.run.exclude, vec!["dunst"]);
        assert_eq!(opts.run.style, vec!["rounded"]);
        assert!(opts.run.print_document);
    }

    #[test]
    fn parse_mode() {
        let cli = Cli::parse_from(["ricer", "mode", "light", "-p", "nord"]);
        let Command::Mode(opts) = cli.command else {
            panic!("expected mode");
        };
        assert_eq!(opts.mode, "light");
        assert_eq!(opts.run.palette.as_deref(), Some("nord"));
    }

    #[test]
    fn parse_toggle() {
        let cli = Cli::parse_from(["ricer", "toggle", "-e", "waybar"]);
        let Command::Toggle(run) = cli.command else {
            panic!("expected toggle");
        };
        assert_eq!(run.exclude, vec!["waybar"]);
    }

    #[test]
    fn parse_theme_tag_needs_tags() {
        let cli = Cli::parse_from(["ricer", "theme", "tag", "forest", "desert", "-t", "warm,calm"]);
        let Command::Theme(ThemeCommand::Tag { themes, tags }) = cli.command else {
            panic!("expected theme tag");
        };
        assert_eq!(themes, vec!["forest", "desert"]);
        assert_eq!(tags, vec!["warm", "calm"]);
        assert!(Cli::try_parse_from(["ricer", "theme", "tag", "forest"]).is_err());
    }

    #[test]
    fn parse_theme_untag_without_themes() {
        let cli = Cli::parse_from(["ricer", "theme", "untag", "--tags", "old"]);
        let Command::Theme(ThemeCommand::Untag { themes, tags }) = cli.command else {
            panic!("expected theme untag");
        };
        assert!(themes.is_empty());
        assert_eq!(tags, vec!["old"]);
    }

    #[test]
    fn parse_theme_export() {
        let cli = Cli::parse_from([
            "ricer", "theme", "export", "nord", "-m", "light", "--out-dir", "/tmp/x",
        ]);
        let Command::Theme(ThemeCommand::Export(opts)) = cli.command else {
            panic!("expected theme export");
        };
        assert_eq!(opts.theme, "nord");
        assert_eq!(opts.mode.as_deref(), Some("light"));
        assert_eq!(opts.run.out_dir, Some(PathBuf::from("/tmp/x")));
    }

    #[test]
    fn parse_random_filters() {
        let cli = Cli::parse_from([
            "ricer",
            "random",
            "--name-includes",
            "forest",
            "--include-tags",
            "green,calm",
            "--exclude-tags",
            "dark",
        ]);
        let Command::Random(opts) = cli.command else {
            panic!("expected random");
        };
        assert_eq!(opts.name_includes.as_deref(), Some("forest"));
        assert_eq!(opts.include_tags, vec!["green", "calm"]);
        assert_eq!(opts.exclude_tags, vec!["dark"]);
    }

    #[test]
    fn parse_list() {
        let cli = Cli::parse_from(["ricer", "list", "palettes"]);
        assert!(matches!(
            cli.command,
            Command::List(ListOpts {
                kind: ListKind::Palettes
            })
        ));
    }

    #[test]
    fn parse_module_run_keeps_trailing_args() {
        let cli = Cli::parse_from(["ricer", "module", "run", "kitty", "reload", "--now", "x"]);
        let Command::Module(ModuleCommand::Run { name, script, args }) = cli.command else {
            panic!("expected module run");
        };
        assert_eq!(name, "kitty");
        assert_eq!(script, "reload");
        assert_eq!(args, vec!["--now", "x"]);
    }

    #[test]
    fn parse_gen() {
        let cli = Cli::parse_from(["ricer", "gen", "wall.png", "--tags", "warm", "--apply"]);
        let Command::Gen(opts) = cli.command else {
            panic!("expected gen");
        };
        assert_eq!(opts.image, PathBuf::from("wall.png"));
        assert_eq!(opts.tags, vec!["warm"]);
        assert!(opts.apply);
    }

    #[test]
    fn parse_version() {
        let cli = Cli::parse_from(["ricer", "version"]);
        assert!(matches!(cli.command, Command::Version));
    }

    #[test]
    fn parse_verbose() {
        let cli = Cli::parse_from(["ricer", "-v", "version"]);
        assert!(cli.verbose);
    }

    #[test]
    fn parse_config_dir_override() {
        let cli = Cli::parse_from(["ricer", "--config-dir", "/tmp/ricer", "list", "themes"]);
        assert_eq!(cli.global.config_dir, Some(PathBuf::from("/tmp/ricer")));
    }
}
