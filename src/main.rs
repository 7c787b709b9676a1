//! `ricer` command-line entry point.
use anyhow::Result;
use clap::Parser;

use ricer::cli::{self, Command};
use ricer::commands::{self, CommandSetup};

/// Exit status used when the run is interrupted with Ctrl-C.
const INTERRUPTED: i32 = 130;

fn main() -> Result<()> {
    let _ = enable_ansi_support::enable_ansi_support();
    let args = cli::Cli::parse();

    if matches!(args.command, Command::Version) {
        commands::version::run();
        return Ok(());
    }

    let setup = CommandSetup::init(&args.global, args.verbose, args.command.name())?;

    let lock_file = setup.ctx.paths.lock_file();
    let pid = std::process::id();
    if let Err(e) = ctrlc::set_handler(move || {
        ricer::lock::release_if_owned(&lock_file, pid);
        std::process::exit(INTERRUPTED);
    }) {
        setup
            .logger
            .debug(&format!("could not install interrupt handler: {e}"));
    }

    match &args.command {
        Command::Apply(opts) => commands::apply::run(&setup, opts),
        Command::Mode(opts) => commands::apply::run_mode(&setup, opts),
        Command::Toggle(run) => commands::apply::run_toggle(&setup, run),
        Command::Random(opts) => commands::apply::run_random(&setup, opts),
        Command::List(opts) => commands::list::run(&setup, opts.kind),
        Command::Theme(command) => commands::theme::run(&setup, command),
        Command::Module(command) => commands::module::run(&setup, command),
        Command::Gen(opts) => commands::generate::run(&setup, opts),
        Command::Version => Ok(()),
    }
}
