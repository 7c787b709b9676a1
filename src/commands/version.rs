//! Command: print version information.
use std::io::Write as _;

/// Print the ricer version to stdout.
pub fn run() {
    let version = option_env!("RICER_VERSION").unwrap_or(env!("CARGO_PKG_VERSION"));
    writeln!(std::io::stdout(), "ricer {version}").ok();
}
