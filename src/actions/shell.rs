//! Shell command action.
use super::{ActionContext, ActionResult};

pub(super) fn run(module: &str, command: &str, ctx: &ActionContext<'_>) -> ActionResult {
    let mut res = ActionResult::new(module);
    let cmd = match ctx.render(module, command) {
        Ok(cmd) => cmd,
        Err(e) => {
            res.error(format!("cannot render command \"{command}\": {e}"));
            return res;
        }
    };

    if let Some(background) = cmd.strip_suffix('&').map(str::trim_end) {
        match ctx.env.executor.spawn_detached(background) {
            Ok(()) => {
                res.debug(format!("command \"{background}\" started in background"));
                res.succeed();
            }
            Err(e) => {
                res.error(format!("cannot start \"{background}\": {e:#}"));
            }
        }
        return res;
    }

    match ctx.env.executor.run_shell(&cmd) {
        Ok(output) => {
            let stdout = output.stdout.trim();
            if !stdout.is_empty() {
                res.debug(stdout.to_string());
            }
            let stderr = output.stderr.trim();
            if !output.success || !stderr.is_empty() {
                let code = output
                    .code
                    .map_or_else(String::new, |c| format!(" (exit {c})"));
                res.warning(format!("command \"{cmd}\" returned an error{code}:\n{stderr}"));
            }
            res.debug(format!("executed \"{cmd}\""));
            res.succeed();
        }
        Err(e) => {
            res.error(format!("cannot run \"{cmd}\": {e:#}"));
        }
    }
    res
}
