//! Symlink action.
use std::path::PathBuf;

use super::{ActionContext, ActionResult};

pub(super) fn run(
    module: &str,
    origin: &str,
    destination: &str,
    ctx: &ActionContext<'_>,
) -> ActionResult {
    let mut res = ActionResult::new(module);
    let (origin, destination) = match (ctx.render(module, origin), ctx.render(module, destination))
    {
        (Ok(o), Ok(d)) => (PathBuf::from(o), PathBuf::from(d)),
        (Err(e), _) | (_, Err(e)) => {
            res.error(format!("cannot render link paths: {e}"));
            return res;
        }
    };
    let origin = if origin.is_absolute() {
        origin
    } else {
        ctx.module_dir(module).join("files").join(origin)
    };

    if crate::fs::entry_exists(&destination) {
        res.error(format!(
            "cannot link destination \"{}\" to origin \"{}\", destination already exists",
            destination.display(),
            origin.display()
        ));
        return res;
    }

    let linked = crate::fs::ensure_parent_dir(&destination)
        .and_then(|()| crate::fs::create_symlink(&origin, &destination));
    match linked {
        Ok(()) => {
            res.info(format!(
                "\"{}\" linked to \"{}\"",
                destination.display(),
                origin.display()
            ));
            res.succeed();
        }
        Err(e) => {
            res.error(format!("{e:#}"));
        }
    }
    res
}

#[cfg(all(test, unix))]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use crate::actions::{Action, ActionContext, ActionKind};
    use crate::document::Mapping;
    use crate::modules::test_helpers::test_context;
    use std::fs;

    fn link(origin: &str, destination: &str) -> Action {
        Action::new(
            "nvim",
            ActionKind::Link {
                origin: origin.to_string(),
                destination: destination.to_string(),
            },
        )
    }

    #[test]
    fn links_relative_origin_from_files_dir() {
        let (env, _tmp) = test_context();
        let files = env.paths.module_dir("nvim").join("files");
        fs::create_dir_all(&files).unwrap();
        fs::write(files.join("init.lua"), "-- init").unwrap();
        let doc = Mapping::new();

        let res = link("init.lua", "~/.config/nvim/init.lua").run(&ActionContext::new(&env, &doc));
        assert!(res.ok, "{:?}", res.messages);
        let destination = env.paths.home.join(".config/nvim/init.lua");
        assert_eq!(fs::read_link(&destination).unwrap(), files.join("init.lua"));
        assert_eq!(fs::read_to_string(&destination).unwrap(), "-- init");
    }

    #[test]
    fn existing_destination_is_an_error() {
        let (env, _tmp) = test_context();
        let destination = env.paths.home.join("taken");
        fs::create_dir_all(&env.paths.home).unwrap();
        fs::write(&destination, "mine").unwrap();
        let doc = Mapping::new();

        let res = link("/etc/hostname", "~/taken").run(&ActionContext::new(&env, &doc));
        assert!(res.failed());
        assert!(res.first_error().unwrap().contains("already exists"));
        assert_eq!(fs::read_to_string(&destination).unwrap(), "mine");
    }
}
