//! Template file action.
use std::path::{Path, PathBuf};

use super::{ActionContext, ActionResult};
use crate::document::template::render_str;

/// Template used when a file action names none: `<target file name>.j2`.
fn default_template(target: &str) -> String {
    let name = Path::new(target)
        .file_name()
        .map_or_else(String::new, |n| n.to_string_lossy().into_owned());
    format!("{name}.j2")
}

pub(super) fn run(
    module: &str,
    target: &str,
    template: Option<&str>,
    ctx: &ActionContext<'_>,
) -> ActionResult {
    let mut res = ActionResult::new(module);
    let template = template.map_or_else(|| default_template(target), str::to_string);

    let (template_path, target_path) =
        match (ctx.render(module, &template), ctx.render(module, target)) {
            (Ok(t), Ok(o)) => (PathBuf::from(t), PathBuf::from(o)),
            (Err(e), _) | (_, Err(e)) => {
                res.error(format!("cannot render file action paths: {e}"));
                return res;
            }
        };
    let template_path = if template_path.is_absolute() {
        template_path
    } else {
        ctx.module_dir(module).join("templates").join(template_path)
    };
    let target_path = match (ctx.out_dir, target_path.file_name()) {
        (Some(out_dir), Some(name)) => out_dir.join(module).join(name),
        _ => target_path,
    };

    let source = match std::fs::read_to_string(&template_path) {
        Ok(source) => source,
        Err(e) => {
            res.error(format!(
                "cannot read template {}: {e}",
                template_path.display()
            ));
            return res;
        }
    };
    if source.contains("{%") {
        res.warning(format!(
            "template {} contains \"{{%\" blocks, which are copied verbatim",
            template_path.display()
        ));
    }
    let rendered = match render_str(&source, &ctx.variables(module), ctx.env.evaluator.as_ref()) {
        Ok(rendered) => rendered,
        Err(e) => {
            res.error(format!(
                "cannot render template {}: {e}",
                template_path.display()
            ));
            return res;
        }
    };

    if let Err(e) = crate::fs::write_file(&target_path, &rendered) {
        res.error(format!("{e:#}"));
        return res;
    }

    let name = target_path
        .file_name()
        .map_or_else(String::new, |n| n.to_string_lossy().into_owned());
    res.debug(format!("generated \"{name}\""));
    res.succeed();
    res
}
