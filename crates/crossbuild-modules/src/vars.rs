use crossbuild_config::{VariableContext, VariableContextBuilder};
use crossbuild_core::{BuildContext, Target};
use std::path::Path;

/// Interpolation variables for a module running on `target` with output
/// directory `out`. `${version}` is read at run time so it reflects a bump
/// made earlier in the same build.
pub(crate) async fn for_run(ctx: &BuildContext, target: Option<Target>, out: &Path) -> VariableContext {
    let mut builder = VariableContextBuilder::new()
        .with_name(ctx.config.name.clone())
        .with_out(out.to_string_lossy());
    if let Some(target) = target {
        builder = builder.with_target(target);
    }
    if let Some(path) = ctx.config.version_path() {
        if let Ok(version) = tokio::fs::read_to_string(path).await {
            builder = builder.with_version(version.trim());
        }
    }
    let mut vars = builder.build();
    vars.populate_env();
    vars
}
