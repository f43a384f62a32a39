//! Files scaffolded by platform generate hooks.

use kubeprod_core::platform::{GenerateContext, HookError};
use kubeprod_core::scaffold::{self, WriteOutcome};

const OVERRIDES_TEMPLATE: &str = r#"-- Cluster overrides for {platform} ({description}).
--
-- kubeprod creates this file once and never rewrites it. It returns a
-- function that receives the generated manifest and the cluster
-- configuration, and returns the manifest to apply.
local kube = import("internal:///lib/kube.lua")

return function(manifest, config)
  return kube.merge(manifest, {
    -- Example: run three ingress controllers.
    -- nginxIngress = { controller = { spec = { replicas = 3 } } },
  })
end
"#;

/// Scaffold the cluster overrides file.
pub fn write_overrides(ctx: &GenerateContext, description: &str) -> Result<WriteOutcome, HookError> {
  let content = scaffold::render(
    OVERRIDES_TEMPLATE,
    &[("platform", ctx.platform.as_str()), ("description", description)],
  )?;
  Ok(scaffold::write_file(&ctx.overrides_path(), &content, ctx.existing)?)
}
