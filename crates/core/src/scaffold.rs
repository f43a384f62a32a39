//! Templated files written into the working directory.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use kubeprod_lua::{Location, LocationError};
use thiserror::Error;
use tracing::info;

use crate::platform::GenerateContext;

/// Root manifest evaluated by the install pipeline.
pub const ROOT_MANIFEST_FILE: &str = "kubeprod-manifest.lua";

/// Cluster-specific overrides, owned by the operator once generated.
pub const OVERRIDES_FILE: &str = "kubeprod-overrides.lua";

const ROOT_MANIFEST_TEMPLATE: &str = r#"-- Root manifest for the {platform} platform.
--
-- kubeprod regenerates this file on every run. Cluster-specific changes
-- belong in {overrides_file}.
local config = import({config_path})
local platform = import({platform_manifest})

local manifest = platform(config)
{apply_overrides}
return manifest
"#;

#[derive(Debug, Error)]
pub enum ScaffoldError {
  #[error("unresolved placeholder {{{0}}} in template")]
  Unresolved(String),

  #[error("{} already exists; remove it or edit it in place", .0.display())]
  PathExists(PathBuf),

  #[error("failed to write {}: {source}", path.display())]
  Write {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error(transparent)]
  Location(#[from] LocationError),
}

/// Policy for scaffolded files that are already on disk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExistingFile {
  /// Refuse to continue rather than risk discarding operator edits.
  #[default]
  Fail,
  /// Leave the existing file untouched.
  Keep,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
  Written,
  Kept,
}

/// Substitute `{name}` placeholders from `vars`.
///
/// Braces that do not enclose an identifier are copied through, so Lua table
/// constructors such as `{ a = 1 }` survive. Substituted values are not
/// scanned again.
pub fn render(template: &str, vars: &[(&str, &str)]) -> Result<String, ScaffoldError> {
  let mut out = String::with_capacity(template.len());
  let mut rest = template;

  while let Some(start) = rest.find('{') {
    out.push_str(&rest[..start]);
    let after = &rest[start + 1..];
    let placeholder = after
      .find('}')
      .map(|end| &after[..end])
      .filter(|name| !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'));

    match placeholder {
      Some(name) => {
        let value = vars
          .iter()
          .find(|(key, _)| *key == name)
          .map(|(_, value)| *value)
          .ok_or_else(|| ScaffoldError::Unresolved(name.to_string()))?;
        out.push_str(value);
        rest = &after[name.len() + 1..];
      }
      None => {
        out.push('{');
        rest = after;
      }
    }
  }

  out.push_str(rest);
  Ok(out)
}

/// Write a scaffolded file, honouring `existing` if the path is taken.
pub fn write_file(path: &Path, content: &str, existing: ExistingFile) -> Result<WriteOutcome, ScaffoldError> {
  if path.exists() {
    match existing {
      ExistingFile::Fail => return Err(ScaffoldError::PathExists(path.to_path_buf())),
      ExistingFile::Keep => {
        info!(path = %path.display(), "keeping existing file");
        return Ok(WriteOutcome::Kept);
      }
    }
  }

  write_owned(path, content)?;
  Ok(WriteOutcome::Written)
}

/// Write a file kubeprod owns outright, replacing any previous version.
fn write_owned(path: &Path, content: &str) -> Result<(), ScaffoldError> {
  let write_err = |source| ScaffoldError::Write {
    path: path.to_path_buf(),
    source,
  };
  if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
    fs::create_dir_all(parent).map_err(write_err)?;
  }
  fs::write(path, content).map_err(write_err)?;
  info!(path = %path.display(), "wrote file");
  Ok(())
}

/// Quote a string as a Lua literal.
pub fn lua_string(value: &str) -> String {
  let escaped = value.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n");
  format!("\"{escaped}\"")
}

/// Location of a platform's manifest under the manifest library base.
pub fn platform_manifest(manifests: &str, platform: &str) -> Result<Location, ScaffoldError> {
  Ok(Location::parse(manifests)?.join(&format!("platforms/{platform}.lua"))?)
}

/// (Re)write the root manifest for `ctx`.
///
/// The overrides file is imported only when it exists at the time of writing.
pub fn write_root_manifest(ctx: &GenerateContext) -> Result<PathBuf, ScaffoldError> {
  let path = ctx.root_manifest_path();
  let platform_location = platform_manifest(&ctx.manifests, &ctx.platform)?.to_string();
  let config_path = ctx.config_path.display().to_string();

  let apply_overrides = if ctx.overrides_path().exists() {
    format!(
      "manifest = import({})(manifest, config)\n",
      lua_string(OVERRIDES_FILE)
    )
  } else {
    String::new()
  };

  let config_literal = lua_string(&config_path);
  let platform_literal = lua_string(&platform_location);
  let content = render(
    ROOT_MANIFEST_TEMPLATE,
    &[
      ("platform", ctx.platform.as_str()),
      ("overrides_file", OVERRIDES_FILE),
      ("config_path", config_literal.as_str()),
      ("platform_manifest", platform_literal.as_str()),
      ("apply_overrides", apply_overrides.as_str()),
    ],
  )?;

  write_owned(&path, &content)?;
  Ok(path)
}
