//! Manifest evaluation.
//!
//! Every imported Lua file runs in its own environment table that falls back
//! to the shared globals, with `__file` bound to the file's location. The
//! location of the file currently executing is tracked in the Lua registry so
//! nested imports resolve relative to the file that issued them.
//!
//! Globals available to manifests:
//! - `import(path)`: evaluate a `.lua` file, or parse a `.json`/`.yaml` file
//! - `kp.import`: alias of `import`
//! - `kp.import_str(path)`: raw file contents as a string
//! - `kp.ext_var(name)`: an external variable supplied by the caller
//! - `kp.version`: the kubeprod version

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use mlua::prelude::*;
use mlua::SerializeOptions;
use tracing::debug;

use crate::error::EvalError;
use crate::importer::{Contents, Importer};
use crate::location::Location;

/// External variables made available through `kp.ext_var`.
pub type ExtVars = BTreeMap<String, String>;

/// Registry key holding the location of the file currently executing.
const CURRENT_LOCATION_KEY: &str = "__kubeprod_current_location";

/// Evaluate the manifest at `root` and return its result as JSON text.
///
/// The result must be plain data: tables, strings, numbers, booleans and nil.
pub fn evaluate(root: &Location, importer: Arc<dyn Importer>, ext_vars: &ExtVars) -> Result<String, EvalError> {
  let contents = importer.import(&root.dir(), &root.to_string())?;
  let location = contents.found_here.to_string();
  debug!(location = %location, "evaluating manifest");

  let lua = Lua::new();
  let lua_error = |e: LuaError| EvalError::Lua {
    location: location.clone(),
    message: e.to_string(),
  };

  register_globals(&lua, importer, ext_vars).map_err(lua_error)?;
  let result = load_contents(&lua, &contents).map_err(lua_error)?;

  let value: serde_json::Value = lua.from_value(result).map_err(|e| EvalError::NotData {
    location: location.clone(),
    message: e.to_string(),
  })?;

  serde_json::to_string(&value).map_err(EvalError::Encode)
}

fn register_globals(lua: &Lua, importer: Arc<dyn Importer>, ext_vars: &ExtVars) -> LuaResult<()> {
  let globals = lua.globals();

  let import = {
    let importer = Arc::clone(&importer);
    lua.create_function(move |lua, path: String| {
      let contents = resolve(lua, importer.as_ref(), &path)?;
      load_contents(lua, &contents)
    })?
  };
  globals.set("import", import.clone())?;

  let kp = lua.create_table()?;
  kp.set("import", import)?;

  kp.set(
    "import_str",
    lua.create_function(move |lua, path: String| {
      let contents = resolve(lua, importer.as_ref(), &path)?;
      Ok(contents.content)
    })?,
  )?;

  let vars = ext_vars.clone();
  kp.set(
    "ext_var",
    lua.create_function(move |_, name: String| {
      vars
        .get(&name)
        .cloned()
        .ok_or_else(|| LuaError::external(format!("undefined external variable: {name}")))
    })?,
  )?;

  kp.set("version", env!("CARGO_PKG_VERSION"))?;
  globals.set("kp", kp)?;

  Ok(())
}

/// Resolve an import issued by the file currently executing.
fn resolve(lua: &Lua, importer: &dyn Importer, path: &str) -> LuaResult<Contents> {
  let current: Option<String> = lua.named_registry_value(CURRENT_LOCATION_KEY)?;
  let dir = match current {
    Some(current) => Location::parse(&current).map_err(LuaError::external)?.dir(),
    None => Location::File(PathBuf::new()),
  };
  importer.import(&dir, path).map_err(LuaError::external)
}

/// Turn fetched contents into a Lua value according to the file type.
fn load_contents(lua: &Lua, contents: &Contents) -> LuaResult<LuaValue> {
  let location = contents.found_here.to_string();

  match contents.found_here.extension() {
    Some("json") => {
      let value: serde_json::Value = serde_json::from_str(&contents.content)
        .map_err(|e| LuaError::external(format!("{location}: invalid JSON: {e}")))?;
      data_to_lua(lua, &value)
    }
    Some("yaml") | Some("yml") => {
      let value: serde_json::Value = serde_yaml::from_str(&contents.content)
        .map_err(|e| LuaError::external(format!("{location}: invalid YAML: {e}")))?;
      data_to_lua(lua, &value)
    }
    _ => run_chunk(lua, &location, &contents.content),
  }
}

fn data_to_lua(lua: &Lua, value: &serde_json::Value) -> LuaResult<LuaValue> {
  // JSON null becomes nil so manifests can test optional settings directly
  let options = SerializeOptions::new()
    .serialize_none_to_null(false)
    .serialize_unit_to_null(false);
  lua.to_value_with(value, options)
}

fn run_chunk(lua: &Lua, location: &str, source: &str) -> LuaResult<LuaValue> {
  let env = lua.create_table()?;
  env.set("__file", location)?;
  let meta = lua.create_table()?;
  meta.set("__index", lua.globals())?;
  env.set_metatable(Some(meta))?;

  let previous: Option<String> = lua.named_registry_value(CURRENT_LOCATION_KEY)?;
  lua.set_named_registry_value(CURRENT_LOCATION_KEY, location)?;

  let result = lua
    .load(source)
    .set_name(format!("@{location}"))
    .set_environment(env)
    .eval::<LuaValue>();

  lua.set_named_registry_value(CURRENT_LOCATION_KEY, previous)?;
  result
}
