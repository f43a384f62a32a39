//! Implementation of the `kubeprod platforms` command.

use anyhow::Result;
use owo_colors::OwoColorize;

pub fn cmd_platforms() -> Result<()> {
  let registry = kubeprod_platform::registry();
  for platform in registry.iter() {
    println!("{:<20} {}", platform.name().cyan(), platform.description());
  }
  Ok(())
}
