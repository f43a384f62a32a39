//! CLI output formatting utilities.

use owo_colors::OwoColorize;

pub mod symbols {
  pub const SUCCESS: &str = "✓";
  pub const WARNING: &str = "⚠";
  pub const INFO: &str = "•";
  pub const ARROW: &str = "→";
}

pub fn print_success(message: &str) {
  println!("{} {}", symbols::SUCCESS.green(), message.green().bold());
}

pub fn print_step(message: &str) {
  println!("{} {}", symbols::ARROW.cyan(), message);
}

pub fn print_detail(label: &str, value: &str) {
  println!("  {} {:<18} {}", symbols::INFO.cyan(), label, value);
}

pub fn print_warning(message: &str) {
  println!("  {} {}", symbols::WARNING.yellow(), message.yellow());
}
