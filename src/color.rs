//! Terminal styling for command output.
//!
//! Every method takes anything `Display` and returns a plain `String` when
//! colors are off, so handlers never branch on the color setting themselves.

use std::fmt::Display;

use owo_colors::OwoColorize;

use crate::cli::ColorOption;
use crate::credentials::Source;

/// Semantic palette shared by all subcommands.
pub struct ColorScheme {
  enabled: bool,
}

impl ColorScheme {
  /// Resolve `--color`; `auto` colors only when stdout is a terminal.
  pub fn new(color_option: ColorOption) -> Self {
    let enabled = match color_option {
      ColorOption::Always => true,
      ColorOption::Never => false,
      ColorOption::Auto => {
        use std::io::IsTerminal;
        std::io::stdout().is_terminal()
      }
    };

    Self { enabled }
  }

  fn paint<T: Display>(&self, text: T, style: impl FnOnce(&T) -> String) -> String {
    if self.enabled { style(&text) } else { text.to_string() }
  }

  pub fn success<T: Display>(&self, text: T) -> String {
    self.paint(text, |t| t.green().to_string())
  }

  pub fn error<T: Display>(&self, text: T) -> String {
    self.paint(text, |t| t.bright_red().bold().to_string())
  }

  pub fn warning<T: Display>(&self, text: T) -> String {
    self.paint(text, |t| t.yellow().to_string())
  }

  pub fn info<T: Display>(&self, text: T) -> String {
    self.paint(text, |t| t.cyan().to_string())
  }

  /// Labels and headings
  pub fn emphasis<T: Display>(&self, text: T) -> String {
    self.paint(text, |t| t.bright_white().bold().to_string())
  }

  pub fn link<T: Display>(&self, text: T) -> String {
    self.paint(text, |t| t.blue().underline().to_string())
  }

  pub fn path<T: Display>(&self, text: T) -> String {
    self.paint(text, |t| t.magenta().to_string())
  }

  pub fn number<T: Display>(&self, text: T) -> String {
    self.paint(text, |t| t.bright_blue().to_string())
  }

  /// Commands and token previews
  pub fn code<T: Display>(&self, text: T) -> String {
    self.paint(text, |t| t.bright_green().to_string())
  }

  pub fn dimmed<T: Display>(&self, text: T) -> String {
    self.paint(text, |t| t.dimmed().to_string())
  }

  /// Bundle provenance: green for live sources, yellow for fallbacks.
  pub fn provenance(&self, source: Source) -> String {
    if source.is_degraded() {
      self.warning(source)
    } else {
      self.success(source)
    }
  }
}
