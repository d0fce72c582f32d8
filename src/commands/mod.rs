//! CLI subcommand handlers.
//!
//! Keeps [`crate::cli`] down to argument definitions and dispatch; each
//! handler owns its output formatting and exit codes.

pub mod completions;
pub mod show;
pub mod token;
pub mod version;

use chrono::TimeDelta;

/// Render a bundle age compactly, e.g. `42s`, `3m 07s`, `5h 12m`, `2d 04h`.
pub(crate) fn format_age(age: TimeDelta) -> String {
  let secs = age.num_seconds();
  if secs < 0 {
    return "in the future".to_string();
  }

  match secs {
    0..60 => format!("{secs}s"),
    60..3_600 => format!("{}m {:02}s", secs / 60, secs % 60),
    3_600..86_400 => format!("{}h {:02}m", secs / 3_600, (secs % 3_600) / 60),
    _ => format!("{}d {:02}h", secs / 86_400, (secs % 86_400) / 3_600),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_format_age() {
    assert_eq!(format_age(TimeDelta::seconds(42)), "42s");
    assert_eq!(format_age(TimeDelta::seconds(187)), "3m 07s");
    assert_eq!(format_age(TimeDelta::minutes(312)), "5h 12m");
    assert_eq!(format_age(TimeDelta::hours(52)), "2d 04h");
    assert_eq!(format_age(TimeDelta::seconds(-5)), "in the future");
  }
}
