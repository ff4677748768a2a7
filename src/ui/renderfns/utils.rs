use chrono::{DateTime, Utc};
use ratatui::prelude::Color;

/// Truncate a string to a maximum number of characters, adding "..." if truncated
pub fn truncate(s: &str, max_len: usize) -> String {
  if s.chars().count() <= max_len {
    s.to_string()
  } else {
    let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
    format!("{}...", kept)
  }
}

/// Get the display color for a user or strategy status
pub fn status_color(status: &str) -> Color {
  match status.to_ascii_lowercase().as_str() {
    "active" | "verified" | "running" => Color::Green,
    "pending" | "paused" | "inactive" => Color::Yellow,
    "suspended" | "banned" | "stopped" | "failed" => Color::Red,
    _ => Color::White,
  }
}

/// Two decimals plus an optional currency code
pub fn format_money(amount: f64, currency: &str) -> String {
  if currency.is_empty() {
    format!("{:.2}", amount)
  } else {
    format!("{:.2} {}", amount, currency)
  }
}

pub fn format_date(date: Option<DateTime<Utc>>) -> String {
  date
    .map(|d| d.format("%Y-%m-%d %H:%M").to_string())
    .unwrap_or_else(|| "-".to_string())
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::TimeZone;

  #[test]
  fn test_truncate_short_string() {
    assert_eq!(truncate("hello", 10), "hello");
  }

  #[test]
  fn test_truncate_exact_length() {
    assert_eq!(truncate("hello", 5), "hello");
  }

  #[test]
  fn test_truncate_long_string() {
    assert_eq!(truncate("hello world", 8), "hello...");
  }

  #[test]
  fn test_truncate_multibyte() {
    assert_eq!(truncate("héllo wörld", 8), "héllo...");
  }

  #[test]
  fn test_status_color() {
    assert_eq!(status_color("Active"), Color::Green);
    assert_eq!(status_color("paused"), Color::Yellow);
    assert_eq!(status_color("suspended"), Color::Red);
    assert_eq!(status_color("unknown"), Color::White);
  }

  #[test]
  fn test_format_money() {
    assert_eq!(format_money(12.5, "USDT"), "12.50 USDT");
    assert_eq!(format_money(-3.0, ""), "-3.00");
  }

  #[test]
  fn test_format_date() {
    let date = Utc.with_ymd_and_hms(2024, 3, 1, 10, 5, 0).unwrap();
    assert_eq!(format_date(Some(date)), "2024-03-01 10:05");
    assert_eq!(format_date(None), "-");
  }
}
