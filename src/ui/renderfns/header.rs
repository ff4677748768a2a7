use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

use crate::ui::view::Shortcut;

/// Cache counters shown on the right of the header.
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheStats {
  pub entries: usize,
  pub pending: usize,
}

/// Draw the header bar with logo, API host, shortcuts and cache counters
pub fn draw_header(
  frame: &mut Frame,
  area: Rect,
  host: &str,
  shortcuts: &[Shortcut],
  stats: CacheStats,
) {
  let mut spans = vec![
    Span::styled(" dashq ", Style::default().fg(Color::Cyan).bold()),
    Span::styled("│", Style::default().fg(Color::DarkGray)),
    Span::styled(format!(" {} ", host), Style::default().fg(Color::White)),
    Span::styled("│", Style::default().fg(Color::DarkGray)),
    Span::raw(" "),
  ];

  let mut sorted: Vec<&Shortcut> = shortcuts.iter().collect();
  sorted.sort_by_key(|s| s.priority);
  for shortcut in sorted {
    // Keys and brackets highlighted, descriptions dimmed
    spans.push(Span::styled(
      format!("<{}>", shortcut.key),
      Style::default().fg(Color::Cyan),
    ));
    spans.push(Span::styled(
      format!(" {}   ", shortcut.label),
      Style::default().fg(Color::DarkGray),
    ));
  }

  let left = Line::from(spans);
  let right = Line::from(Span::styled(
    cache_label(stats),
    Style::default().fg(Color::DarkGray),
  ))
  .alignment(Alignment::Right);

  let background = Style::default().bg(Color::Black);
  frame.render_widget(Paragraph::new(left).style(background), area);
  frame.render_widget(Paragraph::new(right).style(background), area);
}

fn cache_label(stats: CacheStats) -> String {
  if stats.pending > 0 {
    format!("cache {} · {} in flight ", stats.entries, stats.pending)
  } else {
    format!("cache {} ", stats.entries)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_cache_label() {
    assert_eq!(
      cache_label(CacheStats {
        entries: 8,
        pending: 0
      }),
      "cache 8 "
    );
    assert_eq!(
      cache_label(CacheStats {
        entries: 8,
        pending: 2
      }),
      "cache 8 · 2 in flight "
    );
  }
}
