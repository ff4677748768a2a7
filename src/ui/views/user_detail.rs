use crate::aggregate::{Aggregate, AggregateState, Slot};
use crate::dashboard::UserDetail;
use crate::error::FetchError;
use crate::query::RefetchOptions;
use crate::triggers::Subscription;
use crate::ui::renderfns::{format_date, format_money, status_color, truncate};
use crate::ui::view::{View, ViewAction, ViewContext};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};
use tokio::sync::watch;

/// Rows shown per list section
const SECTION_ROWS: usize = 5;

/// Everything known about one user, loaded as one aggregate
pub struct UserDetailView {
  id: String,
  detail: Aggregate<UserDetail>,
  rx: watch::Receiver<AggregateState<UserDetail>>,
  _triggers: Vec<Subscription>,
}

impl UserDetailView {
  pub fn new(id: String, ctx: ViewContext) -> Self {
    let detail = ctx.sources.user_detail(&id);
    let rx = detail.subscribe();

    // Start fetching immediately
    detail.spawn_fetch();
    let triggers = ctx.triggers(&detail);

    Self {
      id: detail.subject().to_string(),
      detail,
      rx,
      _triggers: triggers,
    }
  }

  fn render_detail(&self, frame: &mut Frame, area: Rect) {
    let state = self.rx.borrow();

    let title = match (&state.error, state.loading, state.is_refreshing) {
      (Some(err), _, _) => format!(" {} (error: {}) ", self.id, truncate(&err.to_string(), 40)),
      (None, true, _) => format!(" {} (loading...) ", self.id),
      (None, false, true) => format!(" {} (refreshing...) ", self.id),
      _ => format!(" {} ", self.id),
    };

    let block = Block::default()
      .title(title)
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    // Without the profile there is nothing meaningful to show
    let Some(user) = state.view.user.as_ref() else {
      let message = match &state.error {
        Some(err) => format!("Error: {}\n\nPress 'r' to retry.", err),
        None => "Loading user...".to_string(),
      };
      let style = if state.error.is_some() {
        Style::default().fg(Color::Red)
      } else {
        Style::default().fg(Color::DarkGray)
      };
      frame.render_widget(Paragraph::new(message).style(style), inner);
      return;
    };

    let chunks = Layout::default()
      .direction(Direction::Vertical)
      .constraints([
        Constraint::Length(4), // Profile and wallet
        Constraint::Length(1), // Part status
        Constraint::Min(1),    // Sections
      ])
      .split(inner);

    let view = &state.view;
    let wallet = match &view.wallet {
      Some(wallet) => format_money(wallet.balance, &wallet.currency),
      None => "-".to_string(),
    };
    let status = user.status.as_deref().unwrap_or("unknown");
    let profile = vec![
      Line::from(vec![
        Span::styled("Name: ", Style::default().fg(Color::DarkGray)),
        Span::raw(user.name.as_str()),
        Span::raw("  "),
        Span::styled("Email: ", Style::default().fg(Color::DarkGray)),
        Span::raw(user.email.as_str()),
        Span::raw(if user.is_verified { " ✓" } else { "" }),
      ]),
      Line::from(vec![
        Span::styled("Status: ", Style::default().fg(Color::DarkGray)),
        Span::styled(status, Style::default().fg(status_color(status))),
        Span::raw("  "),
        Span::styled("Plan: ", Style::default().fg(Color::DarkGray)),
        Span::raw(user.plan.as_deref().unwrap_or("-")),
        Span::raw("  "),
        Span::styled("Phone: ", Style::default().fg(Color::DarkGray)),
        Span::raw(user.phone.as_deref().unwrap_or("-")),
      ]),
      Line::from(vec![
        Span::styled("Joined: ", Style::default().fg(Color::DarkGray)),
        Span::raw(format_date(user.created_at)),
        Span::raw("  "),
        Span::styled("Last login: ", Style::default().fg(Color::DarkGray)),
        Span::raw(format_date(user.last_login)),
      ]),
      Line::from(vec![
        Span::styled("Wallet: ", Style::default().fg(Color::DarkGray)),
        Span::styled(wallet, Style::default().fg(Color::Yellow)),
        Span::raw("  "),
        Span::styled("Referral code: ", Style::default().fg(Color::DarkGray)),
        Span::raw(view.referrals.referral_code.as_str()),
      ]),
    ];
    frame.render_widget(Paragraph::new(profile), chunks[0]);
    frame.render_widget(Paragraph::new(slot_line(&state)), chunks[1]);

    let columns = Layout::default()
      .direction(Direction::Horizontal)
      .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
      .split(chunks[2]);
    let left = Layout::default()
      .direction(Direction::Vertical)
      .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
      .split(columns[0]);
    let right = Layout::default()
      .direction(Direction::Vertical)
      .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
      .split(columns[1]);

    let notifications = view
      .notifications
      .iter()
      .map(|n| {
        let style = if n.read {
          Style::default().fg(Color::DarkGray)
        } else {
          Style::default()
        };
        Line::styled(truncate(&n.title, 40), style)
      })
      .collect();
    let notifications_title = format!(
      "Notifications ({} unread)",
      view.unread_notifications()
    );
    section(frame, left[0], &notifications_title, notifications);

    let strategies = view
      .strategies
      .iter()
      .map(|s| {
        Line::from(vec![
          Span::raw(format!("{:<20}", truncate(&s.name, 20))),
          Span::styled(
            format!("{:<10}", s.status),
            Style::default().fg(status_color(&s.status)),
          ),
          Span::raw(format!("pnl {:+.2}", s.pnl)),
        ])
      })
      .collect();
    section(frame, right[0], "Strategies", strategies);

    let referrals = view
      .referrals
      .referrals
      .iter()
      .map(|r| Line::raw(format!("{:<20} {}", truncate(&r.name, 20), format_money(r.reward, ""))))
      .collect();
    section(frame, left[1], "Referrals", referrals);

    let activities = view
      .activities
      .iter()
      .map(|a| {
        Line::from(vec![
          Span::styled(
            format!("{} ", format_date(a.created_at)),
            Style::default().fg(Color::DarkGray),
          ),
          Span::raw(truncate(&a.action, 20)),
          Span::styled(
            format!(" {}", truncate(&a.description, 30)),
            Style::default().fg(Color::DarkGray),
          ),
        ])
      })
      .collect();
    section(frame, right[1], "Activity", activities);
  }
}

/// One status marker per part, then the error of the first part still failing
fn slot_line(state: &AggregateState<UserDetail>) -> Line<'static> {
  let mut spans = Vec::new();
  let mut failing = None;
  for (name, slot) in &state.slots {
    if failing.is_none() && matches!(slot, Slot::Failed(_)) {
      failing = state.diagnostic(name);
    }
    let (marker, color) = match slot {
      Slot::Pending => ("…", Color::DarkGray),
      Slot::Refreshing => ("↻", Color::Yellow),
      Slot::Ready => ("●", Color::Green),
      Slot::Failed(FetchError::Decode(_)) => ("?", Color::Red),
      Slot::Failed(_) => ("✗", Color::Red),
    };
    spans.push(Span::styled(
      format!("{} {}  ", marker, name),
      Style::default().fg(color),
    ));
  }

  if let Some(last) = failing {
    spans.push(Span::styled(
      format!(
        "{} {}: {}",
        last.at.format("%H:%M:%S"),
        last.resource,
        truncate(&last.error.to_string(), 40)
      ),
      Style::default().fg(Color::DarkGray),
    ));
  }
  Line::from(spans)
}

fn section(frame: &mut Frame, area: Rect, title: &str, mut lines: Vec<Line<'static>>) {
  let block = Block::default()
    .title(format!(" {} ", title))
    .borders(Borders::TOP)
    .border_style(Style::default().fg(Color::DarkGray));

  if lines.is_empty() {
    lines.push(Line::styled("none", Style::default().fg(Color::DarkGray)));
  }
  lines.truncate(SECTION_ROWS);

  let paragraph = Paragraph::new(lines)
    .block(block)
    .wrap(Wrap { trim: true });
  frame.render_widget(paragraph, area);
}

impl View for UserDetailView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    match key.code {
      KeyCode::Char('r') => {
        self.detail.spawn_refresh();
        ViewAction::None
      }
      KeyCode::Char('R') => {
        self.detail.spawn_refetch(RefetchOptions::HARD);
        ViewAction::None
      }
      KeyCode::Char('q') | KeyCode::Esc => ViewAction::Pop,
      _ => ViewAction::None,
    }
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    self.render_detail(frame, area);
  }

  fn breadcrumb_label(&self) -> String {
    let state = self.rx.borrow();
    match &state.view.user {
      Some(user) if !user.name.is_empty() => user.name.clone(),
      _ => self.id.clone(),
    }
  }
}

impl Drop for UserDetailView {
  fn drop(&mut self) {
    self.detail.dispose();
  }
}
