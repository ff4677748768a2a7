use crate::api::types::{DashboardStats, UserSummary};
use crate::query::{Phase, Query, RefetchOptions, ResourceState};
use crate::triggers::Subscription;
use crate::ui::ensure_valid_selection;
use crate::ui::renderfns::{format_date, format_money, truncate};
use crate::ui::view::{Shortcut, View, ViewAction, ViewContext};
use crate::ui::views::UserDetailView;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph};
use tokio::sync::watch;

/// Root view: headline stats and the most recent sign-ups
pub struct OverviewView {
  ctx: ViewContext,
  stats: Query<DashboardStats>,
  users: Query<Vec<UserSummary>>,
  stats_rx: watch::Receiver<ResourceState<DashboardStats>>,
  users_rx: watch::Receiver<ResourceState<Vec<UserSummary>>>,
  list_state: ListState,
  _triggers: Vec<Subscription>,
}

impl OverviewView {
  pub fn new(ctx: ViewContext) -> Self {
    let stats = ctx.sources.stats();
    let users = ctx.sources.recent_users();
    let stats_rx = stats.subscribe();
    let users_rx = users.subscribe();

    // Start fetching immediately
    stats.spawn_fetch();
    users.spawn_fetch();

    let mut triggers = ctx.triggers(&stats);
    triggers.extend(ctx.triggers(&users));

    Self {
      ctx,
      stats,
      users,
      stats_rx,
      users_rx,
      list_state: ListState::default(),
      _triggers: triggers,
    }
  }

  fn selected_user(&self) -> Option<String> {
    let idx = self.list_state.selected()?;
    let state = self.users_rx.borrow();
    state.data.as_ref()?.get(idx).map(|u| u.id.clone())
  }

  fn render_stats(&self, frame: &mut Frame, area: Rect) {
    let state = self.stats_rx.borrow();
    let block = Block::default()
      .title(title("Stats", &state))
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    let Some(stats) = state.data.as_ref() else {
      let message = match &state.error {
        Some(err) => format!("Failed to load stats: {}", err),
        None => "Loading stats...".to_string(),
      };
      let paragraph = Paragraph::new(message)
        .block(block)
        .style(Style::default().fg(Color::DarkGray));
      frame.render_widget(paragraph, area);
      return;
    };

    let growth_color = if stats.growth < 0.0 {
      Color::Red
    } else {
      Color::Green
    };
    let lines = vec![
      Line::from(vec![
        Span::styled("Users: ", Style::default().fg(Color::DarkGray)),
        Span::raw(stats.total_users.to_string()),
        Span::raw("   "),
        Span::styled("Active: ", Style::default().fg(Color::DarkGray)),
        Span::raw(stats.active_users.to_string()),
        Span::raw("   "),
        Span::styled("Plans: ", Style::default().fg(Color::DarkGray)),
        Span::raw(stats.active_plans.to_string()),
      ]),
      Line::from(vec![
        Span::styled("Revenue: ", Style::default().fg(Color::DarkGray)),
        Span::styled(
          format_money(stats.revenue, ""),
          Style::default().fg(Color::Yellow),
        ),
        Span::raw("   "),
        Span::styled("Growth: ", Style::default().fg(Color::DarkGray)),
        Span::styled(
          format!("{:+.1}%", stats.growth),
          Style::default().fg(growth_color),
        ),
      ]),
      updated_line(&state),
    ];
    frame.render_widget(Paragraph::new(lines).block(block), area);
  }

  fn render_users(&mut self, frame: &mut Frame, area: Rect) {
    let state = self.users_rx.borrow().clone();
    let users = state.data.as_deref().unwrap_or(&[]);
    ensure_valid_selection(&mut self.list_state, users.len());

    let block = Block::default()
      .title(title("Recent users", &state))
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    if users.is_empty() {
      let content = match state.phase() {
        Phase::Loading | Phase::Empty => "Loading users...".to_string(),
        Phase::Error => format!(
          "Failed to load users: {}\n\nPress 'r' to retry.",
          state.error.as_ref().map(|e| e.to_string()).unwrap_or_default()
        ),
        _ => "No users yet.".to_string(),
      };
      let paragraph = Paragraph::new(content)
        .block(block)
        .style(Style::default().fg(Color::DarkGray));
      frame.render_widget(paragraph, area);
      return;
    }

    let items: Vec<ListItem> = users
      .iter()
      .map(|user| {
        let line = Line::from(vec![
          Span::styled(
            format!("{:<24}", truncate(&user.name, 24)),
            Style::default().fg(Color::Cyan),
          ),
          Span::raw(" "),
          Span::raw(format!("{:<32}", truncate(&user.email, 32))),
          Span::raw(" "),
          Span::styled(
            format!("{:<10}", truncate(user.plan.as_deref().unwrap_or("-"), 10)),
            Style::default().fg(Color::Yellow),
          ),
          Span::styled(
            format_date(user.created_at),
            Style::default().fg(Color::DarkGray),
          ),
        ]);
        ListItem::new(line)
      })
      .collect();

    let list = List::new(items)
      .block(block)
      .highlight_style(
        Style::default()
          .bg(Color::DarkGray)
          .add_modifier(Modifier::BOLD),
      )
      .highlight_symbol("> ");

    frame.render_stateful_widget(list, area, &mut self.list_state);
  }
}

/// Panel title with the resource's phase
fn title<T>(name: &str, state: &ResourceState<T>) -> String {
  match state.phase() {
    Phase::Loading => format!(" {} (loading...) ", name),
    Phase::StaleServing => format!(" {} (refreshing...) ", name),
    Phase::Error if state.data.is_some() => format!(" {} (stale: {}) ", name, error_text(state)),
    Phase::Error => format!(" {} (error) ", name),
    _ => format!(" {} ", name),
  }
}

fn error_text<T>(state: &ResourceState<T>) -> String {
  state
    .error
    .as_ref()
    .map(|e| truncate(&e.to_string(), 40))
    .unwrap_or_default()
}

fn updated_line<T>(state: &ResourceState<T>) -> Line<'static> {
  let updated = state
    .updated_at
    .map(|at| format!("updated {}", at.format("%H:%M:%S")))
    .unwrap_or_else(|| "from cache".to_string());
  Line::from(Span::styled(updated, Style::default().fg(Color::DarkGray)))
}

impl View for OverviewView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    match key.code {
      KeyCode::Char('j') | KeyCode::Down => {
        self.list_state.select_next();
      }
      KeyCode::Char('k') | KeyCode::Up => {
        self.list_state.select_previous();
      }
      KeyCode::Char('r') => {
        self.stats.spawn_refresh();
        self.users.spawn_refresh();
      }
      KeyCode::Char('R') => {
        self.stats.spawn_refetch(RefetchOptions::HARD);
        self.users.spawn_refetch(RefetchOptions::HARD);
      }
      KeyCode::Enter => {
        if let Some(id) = self.selected_user() {
          return ViewAction::Push(Box::new(UserDetailView::new(id, self.ctx.clone())));
        }
      }
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Pop,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let chunks = Layout::default()
      .direction(Direction::Vertical)
      .constraints([Constraint::Length(5), Constraint::Min(3)])
      .split(area);

    self.render_stats(frame, chunks[0]);
    self.render_users(frame, chunks[1]);
  }

  fn breadcrumb_label(&self) -> String {
    "Overview".to_string()
  }

  fn shortcuts(&self) -> Vec<Shortcut> {
    vec![
      Shortcut::new("enter", "open").with_priority(5),
      Shortcut::new("r", "refresh").with_priority(10),
      Shortcut::new("R", "hard refresh").with_priority(20),
      Shortcut::new("C", "clear cache").with_priority(25),
      Shortcut::new("q", "quit").with_priority(30),
    ]
  }
}

impl Drop for OverviewView {
  fn drop(&mut self) {
    self.stats.dispose();
    self.users.dispose();
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::error::FetchError;

  #[test]
  fn test_title_reflects_phase() {
    let mut state = ResourceState::<u32> {
      loading: true,
      ..Default::default()
    };
    assert_eq!(title("Stats", &state), " Stats (loading...) ");

    state.loading = false;
    state.data = Some(1);
    state.is_refreshing = true;
    assert_eq!(title("Stats", &state), " Stats (refreshing...) ");

    state.is_refreshing = false;
    state.error = Some(FetchError::Transport("timeout".into()));
    assert_eq!(
      title("Stats", &state),
      " Stats (stale: request failed: timeout) "
    );

    state.data = None;
    assert_eq!(title("Stats", &state), " Stats (error) ");
  }
}
