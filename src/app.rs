use crate::api::HttpApi;
use crate::cache::ResourceCache;
use crate::config::Config;
use crate::dashboard::DataSources;
use crate::event::{Event, EventHandler};
use crate::triggers::{FocusSignal, Subscription};
use crate::ui;
use crate::ui::renderfns::CacheStats;
use crate::ui::view::{View, ViewAction, ViewContext};
use crate::ui::views::{OverviewView, UserDetailView};
use color_eyre::Result;
use crossterm::event::{DisableFocusChange, EnableFocusChange, KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{
  disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::prelude::*;
use std::io::stdout;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Main application state
pub struct App {
  /// Navigation stack - root is always at index 0
  view_stack: Vec<Box<dyn View>>,

  /// Shared by every view; focus events are fanned out through it
  focus: FocusSignal,

  cache: ResourceCache,

  /// API host for the header
  host: String,

  /// Periodic sweep of expired cache entries
  _cleanup: Subscription,

  /// Whether to quit
  should_quit: bool,
}

impl App {
  pub fn new(config: Config, user: Option<String>) -> Result<Self> {
    let api = HttpApi::new(&config)?;
    let host = api.host();
    let cache = ResourceCache::new();
    let focus = FocusSignal::new();
    let cleanup = cache.spawn_cleanup(config.cache.cleanup_interval());

    let ctx = ViewContext {
      sources: DataSources::new(Arc::new(api), cache.clone(), &config),
      focus: focus.clone(),
      refresh: config.refresh.clone(),
    };

    let mut view_stack: Vec<Box<dyn View>> = vec![Box::new(OverviewView::new(ctx.clone()))];
    if let Some(id) = user.filter(|id| !id.trim().is_empty()) {
      view_stack.push(Box::new(UserDetailView::new(id, ctx)));
    }

    info!(%host, "starting");
    Ok(Self {
      view_stack,
      focus,
      cache,
      host,
      _cleanup: cleanup,
      should_quit: false,
    })
  }

  pub async fn run(&mut self) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    stdout().execute(EnableFocusChange)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let result = self.event_loop(&mut terminal).await;

    // Cleanup terminal, even when the loop failed
    stdout().execute(DisableFocusChange)?;
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    result
  }

  async fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>) -> Result<()> {
    let mut events = EventHandler::new(Duration::from_millis(250));

    while !self.should_quit {
      terminal.draw(|frame| ui::draw(frame, self))?;

      match events.next().await {
        Some(event) => self.handle_event(event),
        None => break,
      }
    }
    Ok(())
  }

  fn handle_event(&mut self, event: Event) {
    match event {
      Event::Key(key) => self.handle_key(key),
      Event::Tick => {} // Views read their watch channels on draw
      Event::FocusGained => {
        debug!("focus gained");
        self.focus.notify();
      }
    }
  }

  fn handle_key(&mut self, key: KeyEvent) {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
      self.should_quit = true;
      return;
    }
    if key.code == KeyCode::Char('C') {
      // Mounted views refetch on their next refresh or trigger
      info!(entries = self.cache.len(), "clearing cache");
      self.cache.clear();
      return;
    }

    let action = match self.view_stack.last_mut() {
      Some(view) => view.handle_key(key),
      None => ViewAction::Pop,
    };

    match action {
      ViewAction::None => {}
      ViewAction::Push(view) => self.view_stack.push(view),
      ViewAction::Pop => {
        if self.view_stack.len() > 1 {
          // Dropping the view disposes its orchestrators and triggers
          self.view_stack.pop();
        } else {
          self.should_quit = true;
        }
      }
    }
  }

  // Accessors for UI rendering
  pub fn current_view(&self) -> Option<&dyn View> {
    self.view_stack.last().map(|v| v.as_ref())
  }

  pub fn current_view_mut(&mut self) -> Option<&mut Box<dyn View>> {
    self.view_stack.last_mut()
  }

  pub fn host(&self) -> &str {
    &self.host
  }

  pub fn cache_stats(&self) -> CacheStats {
    CacheStats {
      entries: self.cache.len(),
      pending: self.cache.pending_len(),
    }
  }

  pub fn view_breadcrumb(&self) -> Vec<String> {
    self
      .view_stack
      .iter()
      .map(|v| v.breadcrumb_label())
      .collect()
  }
}
