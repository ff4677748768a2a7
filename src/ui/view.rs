use crossterm::event::KeyEvent;
use ratatui::prelude::*;

use crate::config::RefreshConfig;
use crate::dashboard::DataSources;
use crate::triggers::{self, FocusSignal, Refreshable, Subscription};

/// A keyboard shortcut hint for display in the header
#[derive(Debug, Clone)]
pub struct Shortcut {
  pub key: &'static str,
  pub label: &'static str,
  pub priority: u8, // Lower = shown first
}

impl Shortcut {
  pub const fn new(key: &'static str, label: &'static str) -> Self {
    Self {
      key,
      label,
      priority: 100,
    }
  }

  pub const fn with_priority(mut self, priority: u8) -> Self {
    self.priority = priority;
    self
  }
}

/// Actions that a view can request in response to user input
pub enum ViewAction {
  /// No action needed
  None,
  /// Push a new view onto the stack
  Push(Box<dyn View>),
  /// Pop current view from stack (go back)
  Pop,
}

/// What every view needs to build and refresh its data.
#[derive(Clone)]
pub struct ViewContext {
  pub sources: DataSources,
  pub focus: FocusSignal,
  pub refresh: RefreshConfig,
}

impl ViewContext {
  /// Interval and focus subscriptions for `target`, as configured.
  ///
  /// The view keeps the handles; dropping them stops the triggers.
  pub fn triggers<R: Refreshable + Clone>(&self, target: &R) -> Vec<Subscription> {
    let mut subscriptions = Vec::new();
    if let Some(period) = self.refresh.interval() {
      subscriptions.push(triggers::every(target.clone(), period));
    }
    if self.refresh.on_focus {
      subscriptions.push(triggers::on_focus(target.clone(), &self.focus));
    }
    subscriptions
  }
}

/// Trait for view behavior
///
/// Views own their orchestrators and read state from watch channels when
/// rendering. Dropping a view disposes its orchestrators and stops its
/// refresh triggers.
pub trait View {
  /// Handle a key event, returning an action for App to execute
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction;

  /// Render the view to the frame
  fn render(&mut self, frame: &mut Frame, area: Rect);

  /// Get the breadcrumb label for this view
  fn breadcrumb_label(&self) -> String;

  /// Get keyboard shortcuts to display in the header
  fn shortcuts(&self) -> Vec<Shortcut> {
    vec![
      Shortcut::new("r", "refresh").with_priority(10),
      Shortcut::new("R", "hard refresh").with_priority(20),
      Shortcut::new("C", "clear cache").with_priority(25),
      Shortcut::new("q", "back").with_priority(30),
    ]
  }
}
