use crate::tui::Frame;
use anyhow::Result;
use crossterm::event::KeyEvent;
use ratatui::layout::{Constraint, Direction, Layout, Rect};

pub mod home;
pub mod login;
pub mod register;

/// What a screen asks the app to do after handling a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Submit the login form.
    Login,
    /// Submit the registration form (already validated locally).
    Register,
    GoToRegister,
    GoToLogin,
    Refresh,
    Logout,
    Quit,
}

pub trait Component {
    fn handle_input(&mut self, event: KeyEvent) -> Result<Option<Action>>;
    fn render(&self, frame: &mut Frame);
}

/// A rectangle of the given percentages centered in `r`.
pub fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(rows[1])[1]
}
