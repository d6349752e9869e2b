//! Account overview shown after login.

use crate::client::AccountSummary;
use crate::components::{Action, Component};
use crate::tui::Frame;
use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::{
    prelude::*,
    widgets::{Block, BorderType, Borders, Clear, Padding, Paragraph, Wrap},
};
use time::{macros::format_description, OffsetDateTime, UtcOffset};

#[derive(Debug, Default)]
pub struct Home {
    account: Option<AccountSummary>,
    status_line: Option<String>,
    show_logout_dialog: bool,
    /// 0: yes, 1: no
    logout_dialog_selected: usize,
}

/// Formats `at` in the local timezone, or UTC when the offset is unknown.
fn local_time(at: OffsetDateTime) -> String {
    let offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);
    at.to_offset(offset)
        .format(format_description!(
            "[year]-[month]-[day] [hour]:[minute]"
        ))
        .unwrap_or_else(|_| at.to_string())
}

impl Home {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_account(&mut self, account: AccountSummary) {
        self.account = Some(account);
        self.status_line = None;
    }

    pub fn set_status(&mut self, message: impl Into<String>) {
        self.status_line = Some(message.into());
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn account(&self) -> Option<&AccountSummary> {
        self.account.as_ref()
    }

    fn handle_logout_dialog(&mut self, key: KeyEvent) -> Option<Action> {
        match key.code {
            KeyCode::Left | KeyCode::Right => {
                self.logout_dialog_selected = 1 - self.logout_dialog_selected;
            }
            KeyCode::Enter => {
                self.show_logout_dialog = false;
                if self.logout_dialog_selected == 0 {
                    return Some(Action::Logout);
                }
            }
            KeyCode::Esc => self.show_logout_dialog = false,
            _ => {}
        }
        None
    }

    fn summary_lines(&self, account: &AccountSummary) -> Vec<Line<'static>> {
        let label = |text: &'static str| {
            Span::styled(
                format!("{text:<16}"),
                Style::default().fg(Color::Rgb(140, 140, 200)),
            )
        };
        let value = |text: String| Span::styled(text, Style::default().fg(Color::Rgb(220, 220, 240)));

        let status = if account.is_active {
            Span::styled(
                "Active",
                Style::default()
                    .fg(Color::Rgb(140, 219, 140))
                    .add_modifier(Modifier::BOLD),
            )
        } else {
            Span::styled(
                "Pending activation",
                Style::default()
                    .fg(Color::Rgb(250, 250, 110))
                    .add_modifier(Modifier::BOLD),
            )
        };

        let mut lines = vec![
            Line::from(vec![label("Email"), value(account.email.clone())]),
            Line::from(vec![label("Phone"), value(account.phone.clone())]),
            Line::from(vec![label("Role"), value(account.user_type.clone())]),
            Line::from(vec![label("Status"), status]),
            Line::from(vec![
                label("Registered"),
                value(local_time(account.registration_date)),
            ]),
        ];
        if let Some(activated) = account.activation_date {
            lines.push(Line::from(vec![
                label("Activated"),
                value(local_time(activated)),
            ]));
        }
        if !account.profile_complete {
            lines.push(Line::from(""));
            lines.push(Line::from(Span::styled(
                "Your profile is incomplete.",
                Style::default().fg(Color::Rgb(180, 190, 254)),
            )));
        }
        lines
    }
}

impl Component for Home {
    fn handle_input(&mut self, key: KeyEvent) -> Result<Option<Action>> {
        if self.show_logout_dialog {
            return Ok(self.handle_logout_dialog(key));
        }

        let action = match key.code {
            KeyCode::Char('r') | KeyCode::F(5) => Some(Action::Refresh),
            KeyCode::Char('l') | KeyCode::Esc => {
                self.show_logout_dialog = true;
                self.logout_dialog_selected = 1;
                None
            }
            _ => None,
        };
        Ok(action)
    }

    fn render(&self, frame: &mut Frame) {
        frame.render_widget(
            Block::default().style(Style::default().bg(Color::Rgb(16, 16, 28))),
            frame.area(),
        );
        let area = frame.area();

        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(5),
                Constraint::Min(8),
                Constraint::Length(4),
                Constraint::Length(1),
            ])
            .margin(1)
            .split(area);

        let name = self
            .account
            .as_ref()
            .map(|a| a.name.as_str())
            .unwrap_or("there");
        let welcome_block = Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(Style::default().fg(Color::Rgb(75, 75, 120)))
            .style(Style::default().bg(Color::Rgb(24, 24, 40)))
            .padding(Padding::new(0, 0, 1, 0));
        frame.render_widget(
            Paragraph::new(Line::from(vec![
                Span::styled(
                    "Welcome to HomeCare, ",
                    Style::default()
                        .fg(Color::White)
                        .add_modifier(Modifier::BOLD),
                ),
                Span::styled(
                    name.to_string(),
                    Style::default()
                        .fg(Color::Rgb(129, 199, 245))
                        .add_modifier(Modifier::BOLD),
                ),
            ]))
            .alignment(Alignment::Center)
            .block(welcome_block),
            layout[0],
        );

        let lines = match &self.account {
            Some(account) => self.summary_lines(account),
            None => vec![Line::from("Loading account...")],
        };
        frame.render_widget(
            Paragraph::new(lines).block(
                Block::default()
                    .title(" Account ")
                    .borders(Borders::ALL)
                    .border_type(BorderType::Rounded)
                    .border_style(Style::default().fg(Color::Rgb(140, 140, 200)))
                    .style(Style::default().bg(Color::Rgb(22, 22, 35)))
                    .padding(Padding::new(2, 2, 1, 0)),
            ),
            layout[1],
        );

        let notice = match (&self.status_line, &self.account) {
            (Some(status), _) => Some((status.clone(), Color::Rgb(255, 100, 100))),
            (None, Some(account)) if !account.is_active => Some((
                "Your account is pending activation by an administrator. \
                 You will receive an email once it is activated."
                    .to_string(),
                Color::Rgb(250, 250, 110),
            )),
            _ => None,
        };
        if let Some((text, color)) = notice {
            frame.render_widget(
                Paragraph::new(text)
                    .style(Style::default().fg(color))
                    .alignment(Alignment::Center)
                    .wrap(Wrap { trim: true }),
                layout[2],
            );
        }

        frame.render_widget(
            Paragraph::new("R: Refresh | L/ESC: Logout | Ctrl+Q: Quit")
                .style(Style::default().fg(Color::Rgb(140, 140, 170)))
                .alignment(Alignment::Center),
            layout[3],
        );

        if self.show_logout_dialog {
            self.render_logout_dialog(frame, area);
        }
    }
}

impl Home {
    fn render_logout_dialog(&self, frame: &mut Frame, area: Rect) {
        let width = 40;
        let height = 7;
        let dialog_area = Rect::new(
            area.width.saturating_sub(width) / 2,
            area.height.saturating_sub(height) / 2,
            width.min(area.width),
            height.min(area.height),
        );
        frame.render_widget(Clear, dialog_area);

        let selected = |index: usize, color: Color| {
            if self.logout_dialog_selected == index {
                Style::default().fg(color).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::Rgb(180, 180, 200))
            }
        };
        let dialog = Paragraph::new(vec![
            Line::from("Are you sure you want to logout?"),
            Line::from(""),
            Line::from(vec![
                Span::styled(" Yes ", selected(0, Color::Rgb(140, 219, 140))),
                Span::raw("    "),
                Span::styled(" No ", selected(1, Color::Rgb(255, 100, 100))),
            ]),
        ])
        .alignment(Alignment::Center)
        .block(
            Block::default()
                .title(" Confirm Logout ")
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded)
                .border_style(Style::default().fg(Color::Rgb(140, 140, 200)))
                .style(Style::default().bg(Color::Rgb(30, 30, 46)))
                .padding(Padding::new(0, 0, 1, 0)),
        );
        frame.render_widget(dialog, dialog_area);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyModifiers;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn logout_is_confirmed_first() {
        let mut home = Home::new();
        assert_eq!(home.handle_input(key(KeyCode::Char('l'))).unwrap(), None);
        // "No" is preselected.
        assert_eq!(home.handle_input(key(KeyCode::Enter)).unwrap(), None);

        home.handle_input(key(KeyCode::Esc)).unwrap();
        home.handle_input(key(KeyCode::Left)).unwrap();
        assert_eq!(
            home.handle_input(key(KeyCode::Enter)).unwrap(),
            Some(Action::Logout)
        );
    }

    #[test]
    fn refresh_key() {
        let mut home = Home::new();
        assert_eq!(
            home.handle_input(key(KeyCode::Char('r'))).unwrap(),
            Some(Action::Refresh)
        );
    }
}
