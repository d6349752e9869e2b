//! Login screen.

use crate::components::{centered_rect, Action, Component};
use crate::tui::Frame;
use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::{
    prelude::*,
    widgets::{Block, BorderType, Borders, Clear, Paragraph},
};
use std::time::{Duration, Instant};

const FIELDS: usize = 4;
const CREATE_ACCOUNT: usize = 2;
const EXIT: usize = 3;

#[derive(Debug, Default)]
pub struct Login {
    pub email: String,
    pub password: String,
    /// 0: email, 1: password, 2: create account, 3: exit
    selected_index: usize,
    show_exit_dialog: bool,
    /// 0: yes, 1: no
    exit_dialog_selected: usize,
    error_message: Option<String>,
    notice: Option<String>,
    message_time: Option<Instant>,
}

impl Login {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears the form, keeping the email when `keep_email` is set.
    pub fn reset(&mut self, keep_email: bool) {
        if !keep_email {
            self.email.clear();
        }
        self.password.clear();
        self.selected_index = 0;
        self.show_exit_dialog = false;
        self.clear_messages();
    }

    pub fn set_error_message(&mut self, message: impl Into<String>) {
        self.notice = None;
        self.error_message = Some(message.into());
        self.message_time = Some(Instant::now());
    }

    pub fn set_notice(&mut self, message: impl Into<String>) {
        self.error_message = None;
        self.notice = Some(message.into());
        self.message_time = Some(Instant::now());
    }

    fn clear_messages(&mut self) {
        self.error_message = None;
        self.notice = None;
        self.message_time = None;
    }

    /// Hides messages after five seconds.
    pub fn check_error_timeout(&mut self) {
        if let Some(time) = self.message_time {
            if time.elapsed() >= Duration::from_secs(5) {
                self.clear_messages();
            }
        }
    }

    fn focused_field(&mut self) -> Option<&mut String> {
        match self.selected_index {
            0 => Some(&mut self.email),
            1 => Some(&mut self.password),
            _ => None,
        }
    }

    fn handle_exit_dialog(&mut self, key: KeyEvent) -> Option<Action> {
        match key.code {
            KeyCode::Left | KeyCode::Right => {
                self.exit_dialog_selected = 1 - self.exit_dialog_selected;
            }
            KeyCode::Enter if self.exit_dialog_selected == 0 => return Some(Action::Quit),
            KeyCode::Enter | KeyCode::Esc => self.show_exit_dialog = false,
            _ => {}
        }
        None
    }

    fn submit(&mut self) -> Option<Action> {
        if self.email.trim().is_empty() {
            self.set_error_message("Email cannot be empty.");
            return None;
        }
        if self.password.is_empty() {
            self.set_error_message("Password cannot be empty.");
            return None;
        }
        Some(Action::Login)
    }
}

impl Component for Login {
    fn handle_input(&mut self, key: KeyEvent) -> Result<Option<Action>> {
        self.check_error_timeout();

        if self.show_exit_dialog {
            return Ok(self.handle_exit_dialog(key));
        }

        let action = match key.code {
            KeyCode::Char(c) => {
                if let Some(field) = self.focused_field() {
                    field.push(c);
                }
                self.clear_messages();
                None
            }
            KeyCode::Backspace => {
                if let Some(field) = self.focused_field() {
                    field.pop();
                }
                None
            }
            KeyCode::Tab | KeyCode::Down => {
                self.selected_index = (self.selected_index + 1) % FIELDS;
                None
            }
            KeyCode::BackTab | KeyCode::Up => {
                self.selected_index = (self.selected_index + FIELDS - 1) % FIELDS;
                None
            }
            KeyCode::Enter => match self.selected_index {
                CREATE_ACCOUNT => Some(Action::GoToRegister),
                EXIT => {
                    self.show_exit_dialog = true;
                    self.exit_dialog_selected = 1;
                    None
                }
                _ => self.submit(),
            },
            KeyCode::Esc => {
                self.show_exit_dialog = true;
                self.exit_dialog_selected = 1;
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

        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3), // title
                Constraint::Length(2), // tagline
                Constraint::Length(3), // email
                Constraint::Length(3), // password
                Constraint::Length(2), // message
                Constraint::Length(1), // create account
                Constraint::Length(1), // exit
                Constraint::Length(2),
                Constraint::Length(1), // help
                Constraint::Min(0),
            ])
            .margin(1)
            .split(centered_rect(60, 80, frame.area()));

        let title = Paragraph::new(Span::styled(
            "HomeCare",
            Style::default()
                .fg(Color::Rgb(129, 199, 245))
                .add_modifier(Modifier::BOLD),
        ))
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::BOTTOM));
        frame.render_widget(title, layout[0]);

        let tagline = Paragraph::new(Span::styled(
            "Nursing care at home, on request",
            Style::default()
                .fg(Color::Gray)
                .add_modifier(Modifier::ITALIC),
        ))
        .alignment(Alignment::Center);
        frame.render_widget(tagline, layout[1]);

        let field_block = |title: &'static str, index: usize| {
            Block::default()
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded)
                .title(title)
                .border_style(Style::default().fg(if self.selected_index == index {
                    Color::Rgb(250, 250, 110)
                } else {
                    Color::Rgb(140, 140, 200)
                }))
        };

        frame.render_widget(
            Paragraph::new(self.email.as_str()).block(field_block(" Email ", 0)),
            layout[2],
        );
        frame.render_widget(
            Paragraph::new("•".repeat(self.password.chars().count()))
                .block(field_block(" Password ", 1)),
            layout[3],
        );

        if let Some(error) = &self.error_message {
            frame.render_widget(
                Paragraph::new(error.as_str())
                    .style(Style::default().fg(Color::Rgb(255, 100, 100)))
                    .alignment(Alignment::Center),
                layout[4],
            );
        } else if let Some(notice) = &self.notice {
            frame.render_widget(
                Paragraph::new(notice.as_str())
                    .style(Style::default().fg(Color::Rgb(140, 219, 140)))
                    .alignment(Alignment::Center),
                layout[4],
            );
        }

        let link = |label: &'static str, index: usize, color: Color| {
            let (text, style) = if self.selected_index == index {
                (
                    format!("► {label} ◄"),
                    Style::default().fg(color).add_modifier(Modifier::BOLD),
                )
            } else {
                (format!("  {label}  "), Style::default().fg(Color::Gray))
            };
            Paragraph::new(text).style(style).alignment(Alignment::Center)
        };
        frame.render_widget(
            link("Create an account", CREATE_ACCOUNT, Color::Rgb(129, 199, 245)),
            layout[5],
        );
        frame.render_widget(link("Exit", EXIT, Color::Yellow), layout[6]);

        frame.render_widget(
            Paragraph::new("TAB/Arrows: Navigate | ENTER: Select | ESC: Exit | Ctrl+Q: Quit")
                .style(Style::default().fg(Color::Rgb(140, 140, 170)))
                .alignment(Alignment::Center),
            layout[8],
        );

        if self.show_exit_dialog {
            let area = centered_rect(50, 20, frame.area());
            let yes = Style::default().fg(if self.exit_dialog_selected == 0 {
                Color::Green
            } else {
                Color::DarkGray
            });
            let no = Style::default().fg(if self.exit_dialog_selected == 1 {
                Color::Red
            } else {
                Color::DarkGray
            });
            let dialog = Paragraph::new(vec![
                Line::from("Are you sure you want to quit?"),
                Line::from(""),
                Line::from(vec![
                    Span::styled(" Yes ", yes),
                    Span::raw("  "),
                    Span::styled(" No ", no),
                ]),
            ])
            .block(
                Block::default()
                    .title(" Confirm Exit ")
                    .borders(Borders::ALL)
                    .border_type(BorderType::Rounded),
            )
            .alignment(Alignment::Center);

            frame.render_widget(Clear, area);
            frame.render_widget(dialog, area);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyModifiers;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn type_text(login: &mut Login, text: &str) {
        for c in text.chars() {
            login.handle_input(key(KeyCode::Char(c))).unwrap();
        }
    }

    #[test]
    fn empty_email_is_rejected_locally() {
        let mut login = Login::new();
        assert_eq!(login.handle_input(key(KeyCode::Enter)).unwrap(), None);
        assert_eq!(login.error_message.as_deref(), Some("Email cannot be empty."));
    }

    #[test]
    fn filled_form_submits() {
        let mut login = Login::new();
        type_text(&mut login, "a@b.com");
        login.handle_input(key(KeyCode::Tab)).unwrap();
        type_text(&mut login, "secret1");

        assert_eq!(login.email, "a@b.com");
        assert_eq!(login.password, "secret1");
        assert_eq!(
            login.handle_input(key(KeyCode::Enter)).unwrap(),
            Some(Action::Login)
        );
    }

    #[test]
    fn exit_needs_confirmation() {
        let mut login = Login::new();
        assert_eq!(login.handle_input(key(KeyCode::Esc)).unwrap(), None);
        login.handle_input(key(KeyCode::Left)).unwrap();
        assert_eq!(
            login.handle_input(key(KeyCode::Enter)).unwrap(),
            Some(Action::Quit)
        );
    }
}
