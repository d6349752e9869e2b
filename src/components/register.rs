//! Registration screen.

use crate::client::RegisterForm;
use crate::components::{centered_rect, Action, Component};
use crate::tui::Frame;
use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::{
    prelude::*,
    widgets::{Block, BorderType, Borders, Paragraph},
};
use std::time::{Duration, Instant};

const MIN_PASSWORD_LEN: usize = 6;

const EMAIL: usize = 0;
const PASSWORD: usize = 1;
const CONFIRM: usize = 2;
const NAME: usize = 3;
const PHONE: usize = 4;
const NATIONAL_ID: usize = 5;
const ROLE: usize = 6;
const SUBMIT: usize = 7;
const BACK: usize = 8;
const FIELDS: usize = 9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SignupRole {
    #[default]
    Patient,
    Nurse,
}

impl SignupRole {
    fn as_str(self) -> &'static str {
        match self {
            SignupRole::Patient => "patient",
            SignupRole::Nurse => "nurse",
        }
    }

    fn toggled(self) -> Self {
        match self {
            SignupRole::Patient => SignupRole::Nurse,
            SignupRole::Nurse => SignupRole::Patient,
        }
    }
}

#[derive(Debug, Default)]
pub struct Register {
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub name: String,
    pub phone: String,
    pub national_id: String,
    pub role: SignupRole,
    focus_index: usize,
    error_message: Option<String>,
    error_message_time: Option<Instant>,
}

/// `+201` or `01` followed by nine digits.
fn valid_phone(phone: &str) -> bool {
    let rest = phone
        .strip_prefix("+201")
        .or_else(|| phone.strip_prefix("01"));
    matches!(rest, Some(digits) if digits.len() == 9 && digits.bytes().all(|b| b.is_ascii_digit()))
}

fn valid_national_id(id: &str) -> bool {
    id.len() == 14 && id.bytes().all(|b| b.is_ascii_digit())
}

impl Register {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Checks the form the way the server would and builds the request body.
    pub fn validate(&self) -> Result<RegisterForm, &'static str> {
        let email = self.email.trim();
        if email.is_empty() || !email.contains('@') {
            return Err("Please enter a valid email address.");
        }
        if self.password.len() < MIN_PASSWORD_LEN {
            return Err("Password must be at least 6 characters.");
        }
        if self.password != self.confirm_password {
            return Err("Passwords do not match.");
        }
        let name = self.name.trim();
        if name.is_empty() {
            return Err("Name is required.");
        }
        let phone = self.phone.trim();
        if phone.is_empty() {
            return Err("Phone number is required.");
        }
        if !valid_phone(phone) {
            return Err("Phone must be 01XXXXXXXXX or +201XXXXXXXXX.");
        }

        let national_id = self.national_id.trim();
        let national_id = match self.role {
            SignupRole::Patient if !valid_national_id(national_id) => {
                return Err("National ID must be exactly 14 digits.");
            }
            _ if national_id.is_empty() => None,
            _ => Some(national_id.to_string()),
        };

        Ok(RegisterForm {
            email: email.to_string(),
            password: self.password.clone(),
            user_type: self.role.as_str().to_string(),
            name: name.to_string(),
            phone: phone.to_string(),
            national_id,
        })
    }

    pub fn set_error_message(&mut self, message: impl Into<String>) {
        self.error_message = Some(message.into());
        self.error_message_time = Some(Instant::now());
    }

    fn clear_error_message(&mut self) {
        self.error_message = None;
        self.error_message_time = None;
    }

    pub fn check_error_timeout(&mut self) {
        if let Some(time) = self.error_message_time {
            if time.elapsed() >= Duration::from_secs(5) {
                self.clear_error_message();
            }
        }
    }

    fn focused_field(&mut self) -> Option<&mut String> {
        match self.focus_index {
            EMAIL => Some(&mut self.email),
            PASSWORD => Some(&mut self.password),
            CONFIRM => Some(&mut self.confirm_password),
            NAME => Some(&mut self.name),
            PHONE => Some(&mut self.phone),
            NATIONAL_ID => Some(&mut self.national_id),
            _ => None,
        }
    }
}

impl Component for Register {
    fn handle_input(&mut self, key: KeyEvent) -> Result<Option<Action>> {
        self.check_error_timeout();

        let action = match key.code {
            KeyCode::Char(' ') if self.focus_index == ROLE => {
                self.role = self.role.toggled();
                None
            }
            KeyCode::Char(c) => {
                if let Some(field) = self.focused_field() {
                    field.push(c);
                }
                self.clear_error_message();
                None
            }
            KeyCode::Backspace => {
                if let Some(field) = self.focused_field() {
                    field.pop();
                }
                None
            }
            KeyCode::Left | KeyCode::Right if self.focus_index == ROLE => {
                self.role = self.role.toggled();
                None
            }
            KeyCode::Tab | KeyCode::Down => {
                self.focus_index = (self.focus_index + 1) % FIELDS;
                None
            }
            KeyCode::BackTab | KeyCode::Up => {
                self.focus_index = (self.focus_index + FIELDS - 1) % FIELDS;
                None
            }
            KeyCode::Enter => match self.focus_index {
                BACK => Some(Action::GoToLogin),
                ROLE => {
                    self.role = self.role.toggled();
                    None
                }
                _ => match self.validate() {
                    Ok(_) => Some(Action::Register),
                    Err(message) => {
                        self.set_error_message(message);
                        None
                    }
                },
            },
            KeyCode::Esc => Some(Action::GoToLogin),
            _ => None,
        };
        Ok(action)
    }

    fn render(&self, frame: &mut Frame) {
        frame.render_widget(
            Block::default().style(Style::default().bg(Color::Rgb(16, 16, 28))),
            frame.area(),
        );

        let container = centered_rect(70, 90, frame.area());
        let container_block = Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(Style::default().fg(Color::Rgb(75, 75, 120)))
            .style(Style::default().bg(Color::Rgb(22, 22, 35)));
        let inner = container_block.inner(container);
        frame.render_widget(container_block, container);

        let mut constraints = vec![Constraint::Length(2)];
        constraints.extend([Constraint::Length(3); 7]);
        constraints.extend([
            Constraint::Length(2), // message
            Constraint::Length(1), // submit
            Constraint::Length(1), // back
            Constraint::Length(1), // help
            Constraint::Min(0),
        ]);
        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints(constraints)
            .horizontal_margin(2)
            .split(inner);

        frame.render_widget(
            Paragraph::new("Create Account")
                .style(
                    Style::default()
                        .fg(Color::Rgb(230, 230, 250))
                        .add_modifier(Modifier::BOLD),
                )
                .alignment(Alignment::Center),
            layout[0],
        );

        let input = |title: &'static str, value: String, index: usize| {
            let border = if self.focus_index == index {
                Style::default().fg(Color::Rgb(250, 250, 110))
            } else {
                Style::default().fg(Color::Rgb(140, 140, 200))
            };
            Paragraph::new(value)
                .style(Style::default().fg(Color::Rgb(220, 220, 240)))
                .block(
                    Block::default()
                        .borders(Borders::ALL)
                        .border_type(BorderType::Rounded)
                        .title(title)
                        .border_style(border),
                )
        };
        let masked = |s: &str| "•".repeat(s.chars().count());

        let national_id_title = match self.role {
            SignupRole::Patient => " National ID (14 digits) ",
            SignupRole::Nurse => " National ID (optional) ",
        };
        let role_line = match self.role {
            SignupRole::Patient => "[x] Patient   [ ] Nurse",
            SignupRole::Nurse => "[ ] Patient   [x] Nurse",
        };

        let rows = [
            input(" Email ", self.email.clone(), EMAIL),
            input(" Password ", masked(&self.password), PASSWORD),
            input(" Confirm Password ", masked(&self.confirm_password), CONFIRM),
            input(" Full Name ", self.name.clone(), NAME),
            input(" Phone ", self.phone.clone(), PHONE),
            input(national_id_title, self.national_id.clone(), NATIONAL_ID),
            input(" I am a (SPACE to switch) ", role_line.to_string(), ROLE),
        ];
        for (row, area) in rows.into_iter().zip(layout[1..8].iter()) {
            frame.render_widget(row, *area);
        }

        if let Some(error) = &self.error_message {
            frame.render_widget(
                Paragraph::new(error.as_str())
                    .style(
                        Style::default()
                            .fg(Color::Rgb(255, 100, 100))
                            .add_modifier(Modifier::BOLD),
                    )
                    .alignment(Alignment::Center),
                layout[8],
            );
        }

        let button = |label: &'static str, index: usize| {
            let (text, style) = if self.focus_index == index {
                (
                    format!("► {label} ◄"),
                    Style::default()
                        .fg(Color::Rgb(129, 199, 245))
                        .add_modifier(Modifier::BOLD),
                )
            } else {
                (
                    format!("  {label}  "),
                    Style::default().fg(Color::Rgb(180, 180, 200)),
                )
            };
            Paragraph::new(text).style(style).alignment(Alignment::Center)
        };
        frame.render_widget(button("Register", SUBMIT), layout[9]);
        frame.render_widget(button("Back to Login", BACK), layout[10]);

        frame.render_widget(
            Paragraph::new("TAB/Arrows: Navigate | ENTER: Submit | ESC: Back to Login")
                .style(Style::default().fg(Color::Rgb(140, 140, 170)))
                .alignment(Alignment::Center),
            layout[11],
        );
    }
}
