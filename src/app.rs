//! Screen flow for the console client.
//!
//! The app moves between the login, registration and home screens and
//! talks to the server through [`ApiClient`]. The session token only lives
//! in memory; logging out drops it.

use crate::client::{ApiClient, Session};
use crate::components::{home::Home, login::Login, register::Register, Action, Component};
use crate::tui::{self, Tui};
use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Login,
    Register,
    Home,
}

pub struct App {
    pub screen: Screen,
    pub should_quit: bool,
    client: ApiClient,
    session: Option<Session>,
    login: Login,
    register: Register,
    home: Home,
}

impl App {
    pub fn new(client: ApiClient) -> Self {
        Self {
            screen: Screen::Login,
            should_quit: false,
            client,
            session: None,
            login: Login::new(),
            register: Register::new(),
            home: Home::new(),
        }
    }

    pub fn run(&mut self, tui: &mut Tui) -> Result<()> {
        while !self.should_quit {
            tui.draw(|frame| self.render(frame))?;
            match tui.next_event()? {
                tui::Event::Key(key) => self.handle_key(key)?,
                tui::Event::Resize => {}
                tui::Event::Tick => match self.screen {
                    Screen::Login => self.login.check_error_timeout(),
                    Screen::Register => self.register.check_error_timeout(),
                    Screen::Home => {}
                },
            }
        }
        Ok(())
    }

    fn handle_key(&mut self, key: KeyEvent) -> Result<()> {
        if key.code == KeyCode::Char('q') && key.modifiers.contains(KeyModifiers::CONTROL) {
            self.should_quit = true;
            return Ok(());
        }

        let action = match self.screen {
            Screen::Login => self.login.handle_input(key)?,
            Screen::Register => self.register.handle_input(key)?,
            Screen::Home => self.home.handle_input(key)?,
        };
        if let Some(action) = action {
            self.dispatch(action);
        }
        Ok(())
    }

    /// Server failures are shown on the current screen, never propagated.
    fn dispatch(&mut self, action: Action) {
        match action {
            Action::Quit => self.should_quit = true,
            Action::GoToRegister => {
                self.register.reset();
                self.screen = Screen::Register;
            }
            Action::GoToLogin => {
                self.login.reset(true);
                self.screen = Screen::Login;
            }
            Action::Login => {
                match self
                    .client
                    .login(self.login.email.trim(), &self.login.password)
                {
                    Ok(session) => self.start_session(session),
                    Err(e) => self.login.set_error_message(e.to_string()),
                }
            }
            Action::Register => {
                let form = match self.register.validate() {
                    Ok(form) => form,
                    Err(message) => {
                        self.register.set_error_message(message);
                        return;
                    }
                };
                match self.client.register(&form) {
                    Ok(session) => self.start_session(session),
                    Err(e) => self.register.set_error_message(e.to_string()),
                }
            }
            Action::Refresh => {
                let Some(session) = &self.session else {
                    self.logout();
                    return;
                };
                match self.client.profile(&session.token) {
                    Ok(account) => self.home.set_account(account),
                    Err(e) => self.home.set_status(e.to_string()),
                }
            }
            Action::Logout => {
                self.logout();
                self.login.set_notice("You have been logged out.");
            }
        }
    }

    fn start_session(&mut self, session: Session) {
        self.home.set_account(session.account.clone());
        self.session = Some(session);
        self.register.reset();
        self.login.reset(true);
        self.screen = Screen::Home;
    }

    fn logout(&mut self) {
        self.session = None;
        self.home.clear();
        self.login.reset(true);
        self.screen = Screen::Login;
    }

    #[cfg(test)]
    fn is_logged_in(&self) -> bool {
        self.session.is_some()
    }

    fn render(&self, frame: &mut tui::Frame<'_>) {
        match self.screen {
            Screen::Login => self.login.render(frame),
            Screen::Register => self.register.render(frame),
            Screen::Home => self.home.render(frame),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn app() -> App {
        App::new(ApiClient::new("http://127.0.0.1:9/api").unwrap())
    }

    #[test]
    fn ctrl_q_quits_from_any_screen() {
        let mut app = app();
        app.screen = Screen::Register;
        app.handle_key(KeyEvent::new(KeyCode::Char('q'), KeyModifiers::CONTROL))
            .unwrap();
        assert!(app.should_quit);
    }

    #[test]
    fn login_and_register_screens_link_to_each_other() {
        let mut app = app();
        app.dispatch(Action::GoToRegister);
        assert_eq!(app.screen, Screen::Register);

        app.handle_key(key(KeyCode::Esc)).unwrap();
        assert_eq!(app.screen, Screen::Login);
    }

    #[test]
    fn refresh_without_session_returns_to_login() {
        let mut app = app();
        app.screen = Screen::Home;
        app.dispatch(Action::Refresh);
        assert_eq!(app.screen, Screen::Login);
        assert!(!app.is_logged_in());
    }
}
