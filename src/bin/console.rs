use anyhow::Result;
use crossterm::terminal::{self, LeaveAlternateScreen};
use homecare::{app::App, client::ApiClient, tui::Tui};
use std::io;

fn main() -> Result<()> {
    let client = ApiClient::from_env()?;
    let server = client.base().to_string();

    let _guard = RestoreTerminal;
    let mut tui = Tui::new()?;
    tui.enter()?;

    let mut app = App::new(client);
    let res = app.run(&mut tui);

    tui.leave()?;

    if let Err(e) = res {
        eprintln!("homecare-console ({server}): {e:#}");
    }
    Ok(())
}

/// Puts the terminal back even if the app panics.
struct RestoreTerminal;

impl Drop for RestoreTerminal {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
        let _ = crossterm::execute!(io::stdout(), LeaveAlternateScreen);
    }
}
