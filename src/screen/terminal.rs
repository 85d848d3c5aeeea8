//! Terminal front-end: raw mode, key mapping and the draw loop

use anyhow::Result;
use crossterm::{
    event::{Event, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use futures::StreamExt;
use ratatui::{prelude::CrosstermBackend, Terminal};
use std::io;
use tokio::sync::mpsc;
use tracing::debug;

use super::controller::{PlayerScreen, UserAction};
use super::ui::draw_player;
use crate::utils::TuiModeGuard;

/// Seek step for one arrow key press
const SEEK_STEP: f64 = 0.05;

/// Map a key press to a player action
pub fn key_to_action(key: KeyEvent) -> Option<UserAction> {
    if key.kind != KeyEventKind::Press {
        return None;
    }
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return Some(UserAction::Quit);
    }

    match key.code {
        KeyCode::Char(' ') => Some(UserAction::TogglePlay),
        KeyCode::Char('n') => Some(UserAction::Next),
        KeyCode::Char('p') => Some(UserAction::Previous),
        KeyCode::Left => Some(UserAction::SeekStep(-SEEK_STEP)),
        KeyCode::Right => Some(UserAction::SeekStep(SEEK_STEP)),
        KeyCode::Enter => Some(UserAction::SeekRelease),
        KeyCode::Char('l') => Some(UserAction::ToggleLike),
        KeyCode::Char('q') | KeyCode::Esc => Some(UserAction::Quit),
        _ => None,
    }
}

/// Run the now-playing screen on the terminal until the user quits
pub async fn run_player(screen: &mut PlayerScreen) -> Result<()> {
    // Suppress stderr logging until the terminal is restored
    let _tui_mode = TuiModeGuard::enable();

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let (tx, rx) = mpsc::unbounded_channel();
    let input = tokio::spawn(forward_input(tx));

    let result = screen
        .run(rx, |view| {
            terminal.draw(|f| draw_player(f, view))?;
            Ok(())
        })
        .await;

    input.abort();

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

async fn forward_input(tx: mpsc::UnboundedSender<UserAction>) {
    let mut events = EventStream::new();
    while let Some(event) = events.next().await {
        let action = match event {
            Ok(Event::Key(key)) => key_to_action(key),
            Ok(Event::Resize(..)) => Some(UserAction::Refresh),
            Ok(_) => None,
            Err(e) => {
                debug!("Terminal input error: {}", e);
                Some(UserAction::Quit)
            }
        };
        if let Some(action) = action
            && tx.send(action).is_err()
        {
            break;
        }
    }
}
