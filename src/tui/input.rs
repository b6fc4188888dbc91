use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEventKind, MouseButton, MouseEventKind};

use super::mode::TuiState;
use crate::shared::InputEvent;

// poll for input from tui, resolves keys and clicks into semantic
// inputevents for the middle layer to handle
pub fn poll_input(timeout: Duration, ts: &TuiState) -> anyhow::Result<Vec<InputEvent>> {
    if !event::poll(timeout)? {
        return Ok(vec![]);
    }

    match event::read()? {
        Event::Key(key) if key.kind == KeyEventKind::Press => Ok(handle_key(key.code)),
        Event::Mouse(mouse) => match mouse.kind {
            MouseEventKind::Down(MouseButton::Left) => Ok(ts
                .to_canvas(mouse.column, mouse.row)
                .map(|(x, y)| InputEvent::SpawnAt { x, y })
                .into_iter()
                .collect()),
            _ => Ok(vec![]),
        },
        _ => Ok(vec![]),
    }
}

fn handle_key(code: KeyCode) -> Vec<InputEvent> {
    let event = match code {
        KeyCode::Esc | KeyCode::Char('q') => InputEvent::Quit,

        // canvas
        KeyCode::Char(' ') => InputEvent::SpawnRandom,
        KeyCode::Char('c') => InputEvent::Clear,

        // musical settings, lowercase = up and shifted = down
        KeyCode::Char('s') => InputEvent::NextScale,
        KeyCode::Char('S') => InputEvent::PrevScale,
        KeyCode::Char('k') => InputEvent::KeyUp,
        KeyCode::Char('K') => InputEvent::KeyDown,
        KeyCode::Char('o') => InputEvent::OctaveUp,
        KeyCode::Char('O') => InputEvent::OctaveDown,
        KeyCode::Char('w') => InputEvent::NextWaveform,

        // knob
        KeyCode::Up => InputEvent::SelectParam(-1),
        KeyCode::Down => InputEvent::SelectParam(1),
        KeyCode::Char('[') => InputEvent::AdjustParam(-1.0),
        KeyCode::Char(']') => InputEvent::AdjustParam(1.0),

        KeyCode::Char('r') => InputEvent::ToggleRecording,

        _ => return vec![],
    };
    vec![event]
}
