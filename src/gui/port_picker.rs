use std::{path::PathBuf, time::Duration};

use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use ratatui::{
    prelude::*,
    widgets::{
        block::{Position, Title},
        *,
    },
};

use super::{with_terminal, GuiError};

/// Lets the operator pick the UWB module out of `ports`. Returns `None` if
/// they quit instead.
pub fn pick_port(mut ports: Vec<PathBuf>) -> Result<Option<PathBuf>, GuiError> {
    if ports.is_empty() {
        return Err(GuiError::NoPorts);
    }
    let n_ports = ports.len();
    let mut list_state = ListState::default().with_selected(Some(0));
    let picked = with_terminal(|terminal| loop {
        let title = Title::from(" Which port is the UWB module on? ".cyan().bold());
        let keys = Title::from(Line::from(vec![
            " Move ".into(),
            "<Up>/<Down>".cyan().bold(),
            " Pick ".into(),
            "<Enter>".cyan().bold(),
            " Quit ".into(),
            "<Q> ".cyan().bold(),
        ]));
        let block = Block::default()
            .title(title.alignment(Alignment::Center))
            .title(keys.alignment(Alignment::Center).position(Position::Bottom))
            .borders(Borders::ALL);
        let list = List::new(ports.iter().map(|p| p.to_string_lossy().into_owned()))
            .highlight_symbol("> ")
            .highlight_style(Style::default().fg(Color::Cyan))
            .block(block);
        terminal.draw(|frame| {
            let area = frame.size();
            frame.render_stateful_widget(list, area, &mut list_state);
        })?;

        if !event::poll(Duration::from_millis(16))? {
            continue;
        }
        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }
        let cursor = list_state.selected().unwrap_or(0);
        match key.code {
            KeyCode::Down => list_state.select(Some((cursor + 1) % n_ports)),
            KeyCode::Up => list_state.select(Some((cursor + n_ports - 1) % n_ports)),
            KeyCode::Enter => break Ok(Some(cursor)),
            KeyCode::Char('q') | KeyCode::Esc => break Ok(None),
            _ => {}
        }
    })?;

    Ok(picked.map(|i| ports.swap_remove(i)))
}
