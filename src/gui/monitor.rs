use std::{
    sync::atomic::{AtomicBool, Ordering},
    time::Duration,
};

use crossterm::event::{self, Event, KeyEventKind};
use ratatui::{
    prelude::*,
    widgets::{Axis, Block, Borders, Chart, Dataset, GraphType, Paragraph},
};

use super::{with_terminal, GuiError};
use crate::visualizer::{MailboxReader, Snapshot};

const REFRESH: Duration = Duration::from_millis(50);
const MARGIN: f64 = 1.0;

/// Floor-plane bounds that fit every anchor and the tag, with a metre of
/// margin. Falls back to ±10 m when there is nothing to show.
pub fn chart_bounds(snapshot: &Snapshot) -> ([f64; 2], [f64; 2]) {
    let points = snapshot.anchors.iter().chain(snapshot.position.iter());
    let (mut x, mut y) = ([f64::INFINITY, f64::NEG_INFINITY], [f64::INFINITY, f64::NEG_INFINITY]);
    for p in points {
        x = [x[0].min(p.x), x[1].max(p.x)];
        y = [y[0].min(p.y), y[1].max(p.y)];
    }
    if !(x[0].is_finite() && y[0].is_finite()) {
        return ([-10.0, 10.0], [-10.0, 10.0]);
    }
    (
        [x[0] - MARGIN, x[1] + MARGIN],
        [y[0] - MARGIN, y[1] + MARGIN],
    )
}

fn axis<'a>(title: &'a str, bounds: [f64; 2]) -> Axis<'a> {
    let mid = (bounds[0] + bounds[1]) / 2.0;
    Axis::default()
        .title(title.cyan())
        .bounds(bounds)
        .labels(
            [bounds[0], mid, bounds[1]]
                .iter()
                .map(|v| Span::from(format!("{:.1}", v)))
                .collect(),
        )
}

fn draw(frame: &mut Frame, snapshot: &Snapshot) {
    let (x_bounds, y_bounds) = chart_bounds(snapshot);
    let anchors: Vec<(f64, f64)> = snapshot.anchors.iter().map(|a| (a.x, a.y)).collect();
    let tag: Vec<(f64, f64)> = snapshot.position.iter().map(|p| (p.x, p.y)).collect();

    let chart = Chart::new(vec![
        Dataset::default()
            .name("Anchors")
            .marker(symbols::Marker::Block)
            .graph_type(GraphType::Scatter)
            .style(Style::default().fg(Color::Cyan))
            .data(&anchors),
        Dataset::default()
            .name("Tag")
            .marker(symbols::Marker::Braille)
            .graph_type(GraphType::Scatter)
            .style(Style::default().fg(Color::Red))
            .data(&tag),
    ])
    .block(
        Block::default()
            .title(" Tracking ".magenta().bold())
            .borders(Borders::ALL),
    )
    .x_axis(axis("x (m)", x_bounds))
    .y_axis(axis("y (m)", y_bounds));

    let status = match snapshot.position {
        Some(p) => format!(" tag at {}  ({} updates) ", p, snapshot.updates),
        None => " waiting for the first report ".to_owned(),
    };
    let footer = Paragraph::new(Line::from(vec![
        status.into(),
        " Press any key to stop ".magenta().bold(),
    ]))
    .block(Block::default().borders(Borders::ALL));

    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(5), Constraint::Length(3)])
        .split(frame.size());
    frame.render_widget(chart, layout[0]);
    frame.render_widget(footer, layout[1]);
}

/// Draws the anchors and the tag until a key is pressed or `stop` is raised
/// elsewhere. A key press raises `stop` itself.
pub fn run_monitor(reader: &MailboxReader, stop: &AtomicBool) -> Result<(), GuiError> {
    with_terminal(|terminal| {
        while !stop.load(Ordering::Relaxed) {
            let snapshot = reader.snapshot();
            terminal.draw(|frame| draw(frame, &snapshot))?;

            if event::poll(REFRESH)? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press {
                        stop.store(true, Ordering::Relaxed);
                    }
                }
            }
        }
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Point3;

    #[test]
    fn empty_snapshot_has_default_bounds() {
        assert_eq!(
            chart_bounds(&Snapshot::default()),
            ([-10.0, 10.0], [-10.0, 10.0])
        );
    }

    #[test]
    fn bounds_cover_anchors_and_tag() {
        let snapshot = Snapshot {
            anchors: vec![Point3::new(0.0, 0.0, 2.5), Point3::new(8.0, 6.0, 2.5)],
            position: Some(Point3::new(9.0, -2.0, 1.0)),
            updates: 1,
        };
        assert_eq!(chart_bounds(&snapshot), ([-1.0, 10.0], [-3.0, 7.0]));
    }
}
