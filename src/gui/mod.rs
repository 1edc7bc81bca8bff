//! Terminal interfaces: picking the UWB module's serial port, and watching
//! the tracked tag while the light follows it.

mod error;
mod monitor;
mod port_picker;

pub use error::GuiError;
pub use monitor::{chart_bounds, run_monitor};
pub use port_picker::pick_port;

use crossterm::{
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    ExecutableCommand,
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io::{stdout, Stdout};

type Term = Terminal<CrosstermBackend<Stdout>>;

fn enter_terminal() -> Result<Term, GuiError> {
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;
    terminal.clear()?;
    Ok(terminal)
}

fn leave_terminal() -> Result<(), GuiError> {
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;
    Ok(())
}

/// Runs `body` on the alternate screen and hands the terminal back to the
/// operator however `body` ends.
fn with_terminal<T>(body: impl FnOnce(&mut Term) -> Result<T, GuiError>) -> Result<T, GuiError> {
    let res = enter_terminal().and_then(|mut terminal| body(&mut terminal));
    restore_then(res, leave_terminal)
}

/// Always runs `leave`. An error from the body outranks one from `leave`.
fn restore_then<T>(
    res: Result<T, GuiError>,
    leave: impl FnOnce() -> Result<(), GuiError>,
) -> Result<T, GuiError> {
    let left = leave();
    let value = res?;
    left?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{cell::Cell, io};

    fn broken_pipe() -> GuiError {
        GuiError::IOError(io::Error::from(io::ErrorKind::BrokenPipe))
    }

    #[test]
    fn terminal_is_restored_when_the_body_fails() {
        let restored = Cell::new(false);
        let res: Result<(), GuiError> = restore_then(Err(broken_pipe()), || {
            restored.set(true);
            Ok(())
        });
        assert!(restored.get());
        assert!(matches!(res, Err(GuiError::IOError(_))));
    }

    #[test]
    fn body_error_outranks_restore_error() {
        let res: Result<(), GuiError> = restore_then(Err(GuiError::NoPorts), || Err(broken_pipe()));
        assert!(matches!(res, Err(GuiError::NoPorts)));
    }

    #[test]
    fn restore_error_surfaces_after_a_clean_body() {
        let res = restore_then(Ok(7), || Err(broken_pipe()));
        assert!(matches!(res, Err(GuiError::IOError(_))));

        let res = restore_then(Ok(7), || Ok(()));
        assert!(matches!(res, Ok(7)));
    }
}
