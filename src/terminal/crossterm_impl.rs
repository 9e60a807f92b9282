use std::io;

use crossterm::terminal;
use tracing::info;

use crate::terminal::terminal_trait::{InputMode, ModeToken, TerminalMode};

/// Raw mode through crossterm.
/// `is_raw_mode_enabled` reports crossterm's own bookkeeping, not the live termios,
/// so a terminal made raw by another program reads as cooked here. Restoring is
/// still exact: crossterm saves the termios it found and puts that back.
/// A `Raw` token only comes from a raw mode this process entered through crossterm.
#[derive(Debug, Default)]
pub struct CrosstermTerminal;

impl TerminalMode for CrosstermTerminal {
    fn current_mode(&self) -> io::Result<InputMode> {
        if terminal::is_raw_mode_enabled()? {
            Ok(InputMode::Raw)
        } else {
            Ok(InputMode::Cooked)
        }
    }

    fn enter_raw(&self) -> io::Result<ModeToken> {
        let previous = self.current_mode()?;
        if previous == InputMode::Cooked {
            terminal::enable_raw_mode()?;
            info!("Terminal switched to raw mode");
        }
        Ok(ModeToken::new(previous))
    }

    fn restore(&self, token: ModeToken) -> io::Result<()> {
        if token.previous() == InputMode::Cooked {
            terminal::disable_raw_mode()?;
            info!("Terminal restored to cooked mode");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_token_restore_leaves_the_terminal_alone() {
        // No terminal call is made, so this holds without a tty
        assert!(CrosstermTerminal.restore(ModeToken::new(InputMode::Raw)).is_ok());
    }
}
