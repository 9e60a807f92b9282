use std::io;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error};

// ================ Terminal mode ================

/// Input discipline of the controlling terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    /// Line buffered and echoed
    Cooked,
    /// Unbuffered, unechoed, byte at a time
    Raw,
}

/// The mode that was in effect before raw mode was requested.
/// Consumed by `TerminalMode::restore`, so it can only be used once.
#[derive(Debug)]
#[must_use = "the token is needed to restore the terminal"]
pub struct ModeToken {
    previous: InputMode,
}

impl ModeToken {
    pub fn new(previous: InputMode) -> Self {
        Self { previous }
    }

    pub fn previous(&self) -> InputMode {
        self.previous
    }
}

/// Access to the host terminal's input mode
pub trait TerminalMode: Send + Sync {
    fn current_mode(&self) -> io::Result<InputMode>;

    /// Switch to raw mode, returning what to restore later
    fn enter_raw(&self) -> io::Result<ModeToken>;

    /// Put the terminal back into the mode captured by `token`
    fn restore(&self, token: ModeToken) -> io::Result<()>;
}

/// Raw mode scope. The captured mode is restored by `release`,
/// or on drop if the scope is left any other way.
pub struct RawModeGuard {
    terminal: Arc<dyn TerminalMode>,
    token: Option<ModeToken>,
}

impl RawModeGuard {
    pub fn acquire(terminal: Arc<dyn TerminalMode>) -> io::Result<Self> {
        let token = terminal.enter_raw()?;
        debug!("Raw mode acquired (previous mode: {:?})", token.previous());
        Ok(Self {
            terminal,
            token: Some(token),
        })
    }

    /// Restore the captured mode and report the outcome
    pub fn release(mut self) -> io::Result<()> {
        match self.token.take() {
            Some(token) => {
                debug!("Restoring terminal mode {:?}", token.previous());
                self.terminal.restore(token)
            }
            None => Ok(()),
        }
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        if let Some(token) = self.token.take() {
            if let Err(e) = self.terminal.restore(token) {
                error!("Failed to restore terminal mode: {}", e);
            }
        }
    }
}

// ================ Keyboard input ================

/// Source of raw keystrokes
#[async_trait]
pub trait InputSource: Send {
    /// Next chunk of input, `None` once the input is closed
    async fn read_chunk(&mut self) -> io::Result<Option<Vec<u8>>>;
}
