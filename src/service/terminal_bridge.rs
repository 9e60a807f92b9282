//! Terminal bridge: keystrokes from the local terminal to the device input characteristic
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{error, info, trace, warn};

use crate::ble::GattCharacteristic;
use crate::service::{RelayError, SessionState};
use crate::terminal::{Console, InputSource, RawModeGuard, TerminalMode};

/// Ctrl-X, read on its own, ends the session
pub const EXIT_BYTE: u8 = 0x18;

/// Printed on stderr when the device goes away mid-session
pub const LOST_CONNECTION_MESSAGE: &str = "lost connection";

/// Why the relay loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// Ctrl-X was typed
    UserExit,
    /// The link to the device dropped
    LinkLost,
    /// Standard input reached end of file
    InputClosed,
}

/// Raw mode sends CR for Enter; map stray LFs the same way
pub fn translate_input(chunk: &[u8]) -> Vec<u8> {
    chunk
        .iter()
        .map(|&b| if b == b'\n' { b'\r' } else { b })
        .collect()
}

/// Only a chunk consisting of exactly the exit byte counts.
/// Ctrl-X arriving in the same read as other keys is forwarded like any other byte.
pub fn is_exit_chunk(chunk: &[u8]) -> bool {
    matches!(chunk, [EXIT_BYTE])
}

pub struct TerminalBridge {
    terminal: Arc<dyn TerminalMode>,
    console: Console,
}

impl TerminalBridge {
    pub fn new(terminal: Arc<dyn TerminalMode>, console: Console) -> Self {
        Self { terminal, console }
    }

    /// Relay keystrokes to `target` inside a raw mode scope.
    /// The previous terminal mode is restored before this returns, on every path.
    pub async fn run(
        &self,
        input: &mut dyn InputSource,
        target: &dyn GattCharacteristic,
        link: watch::Receiver<SessionState>,
    ) -> Result<ExitReason, RelayError> {
        let guard = RawModeGuard::acquire(self.terminal.clone())?;
        info!("Terminal bridge started, Ctrl-X to exit");

        let outcome = Self::pump(input, target, link).await;
        let restored = guard.release();

        if matches!(outcome, Ok(ExitReason::LinkLost)) {
            self.console.diagnostic(LOST_CONNECTION_MESSAGE)?;
        }
        if let Err(e) = restored {
            error!("Failed to restore terminal mode: {}", e);
            if outcome.is_ok() {
                return Err(e.into());
            }
        }
        if let Ok(reason) = &outcome {
            info!("Terminal bridge finished: {:?}", reason);
        }
        outcome
    }

    async fn pump(
        input: &mut dyn InputSource,
        target: &dyn GattCharacteristic,
        mut link: watch::Receiver<SessionState>,
    ) -> Result<ExitReason, RelayError> {
        loop {
            let chunk = tokio::select! {
                biased;
                _ = link_lost(&mut link) => {
                    warn!("Session lost while waiting for input");
                    return Ok(ExitReason::LinkLost);
                }
                chunk = input.read_chunk() => chunk?,
            };

            let Some(chunk) = chunk else {
                info!("Input closed");
                return Ok(ExitReason::InputClosed);
            };

            let chunk = translate_input(&chunk);
            if is_exit_chunk(&chunk) {
                info!("Exit requested");
                return Ok(ExitReason::UserExit);
            }

            match target.write(&chunk).await {
                Ok(()) => trace!("Forwarded {} bytes", chunk.len()),
                Err(e) if e.is_link_lost() => {
                    warn!("Write failed, link lost: {}", e);
                    return Ok(ExitReason::LinkLost);
                }
                Err(e) => {
                    error!("Write to device failed: {}", e);
                    return Err(e.into());
                }
            }
        }
    }
}

/// Resolves when the session reports `Lost`; never resolves if the session is gone
async fn link_lost(link: &mut watch::Receiver<SessionState>) {
    if link.wait_for(|s| *s == SessionState::Lost).await.is_err() {
        std::future::pending::<()>().await;
    }
}
