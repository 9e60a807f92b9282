//! Delivers device notifications to the console.
//! Runs as its own task fed by the transport's notification channel.
use std::io;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, trace};

use crate::ble::NotificationReceiver;
use crate::terminal::Console;

/// Expand every LF into CR LF; raw mode does not do it for us
pub fn expand_line_endings(payload: &[u8]) -> Vec<u8> {
    let mut expanded = Vec::with_capacity(payload.len() + payload.len() / 8);
    for &byte in payload {
        if byte == b'\n' {
            expanded.push(b'\r');
        }
        expanded.push(byte);
    }
    expanded
}

pub struct NotificationSink {
    console: Console,
}

impl NotificationSink {
    pub fn new(console: Console) -> Self {
        Self { console }
    }

    /// Handle one notification payload.
    /// Each payload is decoded on its own, so a UTF-8 sequence split across
    /// two notifications shows up as replacement characters.
    pub fn on_notify(&self, payload: &[u8]) -> io::Result<()> {
        trace!("Notification of {} bytes", payload.len());
        let expanded = expand_line_endings(payload);
        let text = String::from_utf8_lossy(&expanded);
        self.console.write_output(text.as_bytes())
    }

    /// Consume notifications until the channel closes or the handle is finished
    pub fn spawn(self, mut notifications: NotificationReceiver) -> SinkHandle {
        let (stop, mut stopped) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    payload = notifications.recv() => {
                        let Some(payload) = payload else { break };
                        if let Err(e) = self.on_notify(&payload) {
                            error!("Failed to write notification to console: {}", e);
                            return;
                        }
                    }
                    _ = &mut stopped => {
                        self.drain(&mut notifications);
                        break;
                    }
                }
            }
            debug!("Notification sink finished");
        });
        SinkHandle { stop, task }
    }

    /// Write whatever is already queued without waiting for more
    fn drain(&self, notifications: &mut NotificationReceiver) {
        let mut drained = 0usize;
        while let Ok(payload) = notifications.try_recv() {
            if let Err(e) = self.on_notify(&payload) {
                error!("Failed to write notification to console: {}", e);
                return;
            }
            drained += 1;
        }
        debug!("Drained {} queued notifications", drained);
    }
}

/// Running sink task
pub struct SinkHandle {
    stop: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl SinkHandle {
    /// Flush queued notifications to the console and wait for the task to end
    pub async fn finish(self) {
        // The task may already be gone if the channel closed
        let _ = self.stop.send(());
        if let Err(e) = self.task.await {
            if !e.is_cancelled() {
                error!("Notification sink task failed: {}", e);
            }
        }
    }
}
