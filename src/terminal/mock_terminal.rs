//! Terminal test doubles
use std::collections::VecDeque;
use std::io::{self, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::terminal::terminal_trait::{InputMode, InputSource, ModeToken, TerminalMode};

/// Terminal that only tracks its mode
pub struct MockTerminal {
    mode: Mutex<InputMode>,
    acquisitions: AtomicUsize,
    restorations: AtomicUsize,
}

impl MockTerminal {
    pub fn new(mode: InputMode) -> Self {
        Self {
            mode: Mutex::new(mode),
            acquisitions: AtomicUsize::new(0),
            restorations: AtomicUsize::new(0),
        }
    }

    pub fn mode(&self) -> InputMode {
        *self.mode.lock().unwrap()
    }

    pub fn acquisitions(&self) -> usize {
        self.acquisitions.load(Ordering::SeqCst)
    }

    pub fn restorations(&self) -> usize {
        self.restorations.load(Ordering::SeqCst)
    }
}

impl TerminalMode for MockTerminal {
    fn current_mode(&self) -> io::Result<InputMode> {
        Ok(self.mode())
    }

    fn enter_raw(&self) -> io::Result<ModeToken> {
        self.acquisitions.fetch_add(1, Ordering::SeqCst);
        let mut mode = self.mode.lock().unwrap();
        let previous = *mode;
        *mode = InputMode::Raw;
        Ok(ModeToken::new(previous))
    }

    fn restore(&self, token: ModeToken) -> io::Result<()> {
        self.restorations.fetch_add(1, Ordering::SeqCst);
        *self.mode.lock().unwrap() = token.previous();
        Ok(())
    }
}

/// Input replaying fixed chunks
pub struct ScriptedInput {
    chunks: VecDeque<io::Result<Vec<u8>>>,
    /// Block forever once the script is exhausted instead of reporting EOF
    hold_open: bool,
}

impl ScriptedInput {
    pub fn new(chunks: Vec<Vec<u8>>) -> Self {
        Self {
            chunks: chunks.into_iter().map(Ok).collect(),
            hold_open: false,
        }
    }

    pub fn failing(error: io::ErrorKind) -> Self {
        let mut chunks = VecDeque::new();
        chunks.push_back(Err(io::Error::new(error, "scripted failure")));
        Self {
            chunks,
            hold_open: false,
        }
    }

    pub fn hold_open(mut self) -> Self {
        self.hold_open = true;
        self
    }
}

#[async_trait]
impl InputSource for ScriptedInput {
    async fn read_chunk(&mut self) -> io::Result<Option<Vec<u8>>> {
        match self.chunks.pop_front() {
            Some(chunk) => chunk.map(Some),
            None if self.hold_open => std::future::pending().await,
            None => Ok(None),
        }
    }
}

/// In-memory writer shared between the console and the test
#[derive(Clone, Default)]
pub struct SharedBuffer {
    data: Arc<Mutex<Vec<u8>>>,
    flushes: Arc<AtomicUsize>,
}

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.data.lock().unwrap()).into_owned()
    }

    pub fn flushes(&self) -> usize {
        self.flushes.load(Ordering::SeqCst)
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.data.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.flushes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
