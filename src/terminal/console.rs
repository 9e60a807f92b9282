//! Shared console output.
//! Notification output and the relay's own messages go through one lock,
//! so a payload write and a diagnostic line never interleave.
use std::io::{self, Write};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

struct Streams {
    out: Box<dyn Write + Send>,
    err: Box<dyn Write + Send>,
}

/// Cloneable handle to the process console
#[derive(Clone)]
pub struct Console {
    streams: Arc<Mutex<Streams>>,
}

impl Console {
    pub fn new(out: Box<dyn Write + Send>, err: Box<dyn Write + Send>) -> Self {
        Self {
            streams: Arc::new(Mutex::new(Streams { out, err })),
        }
    }

    /// Console bound to the process stdout and stderr
    pub fn stdio() -> Self {
        Self::new(Box::new(io::stdout()), Box::new(io::stderr()))
    }

    fn lock(&self) -> MutexGuard<'_, Streams> {
        self.streams.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Write device output and flush it immediately
    pub fn write_output(&self, data: &[u8]) -> io::Result<()> {
        let mut streams = self.lock();
        streams.out.write_all(data)?;
        streams.out.flush()
    }

    /// Progress text without a line break, e.g. "Connecting... "
    pub fn progress(&self, message: &str) -> io::Result<()> {
        let mut streams = self.lock();
        write!(streams.out, "{}", message)?;
        streams.out.flush()
    }

    /// A complete status line on stdout
    pub fn status(&self, message: &str) -> io::Result<()> {
        let mut streams = self.lock();
        writeln!(streams.out, "{}", message)?;
        streams.out.flush()
    }

    /// A diagnostic line on stderr
    pub fn diagnostic(&self, message: &str) -> io::Result<()> {
        let mut streams = self.lock();
        streams.out.flush()?;
        writeln!(streams.err, "{}", message)?;
        streams.err.flush()
    }
}
