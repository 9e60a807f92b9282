//! Blocking stdin reader
use std::io::{self, Read};
use std::thread;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, error};

use crate::terminal::terminal_trait::InputSource;

/// Largest chunk handed to the relay per read
pub const READ_CHUNK_SIZE: usize = 20;

/// Reads stdin on a dedicated thread so the blocking read never stalls the runtime.
/// The thread is started on the first read, after raw mode is in place.
#[derive(Default)]
pub struct StdinSource {
    chunks: Option<mpsc::Receiver<io::Result<Vec<u8>>>>,
}

impl StdinSource {
    pub fn new() -> Self {
        Self::default()
    }

    fn start(&mut self) -> io::Result<&mut mpsc::Receiver<io::Result<Vec<u8>>>> {
        if self.chunks.is_none() {
            let (tx, rx) = mpsc::channel(1);
            thread::Builder::new()
                .name("stdin-reader".to_string())
                .spawn(move || read_stdin(tx))?;
            self.chunks = Some(rx);
        }
        // The receiver was installed just above when missing
        self.chunks
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "stdin reader not running"))
    }
}

fn read_stdin(tx: mpsc::Sender<io::Result<Vec<u8>>>) {
    let mut stdin = io::stdin().lock();
    let mut buffer = [0u8; READ_CHUNK_SIZE];
    loop {
        match stdin.read(&mut buffer) {
            Ok(0) => {
                debug!("stdin reached end of input");
                return;
            }
            Ok(n) => {
                if tx.blocking_send(Ok(buffer[..n].to_vec())).is_err() {
                    return;
                }
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                error!("Failed to read stdin: {}", e);
                let _ = tx.blocking_send(Err(e));
                return;
            }
        }
    }
}

#[async_trait]
impl InputSource for StdinSource {
    async fn read_chunk(&mut self) -> io::Result<Option<Vec<u8>>> {
        let chunks = self.start()?;
        match chunks.recv().await {
            Some(Ok(chunk)) => Ok(Some(chunk)),
            Some(Err(e)) => Err(e),
            None => Ok(None),
        }
    }
}
