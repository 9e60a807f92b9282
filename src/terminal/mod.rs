//! Host terminal handling: raw mode, keyboard input and the shared console

mod console;
mod crossterm_impl;
#[cfg(test)]
pub mod mock_terminal;
mod stdin_source;
mod terminal_trait;

pub use console::Console;
pub use crossterm_impl::CrosstermTerminal;
pub use stdin_source::{READ_CHUNK_SIZE, StdinSource};
pub use terminal_trait::*;
