/// Service layer for the NUS console relay
/// Locating the device, driving the session, and moving bytes between
/// the terminal and the device live in separate modules
mod device_locator;
mod error;
mod notification_sink;
mod relay;
mod session_manager;
mod terminal_bridge;

// Re-export public types and functions
pub use device_locator::{DeviceFilter, DeviceLocator, ScanSession};
pub use error::RelayError;
pub use notification_sink::{NotificationSink, SinkHandle, expand_line_endings};
pub use relay::{RelayOptions, run_session};
pub use session_manager::{ReadySession, SessionManager, SessionState};
pub use terminal_bridge::{
    EXIT_BYTE, ExitReason, LOST_CONNECTION_MESSAGE, TerminalBridge, is_exit_chunk, translate_input,
};
