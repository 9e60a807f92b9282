//! Nordic UART Service identifiers
use uuid::Uuid;

/// NUS service UUID
pub const NUS_SERVICE_UUID: Uuid = Uuid::from_u128(0x6e400001_b5a3_f393_e0a9_e50e24dcca9e);

/// Input characteristic, written by the host (device RX)
pub const NUS_INPUT_CHAR_UUID: Uuid = Uuid::from_u128(0x6e400002_b5a3_f393_e0a9_e50e24dcca9e);

/// Output characteristic, notified by the device (device TX)
pub const NUS_OUTPUT_CHAR_UUID: Uuid = Uuid::from_u128(0x6e400003_b5a3_f393_e0a9_e50e24dcca9e);
