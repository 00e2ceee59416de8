//! # Lumen Protocol
//!
//! Open Pixel Control (OPC) wire format for LED output devices (no I/O).
//!
//! ## Modules
//!
//! - `color`: RGBA colour model and the "alpha zero means off" policy
//! - `message`: `DeviceMessage` framing (header + RGB triples)
//!
//! ## Byte order
//!
//! The OPC length field is big-endian (MSB first).

pub mod color;
pub mod message;

pub use color::{ChannelBuffer, Rgba};
pub use message::{
    BROADCAST_CHANNEL, BYTES_PER_PIXEL, CMD_SET_PIXEL_COLORS, DeviceMessage, HEADER_LEN,
    MAX_PIXELS,
};

use thiserror::Error;

/// Protocol layer error
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// The element count does not fit the 16-bit length field
    #[error("Too many pixels for one message: {count} (max {max})")]
    TooManyPixels { count: usize, max: usize },

    /// Pixel index outside the message
    #[error("Pixel index {index} out of range (message holds {len} pixels)")]
    PixelOutOfRange { index: usize, len: usize },

    /// Buffer shorter than the OPC header
    #[error("Truncated message: {actual} bytes, need at least {expected}")]
    Truncated { expected: usize, actual: usize },

    /// Header length does not match the payload that follows it
    #[error("Length mismatch: header says {declared} bytes, payload has {actual}")]
    LengthMismatch { declared: usize, actual: usize },
}
