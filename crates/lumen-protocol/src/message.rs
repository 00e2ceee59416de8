//! Open Pixel Control "set pixel colours" message
//!
//! ```text
//! byte 0      channel   (0 = broadcast, 1..=255 = one output)
//! byte 1      command   (0x00 = set pixel colours)
//! bytes 2..4  length    (big-endian u16, payload bytes = 3 × pixels)
//! bytes 4..   payload   (R, G, B) per pixel, in element order
//! ```

use crate::ProtocolError;
use crate::color::Rgba;
use bytes::{BufMut, BytesMut};

/// OPC header size in bytes
pub const HEADER_LEN: usize = 4;

/// Bytes per addressable element on the wire
pub const BYTES_PER_PIXEL: usize = 3;

/// Largest pixel count whose payload fits the u16 length field
pub const MAX_PIXELS: usize = u16::MAX as usize / BYTES_PER_PIXEL;

/// OPC channel addressing every output at once
pub const BROADCAST_CHANNEL: u8 = 0;

/// OPC command byte for pixel data
pub const CMD_SET_PIXEL_COLORS: u8 = 0x00;

/// One framed message for a single output channel.
///
/// The frame is kept in wire form so sending is a single write.
///
/// # Example
///
/// ```
/// use lumen_protocol::{DeviceMessage, Rgba};
///
/// let mut msg = DeviceMessage::new(1, 2).unwrap();
/// msg.set_pixel(0, Rgba::opaque(10, 20, 30)).unwrap();
/// msg.set_pixel(1, Rgba::new(255, 255, 255, 0)).unwrap();
///
/// assert_eq!(msg.as_bytes(), &[1, 0, 0, 6, 10, 20, 30, 0, 0, 0]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceMessage {
    frame: BytesMut,
}

impl DeviceMessage {
    /// Allocate a zeroed (all off) message for `pixels` elements.
    pub fn new(channel: u8, pixels: usize) -> Result<Self, ProtocolError> {
        if pixels > MAX_PIXELS {
            return Err(ProtocolError::TooManyPixels {
                count: pixels,
                max: MAX_PIXELS,
            });
        }

        let payload_len = pixels * BYTES_PER_PIXEL;
        let mut frame = BytesMut::with_capacity(HEADER_LEN + payload_len);
        frame.put_u8(channel);
        frame.put_u8(CMD_SET_PIXEL_COLORS);
        frame.put_u16(payload_len as u16);
        frame.put_bytes(0, payload_len);

        Ok(Self { frame })
    }

    /// Build a message from a colour buffer, applying the alpha-zero policy.
    pub fn from_buffer(channel: u8, pixels: &[Rgba]) -> Result<Self, ProtocolError> {
        let mut msg = Self::new(channel, pixels.len())?;
        for (index, color) in pixels.iter().enumerate() {
            msg.write_pixel(index, *color);
        }
        Ok(msg)
    }

    /// Decode a frame previously produced by [`DeviceMessage::as_bytes`].
    pub fn parse(raw: &[u8]) -> Result<Self, ProtocolError> {
        if raw.len() < HEADER_LEN {
            return Err(ProtocolError::Truncated {
                expected: HEADER_LEN,
                actual: raw.len(),
            });
        }

        let declared = u16::from_be_bytes([raw[2], raw[3]]) as usize;
        let actual = raw.len() - HEADER_LEN;
        if declared != actual {
            return Err(ProtocolError::LengthMismatch { declared, actual });
        }

        Ok(Self {
            frame: BytesMut::from(raw),
        })
    }

    pub fn channel(&self) -> u8 {
        self.frame[0]
    }

    pub fn command(&self) -> u8 {
        self.frame[1]
    }

    /// Declared payload length (bytes) from the header.
    pub fn payload_len(&self) -> usize {
        u16::from_be_bytes([self.frame[2], self.frame[3]]) as usize
    }

    pub fn pixel_count(&self) -> usize {
        self.payload_len() / BYTES_PER_PIXEL
    }

    /// A message without any pixels carries nothing a device can use.
    pub fn is_empty(&self) -> bool {
        self.pixel_count() == 0
    }

    /// Set one pixel; alpha 0 is written as black.
    pub fn set_pixel(&mut self, index: usize, color: Rgba) -> Result<(), ProtocolError> {
        let len = self.pixel_count();
        if index >= len {
            return Err(ProtocolError::PixelOutOfRange { index, len });
        }
        self.write_pixel(index, color);
        Ok(())
    }

    /// RGB triple at `index` as it will appear on the wire.
    pub fn pixel(&self, index: usize) -> Option<[u8; 3]> {
        if index >= self.pixel_count() {
            return None;
        }
        let start = HEADER_LEN + index * BYTES_PER_PIXEL;
        Some([
            self.frame[start],
            self.frame[start + 1],
            self.frame[start + 2],
        ])
    }

    pub fn payload(&self) -> &[u8] {
        &self.frame[HEADER_LEN..]
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.frame
    }

    fn write_pixel(&mut self, index: usize, color: Rgba) {
        let start = HEADER_LEN + index * BYTES_PER_PIXEL;
        self.frame[start..start + BYTES_PER_PIXEL].copy_from_slice(&color.to_wire());
    }
}
