// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Message formats and frame validation.
//!
//! A ring carries either fixed-size messages (raw payload bytes, no header) or
//! length-prefixed frames:
//!
//! ```text
//! [length: u32 LE][crc32: u32 LE][payload ...][pad to 8 bytes]
//! ```
//!
//! Frames are validated with CRC32 at every read.

use crate::error::ChannelError;

/// Frame header size in bytes (length + checksum).
pub const FRAME_HEADER_SIZE: usize = 8;

/// Alignment for frames (8 bytes).
pub const FRAME_ALIGNMENT: usize = 8;

/// How payloads are laid out in the data area.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageFormat {
    /// Every message is exactly this many bytes.
    Fixed(usize),
    /// Variable-length payloads with a length and checksum prefix.
    Framed,
}

impl MessageFormat {
    /// Check the format can be carried by a ring of `capacity` bytes.
    pub fn validate(&self, capacity: usize) -> Result<(), ChannelError> {
        match *self {
            Self::Fixed(size) if size == 0 || size > capacity => Err(ChannelError::InvalidLength {
                len: size,
                reason: format!("Fixed message size must be between 1 and {}", capacity),
            }),
            Self::Framed if max_framed_payload(capacity) == 0 => {
                Err(ChannelError::InvalidLength {
                    len: capacity,
                    reason: "Capacity too small for a single frame".to_string(),
                })
            }
            _ => Ok(()),
        }
    }

    /// Number of ring bytes a payload of `len` bytes occupies.
    ///
    /// Fails with `InvalidLength` when the payload breaks the size contract.
    pub fn encoded_len(&self, len: usize, capacity: usize) -> Result<usize, ChannelError> {
        match *self {
            Self::Fixed(size) => {
                if len != size {
                    return Err(ChannelError::InvalidLength {
                        len,
                        reason: format!("Fixed-size channel expects {} bytes", size),
                    });
                }
                Ok(size)
            }
            Self::Framed => {
                let max = max_framed_payload(capacity);
                if len == 0 || len > max {
                    return Err(ChannelError::InvalidLength {
                        len,
                        reason: format!("Framed payload must be between 1 and {} bytes", max),
                    });
                }
                Ok(frame_len(len))
            }
        }
    }
}

impl std::fmt::Display for MessageFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fixed(size) => write!(f, "fixed({} bytes)", size),
            Self::Framed => write!(f, "framed"),
        }
    }
}

/// Header preceding every framed payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Length of the payload in bytes.
    pub length: u32,
    /// CRC32 checksum of the payload.
    pub checksum: u32,
}

impl FrameHeader {
    pub fn for_payload(payload: &[u8]) -> Self {
        Self {
            length: payload.len() as u32,
            checksum: calculate_checksum(payload),
        }
    }

    pub fn encode(&self) -> [u8; FRAME_HEADER_SIZE] {
        let mut bytes = [0u8; FRAME_HEADER_SIZE];
        bytes[..4].copy_from_slice(&self.length.to_le_bytes());
        bytes[4..].copy_from_slice(&self.checksum.to_le_bytes());
        bytes
    }

    pub fn decode(bytes: [u8; FRAME_HEADER_SIZE]) -> Self {
        let [l0, l1, l2, l3, c0, c1, c2, c3] = bytes;
        Self {
            length: u32::from_le_bytes([l0, l1, l2, l3]),
            checksum: u32::from_le_bytes([c0, c1, c2, c3]),
        }
    }

    /// Ring bytes this frame occupies, header and padding included.
    pub fn frame_len(&self) -> usize {
        frame_len(self.length as usize)
    }
}

/// Total aligned size of a frame carrying `payload_len` bytes.
pub const fn frame_len(payload_len: usize) -> usize {
    align_up(FRAME_HEADER_SIZE + payload_len, FRAME_ALIGNMENT)
}

/// Largest payload a framed ring of `capacity` bytes accepts.
pub fn max_framed_payload(capacity: usize) -> usize {
    let usable = capacity & !(FRAME_ALIGNMENT - 1);
    usable
        .saturating_sub(FRAME_HEADER_SIZE)
        .min(u32::MAX as usize)
}

/// Calculate CRC32 checksum for a payload.
pub fn calculate_checksum(payload: &[u8]) -> u32 {
    crc32fast::hash(payload)
}

/// Validate a payload after reading.
///
/// Fails on mismatch; the caller decides whether the frame is skipped.
pub fn validate_checksum(payload: &[u8], expected: u32) -> Result<(), ChannelError> {
    let actual = calculate_checksum(payload);

    if actual != expected {
        return Err(ChannelError::ChecksumMismatch { expected, actual });
    }

    Ok(())
}

/// Align value up to the given alignment.
const fn align_up(value: usize, alignment: usize) -> usize {
    (value + alignment - 1) & !(alignment - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_align_up() {
        assert_eq!(align_up(1, 8), 8);
        assert_eq!(align_up(8, 8), 8);
        assert_eq!(align_up(9, 8), 16);
        assert_eq!(align_up(0, 8), 0);
    }

    #[test]
    fn test_frame_len_includes_header_and_padding() {
        assert_eq!(frame_len(1), 16);
        assert_eq!(frame_len(8), 16);
        assert_eq!(frame_len(9), 24);
        assert_eq!(frame_len(100), 112);
    }

    #[test]
    fn test_fixed_format_rejects_wrong_length() {
        let format = MessageFormat::Fixed(100);
        assert_eq!(format.encoded_len(100, 1024).unwrap(), 100);
        assert!(matches!(
            format.encoded_len(99, 1024),
            Err(ChannelError::InvalidLength { len: 99, .. })
        ));
    }

    #[test]
    fn test_framed_format_bounds() {
        let format = MessageFormat::Framed;
        assert!(format.encoded_len(0, 1024).is_err());
        assert_eq!(format.encoded_len(1016, 1024).unwrap(), 1024);
        assert!(format.encoded_len(1017, 1024).is_err());
    }

    #[test]
    fn test_format_validate() {
        assert!(MessageFormat::Fixed(0).validate(1024).is_err());
        assert!(MessageFormat::Fixed(1025).validate(1024).is_err());
        assert!(MessageFormat::Fixed(1024).validate(1024).is_ok());
        assert!(MessageFormat::Framed.validate(64).is_ok());
    }

    #[test]
    fn test_frame_header_codec() {
        let header = FrameHeader::for_payload(b"hello world");
        let decoded = FrameHeader::decode(header.encode());
        assert_eq!(decoded, header);
        assert_eq!(decoded.length, 11);
        assert_eq!(decoded.frame_len(), 24);
    }

    #[test]
    fn test_checksum_validation() {
        let payload = b"test payload";
        let checksum = calculate_checksum(payload);
        assert!(validate_checksum(payload, checksum).is_ok());
        assert!(matches!(
            validate_checksum(payload, checksum ^ 1),
            Err(ChannelError::ChecksumMismatch { .. })
        ));
    }
}
