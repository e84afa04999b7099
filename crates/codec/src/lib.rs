//! ## Overlay wire format
//!
//! Every frame exchanged between peers carries a fixed big-endian header
//! followed by a variable ASCII body:
//!
//! ```text
//!  _________________________________________________________________
//! | version (2 bytes) | type (2 bytes) |     length (4 bytes)       |
//! |-----------------------------------------------------------------|
//! |              source ip, four octets (2 bytes each)              |
//! |-----------------------------------------------------------------|
//! |                      source port (4 bytes)                      |
//! |-----------------------------------------------------------------|
//! |                       body (length bytes)                       |
//! |_________________________________________________________________|
//! ```
//!
//! The version is always 1. The type discriminates REGISTER (1),
//! ADVERTISE (2), JOIN (3), MESSAGE (4) and REUNION (5) frames, and the
//! length field counts the body bytes. The source address names the
//! *emitter* of the frame: peers rewrite it hop by hop when relaying, so
//! only reunion bodies carry end-to-end path information.
//!
//! Bodies are fixed-width ASCII with no separators. Addresses inside a
//! body always take their canonical 20-character text form: the ip as
//! four dot-joined three-digit octets, the port as five decimal digits.

pub mod address;
pub mod packet;

pub use self::{
    address::{ADDRESS_SIZE, Address},
    packet::{MAX_PATH_ENTRIES, Packet, PacketKind, Payload},
};

use std::{array::TryFromSliceError, str::Utf8Error};

/// Protocol version carried by every frame.
pub const VERSION: u16 = 1;

/// Encoded size of the fixed header.
pub const HEADER_SIZE: usize = 20;

#[derive(Debug)]
pub enum Error {
    InvalidInput,
    LengthMismatch,
    UnknownKind,
    BadAddress,
    BadBody,
    Utf8Error(Utf8Error),
    TryFromSliceError(TryFromSliceError),
}

impl std::error::Error for Error {}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl From<Utf8Error> for Error {
    fn from(value: Utf8Error) -> Self {
        Self::Utf8Error(value)
    }
}

impl From<TryFromSliceError> for Error {
    fn from(value: TryFromSliceError) -> Self {
        Self::TryFromSliceError(value)
    }
}

/// Total size of the frame starting at `bytes`, read from the header
/// alone. The transport uses this to split a byte stream back into
/// frames before decoding.
///
/// # Test
///
/// ```
/// use arbor_peer_codec::{frame_size, HEADER_SIZE};
///
/// let mut frame = vec![0u8; HEADER_SIZE];
/// frame[1] = 1; // version
/// frame[3] = 3; // JOIN
/// frame[7] = 4; // length
/// frame.extend_from_slice(b"JOIN");
///
/// assert_eq!(frame_size(&frame).unwrap(), frame.len());
/// ```
pub fn frame_size(bytes: &[u8]) -> Result<usize, Error> {
    if bytes.len() < 8 {
        return Err(Error::InvalidInput);
    }

    let length = u32::from_be_bytes(bytes[4..8].try_into()?) as usize;
    Ok(HEADER_SIZE + length)
}
