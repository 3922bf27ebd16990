//! Sensorhub wire protocol - framing, GATT commands, relay and uplink packets
//!
//! GATT writes carry `[u32 length LE][BleSendPacket]`. Responses are drained
//! as a 4 byte little-endian length followed by at most [`GATT_CHUNK_LEN`]
//! bytes per read.

pub mod backend;
pub mod ble;
pub mod packet;

pub use backend::*;
pub use packet::*;

/// Bytes in the length prefix of every frame
pub const LENGTH_PREFIX_LEN: usize = 4;

/// GATT read budget in the reference deployment
pub const GATT_CHUNK_LEN: usize = 126;

/// Cap on sensor and value lists in one relay packet
pub const MAX_LIST_ENTRIES: usize = 64;

/// Largest payload a frame may declare
pub const MAX_FRAME_LEN: usize = 64 * 1024;

/// Fixed width of an address field, NUL terminator included
pub const ADDRESS_FIELD_WIDTH: usize = 21;

#[derive(thiserror::Error, Debug)]
pub enum ProtoError {
    #[error("protobuf decode failed: {0}")]
    Decode(#[from] prost::DecodeError),
    #[error("protobuf encode failed: {0}")]
    Encode(#[from] prost::EncodeError),
    #[error("envelope carries no known command")]
    EmptyEnvelope,
    #[error("unknown device type {0}")]
    UnknownDeviceType(i32),
    #[error("unknown measure type {0}")]
    UnknownMeasureType(i32),
    #[error("required field {0} missing")]
    MissingField(&'static str),
    #[error("malformed sensor reading: {0}")]
    InvalidReading(String),
    #[error("frame needs 4 length bytes, got {0}")]
    FrameTooShort(usize),
    #[error("frame declares {0} bytes, over the 64 KiB limit")]
    FrameTooLarge(usize),
    #[error("{0} carries {1} entries, over the 64 entry limit")]
    TooManyEntries(&'static str, usize),
}

/// Little-endian length prefix for a payload
pub fn length_prefix(len: usize) -> [u8; LENGTH_PREFIX_LEN] {
    (len as u32).to_le_bytes()
}

/// Prefix `payload` with its length
pub fn encode_frame(payload: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(LENGTH_PREFIX_LEN + payload.len());
    buf.extend_from_slice(&length_prefix(payload.len()));
    buf.extend_from_slice(payload);
    buf
}

/// Read the declared payload length from the start of `data`
pub fn parse_length_prefix(data: &[u8]) -> Result<usize, ProtoError> {
    let prefix: [u8; LENGTH_PREFIX_LEN] = data
        .get(..LENGTH_PREFIX_LEN)
        .and_then(|b| b.try_into().ok())
        .ok_or(ProtoError::FrameTooShort(data.len()))?;
    Ok(u32::from_le_bytes(prefix) as usize)
}

/// BLE address squeezed into the fixed-width wire field.
///
/// Longer addresses are cut at a character boundary so the field always
/// keeps a trailing NUL.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct AddressField([u8; ADDRESS_FIELD_WIDTH]);

impl AddressField {
    pub fn new(address: &str) -> Self {
        let mut end = address.len().min(ADDRESS_FIELD_WIDTH - 1);
        while !address.is_char_boundary(end) {
            end -= 1;
        }
        let mut field = [0u8; ADDRESS_FIELD_WIDTH];
        field[..end].copy_from_slice(&address.as_bytes()[..end]);
        Self(field)
    }

    pub fn as_str(&self) -> &str {
        let len = self.0.iter().position(|b| *b == 0).unwrap_or(ADDRESS_FIELD_WIDTH);
        // `new` only ever copies whole characters
        std::str::from_utf8(&self.0[..len]).unwrap_or_default()
    }
}

impl std::fmt::Debug for AddressField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AddressField({:?})", self.as_str())
    }
}

/// Address as it should be written into a wire string field
pub fn bounded_address(address: &str) -> String {
    AddressField::new(address).as_str().to_string()
}
