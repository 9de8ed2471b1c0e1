use std::fmt;

use bytes::{BufMut, BytesMut};

use crate::error::{FrameError, Result};

/// Frame header: type (1) + channel id (2) + payload length (4) = 7 bytes.
pub const HEADER_SIZE: usize = 7;

/// Largest payload a single frame can declare.
pub const MAX_PAYLOAD_LEN: usize = u32::MAX as usize;

/// The kinds of frame the protocol defines.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameType {
    /// Channel data; followed by `payload_len` bytes.
    Payload = 0,
    /// Request for a new channel. Carries no id and no payload.
    Open = 1,
    /// Answer to an OPEN, carrying the id the responder assigned.
    Accepted = 2,
}

impl FrameType {
    /// Wire value of this frame type.
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for FrameType {
    type Error = FrameError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(FrameType::Payload),
            1 => Ok(FrameType::Open),
            2 => Ok(FrameType::Accepted),
            other => Err(FrameError::UnknownFrameType(other)),
        }
    }
}

impl fmt::Display for FrameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FrameType::Payload => "PAYLOAD",
            FrameType::Open => "OPEN",
            FrameType::Accepted => "ACCEPTED",
        })
    }
}

/// A frame header in its wire form.
///
/// Wire format:
/// ```text
/// ┌──────────┬──────────────┬──────────────────┐
/// │ Type     │ Channel id   │ Payload length   │
/// │ (1B)     │ (2B BE)      │ (4B BE)          │
/// └──────────┴──────────────┴──────────────────┘
/// ```
///
/// The type byte is stored as received; [`Header::frame_type`] is the
/// fallible view used when dispatching.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Header([u8; HEADER_SIZE]);

impl Header {
    /// Build a header for a known frame type.
    pub fn new(frame_type: FrameType, channel_id: u16, payload_len: u32) -> Self {
        Self::from_raw(frame_type.as_u8(), channel_id, payload_len)
    }

    /// Build a header from a raw type byte, defined or not.
    pub fn from_raw(raw_type: u8, channel_id: u16, payload_len: u32) -> Self {
        let mut bytes = [0u8; HEADER_SIZE];
        let mut dst = &mut bytes[..];
        dst.put_u8(raw_type);
        dst.put_u16(channel_id);
        dst.put_u32(payload_len);
        Self(bytes)
    }

    /// Header of a PAYLOAD frame.
    pub fn payload(channel_id: u16, payload_len: u32) -> Self {
        Self::new(FrameType::Payload, channel_id, payload_len)
    }

    /// Header of an OPEN frame.
    pub fn open() -> Self {
        Self::new(FrameType::Open, 0, 0)
    }

    /// Header of an ACCEPTED frame assigning `channel_id`.
    pub fn accepted(channel_id: u16) -> Self {
        Self::new(FrameType::Accepted, channel_id, 0)
    }

    /// Reinterpret seven wire bytes as a header.
    pub fn from_bytes(bytes: [u8; HEADER_SIZE]) -> Self {
        Self(bytes)
    }

    /// The header's wire bytes.
    pub fn as_bytes(&self) -> &[u8; HEADER_SIZE] {
        &self.0
    }

    /// The type byte exactly as it appears on the wire.
    pub fn raw_type(&self) -> u8 {
        self.0[0]
    }

    /// The frame type, if the type byte is one the protocol defines.
    pub fn frame_type(&self) -> Result<FrameType> {
        FrameType::try_from(self.raw_type())
    }

    pub fn channel_id(&self) -> u16 {
        u16::from_be_bytes([self.0[1], self.0[2]])
    }

    pub fn payload_len(&self) -> u32 {
        u32::from_be_bytes([self.0[3], self.0[4], self.0[5], self.0[6]])
    }

    /// Append the header to `dst`.
    pub fn encode(&self, dst: &mut BytesMut) {
        dst.put_slice(&self.0);
    }
}

impl fmt::Debug for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut dbg = f.debug_struct("Header");
        match self.frame_type() {
            Ok(frame_type) => dbg.field("type", &frame_type),
            Err(_) => dbg.field("type", &format_args!("unknown({})", self.raw_type())),
        };
        dbg.field("channel_id", &self.channel_id())
            .field("payload_len", &self.payload_len())
            .finish()
    }
}

/// Append a complete PAYLOAD frame (header, then `payload`) to `dst`.
pub fn encode_frame(channel_id: u16, payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    if payload.len() > MAX_PAYLOAD_LEN {
        return Err(FrameError::PayloadTooLarge {
            size: payload.len(),
            max: MAX_PAYLOAD_LEN,
        });
    }
    dst.reserve(HEADER_SIZE + payload.len());
    Header::payload(channel_id, payload.len() as u32).encode(dst);
    dst.put_slice(payload);
    Ok(())
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use rstest::rstest;

    use super::*;

    const ALL_TYPES: [FrameType; 3] = [FrameType::Payload, FrameType::Open, FrameType::Accepted];

    #[rstest]
    #[case(FrameType::Payload, 0x0102, 0x0304_0506, [0, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06])]
    #[case(FrameType::Open, 0, 0, [1, 0, 0, 0, 0, 0, 0])]
    #[case(FrameType::Accepted, 0xFFFF, 0, [2, 0xFF, 0xFF, 0, 0, 0, 0])]
    #[case(FrameType::Payload, 7, u32::MAX, [0, 0, 7, 0xFF, 0xFF, 0xFF, 0xFF])]
    fn wire_layout_is_big_endian(
        #[case] frame_type: FrameType,
        #[case] id: u16,
        #[case] len: u32,
        #[case] expected: [u8; HEADER_SIZE],
    ) {
        let header = Header::new(frame_type, id, len);
        assert_eq!(header.as_bytes(), &expected);
    }

    #[test]
    fn every_type_and_id_round_trips() {
        let lengths = [0u32, 1, 1024, 65_536, 1 << 31, u32::MAX];
        for frame_type in ALL_TYPES {
            for id in 0..=u16::MAX {
                for len in lengths {
                    let decoded = Header::from_bytes(*Header::new(frame_type, id, len).as_bytes());
                    assert_eq!(decoded.frame_type().unwrap(), frame_type);
                    assert_eq!(decoded.channel_id(), id);
                    assert_eq!(decoded.payload_len(), len);
                }
            }
        }
    }

    proptest! {
        #[test]
        fn arbitrary_fields_round_trip(raw_type in any::<u8>(), id in any::<u16>(), len in any::<u32>()) {
            let header = Header::from_raw(raw_type, id, len);
            let decoded = Header::from_bytes(*header.as_bytes());
            prop_assert_eq!(decoded.raw_type(), raw_type);
            prop_assert_eq!(decoded.channel_id(), id);
            prop_assert_eq!(decoded.payload_len(), len);
        }
    }

    #[test]
    fn unknown_type_is_preserved_but_rejected() {
        let header = Header::from_raw(9, 3, 0);
        assert_eq!(header.raw_type(), 9);
        assert!(matches!(
            header.frame_type(),
            Err(FrameError::UnknownFrameType(9))
        ));
        assert!(format!("{header:?}").contains("unknown(9)"));
    }

    #[test]
    fn control_constructors() {
        assert_eq!(Header::open().frame_type().unwrap(), FrameType::Open);
        assert_eq!(Header::open().payload_len(), 0);

        let accepted = Header::accepted(41);
        assert_eq!(accepted.frame_type().unwrap(), FrameType::Accepted);
        assert_eq!(accepted.channel_id(), 41);
        assert_eq!(accepted.payload_len(), 0);
    }

    #[test]
    fn encode_frame_appends_header_and_payload() {
        let mut buf = BytesMut::new();
        encode_frame(5, b"hello", &mut buf).unwrap();
        encode_frame(6, b"", &mut buf).unwrap();

        assert_eq!(buf.len(), 2 * HEADER_SIZE + 5);
        let first = Header::from_bytes(buf[..HEADER_SIZE].try_into().unwrap());
        assert_eq!(first.frame_type().unwrap(), FrameType::Payload);
        assert_eq!(first.channel_id(), 5);
        assert_eq!(first.payload_len(), 5);
        assert_eq!(&buf[HEADER_SIZE..HEADER_SIZE + 5], b"hello");

        let second = Header::from_bytes(buf[HEADER_SIZE + 5..].try_into().unwrap());
        assert_eq!(second.channel_id(), 6);
        assert_eq!(second.payload_len(), 0);
    }

    #[test]
    fn frame_type_display_names() {
        assert_eq!(FrameType::Payload.to_string(), "PAYLOAD");
        assert_eq!(FrameType::Open.to_string(), "OPEN");
        assert_eq!(FrameType::Accepted.to_string(), "ACCEPTED");
    }
}
