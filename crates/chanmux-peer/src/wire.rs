//! Typed values on a byte stream.
//!
//! Every value except a bare `u32` travels as a big-endian `u32` length
//! followed by that many bytes. Strings are UTF-8; JSON values are
//! `serde_json` documents inside such a byte block.

use std::io::{Read, Write};

use bytes::{BufMut, BytesMut};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{PeerError, Result};

/// Largest length prefix the readers accept by default (16 MiB).
pub const DEFAULT_MAX_WIRE_LEN: usize = 16 * 1024 * 1024;

const LEN_PREFIX_SIZE: usize = 4;

/// Reading typed values. Implemented for every [`Read`].
pub trait WireRead: Read {
    fn read_u32(&mut self) -> Result<u32> {
        let mut buf = [0u8; LEN_PREFIX_SIZE];
        self.read_exact(&mut buf)?;
        Ok(u32::from_be_bytes(buf))
    }

    /// Read a length-prefixed byte block of at most [`DEFAULT_MAX_WIRE_LEN`].
    fn read_bytes(&mut self) -> Result<Vec<u8>> {
        self.read_bytes_limited(DEFAULT_MAX_WIRE_LEN)
    }

    /// Read a length-prefixed byte block, rejecting prefixes above `max`
    /// before allocating.
    fn read_bytes_limited(&mut self, max: usize) -> Result<Vec<u8>> {
        let len = self.read_u32()? as usize;
        if len > max {
            return Err(PeerError::PayloadTooLarge { size: len, max });
        }
        let mut buf = vec![0u8; len];
        self.read_exact(&mut buf)?;
        Ok(buf)
    }

    fn read_string(&mut self) -> Result<String> {
        Ok(String::from_utf8(self.read_bytes()?)?)
    }

    fn read_json<T: DeserializeOwned>(&mut self) -> Result<T> {
        let bytes = self.read_bytes()?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

impl<R: Read + ?Sized> WireRead for R {}

/// Writing typed values. Implemented for every [`Write`].
pub trait WireWrite: Write {
    fn write_u32(&mut self, value: u32) -> Result<()> {
        self.write_all(&value.to_be_bytes())?;
        Ok(())
    }

    /// Write a length-prefixed byte block. Prefix and bytes go out in one
    /// write, so on a channel they never straddle another writer's data.
    fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        let len = u32::try_from(bytes.len()).map_err(|_| PeerError::PayloadTooLarge {
            size: bytes.len(),
            max: u32::MAX as usize,
        })?;
        let mut buf = BytesMut::with_capacity(LEN_PREFIX_SIZE + bytes.len());
        buf.put_u32(len);
        buf.put_slice(bytes);
        self.write_all(&buf)?;
        Ok(())
    }

    fn write_string(&mut self, value: &str) -> Result<()> {
        self.write_bytes(value.as_bytes())
    }

    fn write_json<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec(value)?;
        self.write_bytes(&bytes)
    }
}

impl<W: Write + ?Sized> WireWrite for W {}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use serde::Deserialize;

    use super::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Greeting {
        name: String,
        count: u32,
    }

    #[test]
    fn values_read_back_in_order() {
        let mut wire = Vec::new();
        wire.write_u32(0xDEAD_BEEF).unwrap();
        wire.write_bytes(b"\x00\x01\x02").unwrap();
        wire.write_string("héllo").unwrap();
        wire.write_json(&Greeting {
            name: "chanmux".to_string(),
            count: 3,
        })
        .unwrap();

        let mut reader = Cursor::new(wire);
        assert_eq!(reader.read_u32().unwrap(), 0xDEAD_BEEF);
        assert_eq!(reader.read_bytes().unwrap(), vec![0, 1, 2]);
        assert_eq!(reader.read_string().unwrap(), "héllo");
        let greeting: Greeting = reader.read_json().unwrap();
        assert_eq!(greeting.name, "chanmux");
        assert_eq!(greeting.count, 3);
    }

    #[test]
    fn u32_is_big_endian() {
        let mut wire = Vec::new();
        wire.write_u32(0x0102_0304).unwrap();
        assert_eq!(wire, [1, 2, 3, 4]);
    }

    #[test]
    fn bytes_are_length_prefixed() {
        let mut wire = Vec::new();
        wire.write_bytes(b"abc").unwrap();
        assert_eq!(wire, [0, 0, 0, 3, b'a', b'b', b'c']);

        let mut empty = Vec::new();
        empty.write_bytes(b"").unwrap();
        assert_eq!(empty, [0, 0, 0, 0]);
    }

    #[test]
    fn bytes_go_out_in_a_single_write() {
        let mut sink = CountingWriter::default();
        sink.write_bytes(&[7u8; 100]).unwrap();
        assert_eq!(sink.writes, 1);
        assert_eq!(sink.data.len(), 104);
    }

    #[test]
    fn oversized_prefix_is_rejected_before_reading_body() {
        let mut reader = Cursor::new(vec![0, 0, 0, 9, 1, 2]);
        let err = reader.read_bytes_limited(8).unwrap_err();
        assert!(matches!(err, PeerError::PayloadTooLarge { size: 9, max: 8 }));
    }

    #[test]
    fn default_limit_is_enforced() {
        let mut reader = Cursor::new(0x0100_0001u32.to_be_bytes().to_vec());
        assert!(matches!(
            reader.read_bytes(),
            Err(PeerError::PayloadTooLarge { max: DEFAULT_MAX_WIRE_LEN, .. })
        ));
    }

    #[test]
    fn truncated_body_is_an_io_error() {
        let mut reader = Cursor::new(vec![0, 0, 0, 5, b'a', b'b']);
        let err = reader.read_bytes().unwrap_err();
        assert!(
            matches!(err, PeerError::Io(ref e) if e.kind() == std::io::ErrorKind::UnexpectedEof)
        );
    }

    #[test]
    fn invalid_utf8_is_reported() {
        let mut wire = Vec::new();
        wire.write_bytes(&[0xFF, 0xFE]).unwrap();
        let err = Cursor::new(wire).read_string().unwrap_err();
        assert!(matches!(err, PeerError::InvalidUtf8(_)));
    }

    #[test]
    fn malformed_json_is_reported() {
        let mut wire = Vec::new();
        wire.write_string("{not json").unwrap();
        let err = Cursor::new(wire).read_json::<Greeting>().unwrap_err();
        assert!(matches!(err, PeerError::Json(_)));
    }

    #[derive(Default)]
    struct CountingWriter {
        writes: usize,
        data: Vec<u8>,
    }

    impl Write for CountingWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.writes += 1;
            self.data.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }
}
