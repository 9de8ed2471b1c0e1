use std::io::{ErrorKind, Read};

use crate::error::{FrameError, Result};
use crate::header::{Header, HEADER_SIZE};

/// Read exactly one header from a blocking reader.
///
/// Interrupted reads are retried. EOF before the first byte, or in the middle
/// of the header, is reported as [`FrameError::ConnectionClosed`]. Payload
/// bytes are left in the reader for the caller.
pub fn read_header<R: Read + ?Sized>(reader: &mut R) -> Result<Header> {
    let mut bytes = [0u8; HEADER_SIZE];
    let mut filled = 0usize;
    while filled < HEADER_SIZE {
        match reader.read(&mut bytes[filled..]) {
            Ok(0) => return Err(FrameError::ConnectionClosed),
            Ok(n) => filled += n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(FrameError::Io(err)),
        }
    }
    Ok(Header::from_bytes(bytes))
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use bytes::BytesMut;

    use super::*;
    use crate::header::{encode_frame, FrameType};

    #[test]
    fn reads_header_and_leaves_payload() {
        let mut wire = BytesMut::new();
        encode_frame(3, b"body", &mut wire).unwrap();

        let mut cursor = Cursor::new(wire.to_vec());
        let header = read_header(&mut cursor).unwrap();
        assert_eq!(header.frame_type().unwrap(), FrameType::Payload);
        assert_eq!(header.channel_id(), 3);
        assert_eq!(header.payload_len(), 4);

        let mut rest = Vec::new();
        cursor.read_to_end(&mut rest).unwrap();
        assert_eq!(rest, b"body");
    }

    #[test]
    fn reads_back_to_back_control_headers() {
        let mut wire = Vec::new();
        wire.extend_from_slice(Header::open().as_bytes());
        wire.extend_from_slice(Header::accepted(12).as_bytes());

        let mut cursor = Cursor::new(wire);
        assert_eq!(read_header(&mut cursor).unwrap(), Header::open());
        assert_eq!(read_header(&mut cursor).unwrap(), Header::accepted(12));
        assert!(matches!(
            read_header(&mut cursor),
            Err(FrameError::ConnectionClosed)
        ));
    }

    #[test]
    fn partial_reads_are_assembled() {
        let mut reader = ByteByByteReader {
            bytes: Header::accepted(0xBEEF).as_bytes().to_vec(),
            pos: 0,
        };
        let header = read_header(&mut reader).unwrap();
        assert_eq!(header.channel_id(), 0xBEEF);
    }

    #[test]
    fn eof_mid_header_is_connection_closed() {
        let mut cursor = Cursor::new(vec![0u8, 0, 1]);
        assert!(matches!(
            read_header(&mut cursor),
            Err(FrameError::ConnectionClosed)
        ));
    }

    #[test]
    fn interrupted_read_retries() {
        let mut reader = FailOnceThenData {
            kind: ErrorKind::Interrupted,
            failed: false,
            inner: Cursor::new(Header::open().as_bytes().to_vec()),
        };
        assert_eq!(read_header(&mut reader).unwrap(), Header::open());
    }

    #[test]
    fn other_io_errors_propagate() {
        let mut reader = FailOnceThenData {
            kind: ErrorKind::ConnectionReset,
            failed: false,
            inner: Cursor::new(Header::open().as_bytes().to_vec()),
        };
        let err = read_header(&mut reader).unwrap_err();
        assert!(matches!(err, FrameError::Io(e) if e.kind() == ErrorKind::ConnectionReset));
    }

    struct ByteByByteReader {
        bytes: Vec<u8>,
        pos: usize,
    }

    impl Read for ByteByByteReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.pos >= self.bytes.len() || buf.is_empty() {
                return Ok(0);
            }
            buf[0] = self.bytes[self.pos];
            self.pos += 1;
            Ok(1)
        }
    }

    struct FailOnceThenData {
        kind: ErrorKind,
        failed: bool,
        inner: Cursor<Vec<u8>>,
    }

    impl Read for FailOnceThenData {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if !self.failed {
                self.failed = true;
                return Err(std::io::Error::from(self.kind));
            }
            self.inner.read(buf)
        }
    }
}
