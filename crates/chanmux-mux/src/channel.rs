use std::fmt;
use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use bytes::BytesMut;
use chanmux_frame::{encode_frame, HEADER_SIZE};

use crate::config::{non_zero_or, DEFAULT_MAX_FRAME_SIZE};
use crate::ring::RingBuffer;

/// One bidirectional byte stream carried by a [`Mux`](crate::Mux).
///
/// Reads come from the channel's own inbound buffer, filled by the receive
/// loop. Writes are cut into PAYLOAD frames of at most
/// [`frame_size`](Channel::frame_size) bytes and queued on the outbound buffer
/// every channel of the mux shares.
///
/// Both `Channel` and `&Channel` implement [`Read`] and [`Write`], so a
/// channel can be read on one thread while another writes to it.
pub struct Channel {
    id: u16,
    inbound: Arc<RingBuffer>,
    outbound: Arc<RingBuffer>,
    frame_size: AtomicU32,
}

impl Channel {
    pub(crate) fn new(
        id: u16,
        inbound: Arc<RingBuffer>,
        outbound: Arc<RingBuffer>,
        frame_size: u32,
    ) -> Self {
        Self {
            id,
            inbound,
            outbound,
            frame_size: AtomicU32::new(non_zero_or(frame_size, DEFAULT_MAX_FRAME_SIZE)),
        }
    }

    pub fn id(&self) -> u16 {
        self.id
    }

    /// Largest payload the next write puts in a single frame.
    pub fn frame_size(&self) -> u32 {
        self.frame_size.load(Ordering::Relaxed)
    }

    /// Change the fragment bound for writes issued from now on.
    /// Zero selects the default.
    pub fn set_frame_size(&self, frame_size: u32) {
        self.frame_size
            .store(non_zero_or(frame_size, DEFAULT_MAX_FRAME_SIZE), Ordering::Relaxed);
    }

    /// Channels stay registered for the lifetime of their mux; closing one
    /// releases nothing and sends nothing to the peer.
    pub fn close(&self) -> io::Result<()> {
        Ok(())
    }

    /// Bytes received and not yet read.
    pub fn buffered(&self) -> usize {
        self.inbound.len()
    }

    fn read_inbound(&self, buf: &mut [u8]) -> io::Result<usize> {
        self.inbound.read(buf)
    }

    fn write_frames(&self, src: &[u8]) -> io::Result<usize> {
        let frame_size = self.frame_size() as usize;
        let mut frame = BytesMut::with_capacity(HEADER_SIZE + frame_size.min(src.len()));
        let mut written = 0;
        for fragment in src.chunks(frame_size) {
            frame.clear();
            encode_frame(self.id, fragment, &mut frame)
                .map_err(|err| io::Error::new(io::ErrorKind::InvalidInput, err))?;
            if let Err(err) = self.outbound.write(&frame) {
                if written > 0 {
                    return Ok(written);
                }
                return Err(err);
            }
            written += fragment.len();
        }
        Ok(written)
    }
}

impl Read for Channel {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.read_inbound(buf)
    }
}

impl Read for &Channel {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.read_inbound(buf)
    }
}

impl Write for Channel {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_frames(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Write for &Channel {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_frames(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("id", &self.id)
            .field("frame_size", &self.frame_size())
            .field("buffered", &self.inbound.len())
            .finish()
    }
}
