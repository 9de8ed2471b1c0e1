use std::io::{Read, Write};
use std::net::TcpStream;

use crate::error::Result;
use crate::traits::Connection;

/// A connected transport stream. Implements Read, Write and [`Connection`].
///
/// This is what listeners hand out and what [`crate::Endpoint::connect`]
/// returns. On Unix it may wrap a Unix domain socket; everywhere it may wrap
/// a TCP stream.
pub struct Stream {
    inner: StreamInner,
}

enum StreamInner {
    #[cfg(unix)]
    Unix(std::os::unix::net::UnixStream),
    Tcp(TcpStream),
}

impl Read for Stream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            #[cfg(unix)]
            StreamInner::Unix(stream) => stream.read(buf),
            StreamInner::Tcp(stream) => stream.read(buf),
        }
    }
}

impl Write for Stream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            #[cfg(unix)]
            StreamInner::Unix(stream) => stream.write(buf),
            StreamInner::Tcp(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match &mut self.inner {
            #[cfg(unix)]
            StreamInner::Unix(stream) => stream.flush(),
            StreamInner::Tcp(stream) => stream.flush(),
        }
    }
}

impl Connection for Stream {
    fn try_clone_box(&self) -> std::io::Result<Box<dyn Connection>> {
        match &self.inner {
            #[cfg(unix)]
            StreamInner::Unix(stream) => stream.try_clone_box(),
            StreamInner::Tcp(stream) => stream.try_clone_box(),
        }
    }

    fn shutdown(&self) -> std::io::Result<()> {
        match &self.inner {
            #[cfg(unix)]
            StreamInner::Unix(stream) => Connection::shutdown(stream),
            StreamInner::Tcp(stream) => Connection::shutdown(stream),
        }
    }
}

impl Stream {
    /// Wrap a Unix domain socket stream.
    #[cfg(unix)]
    pub fn from_unix(stream: std::os::unix::net::UnixStream) -> Self {
        Self {
            inner: StreamInner::Unix(stream),
        }
    }

    /// Wrap a TCP stream. Nagle's algorithm is disabled: the multiplexer
    /// already coalesces small frames in its outbound buffer.
    pub fn from_tcp(stream: TcpStream) -> Result<Self> {
        stream.set_nodelay(true)?;
        Ok(Self {
            inner: StreamInner::Tcp(stream),
        })
    }

    /// Transport name for diagnostics.
    pub fn transport_name(&self) -> &'static str {
        match &self.inner {
            #[cfg(unix)]
            StreamInner::Unix(_) => "unix-domain-socket",
            StreamInner::Tcp(_) => "tcp",
        }
    }
}

impl std::fmt::Debug for Stream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.inner {
            #[cfg(unix)]
            StreamInner::Unix(_) => f.debug_struct("Stream").field("type", &"unix").finish(),
            StreamInner::Tcp(stream) => f
                .debug_struct("Stream")
                .field("type", &"tcp")
                .field("peer", &stream.peer_addr().ok())
                .finish(),
        }
    }
}
