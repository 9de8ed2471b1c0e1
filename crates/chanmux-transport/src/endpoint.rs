use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{Result, TransportError};
use crate::stream::Stream;
use crate::tcp::TcpSocket;
#[cfg(unix)]
use crate::uds::UnixDomainSocket;

/// Where to listen or connect.
///
/// Parsed from `unix:<path>`, `tcp:<host:port>`, a bare `host:port`, or a
/// bare filesystem path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    #[cfg(unix)]
    Unix(PathBuf),
    Tcp(String),
}

impl Endpoint {
    /// Start listening on this endpoint.
    pub fn bind(&self) -> Result<Listener> {
        match self {
            #[cfg(unix)]
            Endpoint::Unix(path) => Ok(Listener::Unix(UnixDomainSocket::bind(path)?)),
            Endpoint::Tcp(addr) => Ok(Listener::Tcp(TcpSocket::bind(addr)?)),
        }
    }

    /// Connect to a listener on this endpoint.
    pub fn connect(&self) -> Result<Stream> {
        match self {
            #[cfg(unix)]
            Endpoint::Unix(path) => UnixDomainSocket::connect(path),
            Endpoint::Tcp(addr) => TcpSocket::connect(addr),
        }
    }
}

impl FromStr for Endpoint {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || TransportError::InvalidEndpoint(s.to_string());

        if let Some(addr) = s.strip_prefix("tcp:") {
            let addr = addr.trim_start_matches("//");
            return if is_host_port(addr) {
                Ok(Endpoint::Tcp(addr.to_string()))
            } else {
                Err(invalid())
            };
        }
        if let Some(path) = s.strip_prefix("unix:") {
            return unix_endpoint(path.trim_start_matches("//")).ok_or_else(invalid);
        }
        if s.contains('/') {
            return unix_endpoint(s).ok_or_else(invalid);
        }
        if is_host_port(s) {
            return Ok(Endpoint::Tcp(s.to_string()));
        }
        Err(invalid())
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            #[cfg(unix)]
            Endpoint::Unix(path) => write!(f, "unix:{}", path.display()),
            Endpoint::Tcp(addr) => write!(f, "tcp:{addr}"),
        }
    }
}

#[cfg(unix)]
fn unix_endpoint(path: &str) -> Option<Endpoint> {
    (!path.is_empty()).then(|| Endpoint::Unix(PathBuf::from(path)))
}

#[cfg(not(unix))]
fn unix_endpoint(_path: &str) -> Option<Endpoint> {
    None
}

fn is_host_port(s: &str) -> bool {
    match s.rsplit_once(':') {
        Some((host, port)) => !host.is_empty() && port.parse::<u16>().is_ok(),
        None => false,
    }
}

/// A bound listener for either transport.
pub enum Listener {
    #[cfg(unix)]
    Unix(UnixDomainSocket),
    Tcp(TcpSocket),
}

impl Listener {
    /// Accept the next connection (blocking).
    pub fn accept(&self) -> Result<Stream> {
        match self {
            #[cfg(unix)]
            Listener::Unix(socket) => socket.accept(),
            Listener::Tcp(socket) => socket.accept(),
        }
    }

    /// The endpoint clients should connect to. For TCP this carries the port
    /// actually bound, which matters when binding port 0.
    pub fn local_endpoint(&self) -> Endpoint {
        match self {
            #[cfg(unix)]
            Listener::Unix(socket) => Endpoint::Unix(socket.path().to_path_buf()),
            Listener::Tcp(socket) => Endpoint::Tcp(socket.local_addr().to_string()),
        }
    }
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener")
            .field("endpoint", &self.local_endpoint())
            .finish()
    }
}
