//! Connected byte streams for chanmux.
//!
//! The multiplexer only needs an already connected, bidirectional stream.
//! This crate provides that stream for the transports chanmux ships with:
//! - Unix domain sockets (Linux/macOS)
//! - TCP
//!
//! It also defines the [`Connection`] capability trait the multiplexer is
//! written against, so tests can substitute their own doubles.

pub mod endpoint;
pub mod error;
pub mod stream;
pub mod tcp;
pub mod traits;

#[cfg(unix)]
pub mod uds;

pub use endpoint::{Endpoint, Listener};
pub use error::{Result, TransportError};
pub use stream::Stream;
pub use tcp::TcpSocket;
pub use traits::Connection;

#[cfg(unix)]
pub use uds::UnixDomainSocket;
