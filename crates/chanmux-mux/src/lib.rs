//! Channel multiplexer for chanmux.
//!
//! A [`Mux`] carries many independent, bidirectional [`Channel`]s over one
//! connected byte stream. New channels are agreed with an OPEN/ACCEPTED
//! handshake; channel data travels in PAYLOAD frames of bounded size.
//!
//! Flow control comes from bounded buffers:
//! - every channel has its own inbound [`RingBuffer`], filled by the receive
//!   loop; a full buffer stalls the receive loop for every channel
//! - all channels share one outbound buffer, drained onto the connection by
//!   the send loop; a full buffer stalls every writer
//!
//! # Example
//!
//! ```no_run
//! use std::io::{Read, Write};
//! use std::os::unix::net::UnixStream;
//!
//! use chanmux_mux::Mux;
//!
//! let (a, b) = UnixStream::pair()?;
//! let server = Mux::new(a)?;
//! let client = Mux::new(b)?;
//!
//! let accepting = std::thread::spawn(move || {
//!     let mut channel = server.accept()?;
//!     let mut buf = [0u8; 4];
//!     channel.read_exact(&mut buf)?;
//!     Ok::<_, Box<dyn std::error::Error + Send + Sync>>(buf)
//! });
//!
//! let mut channel = client.open()?;
//! channel.write_all(b"ping")?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod channel;
pub mod config;
pub mod error;
pub mod mux;
pub mod ring;

mod rendezvous;

pub use channel::Channel;
pub use config::{
    MuxConfig, DEFAULT_MAX_FRAME_SIZE, DEFAULT_RECV_BUFFER_SIZE, DEFAULT_SEND_BUFFER_SIZE,
};
pub use error::{MuxError, Result};
pub use mux::Mux;
pub use ring::RingBuffer;
