//! Many independent byte streams over one connection.
//!
//! chanmux carries any number of bidirectional channels over a single
//! connected stream (Unix domain socket, TCP, or anything implementing
//! [`transport::Connection`]), with per-channel flow control from bounded
//! buffers.
//!
//! # Crate Structure
//!
//! - [`transport`]: connected streams, listeners and endpoints (UDS, TCP)
//! - [`frame`]: the 7-byte frame header and its codec
//! - [`mux`]: ring buffer, channels and the multiplexer itself
//! - [`peer`]: pooled client sessions, channel server, typed wire helpers
//!   (behind the `peer` feature)

/// Re-export transport types.
pub mod transport {
    pub use chanmux_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use chanmux_frame::*;
}

/// Re-export multiplexer types.
pub mod mux {
    pub use chanmux_mux::*;
}

/// Re-export session and server types (requires `peer` feature).
#[cfg(feature = "peer")]
pub mod peer {
    pub use chanmux_peer::*;
}

pub use chanmux_mux::{Channel, Mux, MuxConfig, MuxError};
