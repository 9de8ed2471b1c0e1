//! Frame header codec for the chanmux wire protocol.
//!
//! Every frame on the wire starts with a fixed 7-byte header:
//! - a 1-byte frame type (PAYLOAD, OPEN, ACCEPTED)
//! - a 2-byte big-endian channel id
//! - a 4-byte big-endian payload length
//!
//! Only PAYLOAD frames carry payload bytes. This crate does no buffering and
//! no validation beyond what a caller asks for; the multiplexer decides what
//! an unknown frame type means.

pub mod error;
pub mod header;
pub mod reader;

pub use error::{FrameError, Result};
pub use header::{encode_frame, FrameType, Header, HEADER_SIZE, MAX_PAYLOAD_LEN};
pub use reader::read_header;
