/// Errors that can occur while encoding, decoding or reading frames.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The header carries a frame type this protocol does not define.
    #[error("unknown frame type {0}")]
    UnknownFrameType(u8),

    /// The payload does not fit the 32-bit length field.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// An I/O error occurred while reading a header.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection was closed before a complete header was received.
    #[error("connection closed (incomplete frame)")]
    ConnectionClosed,
}

pub type Result<T> = std::result::Result<T, FrameError>;
