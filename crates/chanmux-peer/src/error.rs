/// Errors that can occur in client, server and wire helper operations.
#[derive(Debug, thiserror::Error)]
pub enum PeerError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] chanmux_transport::TransportError),

    /// Multiplexer error.
    #[error("mux error: {0}")]
    Mux(#[from] chanmux_mux::MuxError),

    /// Reading or writing a channel failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// A length prefix exceeds what the reader accepts, or a value does not
    /// fit a 32-bit length prefix.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// A string value is not valid UTF-8.
    #[error("invalid UTF-8: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),
}

impl PeerError {
    /// True when the error means the other side went away.
    pub fn is_disconnect(&self) -> bool {
        use std::io::ErrorKind;

        match self {
            PeerError::Io(err) => matches!(
                err.kind(),
                ErrorKind::UnexpectedEof
                    | ErrorKind::ConnectionAborted
                    | ErrorKind::ConnectionReset
                    | ErrorKind::BrokenPipe
            ),
            PeerError::Mux(chanmux_mux::MuxError::Closed) => true,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, PeerError>;
