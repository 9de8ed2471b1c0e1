use chanmux_frame::FrameError;
use chanmux_transport::TransportError;

/// Errors returned by the multiplexer.
#[derive(Debug, thiserror::Error)]
pub enum MuxError {
    /// Establishing the underlying connection failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A frame could not be read or understood.
    #[error(transparent)]
    Frame(#[from] FrameError),

    /// An I/O error, typically enqueueing a control frame.
    #[error("mux I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A PAYLOAD frame addressed a channel id that was never registered.
    #[error("payload for unknown channel {0}")]
    UnknownChannel(u16),

    /// The multiplexer has stopped; no further channels can be established.
    #[error("multiplexer closed")]
    Closed,

    /// A loop thread could not be started.
    #[error("failed to spawn {name} thread: {source}")]
    Spawn {
        name: &'static str,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, MuxError>;
