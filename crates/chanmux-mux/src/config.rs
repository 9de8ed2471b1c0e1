/// Default capacity of the shared outbound buffer, in bytes.
pub const DEFAULT_SEND_BUFFER_SIZE: usize = 16 * 1024;
/// Default capacity of each channel's inbound buffer, in bytes.
pub const DEFAULT_RECV_BUFFER_SIZE: usize = 2 * 1024;
/// Default largest payload a channel puts in one frame.
pub const DEFAULT_MAX_FRAME_SIZE: u32 = 1024;

/// Tunables for a [`Mux`](crate::Mux).
///
/// Any field left at zero is replaced by its default when the config is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MuxConfig {
    /// Capacity of the outbound buffer shared by every channel.
    pub send_buffer_size: usize,
    /// Inbound buffer capacity for channels created with `open`/`accept`.
    pub recv_buffer_size: usize,
    /// Frame size for channels created with `open`/`accept`.
    pub max_frame_size: u32,
}

impl MuxConfig {
    pub const DEFAULT: MuxConfig = MuxConfig {
        send_buffer_size: DEFAULT_SEND_BUFFER_SIZE,
        recv_buffer_size: DEFAULT_RECV_BUFFER_SIZE,
        max_frame_size: DEFAULT_MAX_FRAME_SIZE,
    };

    /// Copy of this config with zero fields replaced by their defaults.
    pub fn normalized(self) -> Self {
        Self {
            send_buffer_size: non_zero_or(self.send_buffer_size, DEFAULT_SEND_BUFFER_SIZE),
            recv_buffer_size: non_zero_or(self.recv_buffer_size, DEFAULT_RECV_BUFFER_SIZE),
            max_frame_size: non_zero_or(self.max_frame_size, DEFAULT_MAX_FRAME_SIZE),
        }
    }
}

impl Default for MuxConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// `value`, or `fallback` when `value` is zero.
pub(crate) fn non_zero_or<T: Default + PartialEq>(value: T, fallback: T) -> T {
    if value == T::default() {
        fallback
    } else {
        value
    }
}
