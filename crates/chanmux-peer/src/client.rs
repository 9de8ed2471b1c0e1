use std::fmt;
use std::io::{self, Read, Write};
use std::sync::Arc;

use chanmux_mux::{Channel, Mux, MuxConfig};
use chanmux_transport::Endpoint;
use parking_lot::Mutex;
use tracing::debug;

use crate::error::Result;

/// The connecting side of a multiplexed connection.
///
/// A client hands out [`Session`]s. Each session owns one channel of the
/// underlying [`Mux`]; when the session is closed or dropped the channel goes
/// back to an idle pool and the next [`session`](Client::session) call reuses
/// it instead of opening a new one.
///
/// Cloning a client is cheap and shares the mux and the pool.
#[derive(Clone)]
pub struct Client {
    inner: Arc<Inner>,
}

struct Inner {
    mux: Mux,
    idle: Mutex<Vec<Channel>>,
}

impl Client {
    /// Wrap an already running mux.
    pub fn new(mux: Mux) -> Self {
        Self {
            inner: Arc::new(Inner {
                mux,
                idle: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Connect to `endpoint` and start a mux with the default configuration.
    pub fn connect(endpoint: &Endpoint) -> Result<Self> {
        Self::connect_with_config(endpoint, MuxConfig::default())
    }

    /// Connect to `endpoint` and start a mux with `config`.
    pub fn connect_with_config(endpoint: &Endpoint, config: MuxConfig) -> Result<Self> {
        let stream = endpoint.connect()?;
        debug!(endpoint = %endpoint, transport = stream.transport_name(), "client connected");
        Ok(Self::new(Mux::with_config(stream, config)?))
    }

    /// Take an idle session, or open a new channel if none is idle.
    pub fn session(&self) -> Result<Session> {
        let pooled = self.inner.idle.lock().pop();
        let channel = match pooled {
            Some(channel) => {
                debug!(channel_id = channel.id(), "reusing idle session");
                channel
            }
            None => self.inner.mux.open()?,
        };
        Ok(Session {
            channel: Some(channel),
            owner: Arc::clone(&self.inner),
        })
    }

    /// Number of sessions waiting in the pool.
    pub fn idle_sessions(&self) -> usize {
        self.inner.idle.lock().len()
    }

    pub fn mux(&self) -> &Mux {
        &self.inner.mux
    }

    /// Shut the connection down. Open sessions fail on their next read or write.
    pub fn close(&self) {
        self.inner.idle.lock().clear();
        self.inner.mux.close();
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("mux", &self.inner.mux)
            .field("idle_sessions", &self.idle_sessions())
            .finish()
    }
}

/// A channel borrowed from a [`Client`]'s pool.
///
/// Implements [`Read`] and [`Write`], and with them the
/// [`WireRead`](crate::WireRead)/[`WireWrite`](crate::WireWrite) helpers.
/// Whatever the previous user left unread on the channel is still there.
pub struct Session {
    channel: Option<Channel>,
    owner: Arc<Inner>,
}

impl Session {
    /// The underlying channel.
    pub fn channel(&self) -> io::Result<&Channel> {
        self.channel
            .as_ref()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "session closed"))
    }

    /// Return the channel to the pool.
    pub fn close(mut self) {
        self.release();
    }

    fn release(&mut self) {
        let Some(channel) = self.channel.take() else {
            return;
        };
        if self.owner.mux.is_closed() {
            debug!(channel_id = channel.id(), "dropping session of closed mux");
            return;
        }
        self.owner.idle.lock().push(channel);
    }
}

impl Read for Session {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut channel = self.channel()?;
        channel.read(buf)
    }
}

impl Write for Session {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut channel = self.channel()?;
        channel.write(buf)
    }

    /// Waits until everything queued on the connection has been sent.
    fn flush(&mut self) -> io::Result<()> {
        self.owner
            .mux
            .flush()
            .map_err(|err| io::Error::new(io::ErrorKind::BrokenPipe, err))
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("channel", &self.channel)
            .finish()
    }
}
