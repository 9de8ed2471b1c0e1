use std::sync::Arc;
use std::thread;

use chanmux_mux::{Channel, Mux, MuxConfig, MuxError};
use chanmux_transport::{Connection, Listener};
use tracing::{debug, error, warn};

use crate::error::Result;

/// Serves one channel.
///
/// The server calls [`handle`](Handler::handle) on the same channel again and
/// again until it returns an error, so a handler typically processes one
/// request and returns.
pub trait Handler: Send + Sync + 'static {
    fn handle(&self, channel: &mut Channel) -> Result<()>;
}

impl<F> Handler for F
where
    F: Fn(&mut Channel) -> Result<()> + Send + Sync + 'static,
{
    fn handle(&self, channel: &mut Channel) -> Result<()> {
        self(channel)
    }
}

/// The accepting side: runs a mux per connection and a handler per channel.
pub struct Server<H> {
    handler: Arc<H>,
    config: MuxConfig,
}

impl<H: Handler> Server<H> {
    pub fn new(handler: H) -> Self {
        Self {
            handler: Arc::new(handler),
            config: MuxConfig::default(),
        }
    }

    /// Override the mux configuration used for every connection.
    pub fn with_config(mut self, config: MuxConfig) -> Self {
        self.config = config;
        self
    }

    /// Accept connections from `listener` forever, each on its own thread.
    ///
    /// A failed accept is logged and the loop continues.
    pub fn serve(&self, listener: &Listener) -> Result<()> {
        loop {
            let stream = match listener.accept() {
                Ok(stream) => stream,
                Err(err) => {
                    warn!(error = %err, "failed to accept connection");
                    continue;
                }
            };
            debug!(transport = stream.transport_name(), "connection accepted");

            let handler = Arc::clone(&self.handler);
            let config = self.config;
            let spawned = thread::Builder::new()
                .name("chanmux-conn".to_string())
                .spawn(move || {
                    if let Err(err) = run_connection(handler, config, stream) {
                        warn!(error = %err, "connection ended with error");
                    }
                });
            if let Err(err) = spawned {
                error!(error = %err, "failed to spawn connection thread");
            }
        }
    }

    /// Serve a single connection on the calling thread.
    ///
    /// Returns once the connection is gone: `Ok` if the peer went away,
    /// otherwise the error that stopped channel acceptance.
    pub fn serve_connection<C: Connection>(&self, conn: C) -> Result<()> {
        run_connection(Arc::clone(&self.handler), self.config, conn)
    }
}

fn run_connection<H: Handler, C: Connection>(
    handler: Arc<H>,
    config: MuxConfig,
    conn: C,
) -> Result<()> {
    let mux = Mux::with_config(conn, config)?;
    loop {
        let channel = match mux.accept() {
            Ok(channel) => channel,
            Err(MuxError::Closed) => {
                debug!("connection closed");
                return Ok(());
            }
            Err(err) => return Err(err.into()),
        };

        let handler = Arc::clone(&handler);
        let id = channel.id();
        thread::Builder::new()
            .name(format!("chanmux-chan-{id}"))
            .spawn(move || serve_channel(handler.as_ref(), channel))?;
    }
}

fn serve_channel<H: Handler>(handler: &H, mut channel: Channel) {
    loop {
        if let Err(err) = handler.handle(&mut channel) {
            if err.is_disconnect() {
                debug!(channel_id = channel.id(), "channel peer went away");
            } else {
                warn!(channel_id = channel.id(), error = %err, "channel handler failed");
            }
            return;
        }
    }
}
