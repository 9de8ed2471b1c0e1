use std::collections::HashMap;
use std::io::Read;
use std::sync::atomic::{AtomicBool, AtomicU16, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use chanmux_frame::{read_header, FrameError, FrameType, Header};
use chanmux_transport::Connection;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, error, warn};

use crate::channel::Channel;
use crate::config::{non_zero_or, MuxConfig};
use crate::error::{MuxError, Result};
use crate::rendezvous::Rendezvous;
use crate::ring::RingBuffer;

const RECV_THREAD: &str = "chanmux-recv";
const SEND_THREAD: &str = "chanmux-send";

/// Multiplexes many [`Channel`]s over one connection.
///
/// Construction spawns two threads: a receive loop that reads frames and
/// routes payloads to channels, and a send loop that drains the shared
/// outbound buffer onto the connection. Either loop stops for good on its
/// first error. After the receive loop stops, channel reads return what was
/// already buffered and then fail, and `open`/`accept` fail with
/// [`MuxError::Closed`]. After the send loop stops, channel writes fail.
///
/// Dropping the mux (or calling [`close`](Mux::close)) shuts the connection
/// down and joins both loops.
pub struct Mux {
    shared: Arc<Shared>,
    loops: Mutex<Vec<JoinHandle<()>>>,
    config: MuxConfig,
    /// Last id handed out; starts at `u16::MAX` so the first allocation is 0.
    next_id: AtomicU16,
}

struct Shared {
    conn: Mutex<Box<dyn Connection>>,
    outbound: Arc<RingBuffer>,
    table: RwLock<Table>,
    /// Receive loop -> `accept`: the peer sent OPEN.
    incoming: Rendezvous<()>,
    /// Receive loop -> `open`: the peer sent ACCEPTED with this id.
    accepted: Rendezvous<u16>,
    closing: AtomicBool,
}

struct Table {
    channels: HashMap<u16, Arc<RingBuffer>>,
    halted: bool,
}

impl Mux {
    /// Start multiplexing over `conn` with the default configuration.
    pub fn new<C: Connection>(conn: C) -> Result<Self> {
        Self::with_config(conn, MuxConfig::default())
    }

    /// Start multiplexing over `conn`.
    pub fn with_config<C: Connection>(conn: C, config: MuxConfig) -> Result<Self> {
        let config = config.normalized();
        let conn: Box<dyn Connection> = Box::new(conn);
        let reader = conn.try_clone_box()?;
        let writer = conn.try_clone_box()?;

        let mux = Self {
            shared: Arc::new(Shared {
                conn: Mutex::new(conn),
                outbound: Arc::new(RingBuffer::new(config.send_buffer_size)),
                table: RwLock::new(Table {
                    channels: HashMap::new(),
                    halted: false,
                }),
                incoming: Rendezvous::new(),
                accepted: Rendezvous::new(),
                closing: AtomicBool::new(false),
            }),
            loops: Mutex::new(Vec::with_capacity(2)),
            config,
            next_id: AtomicU16::new(u16::MAX),
        };

        // On failure the partially started mux is dropped, which tears down
        // whichever loop did start.
        let shared = Arc::clone(&mux.shared);
        mux.spawn_loop(RECV_THREAD, move || recv_loop(shared, reader))?;
        let shared = Arc::clone(&mux.shared);
        mux.spawn_loop(SEND_THREAD, move || send_loop(shared, writer))?;

        debug!(
            send_buffer_size = config.send_buffer_size,
            recv_buffer_size = config.recv_buffer_size,
            max_frame_size = config.max_frame_size,
            "mux started"
        );
        Ok(mux)
    }

    fn spawn_loop<F>(&self, name: &'static str, body: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(body)
            .map_err(|source| MuxError::Spawn { name, source })?;
        self.loops.lock().push(handle);
        Ok(())
    }

    /// Ask the peer for a new channel using the configured sizes.
    pub fn open(&self) -> Result<Channel> {
        self.open_with_size(self.config.recv_buffer_size, self.config.max_frame_size)
    }

    /// Ask the peer for a new channel.
    ///
    /// Sends OPEN and blocks until the peer's ACCEPTED arrives; the channel
    /// then uses the id the peer assigned. Zero sizes select the configured
    /// defaults.
    pub fn open_with_size(&self, buffer_size: usize, frame_size: u32) -> Result<Channel> {
        if self.is_closed() {
            return Err(MuxError::Closed);
        }
        self.shared.outbound.write(Header::open().as_bytes())?;

        let id = self.shared.accepted.take()?;
        let registered = self.register(id, buffer_size, frame_size);
        self.shared.accepted.ack();

        let channel = registered?;
        debug!(channel_id = id, "channel opened");
        Ok(channel)
    }

    /// Wait for the peer to open a channel, using the configured sizes.
    pub fn accept(&self) -> Result<Channel> {
        self.accept_with_size(self.config.recv_buffer_size, self.config.max_frame_size)
    }

    /// Wait for the peer to open a channel.
    ///
    /// Blocks until an OPEN arrives, assigns the next id and answers with
    /// ACCEPTED. Zero sizes select the configured defaults.
    pub fn accept_with_size(&self, buffer_size: usize, frame_size: u32) -> Result<Channel> {
        self.shared.incoming.take()?;

        let id = self.allocate_id();
        let registered = self
            .shared
            .outbound
            .write(Header::accepted(id).as_bytes())
            .map_err(MuxError::from)
            .and_then(|_| self.register(id, buffer_size, frame_size));
        // The receive loop waits for this even when the answer failed.
        self.shared.incoming.ack();

        let channel = registered?;
        debug!(channel_id = id, "channel accepted");
        Ok(channel)
    }

    fn allocate_id(&self) -> u16 {
        self.next_id.fetch_add(1, Ordering::Relaxed).wrapping_add(1)
    }

    fn register(&self, id: u16, buffer_size: usize, frame_size: u32) -> Result<Channel> {
        let buffer_size = non_zero_or(buffer_size, self.config.recv_buffer_size);
        let frame_size = non_zero_or(frame_size, self.config.max_frame_size);

        let inbound = Arc::new(RingBuffer::new(buffer_size));
        let mut table = self.shared.table.write();
        if table.halted {
            return Err(MuxError::Closed);
        }
        if table.channels.insert(id, Arc::clone(&inbound)).is_some() {
            warn!(channel_id = id, "channel id reused, replacing earlier channel");
        }
        drop(table);

        Ok(Channel::new(
            id,
            inbound,
            Arc::clone(&self.shared.outbound),
            frame_size,
        ))
    }

    /// Block until the send loop has handed every queued frame to the
    /// connection.
    pub fn flush(&self) -> Result<()> {
        if self.shared.outbound.wait_empty() {
            Ok(())
        } else {
            Err(MuxError::Closed)
        }
    }

    /// Shut the connection down and stop both loops.
    ///
    /// Channels stop receiving and their writes fail. Safe to call more than
    /// once and from several threads; every caller returns only after both
    /// loops have exited. Also runs on drop.
    pub fn close(&self) {
        if !self.shared.closing.swap(true, Ordering::AcqRel) {
            if let Err(err) = self.shared.conn.lock().shutdown() {
                debug!(error = %err, "connection shutdown failed");
            }
            self.shared.outbound.close();
            self.shared.halt_inbound();
        }

        // Joined under the lock so a concurrent caller waits for the same
        // loops instead of finding the list already emptied.
        let mut loops = self.loops.lock();
        for handle in loops.drain(..) {
            if handle.join().is_err() {
                warn!("mux loop thread panicked");
            }
        }
    }

    /// True once either loop has stopped or [`close`](Mux::close) was called.
    pub fn is_closed(&self) -> bool {
        self.shared.closing.load(Ordering::Acquire)
            || self.shared.outbound.is_closed()
            || self.shared.table.read().halted
    }

    /// Number of channels registered so far.
    pub fn channel_count(&self) -> usize {
        self.shared.table.read().channels.len()
    }

    pub fn config(&self) -> &MuxConfig {
        &self.config
    }
}

impl Drop for Mux {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for Mux {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mux")
            .field("config", &self.config)
            .field("channels", &self.channel_count())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl Shared {
    fn is_closing(&self) -> bool {
        self.closing.load(Ordering::Acquire)
    }

    /// Stop delivering inbound data and fail every pending and future
    /// `open`/`accept`.
    fn halt_inbound(&self) {
        let mut table = self.table.write();
        table.halted = true;
        for inbound in table.channels.values() {
            inbound.close();
        }
        drop(table);
        self.incoming.close();
        self.accepted.close();
    }
}

fn recv_loop(shared: Arc<Shared>, mut reader: Box<dyn Connection>) {
    let err = loop {
        if let Err(err) = demux_frame(&shared, &mut reader) {
            break err;
        }
    };
    if shared.is_closing() {
        debug!(error = %err, "receive loop stopped");
    } else {
        error!(error = %err, "receive loop failed");
    }
    shared.halt_inbound();
}

/// Read one frame and act on it.
fn demux_frame<R: Read>(shared: &Shared, reader: &mut R) -> Result<()> {
    let header = read_header(reader)?;
    match header.frame_type()? {
        FrameType::Open => shared.incoming.offer(()),
        FrameType::Accepted => shared.accepted.offer(header.channel_id()),
        FrameType::Payload => {
            let id = header.channel_id();
            let inbound = shared
                .table
                .read()
                .channels
                .get(&id)
                .cloned()
                .ok_or(MuxError::UnknownChannel(id))?;

            let declared = u64::from(header.payload_len());
            let absorbed = inbound.fill_from(&mut reader.by_ref().take(declared))?;
            if absorbed < declared {
                return Err(FrameError::ConnectionClosed.into());
            }
            Ok(())
        }
    }
}

fn send_loop(shared: Arc<Shared>, mut writer: Box<dyn Connection>) {
    let err = loop {
        if let Err(err) = shared.outbound.drain_to(&mut writer) {
            break err;
        }
    };
    if shared.is_closing() {
        debug!(error = %err, "send loop stopped");
    } else {
        error!(error = %err, "send loop failed");
    }
    shared.outbound.close();
}

#[cfg(all(test, unix))]
mod tests {
    use std::io::{Read, Write};
    use std::os::unix::net::UnixStream;
    use std::time::Duration;

    use super::*;

    fn pair() -> (Mux, Mux) {
        let (a, b) = UnixStream::pair().unwrap();
        (Mux::new(a).unwrap(), Mux::new(b).unwrap())
    }

    #[test]
    fn first_accepted_id_is_zero_and_ids_increase() {
        let (server, client) = pair();
        let server = Arc::new(server);

        let acceptor = {
            let server = Arc::clone(&server);
            thread::spawn(move || {
                (0..3)
                    .map(|_| server.accept().unwrap().id())
                    .collect::<Vec<_>>()
            })
        };
        let opened: Vec<u16> = (0..3).map(|_| client.open().unwrap().id()).collect();

        assert_eq!(acceptor.join().unwrap(), vec![0, 1, 2]);
        assert_eq!(opened, vec![0, 1, 2]);
        assert_eq!(server.channel_count(), 3);
        assert_eq!(client.channel_count(), 3);
    }

    #[test]
    fn id_allocation_wraps() {
        let (mux, _peer) = pair();
        mux.next_id.store(u16::MAX - 1, Ordering::Relaxed);
        assert_eq!(mux.allocate_id(), u16::MAX);
        assert_eq!(mux.allocate_id(), 0);
        assert_eq!(mux.allocate_id(), 1);
    }

    #[test]
    fn reused_id_replaces_registration() {
        let (mux, _peer) = pair();
        let first = mux.register(5, 16, 16).unwrap();
        let second = mux.register(5, 16, 16).unwrap();
        assert_eq!(first.id(), second.id());
        assert_eq!(mux.channel_count(), 1);
    }

    #[test]
    fn zero_sizes_use_config() {
        let (a, _b) = UnixStream::pair().unwrap();
        let mux = Mux::with_config(
            a,
            MuxConfig {
                send_buffer_size: 0,
                recv_buffer_size: 32,
                max_frame_size: 8,
            },
        )
        .unwrap();
        assert_eq!(mux.config().send_buffer_size, 16384);
        let channel = mux.register(1, 0, 0).unwrap();
        assert_eq!(channel.frame_size(), 8);
    }

    #[test]
    fn close_is_idempotent_and_fails_later_calls() {
        let (mux, _peer) = pair();
        mux.close();
        mux.close();
        assert!(mux.is_closed());
        assert!(matches!(mux.open(), Err(MuxError::Closed)));
        assert!(matches!(mux.accept(), Err(MuxError::Closed)));
    }

    #[test]
    fn every_concurrent_close_returns_after_the_loops_exit() {
        let (mux, _peer) = pair();
        let mux = Arc::new(mux);

        let closers: Vec<_> = (0..4)
            .map(|_| {
                let mux = Arc::clone(&mux);
                thread::spawn(move || {
                    mux.close();
                    // Each loop holds a reference to the shared state until
                    // it exits.
                    Arc::strong_count(&mux.shared)
                })
            })
            .collect();

        for closer in closers {
            assert_eq!(closer.join().unwrap(), 1);
        }
    }

    #[test]
    fn close_unblocks_channel_reader() {
        let (server, client) = pair();
        let acceptor = thread::spawn(move || {
            let channel = server.accept().unwrap();
            (server, channel)
        });
        let _opened = client.open().unwrap();
        let (server, channel) = acceptor.join().unwrap();

        let reader = thread::spawn(move || {
            let mut buf = [0u8; 4];
            (&channel).read(&mut buf)
        });
        thread::sleep(Duration::from_millis(20));
        server.close();
        let err = reader.join().unwrap().unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::ConnectionAborted);
    }

    #[test]
    fn flush_waits_for_queued_frames() {
        let (server, client) = pair();
        let acceptor = thread::spawn(move || {
            let channel = server.accept().unwrap();
            (server, channel)
        });
        let mut opened = client.open().unwrap();
        let (_server, accepted) = acceptor.join().unwrap();

        opened.write_all(&[5u8; 1000]).unwrap();
        client.flush().unwrap();
        drop(client);

        let mut buf = vec![0u8; 1000];
        (&accepted).read_exact(&mut buf).unwrap();
        assert!(buf.iter().all(|&b| b == 5));
    }

    #[test]
    fn writes_fail_after_close() {
        let (server, client) = pair();
        let acceptor = thread::spawn(move || {
            let channel = server.accept().unwrap();
            (server, channel)
        });
        let mut opened = client.open().unwrap();
        let (_server, _accepted) = acceptor.join().unwrap();

        client.close();
        let err = opened.write(b"late").unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::BrokenPipe);
    }
}
