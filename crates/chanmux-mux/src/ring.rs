//! Bounded circular byte buffer with blocking flow control.
//!
//! One [`RingBuffer`] backs every channel's inbound data and one more is the
//! multiplexer's shared outbound queue. Operations come in two families:
//!
//! - read family: [`RingBuffer::read`], [`RingBuffer::drain_to`]
//! - write family: [`RingBuffer::write`], [`RingBuffer::fill_from`]
//!
//! At most one operation of each family runs at a time; further callers queue
//! in arrival order on a fair gate. A reader and a writer may overlap.
//!
//! Readers hold back while a writer is still appending to a buffer that is not
//! yet full, so that the run they eventually take is as long as possible. For
//! the outbound buffer that turns many small frames into few large socket
//! writes, at the price of some latency when writers are busy.

use std::io::{self, ErrorKind, Read, Write};
use std::ops::Range;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::{Condvar, FairMutex, Mutex, MutexGuard};

/// Scratch size used by [`RingBuffer::fill_from`] when pulling from a source.
const FILL_CHUNK_SIZE: usize = 8 * 1024;

/// A fixed-capacity circular byte buffer with blocking read and write.
pub struct RingBuffer {
    state: Mutex<State>,
    cond: Condvar,
    read_gate: FairMutex<()>,
    write_gate: FairMutex<()>,
    /// Write-family operations admitted or queued and not yet finished.
    writers: AtomicUsize,
    /// Set under the state lock, readable without it.
    closed: AtomicBool,
    capacity: usize,
}

struct State {
    storage: Box<[u8]>,
    start: usize,
    len: usize,
}

impl State {
    fn capacity(&self) -> usize {
        self.storage.len()
    }

    /// The occupied run as up to two physical ranges, in logical order.
    fn occupied(&self) -> (Range<usize>, Range<usize>) {
        let end = self.start + self.len;
        if end <= self.capacity() {
            (self.start..end, 0..0)
        } else {
            (self.start..self.capacity(), 0..end - self.capacity())
        }
    }

    fn consume(&mut self, n: usize) {
        debug_assert!(n <= self.len);
        self.len -= n;
        // An empty buffer restarts at offset 0 so the next run is contiguous.
        self.start = if self.len == 0 {
            0
        } else {
            (self.start + n) % self.capacity()
        };
    }

    fn pop_into(&mut self, dst: &mut [u8]) -> usize {
        let n = dst.len().min(self.len);
        let (first, second) = self.occupied();
        let head = n.min(first.len());
        dst[..head].copy_from_slice(&self.storage[first.start..first.start + head]);
        dst[head..n].copy_from_slice(&self.storage[second.start..second.start + (n - head)]);
        self.consume(n);
        n
    }

    fn push_from(&mut self, src: &[u8]) -> usize {
        let cap = self.capacity();
        let n = src.len().min(cap - self.len);
        let write_pos = (self.start + self.len) % cap;
        let head = n.min(cap - write_pos);
        self.storage[write_pos..write_pos + head].copy_from_slice(&src[..head]);
        self.storage[..n - head].copy_from_slice(&src[head..n]);
        self.len += n;
        n
    }
}

/// Keeps the in-flight writer count accurate on every exit path, and wakes a
/// waiting reader when the last writer leaves data behind.
struct InFlight<'a> {
    ring: &'a RingBuffer,
}

impl<'a> InFlight<'a> {
    fn enter(ring: &'a RingBuffer) -> Self {
        ring.writers.fetch_add(1, Ordering::AcqRel);
        Self { ring }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let state = self.ring.state.lock();
        if self.ring.writers.fetch_sub(1, Ordering::AcqRel) == 1 && state.len > 0 {
            self.ring.cond.notify_all();
        }
    }
}

impl RingBuffer {
    /// Create an empty buffer holding at most `capacity` bytes.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "ring buffer capacity must be non-zero");
        Self {
            state: Mutex::new(State {
                storage: vec![0u8; capacity].into_boxed_slice(),
                start: 0,
                len: 0,
            }),
            cond: Condvar::new(),
            read_gate: FairMutex::new(()),
            write_gate: FairMutex::new(()),
            writers: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bytes currently buffered.
    pub fn len(&self) -> usize {
        self.state.lock().len
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Never blocks, even while a drain holds the state lock.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Copy buffered bytes into `dst`, blocking until some are available.
    ///
    /// Returns a count greater than zero unless `dst` is empty. Once the buffer
    /// is closed, remaining bytes are still returned; after that the read fails
    /// with [`ErrorKind::ConnectionAborted`].
    pub fn read(&self, dst: &mut [u8]) -> io::Result<usize> {
        if dst.is_empty() {
            return Ok(0);
        }
        let _turn = self.read_gate.lock();
        let mut state = self.state.lock();
        self.wait_readable(&mut state)?;
        let n = state.pop_into(dst);
        self.cond.notify_all();
        Ok(n)
    }

    /// Copy all of `src` into the buffer, blocking while it is full.
    ///
    /// Never returns a short count: either every byte is buffered or the
    /// buffer was closed, which fails with [`ErrorKind::BrokenPipe`].
    pub fn write(&self, src: &[u8]) -> io::Result<usize> {
        let _flight = InFlight::enter(self);
        let _turn = self.write_gate.lock();
        let mut state = self.state.lock();
        let mut written = 0;
        while written < src.len() {
            self.wait_writable(&mut state)?;
            written += state.push_from(&src[written..]);
        }
        Ok(written)
    }

    /// Write the buffered run straight to `sink`, blocking until there is one.
    ///
    /// The run goes out in at most two sink writes (split where it wraps).
    /// Whatever the sink accepted is consumed even if it then fails. The
    /// state lock is held while the sink accepts the run.
    pub fn drain_to<W: Write + ?Sized>(&self, sink: &mut W) -> io::Result<usize> {
        let _turn = self.read_gate.lock();
        let mut state = self.state.lock();
        self.wait_readable(&mut state)?;

        let (first, second) = state.occupied();
        let mut drained = 0;
        let result = write_run(sink, &state.storage[first], &mut drained)
            .and_then(|()| write_run(sink, &state.storage[second], &mut drained));
        state.consume(drained);
        self.cond.notify_all();
        drop(state);

        result?;
        sink.flush()?;
        Ok(drained)
    }

    /// Pull bytes from `source` until it reports end of input.
    ///
    /// End of input (including an unexpected EOF) is success and returns the
    /// number of bytes absorbed. Any other source error is returned; the bytes
    /// read before it stay buffered. The state lock is not held while the
    /// source is read.
    pub fn fill_from<R: Read + ?Sized>(&self, source: &mut R) -> io::Result<u64> {
        let _flight = InFlight::enter(self);
        let _turn = self.write_gate.lock();

        let mut chunk = [0u8; FILL_CHUNK_SIZE];
        let mut absorbed = 0u64;
        loop {
            let n = match source.read(&mut chunk) {
                Ok(0) => return Ok(absorbed),
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::UnexpectedEof => return Ok(absorbed),
                Err(err) => return Err(err),
            };

            let mut state = self.state.lock();
            let mut pushed = 0;
            while pushed < n {
                self.wait_writable(&mut state)?;
                pushed += state.push_from(&chunk[pushed..n]);
            }
            // A full buffer lets a held-back reader in; wake it before the
            // next source read, which may block.
            if state.len == self.capacity {
                self.cond.notify_all();
            }
            absorbed += n as u64;
        }
    }

    /// Close the buffer and wake every waiter.
    ///
    /// Pending and future writes fail; reads return what is still buffered
    /// and then fail.
    pub fn close(&self) {
        let _state = self.state.lock();
        self.closed.store(true, Ordering::Release);
        self.cond.notify_all();
    }

    /// Block until every buffered byte has been taken or the buffer is closed.
    /// Returns `false` if it was closed with bytes left over.
    pub fn wait_empty(&self) -> bool {
        let mut state = self.state.lock();
        while state.len > 0 && !self.is_closed() {
            self.cond.wait(&mut state);
        }
        state.len == 0
    }

    fn wait_readable(&self, state: &mut MutexGuard<'_, State>) -> io::Result<()> {
        loop {
            let closed = self.is_closed();
            if state.len > 0
                && (closed
                    || state.len == self.capacity
                    || self.writers.load(Ordering::Acquire) == 0)
            {
                return Ok(());
            }
            if closed {
                return Err(io::Error::new(
                    ErrorKind::ConnectionAborted,
                    "ring buffer closed",
                ));
            }
            self.cond.wait(state);
        }
    }

    fn wait_writable(&self, state: &mut MutexGuard<'_, State>) -> io::Result<()> {
        loop {
            if self.is_closed() {
                return Err(io::Error::new(ErrorKind::BrokenPipe, "ring buffer closed"));
            }
            if state.len < self.capacity {
                return Ok(());
            }
            // Full: make sure a reader that was holding back gets to run.
            self.cond.notify_all();
            self.cond.wait(state);
        }
    }
}

impl std::fmt::Debug for RingBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("RingBuffer")
            .field("capacity", &self.capacity)
            .field("len", &state.len)
            .field("start", &state.start)
            .field("closed", &self.is_closed())
            .field("writers", &self.writers.load(Ordering::Relaxed))
            .finish()
    }
}

fn write_run<W: Write + ?Sized>(sink: &mut W, run: &[u8], drained: &mut usize) -> io::Result<()> {
    let mut offset = 0;
    while offset < run.len() {
        match sink.write(&run[offset..]) {
            Ok(0) => return Err(io::Error::from(ErrorKind::WriteZero)),
            Ok(n) => {
                offset += n;
                *drained += n;
            }
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        }
    }
    Ok(())
}
