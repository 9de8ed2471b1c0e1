//! One-slot handoff between the receive loop and a blocked API caller.

use parking_lot::{Condvar, Mutex};

use crate::error::{MuxError, Result};

struct Slot<T> {
    offered: Option<T>,
    acked: bool,
    closed: bool,
}

/// The receive loop offers a value and blocks until some caller has taken it
/// and acknowledged; callers block in [`take`](Rendezvous::take) until a value
/// is offered. Closing fails every current and future participant.
pub(crate) struct Rendezvous<T> {
    slot: Mutex<Slot<T>>,
    cond: Condvar,
}

impl<T> Rendezvous<T> {
    pub(crate) fn new() -> Self {
        Self {
            slot: Mutex::new(Slot {
                offered: None,
                acked: false,
                closed: false,
            }),
            cond: Condvar::new(),
        }
    }

    /// Hand `value` to a taker and wait for its acknowledgement.
    pub(crate) fn offer(&self, value: T) -> Result<()> {
        let mut slot = self.slot.lock();
        if slot.closed {
            return Err(MuxError::Closed);
        }
        slot.offered = Some(value);
        slot.acked = false;
        self.cond.notify_all();
        while !slot.acked && !slot.closed {
            self.cond.wait(&mut slot);
        }
        if slot.acked {
            slot.acked = false;
            Ok(())
        } else {
            slot.offered = None;
            Err(MuxError::Closed)
        }
    }

    /// Wait for an offered value. The caller must [`ack`](Rendezvous::ack)
    /// once it is done with it.
    pub(crate) fn take(&self) -> Result<T> {
        let mut slot = self.slot.lock();
        loop {
            if slot.closed {
                return Err(MuxError::Closed);
            }
            if let Some(value) = slot.offered.take() {
                return Ok(value);
            }
            self.cond.wait(&mut slot);
        }
    }

    pub(crate) fn ack(&self) {
        let mut slot = self.slot.lock();
        slot.acked = true;
        self.cond.notify_all();
    }

    pub(crate) fn close(&self) {
        let mut slot = self.slot.lock();
        slot.closed = true;
        self.cond.notify_all();
    }
}
