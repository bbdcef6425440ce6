//! Bounded FIFO buffer with non-blocking operations.
//!
//! [`Buffer`] is the unit of storage inside a [`Pool`](crate::pool::Pool).
//! `put` and `get` never block: a full buffer rejects the value, an empty
//! buffer yields nothing. Closing is idempotent and is serialized against
//! in-flight puts, so no put can succeed once `close` has returned.

use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam::queue::ArrayQueue;
use parking_lot::RwLock;

use crate::error::{Error, Result};

/// Why a non-blocking [`Buffer::put`] did not accept the value. The value
/// is handed back in both cases, mirroring `std`'s `TrySendError`.
#[derive(Debug)]
pub enum TryPutError<T> {
    /// The buffer is at capacity.
    Full(T),
    /// The buffer has been closed.
    Closed(T),
}

impl<T> TryPutError<T> {
    /// Recovers the rejected value.
    pub fn into_inner(self) -> T {
        match self {
            TryPutError::Full(v) | TryPutError::Closed(v) => v,
        }
    }
}

/// A bounded FIFO of opaque values with non-blocking `put`/`get`.
pub struct Buffer<T> {
    queue: ArrayQueue<T>,
    closed: AtomicBool,
    // Serializes close against in-flight puts.
    closing: RwLock<()>,
}

impl<T> Buffer<T> {
    /// Creates a buffer with the given capacity. Zero is rejected.
    pub fn new(cap: u32) -> Result<Self> {
        if cap == 0 {
            return Err(Error::illegal_parameter(format!(
                "buffer capacity is invalid: {cap}"
            )));
        }
        Ok(Buffer {
            queue: ArrayQueue::new(cap as usize),
            closed: AtomicBool::new(false),
            closing: RwLock::new(()),
        })
    }

    pub fn cap(&self) -> u32 {
        self.queue.capacity() as u32
    }

    pub fn len(&self) -> u32 {
        self.queue.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Enqueues a value without blocking. Returns the value back if the
    /// buffer is full or closed.
    pub fn put(&self, datum: T) -> std::result::Result<(), TryPutError<T>> {
        let _guard = self.closing.read();
        if self.closed() {
            return Err(TryPutError::Closed(datum));
        }
        self.queue.push(datum).map_err(TryPutError::Full)
    }

    /// Dequeues a value without blocking. `Ok(None)` means the buffer is
    /// empty but still open; a closed and drained buffer yields
    /// [`Error::ClosedBuffer`].
    pub fn get(&self) -> Result<Option<T>> {
        match self.queue.pop() {
            Some(datum) => Ok(Some(datum)),
            None => {
                if self.closed() {
                    Err(Error::ClosedBuffer)
                } else {
                    Ok(None)
                }
            }
        }
    }

    /// Closes the buffer. Returns `true` exactly once; later calls are
    /// no-ops returning `false`. Remaining values stay readable via `get`.
    pub fn close(&self) -> bool {
        if self
            .closed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            // Wait out puts that entered before the flag flipped.
            let _guard = self.closing.write();
            true
        } else {
            false
        }
    }

    pub fn closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}
