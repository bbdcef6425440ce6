//! Elastic pool of buffers behind a single blocking stream.
//!
//! A [`Pool`] multiplexes any number of producers and consumers over a set
//! of identically-sized [`Buffer`]s. Buffer handles circulate through an
//! internal channel; an operation checks a handle out, tries the
//! non-blocking buffer operation, and checks the handle back in. Sustained
//! producer pressure provisions additional buffers up to `max_buffer_number`;
//! sustained drain retires empty buffers down to one. The growth threshold
//! (5 retries per live buffer) is half the retirement threshold (10 empty
//! inspections per live buffer), which damps oscillation between the two.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use kanal::{AsyncReceiver, AsyncSender};
use log::{trace, warn};
use tokio::sync::Notify;

use crate::buffer::{Buffer, TryPutError};
use crate::error::{Error, Result};

const PARK_INTERVAL: Duration = Duration::from_millis(5);

/// An elastic set of [`Buffer`]s presenting a blocking `put`/`get` stream.
pub struct Pool<T> {
    buffer_cap: u32,
    max_buffer_number: u32,
    buffer_number: AtomicU32,
    total: AtomicU64,
    handles_tx: AsyncSender<Arc<Buffer<T>>>,
    handles_rx: AsyncReceiver<Arc<Buffer<T>>>,
    closed: AtomicBool,
    // Parked producers/consumers wake on activity from the opposite side.
    nonempty: Notify,
    vacancy: Notify,
}

impl<T: Send + 'static> Pool<T> {
    /// Creates a pool holding a single buffer of capacity `buffer_cap`,
    /// growable up to `max_buffer_number` buffers. Both must be at least 1.
    pub fn new(buffer_cap: u32, max_buffer_number: u32) -> Result<Self> {
        if buffer_cap == 0 {
            return Err(Error::illegal_parameter(format!(
                "buffer capacity is invalid: {buffer_cap}"
            )));
        }
        if max_buffer_number == 0 {
            return Err(Error::illegal_parameter(format!(
                "max buffer number is invalid: {max_buffer_number}"
            )));
        }
        let (handles_tx, handles_rx) = kanal::bounded_async(max_buffer_number as usize);
        let seeded = handles_tx
            .try_send(Arc::new(Buffer::new(buffer_cap)?))
            .map_err(|_| Error::ClosedBufferPool)?;
        debug_assert!(seeded);
        Ok(Pool {
            buffer_cap,
            max_buffer_number,
            buffer_number: AtomicU32::new(1),
            total: AtomicU64::new(0),
            handles_tx,
            handles_rx,
            closed: AtomicBool::new(false),
            nonempty: Notify::new(),
            vacancy: Notify::new(),
        })
    }

    pub fn buffer_cap(&self) -> u32 {
        self.buffer_cap
    }

    pub fn max_buffer_number(&self) -> u32 {
        self.max_buffer_number
    }

    /// Number of buffers currently live in the pool.
    pub fn buffer_number(&self) -> u32 {
        self.buffer_number.load(Ordering::Acquire)
    }

    /// Number of values currently held across all buffers.
    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Acquire)
    }

    pub fn closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Stores a value, blocking until a buffer slot is available or the
    /// pool closes.
    pub async fn put(&self, datum: T) -> Result<()> {
        let mut datum = datum;
        let mut retries: u64 = 0;
        loop {
            if self.closed() {
                return Err(Error::ClosedBufferPool);
            }
            let buf = match self.handles_rx.recv().await {
                Ok(buf) => buf,
                Err(_) => return Err(Error::ClosedBufferPool),
            };
            match buf.put(datum) {
                Ok(()) => {
                    self.total.fetch_add(1, Ordering::AcqRel);
                    self.nonempty.notify_one();
                    if let Err(err) = self.check_in(buf).await {
                        self.total.fetch_sub(1, Ordering::AcqRel);
                        return Err(err);
                    }
                    return Ok(());
                }
                Err(TryPutError::Closed(_)) => {
                    // Individual buffers only close while the pool is
                    // shutting down.
                    return Err(Error::ClosedBufferPool);
                }
                Err(TryPutError::Full(rejected)) => {
                    datum = rejected;
                    retries += 1;
                    let live = self.buffer_number() as u64;
                    if retries >= live * 5 {
                        if self.reserve_buffer_slot() {
                            trace!("pool under pressure, provisioning buffer #{}", live + 1);
                            self.install_buffer(datum).await?;
                            self.check_in(buf).await?;
                            return Ok(());
                        } else {
                            // At capacity: park until a consumer frees space.
                            self.check_in(buf).await?;
                            retries = 0;
                            tokio::select! {
                                _ = self.vacancy.notified() => {}
                                _ = tokio::time::sleep(PARK_INTERVAL) => {}
                            }
                            continue;
                        }
                    }
                    self.check_in(buf).await?;
                    tokio::task::yield_now().await;
                }
            }
        }
    }

    /// Retrieves a value, blocking until one is available or the pool
    /// closes.
    pub async fn get(&self) -> Result<T> {
        let mut inspections: u64 = 0;
        loop {
            if self.closed() {
                return Err(Error::ClosedBufferPool);
            }
            let buf = match self.handles_rx.recv().await {
                Ok(buf) => buf,
                Err(_) => return Err(Error::ClosedBufferPool),
            };
            match buf.get() {
                Ok(Some(datum)) => {
                    self.total.fetch_sub(1, Ordering::AcqRel);
                    self.vacancy.notify_one();
                    // A check-in failure here only means the pool is
                    // closing; the retrieved value is still delivered.
                    if self.check_in(buf).await.is_err() {
                        warn!("buffer pool closed while returning a buffer handle");
                    }
                    return Ok(datum);
                }
                Ok(None) => {
                    inspections += 1;
                    let live = self.buffer_number() as u64;
                    if inspections >= live * 10 {
                        if self.release_buffer_slot() {
                            // Demand has dropped: retire this empty buffer.
                            trace!("pool draining, retiring a buffer ({} live)", live - 1);
                            buf.close();
                            inspections = 0;
                            continue;
                        }
                        // Single empty buffer left: park until a producer
                        // delivers.
                        self.check_in(buf).await?;
                        inspections = 0;
                        tokio::select! {
                            _ = self.nonempty.notified() => {}
                            _ = tokio::time::sleep(PARK_INTERVAL) => {}
                        }
                        continue;
                    }
                    self.check_in(buf).await?;
                    tokio::task::yield_now().await;
                }
                Err(_) => {
                    // Closed and drained; only happens during pool close.
                    return Err(Error::ClosedBufferPool);
                }
            }
        }
    }

    /// Closes the pool and every buffer it still contains. Idempotent;
    /// returns `true` exactly once. Blocked `put`/`get` calls resolve to
    /// [`Error::ClosedBufferPool`].
    pub fn close(&self) -> bool {
        if self
            .closed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        while let Ok(Some(buf)) = self.handles_rx.try_recv() {
            buf.close();
        }
        self.handles_tx.close();
        self.nonempty.notify_waiters();
        self.vacancy.notify_waiters();
        true
    }

    /// Atomically claims room for one more buffer; fails at the cap.
    fn reserve_buffer_slot(&self) -> bool {
        self.buffer_number
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < self.max_buffer_number).then_some(n + 1)
            })
            .is_ok()
    }

    /// Atomically gives up one buffer slot; fails when only one remains.
    fn release_buffer_slot(&self) -> bool {
        self.buffer_number
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n > 1).then_some(n - 1)
            })
            .is_ok()
    }

    /// Creates a buffer seeded with `datum` and enqueues its handle. The
    /// reserved slot is released if the pool closed underneath us.
    async fn install_buffer(&self, datum: T) -> Result<()> {
        let buf = Buffer::new(self.buffer_cap)?;
        // A fresh open buffer always has room for one value.
        let _ = buf.put(datum);
        self.total.fetch_add(1, Ordering::AcqRel);
        self.nonempty.notify_one();
        if self.closed() || self.handles_tx.send(Arc::new(buf)).await.is_err() {
            self.total.fetch_sub(1, Ordering::AcqRel);
            self.buffer_number.fetch_sub(1, Ordering::AcqRel);
            return Err(Error::ClosedBufferPool);
        }
        Ok(())
    }

    /// Returns a checked-out handle to the pool.
    async fn check_in(&self, buf: Arc<Buffer<T>>) -> Result<()> {
        if self.closed() {
            buf.close();
            self.buffer_number.fetch_sub(1, Ordering::AcqRel);
            return Err(Error::ClosedBufferPool);
        }
        if self.handles_tx.send(buf).await.is_err() {
            self.buffer_number.fetch_sub(1, Ordering::AcqRel);
            return Err(Error::ClosedBufferPool);
        }
        Ok(())
    }
}

impl<T> Drop for Pool<T> {
    fn drop(&mut self) {
        self.closed.store(true, Ordering::Release);
        self.handles_tx.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    #[test]
    fn invalid_parameters_rejected() {
        assert!(Pool::<u32>::new(0, 1).is_err());
        assert!(Pool::<u32>::new(1, 0).is_err());
    }

    #[tokio::test]
    async fn put_get_roundtrip() {
        let pool = Pool::new(4, 2).unwrap();
        for i in 0..4u32 {
            pool.put(i).await.unwrap();
        }
        assert_eq!(pool.total(), 4);
        let mut got = Vec::new();
        for _ in 0..4 {
            got.push(pool.get().await.unwrap());
        }
        got.sort_unstable();
        assert_eq!(got, vec![0, 1, 2, 3]);
        assert_eq!(pool.total(), 0);
    }

    #[tokio::test]
    async fn grows_under_pressure_and_ninth_put_blocks() {
        // Cap 2, max 4: eight puts fit, the ninth blocks until a consumer
        // frees a slot.
        let pool = Arc::new(Pool::new(2, 4).unwrap());
        for i in 0..8u32 {
            pool.put(i).await.unwrap();
        }
        assert_eq!(pool.buffer_number(), 4);
        assert_eq!(pool.total(), 8);

        let blocked = {
            let pool = Arc::clone(&pool);
            tokio::spawn(async move { pool.put(8).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!blocked.is_finished(), "ninth put should be blocked");

        let _ = pool.get().await.unwrap();
        timeout(Duration::from_secs(2), blocked)
            .await
            .expect("ninth put should unblock after a get")
            .unwrap()
            .unwrap();
        assert_eq!(pool.buffer_number(), 4);
    }

    #[tokio::test]
    async fn shrinks_under_drain() {
        let pool = Arc::new(Pool::new(2, 4).unwrap());
        for i in 0..8u32 {
            pool.put(i).await.unwrap();
        }
        assert_eq!(pool.buffer_number(), 4);
        for _ in 0..8 {
            pool.get().await.unwrap();
        }

        // A consumer sweeping empty buffers retires them down to one.
        let getter = {
            let pool = Arc::clone(&pool);
            tokio::spawn(async move { pool.get().await })
        };
        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        while pool.buffer_number() > 1 && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(pool.buffer_number(), 1);

        pool.put(99).await.unwrap();
        let got = timeout(Duration::from_secs(2), getter)
            .await
            .expect("parked get should resume on put")
            .unwrap()
            .unwrap();
        assert_eq!(got, 99);
    }

    #[tokio::test]
    async fn close_unblocks_waiters() {
        let pool = Arc::new(Pool::<u32>::new(1, 1).unwrap());
        let getter = {
            let pool = Arc::clone(&pool);
            tokio::spawn(async move { pool.get().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(pool.close());
        assert!(!pool.close());
        let res = timeout(Duration::from_secs(2), getter).await.unwrap().unwrap();
        assert_eq!(res, Err(Error::ClosedBufferPool));
        assert_eq!(pool.put(1).await, Err(Error::ClosedBufferPool));
    }

    #[tokio::test]
    async fn concurrent_producers_consumers() {
        let pool = Arc::new(Pool::new(8, 4).unwrap());
        let mut handles = Vec::new();
        for p in 0..4u32 {
            let pool = Arc::clone(&pool);
            handles.push(tokio::spawn(async move {
                for i in 0..100u32 {
                    pool.put(p * 100 + i).await.unwrap();
                }
            }));
        }
        let consumer = {
            let pool = Arc::clone(&pool);
            tokio::spawn(async move {
                let mut seen = Vec::with_capacity(400);
                for _ in 0..400 {
                    seen.push(pool.get().await.unwrap());
                }
                seen
            })
        };
        for h in handles {
            h.await.unwrap();
        }
        let mut seen = timeout(Duration::from_secs(10), consumer)
            .await
            .unwrap()
            .unwrap();
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), 400);
        assert_eq!(pool.total(), 0);
        assert!(pool.buffer_number() <= 4);
    }
}
