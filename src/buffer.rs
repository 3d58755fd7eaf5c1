//! Event buffers between the hot path and the maintenance section.
//!
//! Reads and writes are recorded as events instead of touching policy state
//! directly. Each event type has its own buffer discipline:
//!
//! - **Reads** go to one of several bounded stripes picked by key hash. A
//!   full stripe drops the event; losing a read only blurs recency.
//! - **Writes** go to a single bounded queue that never drops. A producer
//!   that finds it full must drain it before retrying (see
//!   [`WriteBuffer::try_push`]).
//!
//! Events are consumed in enqueue order within each stripe.

use crossbeam_channel::{Receiver, Sender, TryRecvError, TrySendError};

/// Capacity of one read stripe.
pub(crate) const READ_BUFFER_SIZE: usize = 64;
/// Stripe occupancy at which a drain is requested.
pub(crate) const READ_BUFFER_FLUSH_POINT: usize = READ_BUFFER_SIZE / 2;
/// Capacity of the write queue.
pub(crate) const WRITE_BUFFER_SIZE: usize = 128;

/// Outcome of recording a read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReadStatus {
    /// Recorded; the stripe is below its flush point.
    Recorded,
    /// Recorded; the stripe has reached its flush point.
    Full,
    /// The stripe had no room and the event was dropped.
    Dropped,
}

#[derive(Debug)]
struct Stripe<T> {
    tx: Sender<T>,
    rx: Receiver<T>,
}

/// Hash-striped set of lossy bounded queues.
#[derive(Debug)]
pub(crate) struct StripedReadBuffer<T> {
    stripes: Box<[Stripe<T>]>,
}

impl<T> StripedReadBuffer<T> {
    pub(crate) fn new(stripes: usize) -> Self {
        let stripes = (0..stripes.max(1))
            .map(|_| {
                let (tx, rx) = crossbeam_channel::bounded(READ_BUFFER_SIZE);
                Stripe { tx, rx }
            })
            .collect::<Vec<_>>();
        StripedReadBuffer {
            stripes: stripes.into_boxed_slice(),
        }
    }

    #[inline]
    pub(crate) fn stripe_count(&self) -> usize {
        self.stripes.len()
    }

    #[inline]
    fn stripe_for(&self, hash: u64) -> &Stripe<T> {
        // same bits the table stripes on
        &self.stripes[((hash >> 32) as usize) % self.stripes.len()]
    }

    /// Records `event` in the stripe chosen by `hash`.
    pub(crate) fn push(&self, hash: u64, event: T) -> ReadStatus {
        let stripe = self.stripe_for(hash);
        match stripe.tx.try_send(event) {
            Ok(()) if stripe.tx.len() >= READ_BUFFER_FLUSH_POINT => ReadStatus::Full,
            Ok(()) => ReadStatus::Recorded,
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => ReadStatus::Dropped,
        }
    }

    /// Takes up to one stripe's worth of events from every stripe, stripe by
    /// stripe, each in enqueue order.
    pub(crate) fn drain_into(&self, mut sink: impl FnMut(T)) -> usize {
        let mut taken = 0;
        for stripe in self.stripes.iter() {
            for _ in 0..READ_BUFFER_SIZE {
                match stripe.rx.try_recv() {
                    Ok(event) => {
                        sink(event);
                        taken += 1;
                    }
                    Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
                }
            }
        }
        taken
    }

    /// Total buffered events across stripes.
    pub(crate) fn len(&self) -> usize {
        self.stripes.iter().map(|s| s.rx.len()).sum()
    }
}

/// Bounded queue that hands a rejected event back instead of dropping it.
#[derive(Debug)]
pub(crate) struct WriteBuffer<T> {
    tx: Sender<T>,
    rx: Receiver<T>,
}

impl<T> WriteBuffer<T> {
    pub(crate) fn new() -> Self {
        let (tx, rx) = crossbeam_channel::bounded(WRITE_BUFFER_SIZE);
        WriteBuffer { tx, rx }
    }

    /// Enqueues `event`, or returns it when the queue is full.
    pub(crate) fn try_push(&self, event: T) -> Result<(), T> {
        self.tx.try_send(event).map_err(|err| match err {
            TrySendError::Full(event) | TrySendError::Disconnected(event) => event,
        })
    }

    /// Takes up to one queue's worth of events in enqueue order.
    pub(crate) fn drain_into(&self, mut sink: impl FnMut(T)) -> usize {
        let mut taken = 0;
        while taken < WRITE_BUFFER_SIZE {
            match self.rx.try_recv() {
                Ok(event) => {
                    sink(event);
                    taken += 1;
                }
                Err(_) => break,
            }
        }
        taken
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    pub(crate) fn len(&self) -> usize {
        self.rx.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_stripe_reports_flush_point_then_drops() {
        let buffer = StripedReadBuffer::new(1);
        for i in 0..READ_BUFFER_FLUSH_POINT - 1 {
            assert_eq!(buffer.push(0, i), ReadStatus::Recorded);
        }
        assert_eq!(buffer.push(0, 999), ReadStatus::Full);
        for i in READ_BUFFER_FLUSH_POINT..READ_BUFFER_SIZE {
            assert_eq!(buffer.push(0, i), ReadStatus::Full);
        }
        assert_eq!(buffer.push(0, 0), ReadStatus::Dropped);
        assert_eq!(buffer.len(), READ_BUFFER_SIZE);
    }

    #[test]
    fn test_read_drain_preserves_stripe_order() {
        let buffer = StripedReadBuffer::new(4);
        let hash = 7u64 << 32;
        for i in 0..10 {
            buffer.push(hash, i);
        }
        let mut seen = Vec::new();
        assert_eq!(buffer.drain_into(|e| seen.push(e)), 10);
        assert_eq!(seen, (0..10).collect::<Vec<_>>());
        assert_eq!(buffer.len(), 0);
    }

    #[test]
    fn test_read_stripes_are_independent() {
        let buffer = StripedReadBuffer::new(2);
        assert_eq!(buffer.stripe_count(), 2);
        for i in 0..READ_BUFFER_SIZE {
            buffer.push(0, i);
        }
        assert_eq!(buffer.push(0, 0), ReadStatus::Dropped);
        assert_eq!(buffer.push(1u64 << 32, 0), ReadStatus::Recorded);
    }

    #[test]
    fn test_write_buffer_returns_rejected_event() {
        let buffer = WriteBuffer::new();
        for i in 0..WRITE_BUFFER_SIZE {
            assert!(buffer.try_push(i).is_ok());
        }
        assert_eq!(buffer.try_push(1234), Err(1234));
        assert_eq!(buffer.len(), WRITE_BUFFER_SIZE);

        let mut seen = Vec::new();
        buffer.drain_into(|e| seen.push(e));
        assert_eq!(seen.len(), WRITE_BUFFER_SIZE);
        assert_eq!(seen[0], 0);
        assert!(buffer.is_empty());
        assert!(buffer.try_push(1234).is_ok());
    }
}
