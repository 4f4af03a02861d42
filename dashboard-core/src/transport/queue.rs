//! Link Event Queue
//!
//! Bounded SPSC queue between the link task (producer) and the transport
//! owner (consumer), built on `rtrb`.
//!
//! - Producer (link task): pushes one [`LinkEvent`] per socket event. When the
//!   queue is full it waits until the consumer frees a slot instead of
//!   dropping.
//! - Consumer (owner task): drains events in FIFO order, either non-blocking
//!   or by awaiting the next event.
//!
//! Every accepted event carries a gap-free sequence number.

use super::connector::Inbound;
use super::state::TransportError;
use crate::time::Timestamp;
use rtrb::{Consumer, Producer, PushError, RingBuffer};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// Default queue capacity (must be power of 2)
pub const DEFAULT_CAPACITY: usize = 1024;

/// Something the link task observed
#[derive(Debug, Clone, PartialEq)]
pub enum LinkEvent {
    /// Socket open (and handshake sent)
    Opened,
    /// One inbound frame, stamped when the socket yielded it
    Message {
        inbound: Inbound,
        received_at: Timestamp,
    },
    /// Peer closed the stream
    Closed,
    /// Connect or read failure; the link is gone
    Failed(TransportError),
}

/// Event plus its position in the link's event order
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedEvent {
    pub event: LinkEvent,
    pub sequence: u64,
}

/// Queue statistics for monitoring
#[derive(Debug, Default)]
pub struct QueueStats {
    /// Total events pushed
    pub pushed: AtomicU64,
    /// Events taken by the consumer
    pub consumed: AtomicU64,
    /// Times the producer found the queue full and had to wait
    pub backpressure_waits: AtomicU64,
    /// Peak queue occupancy
    pub peak_occupancy: AtomicU64,
}

impl QueueStats {
    pub fn pushed(&self) -> u64 {
        self.pushed.load(Ordering::Relaxed)
    }

    pub fn consumed(&self) -> u64 {
        self.consumed.load(Ordering::Relaxed)
    }

    pub fn backpressure_waits(&self) -> u64 {
        self.backpressure_waits.load(Ordering::Relaxed)
    }

    pub fn peak_occupancy(&self) -> u64 {
        self.peak_occupancy.load(Ordering::Relaxed)
    }

    fn record_occupancy(&self, occupied: u64) {
        let mut peak = self.peak_occupancy.load(Ordering::Relaxed);
        while occupied > peak {
            match self.peak_occupancy.compare_exchange_weak(
                peak,
                occupied,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(p) => peak = p,
            }
        }
    }
}

/// Create a queue and split it into its two halves
///
/// # Panics
/// Panics if capacity is not a power of 2
pub fn link_queue(capacity: usize) -> (LinkSender, LinkReceiver) {
    assert!(
        capacity.is_power_of_two(),
        "Link queue capacity must be a power of 2"
    );

    let (producer, consumer) = RingBuffer::new(capacity);
    let stats = Arc::new(QueueStats::default());
    let notify = Arc::new(Notify::new());
    let space = Arc::new(Notify::new());
    let sender_gone = Arc::new(AtomicBool::new(false));
    let receiver_gone = Arc::new(AtomicBool::new(false));

    (
        LinkSender {
            inner: producer,
            sequence: 0,
            stats: Arc::clone(&stats),
            notify: Arc::clone(&notify),
            space: Arc::clone(&space),
            sender_gone: Arc::clone(&sender_gone),
            receiver_gone: Arc::clone(&receiver_gone),
            capacity,
        },
        LinkReceiver {
            inner: consumer,
            stats,
            notify,
            space,
            sender_gone,
            receiver_gone,
        },
    )
}

/// Producer half (link task)
pub struct LinkSender {
    inner: Producer<QueuedEvent>,
    sequence: u64,
    stats: Arc<QueueStats>,
    notify: Arc<Notify>,
    space: Arc<Notify>,
    sender_gone: Arc<AtomicBool>,
    receiver_gone: Arc<AtomicBool>,
    capacity: usize,
}

impl LinkSender {
    /// Push without waiting
    ///
    /// Returns the assigned sequence number, or the event back if the queue
    /// is full. Sequence numbers are only consumed by successful pushes.
    pub fn try_send(&mut self, event: LinkEvent) -> Result<u64, LinkEvent> {
        let sequence = self.sequence;
        match self.inner.push(QueuedEvent { event, sequence }) {
            Ok(()) => {
                self.sequence += 1;
                self.stats.pushed.fetch_add(1, Ordering::Relaxed);
                let occupied = self.capacity - self.inner.slots();
                self.stats.record_occupancy(occupied as u64);
                self.notify.notify_one();
                Ok(sequence)
            }
            Err(PushError::Full(queued)) => Err(queued.event),
        }
    }

    /// Push, waiting while the queue is full
    ///
    /// The wait ends when the consumer takes an event or goes away. Returns
    /// `None` if the receiver is gone.
    pub async fn send(&mut self, mut event: LinkEvent) -> Option<u64> {
        let mut waited = false;
        loop {
            if self.is_abandoned() {
                return None;
            }
            match self.try_send(event) {
                Ok(sequence) => return Some(sequence),
                Err(returned) => {
                    if !waited {
                        self.stats.backpressure_waits.fetch_add(1, Ordering::Relaxed);
                        waited = true;
                    }
                    event = returned;
                    // a pop between the failed push and this await leaves a permit
                    self.space.notified().await;
                }
            }
        }
    }

    /// The receiver half is gone
    pub fn is_abandoned(&self) -> bool {
        self.receiver_gone.load(Ordering::Acquire) || self.inner.is_abandoned()
    }

    /// Free slots
    pub fn available_slots(&self) -> usize {
        self.inner.slots()
    }

    pub fn is_full(&self) -> bool {
        self.inner.is_full()
    }

    /// Next sequence number to be assigned
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn stats(&self) -> Arc<QueueStats> {
        Arc::clone(&self.stats)
    }
}

impl Drop for LinkSender {
    fn drop(&mut self) {
        // the rtrb producer is dropped after this body runs, so flag first
        self.sender_gone.store(true, Ordering::Release);
        self.notify.notify_one();
    }
}

/// Consumer half (owner task)
pub struct LinkReceiver {
    inner: Consumer<QueuedEvent>,
    stats: Arc<QueueStats>,
    notify: Arc<Notify>,
    space: Arc<Notify>,
    sender_gone: Arc<AtomicBool>,
    receiver_gone: Arc<AtomicBool>,
}

impl LinkReceiver {
    /// Take the next event if one is queued
    pub fn try_recv(&mut self) -> Option<QueuedEvent> {
        match self.inner.pop() {
            Ok(queued) => {
                self.stats.consumed.fetch_add(1, Ordering::Relaxed);
                self.space.notify_one();
                Some(queued)
            }
            Err(_) => None,
        }
    }

    /// Wait for the next event
    ///
    /// Returns `None` once the sender is gone and the queue is drained.
    pub async fn recv(&mut self) -> Option<QueuedEvent> {
        loop {
            if let Some(queued) = self.try_recv() {
                return Some(queued);
            }
            if self.is_abandoned() {
                // the sender may have pushed right before dropping
                return self.try_recv();
            }
            self.notify.notified().await;
        }
    }

    /// The sender half is gone
    pub fn is_abandoned(&self) -> bool {
        self.sender_gone.load(Ordering::Acquire) || self.inner.is_abandoned()
    }

    /// Events waiting to be consumed
    pub fn available(&self) -> usize {
        self.inner.slots()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn stats(&self) -> Arc<QueueStats> {
        Arc::clone(&self.stats)
    }
}

impl Drop for LinkReceiver {
    fn drop(&mut self) {
        self.receiver_gone.store(true, Ordering::Release);
        self.space.notify_one();
    }
}
