//! Dashboard State
//!
//! The read model presentation code consumes. Observers receive a borrowed
//! [`DashboardSnapshot`] synchronously on every publication; other threads can
//! poll an owned [`DashboardSummary`] through a [`SnapshotReader`].

use super::aggregator::{AggregateStats, EventEntry};
use super::frame::Frame;
use super::smoothing::SmoothedSignal;
use crate::transport::ConnectionState;
use crate::usecase::UseCaseConfig;
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

/// Why a snapshot was published
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PublishCause {
    /// A frame was accepted
    Frame { sequence: u64 },
    /// The connection state changed
    Connection,
    /// A new session started
    SessionReset,
}

/// Borrowed view of the read model at one revision
#[derive(Debug, Clone, Copy)]
pub struct DashboardSnapshot<'a> {
    /// Increments on every publication, never resets
    pub revision: u64,
    pub session_id: Uuid,
    pub cause: PublishCause,
    pub use_case: &'a UseCaseConfig,
    pub latest_frame: Option<&'a Frame>,
    pub smoothed: Option<&'a SmoothedSignal>,
    pub stats: &'a AggregateStats,
    pub connection: ConnectionState,
}

impl DashboardSnapshot<'_> {
    /// Owned copy for serialization or cross-thread use
    pub fn summary(&self) -> DashboardSummary {
        let latest = self.latest_frame;
        DashboardSummary {
            revision: self.revision,
            session_id: self.session_id,
            cause: self.cause,
            use_case: self.use_case.id.clone(),
            connection: self.connection,
            sequence: latest.map(Frame::sequence),
            raw: latest.map(|f| f.class_probabilities().to_vec()),
            smoothed: self.smoothed.map(|s| s.as_slice().to_vec()),
            derived_count: latest.and_then(Frame::derived_count),
            confidence: latest.map(Frame::confidence),
            predicted_class: latest.map(|f| self.use_case.class_label(f.predicted_class())),
            point_count: latest.map(|f| f.points().len()).unwrap_or(0),
            sample_count: self.stats.sample_count(),
            running_average: self.stats.running_average(),
            running_max: self.stats.running_max(),
            event_count: self.stats.event_count(),
            last_event: self.stats.last_event().cloned(),
        }
    }
}

/// Owned, serializable digest of a snapshot
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardSummary {
    pub revision: u64,
    pub session_id: Uuid,
    pub cause: PublishCause,
    pub use_case: String,
    pub connection: ConnectionState,
    pub sequence: Option<u64>,
    pub raw: Option<Vec<f64>>,
    pub smoothed: Option<Vec<f64>>,
    pub derived_count: Option<i64>,
    pub confidence: Option<f64>,
    pub predicted_class: Option<String>,
    pub point_count: usize,
    pub sample_count: u64,
    pub running_average: Option<f64>,
    pub running_max: Option<f64>,
    pub event_count: u64,
    pub last_event: Option<EventEntry>,
}

/// Handle returned by [`DashboardState::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Snapshot observer
pub type Observer = Box<dyn FnMut(&DashboardSnapshot<'_>)>;

/// Thread-safe access to the latest summary
#[derive(Debug, Clone, Default)]
pub struct SnapshotReader {
    latest: Arc<RwLock<Option<DashboardSummary>>>,
}

impl SnapshotReader {
    pub fn latest(&self) -> Option<DashboardSummary> {
        self.latest.read().clone()
    }

    pub fn revision(&self) -> Option<u64> {
        self.latest.read().as_ref().map(|s| s.revision)
    }

    fn store(&self, summary: DashboardSummary) {
        *self.latest.write() = Some(summary);
    }
}

/// Observer registry and publication counter
#[derive(Default)]
pub struct DashboardState {
    observers: Vec<(SubscriptionId, Observer)>,
    next_subscription: u64,
    revision: u64,
    reader: SnapshotReader,
}

impl DashboardState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, observer: Observer) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.observers.push((id, observer));
        id
    }

    /// Remove an observer; returns false if `id` was not registered
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(existing, _)| *existing != id);
        self.observers.len() != before
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    /// Last published revision, 0 before the first publication
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn reader(&self) -> SnapshotReader {
        self.reader.clone()
    }

    /// Publish one snapshot to every observer
    ///
    /// The revision in `snapshot` is replaced with the next revision number,
    /// which is returned.
    pub fn publish(&mut self, mut snapshot: DashboardSnapshot<'_>) -> u64 {
        self.revision += 1;
        snapshot.revision = self.revision;
        self.reader.store(snapshot.summary());
        for (_, observer) in self.observers.iter_mut() {
            observer(&snapshot);
        }
        self.revision
    }
}

impl std::fmt::Debug for DashboardState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DashboardState")
            .field("observers", &self.observers.len())
            .field("revision", &self.revision)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usecase::presets;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn snapshot<'a>(use_case: &'a UseCaseConfig, stats: &'a AggregateStats) -> DashboardSnapshot<'a> {
        DashboardSnapshot {
            revision: 0,
            session_id: Uuid::nil(),
            cause: PublishCause::Connection,
            use_case,
            latest_frame: None,
            smoothed: None,
            stats,
            connection: ConnectionState::Open,
        }
    }

    #[test]
    fn test_publish_reaches_every_observer() {
        let use_case = presets::occupancy();
        let stats = AggregateStats::default();
        let mut state = DashboardState::new();
        let seen = Rc::new(RefCell::new(Vec::new()));

        for _ in 0..2 {
            let seen = Rc::clone(&seen);
            state.subscribe(Box::new(move |s| seen.borrow_mut().push(s.revision)));
        }

        state.publish(snapshot(&use_case, &stats));
        state.publish(snapshot(&use_case, &stats));
        assert_eq!(*seen.borrow(), vec![1, 1, 2, 2]);
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let use_case = presets::occupancy();
        let stats = AggregateStats::default();
        let mut state = DashboardState::new();
        let count = Rc::new(RefCell::new(0));

        let counter = Rc::clone(&count);
        let id = state.subscribe(Box::new(move |_| *counter.borrow_mut() += 1));
        state.publish(snapshot(&use_case, &stats));

        assert!(state.unsubscribe(id));
        assert!(!state.unsubscribe(id));
        state.publish(snapshot(&use_case, &stats));
        assert_eq!(*count.borrow(), 1);
        assert_eq!(state.revision(), 2);
    }

    #[test]
    fn test_reader_sees_latest_summary() {
        let use_case = presets::fall_detection();
        let stats = AggregateStats::default();
        let mut state = DashboardState::new();
        let reader = state.reader();
        assert!(reader.latest().is_none());

        state.publish(snapshot(&use_case, &stats));
        let summary = reader.latest().unwrap();
        assert_eq!(summary.revision, 1);
        assert_eq!(summary.use_case, "fall_detection");
        assert_eq!(summary.connection, ConnectionState::Open);
        assert_eq!(summary.sample_count, 0);
    }

    #[test]
    fn test_summary_serializes_cause() {
        let use_case = presets::occupancy();
        let stats = AggregateStats::default();
        let mut snap = snapshot(&use_case, &stats);
        snap.cause = PublishCause::Frame { sequence: 9 };

        let json = serde_json::to_value(snap.summary()).unwrap();
        assert_eq!(json["cause"]["kind"], "frame");
        assert_eq!(json["cause"]["sequence"], 9);
        assert_eq!(json["sequence"], serde_json::Value::Null);
        assert_eq!(json["use_case"], "occupancy");
    }
}
