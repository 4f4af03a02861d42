//! Aggregator
//!
//! Folds accepted frames into running statistics for the current session:
//! sample count, incremental mean and maximum of the use case's metric, a
//! chronological event log and a short trend history of the metric.

use super::frame::Frame;
use crate::time::Timestamp;
use crate::usecase::{MetricField, UseCaseConfig};
use serde::Serialize;
use std::collections::VecDeque;
use tracing::{info, warn};

/// Default number of trend points kept
pub const DEFAULT_TREND_CAPACITY: usize = 120;

/// One logged event
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventEntry {
    pub sequence: u64,
    pub timestamp: Timestamp,
    /// Probability of the use case's event class, `None` if the frame's
    /// vector is too short to carry it
    pub value: Option<f64>,
}

/// Append-only event log
///
/// Unbounded by default. With a capacity it becomes a fixed-size ring that
/// drops the oldest entry, counting and logging every eviction.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EventLog {
    entries: VecDeque<EventEntry>,
    capacity: Option<usize>,
    evicted: u64,
    total: u64,
}

impl EventLog {
    /// `Some(0)` is treated as unbounded
    pub fn new(capacity: Option<usize>) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity: capacity.filter(|c| *c > 0),
            evicted: 0,
            total: 0,
        }
    }

    pub fn push(&mut self, entry: EventEntry) {
        if let Some(capacity) = self.capacity {
            if self.entries.len() == capacity {
                if let Some(oldest) = self.entries.pop_front() {
                    self.evicted += 1;
                    warn!(
                        sequence = oldest.sequence,
                        capacity,
                        evicted = self.evicted,
                        "Event log full, evicting oldest entry"
                    );
                }
            }
        }
        self.entries.push_back(entry);
        self.total += 1;
    }

    /// Entries in arrival order
    pub fn entries(&self) -> impl Iterator<Item = &EventEntry> + '_ {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last(&self) -> Option<&EventEntry> {
        self.entries.back()
    }

    /// Events recorded this session, evicted ones included
    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn evicted(&self) -> u64 {
        self.evicted
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }
}

/// One metric reading on the trend chart
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrendPoint {
    pub timestamp: Timestamp,
    pub value: f64,
}

/// Fixed-size history of metric readings
#[derive(Debug, Clone, Serialize)]
pub struct TrendHistory {
    points: VecDeque<TrendPoint>,
    capacity: usize,
}

impl TrendHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            points: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, point: TrendPoint) {
        if self.points.len() == self.capacity {
            self.points.pop_front();
        }
        self.points.push_back(point);
    }

    pub fn points(&self) -> impl Iterator<Item = &TrendPoint> + '_ {
        self.points.iter()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

impl Default for TrendHistory {
    fn default() -> Self {
        Self::new(DEFAULT_TREND_CAPACITY)
    }
}

/// Session statistics
#[derive(Debug, Clone, Default, Serialize)]
pub struct AggregateStats {
    sample_count: u64,
    metric_samples: u64,
    running_average: Option<f64>,
    running_max: Option<f64>,
    last_value: Option<f64>,
    event_log: EventLog,
    trend: TrendHistory,
}

impl AggregateStats {
    pub fn new(event_log_capacity: Option<usize>, trend_capacity: usize) -> Self {
        Self {
            event_log: EventLog::new(event_log_capacity),
            trend: TrendHistory::new(trend_capacity),
            ..Default::default()
        }
    }

    /// Accepted frames this session
    pub fn sample_count(&self) -> u64 {
        self.sample_count
    }

    /// Frames that carried the metric
    pub fn metric_samples(&self) -> u64 {
        self.metric_samples
    }

    pub fn running_average(&self) -> Option<f64> {
        self.running_average
    }

    pub fn running_max(&self) -> Option<f64> {
        self.running_max
    }

    /// Metric of the most recent frame that carried it
    pub fn last_value(&self) -> Option<f64> {
        self.last_value
    }

    pub fn event_log(&self) -> &EventLog {
        &self.event_log
    }

    pub fn event_count(&self) -> u64 {
        self.event_log.total()
    }

    pub fn last_event(&self) -> Option<&EventEntry> {
        self.event_log.last()
    }

    pub fn trend(&self) -> &TrendHistory {
        &self.trend
    }

    fn record_metric(&mut self, value: f64, at: Timestamp) {
        self.metric_samples += 1;
        let mean = self.running_average.unwrap_or(0.0);
        self.running_average = Some(mean + (value - mean) / self.metric_samples as f64);
        self.running_max = Some(match self.running_max {
            Some(max) if max >= value => max,
            _ => value,
        });
        self.last_value = Some(value);
        self.trend.push(TrendPoint {
            timestamp: at,
            value,
        });
    }
}

/// Per-session frame folder
#[derive(Debug, Clone)]
pub struct Aggregator {
    metric: MetricField,
    event_class_index: usize,
    stats: AggregateStats,
}

impl Aggregator {
    pub fn new(
        use_case: &UseCaseConfig,
        event_log_capacity: Option<usize>,
        trend_capacity: usize,
    ) -> Self {
        Self {
            metric: use_case.metric,
            event_class_index: use_case.event_class_index,
            stats: AggregateStats::new(event_log_capacity, trend_capacity),
        }
    }

    /// Fold one accepted frame; returns true if it was logged as an event
    pub fn record(&mut self, frame: &Frame) -> bool {
        self.stats.sample_count += 1;

        if let Some(value) = self.metric_value(frame) {
            self.stats.record_metric(value, frame.received_at());
        }

        if !frame.is_event() {
            return false;
        }
        let value = frame
            .class_probabilities()
            .get(self.event_class_index)
            .copied();
        info!(
            sequence = frame.sequence(),
            value = ?value,
            "Event recorded"
        );
        self.stats.event_log.push(EventEntry {
            sequence: frame.sequence(),
            timestamp: frame.received_at(),
            value,
        });
        true
    }

    /// Value of the designated metric for `frame`, if it carries one
    pub fn metric_value(&self, frame: &Frame) -> Option<f64> {
        match self.metric {
            MetricField::DerivedCount => frame.derived_count().map(|c| c as f64),
            MetricField::ClassProbability { index } => {
                frame.class_probabilities().get(index).copied()
            }
        }
    }

    pub fn stats(&self) -> &AggregateStats {
        &self.stats
    }
}
