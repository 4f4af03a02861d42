//! Derived-State Pipeline
//!
//! Turns inbound JSON payloads into the dashboard read model:
//! - [`decoder`]: validation against the active use case
//! - [`smoothing`]: EMA over a bounded window of probability vectors
//! - [`aggregator`]: running statistics, event log and trend history
//! - [`state`]: observer registry and published snapshots
//! - [`ingest`]: the [`DashboardPipeline`] composing all of the above

pub mod aggregator;
pub mod decoder;
pub mod frame;
pub mod ingest;
pub mod smoothing;
pub mod state;

pub use aggregator::{AggregateStats, Aggregator, EventEntry, EventLog, TrendHistory, TrendPoint};
pub use decoder::{
    ClassCountPolicy, ConfigMismatch, Decoded, DiagnosticKind, FrameDecoder, FrameError,
};
pub use frame::{Frame, PointCloud};
pub use ingest::{DashboardPipeline, IngestOutcome, IngestStats, PipelineSettings};
pub use smoothing::{SmoothedSignal, SmoothingEngine};
pub use state::{
    DashboardSnapshot, DashboardState, DashboardSummary, Observer, PublishCause, SnapshotReader,
    SubscriptionId,
};
