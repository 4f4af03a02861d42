//! # Dashboard Core
//!
//! Stream ingestion and derived-state pipeline for live radar telemetry
//! dashboards (fall detection, occupancy and user-defined use cases).
//!
//! ## Overview
//!
//! A sensor backend pushes one JSON object per frame over a WebSocket. This
//! crate owns that connection, validates every frame against the active use
//! case, smooths the per-frame class probabilities and folds the frame history
//! into running statistics that presentation code can subscribe to.
//!
//! ## Quick Start
//!
//! ```no_run
//! use dashboard_core::pipeline::{DashboardPipeline, PipelineSettings};
//! use dashboard_core::usecase::presets;
//!
//! let mut pipeline = DashboardPipeline::new(presets::occupancy(), PipelineSettings::default())
//!     .expect("valid use case");
//!
//! pipeline.subscribe(Box::new(|snapshot| {
//!     println!("revision {} -> {} samples", snapshot.revision, snapshot.stats.sample_count());
//! }));
//!
//! let frame = r#"{
//!     "occupancy": {"predicted_count": 2, "probabilities": [0.1, 0.2, 0.6, 0.1]},
//!     "point_data": {"x_pos": [0.4], "y_pos": [1.2], "z_pos": [0.0]}
//! }"#;
//! let outcome = pipeline.ingest_text(0, frame);
//! assert!(outcome.is_accepted());
//! ```
//!
//! ## Architecture
//!
//! - [`transport`]: single-owner WebSocket link with an ordered inbound queue
//! - [`pipeline`]: frame decoding, smoothing, aggregation and the read model
//! - [`usecase`]: declarative use-case schemas and the built-in presets
//! - [`session`]: wires one transport to one pipeline
//! - [`time`]: clock abstraction used to stamp frames
//! - [`app`]: CLI and configuration management
//!
//! ## Data Flow
//!
//! ```text
//! ┌─────────────┐    ┌─────────────┐    ┌─────────────┐    ┌─────────────┐
//! │  WebSocket  │───▶│ Link Queue  │───▶│  Transport  │───▶│   Decoder   │
//! │  (link task)│    │   (SPSC)    │    │  dispatch   │    │             │
//! └─────────────┘    └─────────────┘    └─────────────┘    └─────────────┘
//!                                                                 │
//!                                              ┌──────────────────┤
//!                                              ▼                  ▼
//! ┌─────────────┐    ┌─────────────┐    ┌─────────────┐    ┌─────────────┐
//! │  Observers  │◀───│  Dashboard  │◀───│ Aggregator  │    │  Smoothing  │
//! │             │    │    State    │◀───│             │    │   Engine    │
//! └─────────────┘    └─────────────┘    └─────────────┘    └─────────────┘
//! ```

pub mod app;
pub mod pipeline;
pub mod session;
pub mod time;
pub mod transport;
pub mod usecase;

// Re-export commonly used types
pub use pipeline::{
    AggregateStats, DashboardPipeline, DashboardSnapshot, Frame, FrameError, IngestOutcome,
    PipelineSettings, SmoothedSignal,
};
pub use session::DashboardSession;
pub use transport::{ConnectionState, Transport, TransportError};
pub use usecase::{UseCaseConfig, UseCaseRegistry};

/// Result type alias for the dashboard core
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the dashboard core
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Frame error: {0}")]
    Frame(#[from] FrameError),

    #[error("Use case error: {0}")]
    UseCase(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("A {0} handler is already attached; detach it first")]
    HandlerAttached(&'static str),

    #[error("Runtime error: {0}")]
    Runtime(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
