//! Use-case schemas
//!
//! A use case tells the pipeline where each canonical frame field lives in the
//! backend's JSON, which fields every frame must carry, and which derived
//! metrics apply. The pipeline is parameterized by a [`UseCaseConfig`] but
//! never constructs or mutates one.

pub mod config;
pub mod presets;
pub mod registry;

pub use config::{
    DataFormat, FieldMap, MetricField, PointFields, ProbabilitySource, UseCaseConfig,
    Visualization,
};
pub use registry::UseCaseRegistry;
