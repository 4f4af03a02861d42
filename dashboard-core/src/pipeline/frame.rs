//! Canonical decoded frame

use super::decoder::FrameError;
use crate::time::Timestamp;
use serde::Serialize;

/// Spatial points of one frame as three parallel coordinate arrays
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct PointCloud {
    x: Vec<f64>,
    y: Vec<f64>,
    z: Vec<f64>,
}

impl PointCloud {
    /// Build a point cloud; the three arrays must have equal length
    pub fn new(x: Vec<f64>, y: Vec<f64>, z: Vec<f64>) -> Result<Self, FrameError> {
        if x.len() != y.len() || y.len() != z.len() {
            return Err(FrameError::UnequalPoints {
                x: x.len(),
                y: y.len(),
                z: z.len(),
            });
        }
        Ok(Self { x, y, z })
    }

    pub fn x(&self) -> &[f64] {
        &self.x
    }

    pub fn y(&self) -> &[f64] {
        &self.y
    }

    pub fn z(&self) -> &[f64] {
        &self.z
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// Iterate over `(x, y, z)` triples
    pub fn iter(&self) -> impl Iterator<Item = (f64, f64, f64)> + '_ {
        self.x
            .iter()
            .zip(&self.y)
            .zip(&self.z)
            .map(|((x, y), z)| (*x, *y, *z))
    }
}

/// One decoded telemetry sample
///
/// Immutable after construction; shared with the read model behind an `Arc`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Frame {
    sequence: u64,
    received_at: Timestamp,
    class_probabilities: Vec<f64>,
    derived_count: Option<i64>,
    points: PointCloud,
    event_flag: Option<bool>,
}

impl Frame {
    /// Build a frame from its class probabilities
    ///
    /// Every probability must be finite and within [0, 1]; the vector must
    /// not be empty.
    pub fn new(
        sequence: u64,
        received_at: Timestamp,
        class_probabilities: Vec<f64>,
    ) -> Result<Self, FrameError> {
        if class_probabilities.is_empty() {
            return Err(FrameError::Empty {
                field: "class_probabilities".to_string(),
            });
        }
        if let Some((index, value)) = class_probabilities
            .iter()
            .enumerate()
            .find(|(_, p)| !p.is_finite() || !(0.0..=1.0).contains(*p))
        {
            return Err(FrameError::OutOfRange {
                field: format!("class_probabilities[{}]", index),
                value: *value,
            });
        }

        Ok(Self {
            sequence,
            received_at,
            class_probabilities,
            derived_count: None,
            points: PointCloud::default(),
            event_flag: None,
        })
    }

    pub fn with_derived_count(mut self, count: i64) -> Self {
        self.derived_count = Some(count);
        self
    }

    pub fn with_event_flag(mut self, flag: bool) -> Self {
        self.event_flag = Some(flag);
        self
    }

    pub fn with_points(mut self, points: PointCloud) -> Self {
        self.points = points;
        self
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn received_at(&self) -> Timestamp {
        self.received_at
    }

    pub fn class_probabilities(&self) -> &[f64] {
        &self.class_probabilities
    }

    pub fn derived_count(&self) -> Option<i64> {
        self.derived_count
    }

    pub fn points(&self) -> &PointCloud {
        &self.points
    }

    pub fn event_flag(&self) -> Option<bool> {
        self.event_flag
    }

    /// Frame reports an event (`event_flag == Some(true)`)
    pub fn is_event(&self) -> bool {
        self.event_flag == Some(true)
    }

    /// Highest class probability
    pub fn confidence(&self) -> f64 {
        self.class_probabilities
            .iter()
            .copied()
            .fold(0.0, f64::max)
    }

    /// Index of the highest class probability (first wins on ties)
    pub fn predicted_class(&self) -> usize {
        let mut best = 0;
        for (i, p) in self.class_probabilities.iter().enumerate() {
            if *p > self.class_probabilities[best] {
                best = i;
            }
        }
        best
    }
}
