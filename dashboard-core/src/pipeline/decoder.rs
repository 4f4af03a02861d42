//! Frame Decoder
//!
//! Validates an inbound JSON value against the active use case and turns it
//! into a canonical [`Frame`]:
//!
//! 1. Every path in [`UseCaseConfig::required_paths`] must be present and
//!    non-null.
//! 2. The probability source must be a non-empty numeric array (or a single
//!    number `p`, expanded to `[p, 1 - p]`) with every value in [0, 1].
//! 3. Point arrays must be numeric and of equal length.
//! 4. `derived_count` must be an integer and `event_flag` a boolean.
//!
//! Optional fields that are present with the wrong type are ignored unless
//! they are required. A probability vector whose length differs from the use
//! case's class count is handled per [`ClassCountPolicy`].

use super::frame::{Frame, PointCloud};
use crate::time::Timestamp;
use crate::usecase::{ProbabilitySource, UseCaseConfig};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Why a frame was dropped
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FrameError {
    #[error("payload is not valid JSON: {0}")]
    Undecodable(String),

    #[error("payload is not a JSON object")]
    NotAnObject,

    #[error("missing required field '{path}'")]
    MissingField { path: String },

    #[error("field '{path}' is not {expected}")]
    WrongType { path: String, expected: &'static str },

    #[error("{field} = {value} is outside [0, 1]")]
    OutOfRange { field: String, value: f64 },

    #[error("point arrays differ in length (x={x}, y={y}, z={z})")]
    UnequalPoints { x: usize, y: usize, z: usize },

    #[error("expected {expected} class probabilities, got {actual}")]
    ClassCountMismatch { expected: usize, actual: usize },

    #[error("field '{field}' is empty")]
    Empty { field: String },
}

impl FrameError {
    /// Per-frame errors always drop exactly one message
    pub fn kind(&self) -> DiagnosticKind {
        DiagnosticKind::MalformedFrame
    }
}

/// Per-frame diagnostic categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// Frame dropped
    MalformedFrame,
    /// Frame accepted, but its class count disagrees with the use case
    ConfigMismatch,
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagnosticKind::MalformedFrame => f.write_str("malformed_frame"),
            DiagnosticKind::ConfigMismatch => f.write_str("config_mismatch"),
        }
    }
}

/// Class-count disagreement on an accepted frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigMismatch {
    pub expected: usize,
    pub actual: usize,
}

impl ConfigMismatch {
    pub fn kind(&self) -> DiagnosticKind {
        DiagnosticKind::ConfigMismatch
    }
}

/// What to do when a probability vector has the wrong length
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassCountPolicy {
    /// Drop the frame as malformed
    #[default]
    Strict,
    /// Accept the frame and report a [`ConfigMismatch`]
    Lenient,
}

impl std::str::FromStr for ClassCountPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "strict" => Ok(ClassCountPolicy::Strict),
            "lenient" => Ok(ClassCountPolicy::Lenient),
            other => Err(format!(
                "unknown class count policy '{}' (expected strict or lenient)",
                other
            )),
        }
    }
}

/// Successfully decoded frame plus any lenient-mode diagnostic
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded {
    pub frame: Frame,
    pub mismatch: Option<ConfigMismatch>,
}

/// Decoder bound to one use case
#[derive(Debug, Clone)]
pub struct FrameDecoder {
    use_case: Arc<UseCaseConfig>,
    policy: ClassCountPolicy,
    required: Vec<String>,
}

impl FrameDecoder {
    pub fn new(use_case: Arc<UseCaseConfig>, policy: ClassCountPolicy) -> Self {
        let required = use_case
            .required_paths()
            .into_iter()
            .map(str::to_string)
            .collect();
        Self {
            use_case,
            policy,
            required,
        }
    }

    pub fn use_case(&self) -> &Arc<UseCaseConfig> {
        &self.use_case
    }

    pub fn policy(&self) -> ClassCountPolicy {
        self.policy
    }

    /// Paths that must be present in every frame
    pub fn required_paths(&self) -> &[String] {
        &self.required
    }

    /// Parse `text` as JSON and decode it
    pub fn decode_text(
        &self,
        text: &str,
        sequence: u64,
        received_at: Timestamp,
    ) -> Result<Decoded, FrameError> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| FrameError::Undecodable(e.to_string()))?;
        self.decode(&value, sequence, received_at)
    }

    /// Validate and normalize one inbound value
    pub fn decode(
        &self,
        value: &Value,
        sequence: u64,
        received_at: Timestamp,
    ) -> Result<Decoded, FrameError> {
        if !value.is_object() {
            return Err(FrameError::NotAnObject);
        }

        if let Some(missing) = self.required.iter().find(|p| lookup(value, p).is_none()) {
            return Err(FrameError::MissingField {
                path: missing.clone(),
            });
        }

        let probabilities = self.probabilities(value)?;

        let mut mismatch = None;
        if probabilities.len() != self.use_case.num_classes {
            let expected = self.use_case.num_classes;
            let actual = probabilities.len();
            match self.policy {
                ClassCountPolicy::Strict => {
                    return Err(FrameError::ClassCountMismatch { expected, actual })
                }
                ClassCountPolicy::Lenient => mismatch = Some(ConfigMismatch { expected, actual }),
            }
        }

        let mut frame = Frame::new(sequence, received_at, probabilities)?;

        if let Some(path) = &self.use_case.fields.derived_count {
            if let Some(count) = self.extract(value, path, "an integer", as_integer)? {
                frame = frame.with_derived_count(count);
            }
        }

        if let Some(path) = &self.use_case.fields.event_flag {
            if let Some(flag) = self.extract(value, path, "a boolean", Value::as_bool)? {
                frame = frame.with_event_flag(flag);
            }
        }

        if let Some(points) = self.points(value)? {
            frame = frame.with_points(points);
        }

        Ok(Decoded { frame, mismatch })
    }

    fn probabilities(&self, value: &Value) -> Result<Vec<f64>, FrameError> {
        match &self.use_case.fields.probabilities {
            ProbabilitySource::Vector { path } => {
                let raw = lookup(value, path).ok_or_else(|| FrameError::MissingField {
                    path: path.clone(),
                })?;
                let probabilities =
                    as_number_array(raw).ok_or_else(|| FrameError::WrongType {
                        path: path.clone(),
                        expected: "an array of numbers",
                    })?;
                if probabilities.is_empty() {
                    return Err(FrameError::Empty { field: path.clone() });
                }
                Ok(probabilities)
            }
            ProbabilitySource::Binary { path } => {
                let raw = lookup(value, path).ok_or_else(|| FrameError::MissingField {
                    path: path.clone(),
                })?;
                let p = raw.as_f64().ok_or_else(|| FrameError::WrongType {
                    path: path.clone(),
                    expected: "a number",
                })?;
                if !(0.0..=1.0).contains(&p) {
                    return Err(FrameError::OutOfRange {
                        field: path.clone(),
                        value: p,
                    });
                }
                Ok(vec![p, 1.0 - p])
            }
        }
    }

    fn points(&self, value: &Value) -> Result<Option<PointCloud>, FrameError> {
        let fields = match &self.use_case.fields.points {
            Some(fields) => fields,
            None => return Ok(None),
        };
        let required = fields.paths().iter().any(|p| self.is_required(p));

        let x = self.extract(value, &fields.x, "an array of numbers", as_number_array)?;
        let y = self.extract(value, &fields.y, "an array of numbers", as_number_array)?;
        let z = self.extract(value, &fields.z, "an array of numbers", as_number_array)?;

        match (x, y, z) {
            (Some(x), Some(y), Some(z)) => match PointCloud::new(x, y, z) {
                Ok(cloud) => Ok(Some(cloud)),
                Err(e) if required => Err(e),
                Err(e) => {
                    debug!(error = %e, "Ignoring optional point arrays");
                    Ok(None)
                }
            },
            _ => Ok(None),
        }
    }

    /// Read an optional field; wrong types only fail required fields
    fn extract<T>(
        &self,
        value: &Value,
        path: &str,
        expected: &'static str,
        parse: impl Fn(&Value) -> Option<T>,
    ) -> Result<Option<T>, FrameError> {
        let raw = match lookup(value, path) {
            Some(raw) => raw,
            None => return Ok(None),
        };
        match parse(raw) {
            Some(parsed) => Ok(Some(parsed)),
            None if self.is_required(path) => Err(FrameError::WrongType {
                path: path.to_string(),
                expected,
            }),
            None => {
                debug!(path, expected, "Ignoring optional field of unexpected type");
                Ok(None)
            }
        }
    }

    fn is_required(&self, path: &str) -> bool {
        self.required.iter().any(|p| p == path)
    }
}

/// Resolve a dotted path; `null` counts as absent
///
/// Segments index objects by key and arrays by position.
pub fn lookup<'v>(value: &'v Value, path: &str) -> Option<&'v Value> {
    let mut current = value;
    for segment in path.split('.') {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    if current.is_null() {
        None
    } else {
        Some(current)
    }
}

fn as_number_array(value: &Value) -> Option<Vec<f64>> {
    value.as_array()?.iter().map(Value::as_f64).collect()
}

fn as_integer(value: &Value) -> Option<i64> {
    value.as_i64()
}
