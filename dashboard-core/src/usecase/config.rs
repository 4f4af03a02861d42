//! Use-case configuration types

use serde::{Deserialize, Serialize};

/// Declarative description of one dashboard use case
///
/// Scalar fields come before nested tables so the struct serializes cleanly
/// as a TOML `[[use_cases]]` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UseCaseConfig {
    /// Stable identifier, also sent to the backend in the handshake
    pub id: String,
    /// Display name
    pub name: String,
    /// Short description
    #[serde(default)]
    pub description: String,
    /// Length of every class-probability vector
    pub num_classes: usize,
    /// Optional per-class labels (e.g. "0 People")
    #[serde(default)]
    pub class_labels: Vec<String>,
    /// Class whose probability is recorded in the event log
    #[serde(default)]
    pub event_class_index: usize,
    /// Visualizations the presentation layer renders for this use case
    #[serde(default)]
    pub visualizations: Vec<Visualization>,
    /// Scalar folded into the running average / maximum
    pub metric: MetricField,
    /// Where canonical fields live in the inbound JSON
    pub fields: FieldMap,
    /// Fields every frame must carry
    #[serde(default)]
    pub data_format: DataFormat,
}

/// Mapping from canonical frame fields to dotted JSON paths
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldMap {
    /// Optional integer field, e.g. predicted occupancy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub derived_count: Option<String>,
    /// Optional boolean field, e.g. "fall detected"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_flag: Option<String>,
    /// Class-probability source
    pub probabilities: ProbabilitySource,
    /// Spatial point arrays
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub points: Option<PointFields>,
}

/// How the class-probability vector is read from a frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProbabilitySource {
    /// A numeric array at `path`
    Vector { path: String },
    /// A single probability `p` at `path`, expanded to `[p, 1 - p]`
    Binary { path: String },
}

impl ProbabilitySource {
    /// Path of the source field
    pub fn path(&self) -> &str {
        match self {
            ProbabilitySource::Vector { path } | ProbabilitySource::Binary { path } => path,
        }
    }
}

/// Paths of the three point-cloud coordinate arrays
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointFields {
    pub x: String,
    pub y: String,
    pub z: String,
}

impl PointFields {
    /// Conventional `point_data.{x,y,z}_pos` layout
    pub fn point_data() -> Self {
        Self {
            x: "point_data.x_pos".to_string(),
            y: "point_data.y_pos".to_string(),
            z: "point_data.z_pos".to_string(),
        }
    }

    /// All three paths in x, y, z order
    pub fn paths(&self) -> [&str; 3] {
        [&self.x, &self.y, &self.z]
    }
}

/// Required-field schema
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DataFormat {
    /// Dotted paths that must be present in every frame
    #[serde(default)]
    pub required: Vec<String>,
}

/// Scalar folded into the running statistics
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum MetricField {
    /// The frame's derived count
    DerivedCount,
    /// One entry of the class-probability vector
    ClassProbability { index: usize },
}

/// Visualizations a use case asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visualization {
    /// 3D scatter of the frame's points
    PointCloud,
    /// Raw vs smoothed class probabilities
    Probability,
    /// Metric trend over time
    OccupancyTrend,
}

impl UseCaseConfig {
    /// Check internal consistency
    pub fn validate(&self) -> crate::Result<()> {
        let fail = |msg: String| Err(crate::Error::UseCase(format!("{}: {}", self.id, msg)));

        if self.id.trim().is_empty() {
            return Err(crate::Error::UseCase("use case id must not be empty".to_string()));
        }
        if self.num_classes == 0 {
            return fail("num_classes must be > 0".to_string());
        }
        if let ProbabilitySource::Binary { .. } = self.fields.probabilities {
            if self.num_classes != 2 {
                return fail(format!(
                    "binary probability source needs num_classes = 2, got {}",
                    self.num_classes
                ));
            }
        }
        if self.event_class_index >= self.num_classes {
            return fail(format!(
                "event_class_index {} out of range for {} classes",
                self.event_class_index, self.num_classes
            ));
        }
        if let MetricField::ClassProbability { index } = self.metric {
            if index >= self.num_classes {
                return fail(format!(
                    "metric class index {} out of range for {} classes",
                    index, self.num_classes
                ));
            }
        }
        if !self.class_labels.is_empty() && self.class_labels.len() != self.num_classes {
            return fail(format!(
                "{} class labels for {} classes",
                self.class_labels.len(),
                self.num_classes
            ));
        }
        if self.visualizations.contains(&Visualization::PointCloud) && self.fields.points.is_none()
        {
            return fail("point_cloud visualization needs fields.points".to_string());
        }
        if self.metric == MetricField::DerivedCount && self.fields.derived_count.is_none() {
            return fail("derived_count metric needs fields.derived_count".to_string());
        }

        let mut paths: Vec<&str> = self.data_format.required.iter().map(String::as_str).collect();
        paths.push(self.fields.probabilities.path());
        paths.extend(self.fields.derived_count.as_deref());
        paths.extend(self.fields.event_flag.as_deref());
        if let Some(points) = &self.fields.points {
            paths.extend(points.paths());
        }
        if let Some(bad) = paths.iter().find(|p| !is_valid_path(p)) {
            return fail(format!("invalid field path '{}'", bad));
        }

        Ok(())
    }

    /// Every path the decoder checks for presence before extracting fields
    ///
    /// The declared `data_format.required` list, plus the probability source,
    /// plus the point arrays when a point-cloud visualization is configured.
    pub fn required_paths(&self) -> Vec<&str> {
        let mut candidates: Vec<&str> =
            self.data_format.required.iter().map(String::as_str).collect();
        candidates.push(self.fields.probabilities.path());
        if self.visualizations.contains(&Visualization::PointCloud) {
            if let Some(points) = &self.fields.points {
                candidates.extend(points.paths());
            }
        }

        let mut paths: Vec<&str> = Vec::with_capacity(candidates.len());
        for p in candidates {
            if !paths.contains(&p) {
                paths.push(p);
            }
        }
        paths
    }

    /// Whether `path` is listed in the declared required fields
    pub fn is_required(&self, path: &str) -> bool {
        self.data_format.required.iter().any(|p| p == path)
    }

    /// Label for a class index, falling back to "Class N"
    pub fn class_label(&self, index: usize) -> String {
        self.class_labels
            .get(index)
            .cloned()
            .unwrap_or_else(|| format!("Class {}", index))
    }
}

/// Dotted path: non-empty segments without whitespace
fn is_valid_path(path: &str) -> bool {
    !path.is_empty()
        && path
            .split('.')
            .all(|segment| !segment.is_empty() && !segment.contains(char::is_whitespace))
}
