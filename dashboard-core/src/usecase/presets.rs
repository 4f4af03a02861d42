//! Built-in use cases

use super::config::{
    DataFormat, FieldMap, MetricField, PointFields, ProbabilitySource, UseCaseConfig,
    Visualization,
};

/// Identifier of the occupancy preset
pub const OCCUPANCY: &str = "occupancy";

/// Identifier of the fall-detection preset
pub const FALL_DETECTION: &str = "fall_detection";

/// Room occupancy: four classes (0-3 people), metric is the predicted count
pub fn occupancy() -> UseCaseConfig {
    UseCaseConfig {
        id: OCCUPANCY.to_string(),
        name: "Occupancy Detection".to_string(),
        description: "Monitor room occupancy levels".to_string(),
        num_classes: 4,
        class_labels: (0..4).map(|n| format!("{} People", n)).collect(),
        event_class_index: 0,
        visualizations: vec![Visualization::PointCloud, Visualization::OccupancyTrend],
        metric: MetricField::DerivedCount,
        fields: FieldMap {
            derived_count: Some("occupancy.predicted_count".to_string()),
            event_flag: None,
            probabilities: ProbabilitySource::Vector {
                path: "occupancy.probabilities".to_string(),
            },
            points: Some(PointFields::point_data()),
        },
        data_format: DataFormat {
            required: vec![
                "occupancy.predicted_count".to_string(),
                "occupancy.probabilities".to_string(),
            ],
        },
    }
}

/// Fall detection: binary fall probability, events on `is_fall`
pub fn fall_detection() -> UseCaseConfig {
    UseCaseConfig {
        id: FALL_DETECTION.to_string(),
        name: "Fall Detection".to_string(),
        description: "Monitor and detect falls in real-time".to_string(),
        num_classes: 2,
        class_labels: vec!["Fall".to_string(), "No Fall".to_string()],
        event_class_index: 0,
        visualizations: vec![Visualization::PointCloud, Visualization::Probability],
        metric: MetricField::ClassProbability { index: 0 },
        fields: FieldMap {
            derived_count: None,
            event_flag: Some("fall_detection.is_fall".to_string()),
            probabilities: ProbabilitySource::Binary {
                path: "fall_detection.fall_probability".to_string(),
            },
            points: Some(PointFields::point_data()),
        },
        data_format: DataFormat {
            required: vec![
                "fall_detection.is_fall".to_string(),
                "fall_detection.fall_probability".to_string(),
            ],
        },
    }
}

/// All built-in use cases in display order
pub fn builtin() -> Vec<UseCaseConfig> {
    vec![fall_detection(), occupancy()]
}
