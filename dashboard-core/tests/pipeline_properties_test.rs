//! Integration tests for the derived-state pipeline
//!
//! These tests drive a DashboardPipeline with JSON frames the way the
//! transport would and check the published read model:
//! JSON -> Decoder -> Smoothing / Aggregation -> Snapshot observers

use chrono::Duration;
use dashboard_core::pipeline::{
    ClassCountPolicy, DashboardPipeline, IngestOutcome, PipelineSettings, PublishCause,
};
use dashboard_core::time::{Clock, ManualClock};
use dashboard_core::usecase::presets;
use serde_json::{json, Value};
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

/// Occupancy frame with the given predicted count
fn occupancy_frame(count: i64) -> Value {
    let mut probabilities = [0.05; 4];
    probabilities[(count as usize).min(3)] = 0.85;
    json!({
        "occupancy": {"predicted_count": count, "probabilities": probabilities},
        "point_data": {
            "x_pos": [0.1, 0.4],
            "y_pos": [1.2, 1.9],
            "z_pos": [0.0, 0.3],
            "snr": [10.0, 11.5],
            "noise": [2.0, 2.2]
        }
    })
}

/// Fall-detection frame
fn fall_frame(probability: f64, is_fall: bool) -> Value {
    json!({
        "fall_detection": {"is_fall": is_fall, "fall_probability": probability},
        "point_data": {"x_pos": [0.0], "y_pos": [0.0], "z_pos": [0.0]}
    })
}

fn assert_close(actual: &[f64], expected: &[f64]) {
    assert_eq!(actual.len(), expected.len(), "{:?} != {:?}", actual, expected);
    for (a, e) in actual.iter().zip(expected) {
        assert!((a - e).abs() < 1e-12, "{:?} != {:?}", actual, expected);
    }
}

fn occupancy_pipeline() -> DashboardPipeline {
    DashboardPipeline::new(presets::occupancy(), PipelineSettings::default())
        .expect("occupancy preset is valid")
}

fn fall_pipeline() -> DashboardPipeline {
    DashboardPipeline::new(presets::fall_detection(), PipelineSettings::default())
        .expect("fall preset is valid")
}

#[test]
fn test_sample_count_matches_accepted_frames() {
    let mut pipeline = occupancy_pipeline();

    for i in 0..250u64 {
        let outcome = pipeline.ingest_value(i, &occupancy_frame((i % 4) as i64));
        assert!(outcome.is_accepted());
    }

    assert_eq!(pipeline.aggregate_stats().sample_count(), 250);
    assert_eq!(pipeline.stats().accepted, 250);
}

#[test]
fn test_running_max_tracks_maximum_and_never_decreases() {
    let mut pipeline = occupancy_pipeline();
    let counts = [1, 0, 2, 1, 3, 0, 2, 1];
    let mut previous: Option<f64> = None;

    for (i, count) in counts.iter().enumerate() {
        pipeline.ingest_value(i as u64, &occupancy_frame(*count));
        let max = pipeline.aggregate_stats().running_max().unwrap();
        if let Some(prev) = previous {
            assert!(max >= prev, "running max decreased: {} -> {}", prev, max);
        }
        previous = Some(max);
    }

    assert_eq!(previous, Some(3.0));
}

#[test]
fn test_incremental_mean_matches_arithmetic_mean() {
    let mut pipeline = fall_pipeline();
    let mut values = Vec::with_capacity(12_000);

    // deterministic pseudo-random probabilities
    let mut state: u64 = 0x2545_F491_4F6C_DD1D;
    for i in 0..12_000u64 {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        let p = (state % 10_000) as f64 / 10_000.0;
        values.push(p);
        pipeline.ingest_value(i, &fall_frame(p, false));
    }

    let expected = values.iter().sum::<f64>() / values.len() as f64;
    let actual = pipeline.aggregate_stats().running_average().unwrap();
    assert!(
        (actual - expected).abs() < 1e-9,
        "incremental mean {} differs from {}",
        actual,
        expected
    );
}

#[test]
fn test_cold_start_smoothing_is_exact() {
    let mut pipeline = fall_pipeline();
    pipeline.ingest_value(0, &fall_frame(0.2, false));

    assert_close(pipeline.smoothed().unwrap(), &[0.2, 0.8]);
}

#[test]
fn test_steady_state_smoothing() {
    let mut pipeline = fall_pipeline();
    pipeline.ingest_value(0, &fall_frame(0.2, false));
    pipeline.ingest_value(1, &fall_frame(1.0, false));

    assert_close(pipeline.smoothed().unwrap(), &[0.24, 0.76]);
}

#[test]
fn test_malformed_frame_changes_nothing() {
    let mut pipeline = occupancy_pipeline();
    pipeline.ingest_value(0, &occupancy_frame(2));
    pipeline.ingest_value(1, &occupancy_frame(3));

    let stats_before = pipeline.aggregate_stats().clone();
    let smoothed_before = pipeline.smoothed().cloned();
    let window_before: Vec<Vec<f64>> = pipeline.smoother().window().map(<[f64]>::to_vec).collect();
    let revision_before = pipeline.revision();

    let malformed = [
        json!({"occupancy": {"predicted_count": 1}}),
        json!({"occupancy": {"predicted_count": 1, "probabilities": "0.5"}}),
        json!({"occupancy": {"predicted_count": 1, "probabilities": [0.1, 2.0, 0.1, 0.1]}}),
        json!(42),
    ];
    for (i, value) in malformed.iter().enumerate() {
        let outcome = pipeline.ingest_value(10 + i as u64, value);
        assert!(matches!(outcome, IngestOutcome::Dropped { .. }));
    }
    assert!(!pipeline.ingest_text(20, "\u{0}garbage").is_accepted());

    let stats_after = pipeline.aggregate_stats();
    assert_eq!(stats_after.sample_count(), stats_before.sample_count());
    assert_eq!(stats_after.running_max(), stats_before.running_max());
    assert_eq!(stats_after.running_average(), stats_before.running_average());
    assert_eq!(pipeline.smoothed().cloned(), smoothed_before);
    let window_after: Vec<Vec<f64>> = pipeline.smoother().window().map(<[f64]>::to_vec).collect();
    assert_eq!(window_after, window_before);
    assert_eq!(pipeline.revision(), revision_before);
    assert_eq!(pipeline.stats().malformed, 5);
}

#[test]
fn test_event_log_records_flagged_frames_in_order() {
    let clock = Arc::new(ManualClock::from_millis(1_700_000_000_000));
    let mut pipeline = fall_pipeline().with_clock(clock.clone());
    let start = clock.now();

    let mut stamps = Vec::new();
    for (i, flag) in [false, true, false, true].into_iter().enumerate() {
        clock.advance(Duration::seconds(1));
        stamps.push(clock.now());
        pipeline.ingest_value(i as u64, &fall_frame(0.9, flag));
    }

    let log: Vec<_> = pipeline.aggregate_stats().event_log().entries().cloned().collect();
    assert_eq!(log.len(), 2);
    assert_eq!(log[0].timestamp, stamps[1]);
    assert_eq!(log[1].timestamp, stamps[3]);
    assert!(log[0].timestamp < log[1].timestamp);
    assert!(log[0].timestamp > start);
    assert_eq!(log[0].value, Some(0.9));
}

#[test]
fn test_each_frame_published_exactly_once() {
    let mut pipeline = occupancy_pipeline();
    let published = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&published);
    pipeline.subscribe(Box::new(move |snapshot| {
        if let PublishCause::Frame { sequence } = snapshot.cause {
            sink.borrow_mut().push((sequence, snapshot.stats.sample_count()));
        }
    }));

    for i in 0..20u64 {
        if i % 5 == 4 {
            pipeline.ingest_text(i, "{\"occupancy\": null}");
        } else {
            pipeline.ingest_value(i, &occupancy_frame(1));
        }
    }

    let published = published.borrow();
    assert_eq!(published.len(), 16);
    let sequences: Vec<u64> = published.iter().map(|(s, _)| *s).collect();
    let expected: Vec<u64> = (0..20).filter(|i| i % 5 != 4).collect();
    assert_eq!(sequences, expected);
    for (index, (_, samples)) in published.iter().enumerate() {
        assert_eq!(*samples, index as u64 + 1);
    }
}

#[test]
fn test_use_case_switch_starts_clean_session() {
    let mut pipeline = occupancy_pipeline();
    for i in 0..5 {
        pipeline.ingest_value(i, &occupancy_frame(2));
    }

    pipeline.reset(presets::fall_detection()).unwrap();
    // an occupancy frame is malformed for the fall detection session
    assert!(!pipeline.ingest_value(5, &occupancy_frame(2)).is_accepted());
    assert!(pipeline.ingest_value(6, &fall_frame(0.3, true)).is_accepted());

    let stats = pipeline.aggregate_stats();
    assert_eq!(stats.sample_count(), 1);
    assert_eq!(stats.event_count(), 1);
    assert_close(pipeline.smoothed().unwrap(), &[0.3, 0.7]);
}

#[test]
fn test_lenient_class_count_change_cold_starts_new_indices() {
    let settings = PipelineSettings {
        class_count_policy: ClassCountPolicy::Lenient,
        smoothing_alpha: 0.5,
        ..Default::default()
    };
    let mut use_case = presets::occupancy();
    use_case.data_format.required = vec!["occupancy.probabilities".to_string()];
    use_case.visualizations.clear();
    let mut pipeline = DashboardPipeline::new(use_case, settings).unwrap();

    let frame = |probabilities: Vec<f64>| json!({"occupancy": {"probabilities": probabilities}});
    pipeline.ingest_value(0, &frame(vec![0.4, 0.2, 0.2, 0.2]));
    let outcome = pipeline.ingest_value(1, &frame(vec![0.0, 0.4, 0.2, 0.2, 0.2]));

    match outcome {
        IngestOutcome::Accepted { mismatch, .. } => {
            let mismatch = mismatch.expect("mismatch reported");
            assert_eq!((mismatch.expected, mismatch.actual), (4, 5));
        }
        other => panic!("expected accepted frame, got {:?}", other),
    }
    let smoothed = pipeline.smoothed().unwrap();
    assert_eq!(smoothed.len(), 5);
    assert!((smoothed[0] - 0.2).abs() < 1e-12);
    assert!((smoothed[4] - 0.2).abs() < 1e-12);
    assert_eq!(pipeline.stats().config_mismatches, 1);
}

#[test]
fn test_strict_class_count_change_is_dropped() {
    let mut pipeline = occupancy_pipeline();
    let value = json!({
        "occupancy": {"predicted_count": 1, "probabilities": [0.5, 0.5]},
        "point_data": {"x_pos": [], "y_pos": [], "z_pos": []}
    });

    assert!(!pipeline.ingest_value(0, &value).is_accepted());
    assert_eq!(pipeline.aggregate_stats().sample_count(), 0);
}

#[test]
fn test_reader_exposes_latest_summary_across_threads() {
    let mut pipeline = occupancy_pipeline();
    let reader = pipeline.reader();
    pipeline.ingest_value(0, &occupancy_frame(3));

    let summary = std::thread::spawn(move || reader.latest())
        .join()
        .unwrap()
        .expect("summary published");
    assert_eq!(summary.sample_count, 1);
    assert_eq!(summary.derived_count, Some(3));
    assert_eq!(summary.predicted_class.as_deref(), Some("3 People"));
    assert_eq!(summary.point_count, 2);
}
