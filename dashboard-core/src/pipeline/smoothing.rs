//! Smoothing Engine
//!
//! Exponential moving average over per-frame class probabilities:
//!
//! ```text
//! s[i] = α · raw[i] + (1 - α) · prev[i]
//! ```
//!
//! The first sample passes through verbatim. Indices that have no previous
//! smoothed value (the vector grew) are cold-started individually; indices
//! beyond the new raw length are dropped. Outputs are not renormalized.
//!
//! The engine also keeps the last W raw vectors so their mean can be shown
//! next to the smoothed signal.

use serde::Serialize;
use std::collections::VecDeque;
use std::ops::Deref;

/// Default sliding-window length
pub const DEFAULT_WINDOW: usize = 15;

/// Default EMA weight of the newest sample
pub const DEFAULT_ALPHA: f64 = 0.05;

/// Stabilized class probabilities, same length as the frame's raw vector
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(transparent)]
pub struct SmoothedSignal(Vec<f64>);

impl SmoothedSignal {
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn into_inner(self) -> Vec<f64> {
        self.0
    }
}

impl Deref for SmoothedSignal {
    type Target = [f64];

    fn deref(&self) -> &[f64] {
        &self.0
    }
}

impl From<Vec<f64>> for SmoothedSignal {
    fn from(values: Vec<f64>) -> Self {
        Self(values)
    }
}

/// EMA smoother with a bounded window of raw samples
#[derive(Debug, Clone)]
pub struct SmoothingEngine {
    window: VecDeque<Vec<f64>>,
    capacity: usize,
    alpha: f64,
    previous: Option<SmoothedSignal>,
    samples_observed: u64,
}

impl SmoothingEngine {
    /// Create an engine
    ///
    /// `capacity` is clamped to at least 1 and `alpha` to [0, 1].
    pub fn new(capacity: usize, alpha: f64) -> Self {
        let capacity = capacity.max(1);
        Self {
            window: VecDeque::with_capacity(capacity),
            capacity,
            alpha: alpha.clamp(0.0, 1.0),
            previous: None,
            samples_observed: 0,
        }
    }

    /// Fold one raw probability vector into the signal
    pub fn update(&mut self, raw: &[f64]) -> SmoothedSignal {
        if self.window.len() == self.capacity {
            self.window.pop_front();
        }
        self.window.push_back(raw.to_vec());
        self.samples_observed += 1;

        let smoothed = match &self.previous {
            Some(prev) if self.samples_observed >= 2 => raw
                .iter()
                .enumerate()
                .map(|(i, r)| match prev.get(i) {
                    Some(p) => self.alpha * r + (1.0 - self.alpha) * p,
                    None => *r,
                })
                .collect(),
            _ => raw.to_vec(),
        };

        let smoothed = SmoothedSignal(smoothed);
        self.previous = Some(smoothed.clone());
        smoothed
    }

    /// Forget every sample
    pub fn reset(&mut self) {
        self.window.clear();
        self.previous = None;
        self.samples_observed = 0;
    }

    /// Raw samples currently in the window, oldest first
    pub fn window(&self) -> impl Iterator<Item = &[f64]> + '_ {
        self.window.iter().map(Vec::as_slice)
    }

    pub fn window_len(&self) -> usize {
        self.window.len()
    }

    /// Element-wise mean of the window
    ///
    /// Each index is averaged over the samples that have it.
    pub fn window_mean(&self) -> Vec<f64> {
        let width = self.window.iter().map(Vec::len).max().unwrap_or(0);
        let mut sums = vec![0.0; width];
        let mut counts = vec![0usize; width];
        for sample in &self.window {
            for (i, v) in sample.iter().enumerate() {
                sums[i] += v;
                counts[i] += 1;
            }
        }
        sums.iter()
            .zip(&counts)
            .map(|(sum, n)| sum / *n as f64)
            .collect()
    }

    /// Latest smoothed output
    pub fn current(&self) -> Option<&SmoothedSignal> {
        self.previous.as_ref()
    }

    pub fn samples_observed(&self) -> u64 {
        self.samples_observed
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }
}

impl Default for SmoothingEngine {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW, DEFAULT_ALPHA)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: &[f64], expected: &[f64]) {
        assert_eq!(actual.len(), expected.len());
        for (a, e) in actual.iter().zip(expected) {
            assert!((a - e).abs() < 1e-12, "{:?} != {:?}", actual, expected);
        }
    }

    #[test]
    fn test_cold_start_passes_through() {
        let mut engine = SmoothingEngine::default();
        let out = engine.update(&[0.2, 0.8]);
        assert_eq!(out.as_slice(), &[0.2, 0.8]);
    }

    #[test]
    fn test_steady_state_ema() {
        let mut engine = SmoothingEngine::default();
        engine.update(&[0.2, 0.8]);
        let out = engine.update(&[1.0, 0.0]);
        assert_close(&out, &[0.24, 0.76]);
    }

    #[test]
    fn test_window_evicts_oldest() {
        let mut engine = SmoothingEngine::new(3, 0.5);
        for v in [0.1, 0.2, 0.3, 0.4] {
            engine.update(&[v]);
        }
        let window: Vec<f64> = engine.window().map(|s| s[0]).collect();
        assert_eq!(window, vec![0.2, 0.3, 0.4]);
        assert_eq!(engine.samples_observed(), 4);
    }

    #[test]
    fn test_growing_vector_cold_starts_new_indices() {
        let mut engine = SmoothingEngine::new(15, 0.5);
        engine.update(&[0.4, 0.6]);
        let out = engine.update(&[0.0, 0.2, 0.8]);
        assert_close(&out, &[0.2, 0.4, 0.8]);
    }

    #[test]
    fn test_shrinking_vector_drops_indices() {
        let mut engine = SmoothingEngine::new(15, 0.5);
        engine.update(&[0.4, 0.6, 0.0]);
        let out = engine.update(&[0.0, 1.0]);
        assert_close(&out, &[0.2, 0.8]);
    }

    #[test]
    fn test_no_renormalization() {
        let mut engine = SmoothingEngine::new(15, 0.5);
        engine.update(&[1.0, 0.0]);
        let out = engine.update(&[1.0, 1.0]);
        let sum: f64 = out.iter().sum();
        assert!((sum - 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_reset_restores_cold_start() {
        let mut engine = SmoothingEngine::default();
        engine.update(&[0.2, 0.8]);
        engine.update(&[1.0, 0.0]);
        engine.reset();

        assert_eq!(engine.window_len(), 0);
        assert!(engine.current().is_none());
        assert_eq!(engine.update(&[1.0, 0.0]).as_slice(), &[1.0, 0.0]);
    }

    #[test]
    fn test_window_mean_handles_ragged_samples() {
        let mut engine = SmoothingEngine::new(4, 0.1);
        engine.update(&[0.2, 0.4]);
        engine.update(&[0.4, 0.6, 1.0]);
        assert_close(&engine.window_mean(), &[0.3, 0.5, 1.0]);
    }

    #[test]
    fn test_parameters_are_clamped() {
        let engine = SmoothingEngine::new(0, 3.0);
        assert_eq!(engine.capacity(), 1);
        assert_eq!(engine.alpha(), 1.0);
    }
}
