//! # Snapshot Series
//! Bounded, append-only series of `(value, timestamp)` samples used to answer "how much did this
//! change over the last few minutes". Timestamps are unix seconds.
use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// 24 hours of samples at a 30 second cadence.
pub const MAX_SAMPLES: usize = 2880;
pub const DEDUP_WINDOW_MS: u64 = 15_000;
pub const COMPARE_WINDOW_SECS: i64 = 5 * 60;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub value: f64,
    pub timestamp: i64,
}

#[derive(Debug)]
pub struct SnapshotSeries {
    samples: VecDeque<Sample>,
    capacity: usize,
}

impl Default for SnapshotSeries {
    fn default() -> Self {
        Self::with_capacity(MAX_SAMPLES)
    }
}

impl SnapshotSeries {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Appends a sample unless the newest one is within the dedup window, in which case the new
    /// value is dropped. Returns whether the sample was stored.
    pub fn record(&mut self, value: f64, timestamp: i64) -> bool {
        if let Some(last) = self.samples.back() {
            let gap_ms = last.timestamp.abs_diff(timestamp).saturating_mul(1000);
            if gap_ms < DEDUP_WINDOW_MS {
                log::debug!(
                    "Dropping sample at {}, last sample at {} is only {}ms away",
                    timestamp,
                    last.timestamp,
                    gap_ms
                );
                return false;
            }
        }

        self.samples.push_back(Sample { value, timestamp });
        while self.samples.len() > self.capacity {
            self.samples.pop_front();
        }
        true
    }

    /// Sample closest to `current_timestamp - COMPARE_WINDOW_SECS`. Ties go to the earliest.
    /// Always returns something for a non-empty series, however far the closest sample is.
    pub fn find_comparison(&self, current_timestamp: i64) -> Option<Sample> {
        let target = current_timestamp.saturating_sub(COMPARE_WINDOW_SECS);
        let mut best: Option<(u64, Sample)> = None;
        for sample in &self.samples {
            let distance = sample.timestamp.abs_diff(target);
            if best.map_or(true, |(best_distance, _)| distance < best_distance) {
                best = Some((distance, *sample));
            }
        }
        best.map(|(_, sample)| sample)
            .or_else(|| self.samples.front().copied())
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn oldest(&self) -> Option<&Sample> {
        self.samples.front()
    }

    pub fn newest(&self) -> Option<&Sample> {
        self.samples.back()
    }

    /// Up to `limit` of the newest samples, oldest first.
    pub fn latest(&self, limit: usize) -> Vec<Sample> {
        let skip = self.samples.len().saturating_sub(limit);
        self.samples.iter().skip(skip).copied().collect()
    }
}

/// Two decimals, half away from zero.
pub fn round_to_hundredths(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Percentage change from `previous` to `current`; zero when `previous` is not positive.
pub fn change_percent(current: f64, previous: f64) -> f64 {
    if previous > 0.0 {
        round_to_hundredths((current - previous) / previous * 100.0)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series_at(timestamps: &[i64]) -> SnapshotSeries {
        let mut series = SnapshotSeries::default();
        for (i, timestamp) in timestamps.iter().enumerate() {
            assert!(series.record(i as f64 * 10.0, *timestamp));
        }
        series
    }

    #[test]
    fn drops_samples_inside_dedup_window() {
        let mut series = SnapshotSeries::default();
        assert!(series.record(100.0, 1_000));
        assert!(!series.record(200.0, 1_014));
        assert_eq!(series.len(), 1);
        assert_eq!(series.newest().unwrap().value, 100.0);

        assert!(series.record(300.0, 1_016));
        assert_eq!(series.len(), 2);
    }

    #[test]
    fn dedup_window_is_exclusive() {
        let mut series = SnapshotSeries::default();
        assert!(series.record(1.0, 0));
        assert!(series.record(2.0, 15));
    }

    #[test]
    fn evicts_oldest_beyond_capacity() {
        let mut series = SnapshotSeries::default();
        for i in 0..3000 {
            series.record(i as f64, i * 30);
        }

        assert_eq!(series.len(), MAX_SAMPLES);
        assert_eq!(series.oldest().unwrap().timestamp, 120 * 30);
        assert_eq!(series.newest().unwrap().timestamp, 2999 * 30);
        let all = series.latest(MAX_SAMPLES);
        assert!(all.windows(2).all(|pair| pair[0].timestamp < pair[1].timestamp));
    }

    #[test]
    fn finds_sample_nearest_to_window_start() {
        let series = series_at(&[0, 100, 200, 400]);
        let comparison = series.find_comparison(500).unwrap();
        assert_eq!(comparison.timestamp, 200);
    }

    #[test]
    fn ties_go_to_earliest_sample() {
        // target = 300, both 250 and 350 are 50 away
        let series = series_at(&[250, 350]);
        assert_eq!(series.find_comparison(600).unwrap().timestamp, 250);
    }

    #[test]
    fn returns_closest_sample_however_far() {
        let series = series_at(&[10_000]);
        assert_eq!(series.find_comparison(0).unwrap().timestamp, 10_000);
        assert!(SnapshotSeries::default().find_comparison(0).is_none());
    }

    #[test]
    fn window_start_saturates_near_minimum_timestamp() {
        let series = series_at(&[i64::MIN, i64::MIN + 100]);
        assert_eq!(series.find_comparison(i64::MIN).unwrap().timestamp, i64::MIN);
        assert_eq!(
            series.find_comparison(i64::MIN + 100).unwrap().timestamp,
            i64::MIN
        );
    }

    #[test]
    fn latest_returns_newest_in_order() {
        let series = series_at(&[0, 100, 200, 300]);
        let latest: Vec<i64> = series.latest(2).iter().map(|s| s.timestamp).collect();
        assert_eq!(latest, vec![200, 300]);
        assert_eq!(series.latest(10).len(), 4);
    }

    #[test]
    fn change_percent_rounds_and_guards_zero() {
        assert_eq!(change_percent(1100.0, 1000.0), 10.0);
        assert_eq!(change_percent(1000.0, 3000.0), -66.67);
        assert_eq!(change_percent(5.0, 0.0), 0.0);
        assert_eq!(change_percent(5.0, -1.0), 0.0);
    }
}
