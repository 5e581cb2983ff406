//! Shared, lock-guarded snapshot series exposing the record-and-compare and history queries.
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::MetricsError;
use crate::snapshot_series::{change_percent, Sample, SnapshotSeries};

pub const HISTORY_LIMIT: usize = 100;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeReport {
    pub current_value: f64,
    pub current_timestamp: i64,
    pub comparison_value: f64,
    pub comparison_timestamp: i64,
    pub change_percent: f64,
    pub comparison_age_minutes: i64,
    pub sample_count: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct History {
    pub samples: Vec<Sample>,
    pub count: usize,
    pub oldest_timestamp: Option<i64>,
    pub newest_timestamp: Option<i64>,
}

#[derive(Debug, Default)]
pub struct TvlTracker {
    series: Mutex<SnapshotSeries>,
}

impl TvlTracker {
    pub fn new(series: SnapshotSeries) -> Self {
        Self {
            series: Mutex::new(series),
        }
    }

    /// Records `value` (deduplicated) and compares it against the sample closest to the comparison
    /// window. `timestamp` defaults to the current wall-clock second.
    pub async fn record_and_compare(
        &self,
        value: f64,
        timestamp: Option<i64>,
    ) -> Result<ChangeReport, MetricsError> {
        if !value.is_finite() {
            return Err(MetricsError::InvalidInput(format!(
                "value must be a finite number, got {}",
                value
            )));
        }
        let current_timestamp = timestamp.unwrap_or_else(|| Utc::now().timestamp());

        let mut series = self.series.lock().await;
        series.record(value, current_timestamp);
        let comparison = series.find_comparison(current_timestamp);

        let report = match comparison {
            Some(comparison) if comparison.timestamp != current_timestamp => ChangeReport {
                current_value: value,
                current_timestamp,
                comparison_value: comparison.value,
                comparison_timestamp: comparison.timestamp,
                change_percent: change_percent(value, comparison.value),
                comparison_age_minutes: (current_timestamp.saturating_sub(comparison.timestamp)
                    as f64
                    / 60.0)
                    .round() as i64,
                sample_count: series.len(),
            },
            // No earlier point yet: report against itself.
            _ => ChangeReport {
                current_value: value,
                current_timestamp,
                comparison_value: value,
                comparison_timestamp: current_timestamp,
                change_percent: 0.0,
                comparison_age_minutes: 0,
                sample_count: series.len(),
            },
        };
        log::debug!(
            "Recorded {} at {}, change {}% over {} minutes",
            value,
            current_timestamp,
            report.change_percent,
            report.comparison_age_minutes
        );
        Ok(report)
    }

    /// Same as `record_and_compare` for raw query-string style input.
    #[allow(dead_code)]
    pub async fn record_and_compare_raw(
        &self,
        value: &str,
        timestamp: Option<&str>,
    ) -> Result<ChangeReport, MetricsError> {
        let value: f64 = value
            .trim()
            .parse()
            .map_err(|_| MetricsError::InvalidInput(format!("invalid value {:?}", value)))?;
        let timestamp = timestamp
            .map(|raw| {
                raw.trim().parse::<i64>().map_err(|_| {
                    MetricsError::InvalidInput(format!("invalid timestamp {:?}", raw))
                })
            })
            .transpose()?;
        self.record_and_compare(value, timestamp).await
    }

    pub async fn history(&self) -> History {
        let series = self.series.lock().await;
        History {
            samples: series.latest(HISTORY_LIMIT),
            count: series.len(),
            oldest_timestamp: series.oldest().map(|sample| sample.timestamp),
            newest_timestamp: series.newest().map(|sample| sample.timestamp),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn first_sample_compares_against_itself() {
        let tracker = TvlTracker::default();

        let report = tracker.record_and_compare(1000.0, Some(0)).await.unwrap();

        assert_eq!(report.comparison_timestamp, 0);
        assert_eq!(report.comparison_value, 1000.0);
        assert_eq!(report.change_percent, 0.0);
        assert_eq!(report.comparison_age_minutes, 0);
        assert_eq!(report.sample_count, 1);
    }

    #[tokio::test]
    async fn compares_against_sample_near_window_start() {
        let tracker = TvlTracker::default();
        tracker.record_and_compare(1000.0, Some(1_000)).await.unwrap();
        tracker.record_and_compare(1050.0, Some(1_120)).await.unwrap();

        let report = tracker.record_and_compare(1100.0, Some(1_300)).await.unwrap();

        assert_eq!(report.comparison_timestamp, 1_000);
        assert_eq!(report.comparison_value, 1000.0);
        assert_eq!(report.change_percent, 10.0);
        assert_eq!(report.comparison_age_minutes, 5);
        assert_eq!(report.sample_count, 3);
    }

    #[tokio::test]
    async fn duplicate_inside_window_is_not_stored() {
        let tracker = TvlTracker::default();
        tracker.record_and_compare(1000.0, Some(0)).await.unwrap();

        let report = tracker.record_and_compare(2000.0, Some(10)).await.unwrap();

        assert_eq!(report.sample_count, 1);
        assert_eq!(report.comparison_value, 1000.0);
        assert_eq!(report.change_percent, 100.0);
        assert_eq!(tracker.history().await.samples[0].value, 1000.0);
    }

    #[tokio::test]
    async fn rejects_invalid_input_without_recording() {
        let tracker = TvlTracker::default();

        let error = tracker
            .record_and_compare_raw("lots", Some("100"))
            .await
            .unwrap_err();
        assert_eq!(error.status_code(), 400);
        assert!(tracker.record_and_compare_raw("12.5", Some("soon")).await.is_err());
        assert!(tracker.record_and_compare(f64::NAN, None).await.is_err());
        assert_eq!(tracker.history().await.count, 0);

        let report = tracker
            .record_and_compare_raw(" 12.5 ", Some("100"))
            .await
            .unwrap();
        assert_eq!(report.current_value, 12.5);
        assert_eq!(report.current_timestamp, 100);
    }

    #[tokio::test]
    async fn extreme_timestamps_do_not_overflow() {
        let tracker = TvlTracker::default();

        let report = tracker
            .record_and_compare_raw("100", Some(&i64::MIN.to_string()))
            .await
            .unwrap();
        assert_eq!(report.current_timestamp, i64::MIN);
        assert_eq!(report.change_percent, 0.0);

        let report = tracker
            .record_and_compare(150.0, Some(i64::MIN + 300))
            .await
            .unwrap();
        assert_eq!(report.comparison_timestamp, i64::MIN);
        assert_eq!(report.change_percent, 50.0);
        assert_eq!(report.comparison_age_minutes, 5);

        let report = tracker.record_and_compare(200.0, Some(i64::MAX)).await.unwrap();
        assert_eq!(report.comparison_timestamp, i64::MAX);
        assert_eq!(report.sample_count, 3);
    }

    #[tokio::test]
    async fn missing_timestamp_uses_wall_clock() {
        let tracker = TvlTracker::default();
        let before = Utc::now().timestamp();
        let report = tracker.record_and_compare(1.0, None).await.unwrap();
        assert!(report.current_timestamp >= before);
    }

    #[tokio::test]
    async fn history_is_limited_to_latest_samples() {
        let tracker = TvlTracker::default();
        for i in 0..150 {
            tracker.record_and_compare(i as f64, Some(i * 60)).await.unwrap();
        }

        let history = tracker.history().await;

        assert_eq!(history.count, 150);
        assert_eq!(history.samples.len(), HISTORY_LIMIT);
        assert_eq!(history.samples[0].timestamp, 50 * 60);
        assert_eq!(history.oldest_timestamp, Some(0));
        assert_eq!(history.newest_timestamp, Some(149 * 60));

        let empty = TvlTracker::default().history().await;
        assert_eq!(empty.oldest_timestamp, None);
        assert!(empty.samples.is_empty());
    }
}
