//! # Monitor Scheduler
//! Runs a monitoring round on a fixed interval: fetch metrics (cached), derive TVL, record it in
//! the snapshot series and publish the result.
//! A round that fails or times out is logged and the next tick starts afresh.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use eyre::{Context, Result};
use futures::StreamExt;
use lazy_static::lazy_static;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tokio::time::{interval, timeout, Duration};
use tokio_stream::wrappers::IntervalStream;

use crate::{
    metrics_aggregator::{AggregatedResponse, MetricsAggregator},
    snapshot_publisher::{MonitoringReport, SnapshotPublisher},
    tvl_tracker::TvlTracker,
};

// Rounds are short compared to the poll interval; two in flight only happens when a round is
// stuck waiting on a slow node.
const MAX_CONCURRENT_ROUNDS: usize = 2;
const ROUND_TIMEOUT: u64 = 25;

lazy_static! {
    static ref ROUND_TIMEOUT_DURATION: Duration = Duration::from_secs(ROUND_TIMEOUT);
}

/// Sum of supplied amounts over the protocols that reported.
pub fn total_value_locked(metrics: &AggregatedResponse) -> Result<f64> {
    let total: Decimal = metrics
        .present()
        .map(|(_, protocol)| protocol.total_supplied)
        .sum();
    total
        .to_f64()
        .ok_or_else(|| eyre::eyre!("TVL {} is not representable as f64", total))
}

pub struct MonitorScheduler {
    aggregator: Arc<MetricsAggregator>,
    tracker: Arc<TvlTracker>,
    publisher: Box<dyn SnapshotPublisher>,
    poll_interval: Duration,
    rounds_to_run: Arc<Mutex<Option<u64>>>,
    round_counter: AtomicU64,
}

impl MonitorScheduler {
    pub fn new(
        aggregator: Arc<MetricsAggregator>,
        tracker: Arc<TvlTracker>,
        publisher: Box<dyn SnapshotPublisher>,
        poll_interval: Duration,
        rounds_to_run: Option<u64>,
    ) -> Self {
        Self {
            aggregator,
            tracker,
            publisher,
            poll_interval,
            rounds_to_run: Arc::new(Mutex::new(rounds_to_run)),
            round_counter: AtomicU64::new(0),
        }
    }

    async fn run_single_round(&self, round: u64) -> Result<MonitoringReport> {
        log::info!("Running monitoring round {}", round);
        let start_time = chrono::Utc::now().timestamp_millis();

        let response = match self.aggregator.get_metrics().await {
            Ok(response) => response,
            Err(e) => {
                log::error!(
                    "Metrics unavailable ({}): {}",
                    e.status_code(),
                    e.to_body(chrono::Utc::now().timestamp())
                );
                return Err(e).wrap_err("Failed to get protocol metrics");
            }
        };
        log::debug!(
            "Obtained metrics for round {} with headers {:?} after {}ms",
            round,
            response.headers(),
            chrono::Utc::now().timestamp_millis() - start_time
        );

        let tvl = total_value_locked(&response.payload)?;
        let change = self
            .tracker
            .record_and_compare(tvl, None)
            .await
            .wrap_err("Failed to record TVL snapshot")?;

        let report = MonitoringReport {
            round,
            cache_status: response.cache_status,
            metrics: (*response.payload).clone(),
            tvl: change,
        };
        self.publisher
            .publish(&report)
            .await
            .wrap_err("Failed to publish report")?;
        log::info!(
            "Successfully finished round {} after {}ms",
            round,
            chrono::Utc::now().timestamp_millis() - start_time
        );
        Ok(report)
    }

    pub async fn run(&self) {
        let interval_stream = IntervalStream::new(interval(self.poll_interval));

        let rounds_to_run = self.rounds_to_run.clone();

        interval_stream
            .take_while(move |_| {
                let mut rounds_left_guard = match rounds_to_run.lock() {
                    Ok(guard) => guard,
                    Err(poisoned) => poisoned.into_inner(),
                };
                let should_continue = match *rounds_left_guard {
                    Some(ref mut count) => {
                        let run_round = *count > 0;
                        if run_round {
                            *count -= 1;
                        }
                        run_round
                    }
                    None => true,
                };
                if !should_continue {
                    log::info!("Max rounds reached, stopping.");
                }
                futures::future::ready(should_continue)
            })
            .for_each_concurrent(MAX_CONCURRENT_ROUNDS, |_| async {
                let round = self.round_counter.fetch_add(1, Ordering::SeqCst) + 1;

                timeout(*ROUND_TIMEOUT_DURATION, self.run_single_round(round))
                    .await
                    .unwrap_or_else(|_| {
                        Err(eyre::eyre!("Hit {}s timeout", ROUND_TIMEOUT))
                    })
                    .map(|_| ())
                    .unwrap_or_else(|e| {
                        log::error!("Error when running round: {} - {:?}", round, e);
                    });
            })
            .await;

        let history = self.tracker.history().await;
        log::info!(
            "Stopped after {} rounds, series holds {} samples from {:?} to {:?}",
            self.round_counter.load(Ordering::SeqCst),
            history.count,
            history.oldest_timestamp,
            history.newest_timestamp
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics_aggregator::tests::StaticFetcher;
    use crate::metrics_aggregator::CacheStatus;
    use crate::protocol_fetcher::ProtocolFetcher;
    use async_trait::async_trait;

    #[derive(Default)]
    struct CollectingPublisher {
        reports: Arc<Mutex<Vec<MonitoringReport>>>,
    }

    #[async_trait]
    impl SnapshotPublisher for CollectingPublisher {
        async fn publish(&self, report: &MonitoringReport) -> Result<()> {
            self.reports.lock().unwrap().push(report.clone());
            Ok(())
        }
    }

    fn scheduler(
        fetchers: Vec<Box<dyn ProtocolFetcher>>,
        rounds: u64,
    ) -> (MonitorScheduler, Arc<Mutex<Vec<MonitoringReport>>>, Arc<TvlTracker>) {
        let aggregator = Arc::new(MetricsAggregator::new(
            fetchers,
            "arbitrum-sepolia".to_string(),
            Duration::from_secs(30),
            Duration::from_secs(10),
        ));
        let tracker = Arc::new(TvlTracker::default());
        let publisher = CollectingPublisher::default();
        let reports = publisher.reports.clone();
        let scheduler = MonitorScheduler::new(
            aggregator,
            tracker.clone(),
            Box::new(publisher),
            Duration::from_millis(10),
            Some(rounds),
        );
        (scheduler, reports, tracker)
    }

    #[tokio::test]
    async fn publishes_one_report_per_round() {
        let (scheduler, reports, tracker) = scheduler(
            vec![
                Box::new(StaticFetcher::ok("aave", "AAVE", 1000)),
                Box::new(StaticFetcher::ok("compound", "Compound", 500)),
            ],
            2,
        );

        scheduler.run().await;

        let reports = reports.lock().unwrap();
        assert_eq!(reports.len(), 2);
        assert!(reports.iter().all(|report| report.tvl.current_value == 1500.0));
        let statuses: Vec<CacheStatus> = reports.iter().map(|r| r.cache_status).collect();
        assert!(statuses.contains(&CacheStatus::Miss));
        assert!(statuses.contains(&CacheStatus::Hit));
        // second round lands inside the dedup window
        assert_eq!(tracker.history().await.count, 1);
    }

    #[tokio::test]
    async fn failed_round_does_not_stop_the_loop() {
        let (scheduler, reports, tracker) = scheduler(
            vec![Box::new(StaticFetcher::failing("aave", "AAVE"))],
            2,
        );

        scheduler.run().await;

        assert!(reports.lock().unwrap().is_empty());
        assert_eq!(tracker.history().await.count, 0);
        assert_eq!(scheduler.round_counter.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn tvl_ignores_failed_protocols() {
        let report = crate::snapshot_publisher::tests::report(1);
        assert_eq!(total_value_locked(&report.metrics).unwrap(), 1000.0);
    }
}
