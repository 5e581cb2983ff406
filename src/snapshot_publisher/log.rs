use async_trait::async_trait;
use eyre::Result;

use crate::snapshot_publisher::{MonitoringReport, SnapshotPublisher};

pub struct LogSnapshotPublisher {}

#[async_trait]
impl SnapshotPublisher for LogSnapshotPublisher {
    async fn publish(&self, report: &MonitoringReport) -> Result<()> {
        log::debug!("Publishing report: {:?}", report);
        log::info!(
            "Round {}: TVL {} ({}% over {} minutes), {} warnings",
            report.round,
            report.tvl.current_value,
            report.tvl.change_percent,
            report.tvl.comparison_age_minutes,
            report.metrics.warnings.len()
        );
        Ok(())
    }
}
