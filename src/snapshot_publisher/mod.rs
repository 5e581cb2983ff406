//! Snapshot publishers hand each monitoring round to whatever keeps the long-term record.
use async_trait::async_trait;
use eyre::Result;
use serde::{Deserialize, Serialize};

use crate::metrics_aggregator::{AggregatedResponse, CacheStatus};
use crate::tvl_tracker::ChangeReport;

pub mod http;
pub mod json;
pub mod log;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitoringReport {
    pub round: u64,
    pub cache_status: CacheStatus,
    pub metrics: AggregatedResponse,
    pub tvl: ChangeReport,
}

#[async_trait]
pub trait SnapshotPublisher: Send + Sync {
    async fn publish(&self, report: &MonitoringReport) -> Result<()>;
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::metrics_aggregator::tests::metrics;
    use std::collections::BTreeMap;

    pub(crate) fn report(round: u64) -> MonitoringReport {
        let mut protocols = BTreeMap::new();
        protocols.insert("aave".to_string(), Some(metrics(1000)));
        protocols.insert("compound".to_string(), None);
        MonitoringReport {
            round,
            cache_status: CacheStatus::Miss,
            metrics: AggregatedResponse {
                timestamp: 1_700_000_000,
                chain: "arbitrum-sepolia".to_string(),
                protocols,
                warnings: vec!["Compound: call failed: boom".to_string()],
            },
            tvl: ChangeReport {
                current_value: 1000.0,
                current_timestamp: 1_700_000_000,
                comparison_value: 1000.0,
                comparison_timestamp: 1_700_000_000,
                change_percent: 0.0,
                comparison_age_minutes: 0,
                sample_count: 1,
            },
        }
    }

    #[test]
    fn report_round_trips_through_json() {
        let report = report(3);
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains(r#""cacheStatus":"MISS""#));
        let parsed: MonitoringReport = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, report);
    }
}
