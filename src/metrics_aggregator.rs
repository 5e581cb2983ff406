//! # Metrics Aggregator
//! Fans out to every protocol fetcher, waits for all of them to settle and merges whatever
//! succeeded. Successful responses are cached for a fixed TTL so every caller inside the window
//! sees the very same payload, timestamp included.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::time::{timeout, Duration, Instant};

use crate::error::MetricsError;
use crate::protocol_fetcher::{ProtocolFetcher, ProtocolMetrics};

pub const DEFAULT_CACHE_TTL_SECS: u64 = 30;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregatedResponse {
    pub timestamp: i64,
    pub chain: String,
    /// Every configured protocol has a key; `None` when its fetch failed.
    #[serde(flatten)]
    pub protocols: BTreeMap<String, Option<ProtocolMetrics>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl AggregatedResponse {
    pub fn present(&self) -> impl Iterator<Item = (&String, &ProtocolMetrics)> {
        self.protocols
            .iter()
            .filter_map(|(key, metrics)| metrics.as_ref().map(|metrics| (key, metrics)))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CacheStatus {
    Hit,
    Miss,
}

impl CacheStatus {
    /// Value for the `X-Cache` header.
    pub fn header_value(&self) -> &'static str {
        match self {
            CacheStatus::Hit => "HIT",
            CacheStatus::Miss => "MISS",
        }
    }
}

#[derive(Clone, Debug)]
pub struct MetricsResponse {
    pub payload: Arc<AggregatedResponse>,
    pub cache_status: CacheStatus,
    /// Cache TTL the payload is served under.
    pub max_age: Duration,
}

impl MetricsResponse {
    /// Response headers the serving layer attaches.
    pub fn headers(&self) -> [(&'static str, String); 2] {
        [
            ("X-Cache", self.cache_status.header_value().to_string()),
            (
                "Cache-Control",
                format!("public, max-age={}", self.max_age.as_secs()),
            ),
        ]
    }
}

struct CacheEntry {
    payload: Arc<AggregatedResponse>,
    stored_at: Instant,
}

pub struct ProtocolOutcome {
    pub key: &'static str,
    pub label: &'static str,
    pub result: Result<ProtocolMetrics, MetricsError>,
}

/// Folds per-protocol outcomes into one response. Fails only when nothing succeeded.
pub fn merge_outcomes(
    chain: &str,
    timestamp: i64,
    outcomes: Vec<ProtocolOutcome>,
) -> Result<AggregatedResponse, MetricsError> {
    let mut protocols = BTreeMap::new();
    let mut warnings = Vec::new();

    for outcome in outcomes {
        match outcome.result {
            Ok(metrics) => {
                protocols.insert(outcome.key.to_string(), Some(metrics));
            }
            Err(e) => {
                log::warn!("{} fetch failed: {}", outcome.label, e);
                warnings.push(format!("{}: {}", outcome.label, e));
                protocols.insert(outcome.key.to_string(), None);
            }
        }
    }

    if protocols.values().all(Option::is_none) {
        return Err(MetricsError::AllProtocolsFailed { details: warnings });
    }

    Ok(AggregatedResponse {
        timestamp,
        chain: chain.to_string(),
        protocols,
        warnings,
    })
}

pub struct MetricsAggregator {
    fetchers: Vec<Box<dyn ProtocolFetcher>>,
    chain: String,
    ttl: Duration,
    fetch_timeout: Duration,
    cache: Mutex<Option<CacheEntry>>,
}

impl MetricsAggregator {
    pub fn new(
        fetchers: Vec<Box<dyn ProtocolFetcher>>,
        chain: String,
        ttl: Duration,
        fetch_timeout: Duration,
    ) -> Self {
        Self {
            fetchers,
            chain,
            ttl,
            fetch_timeout,
            cache: Mutex::new(None),
        }
    }

    async fn fetch_all(&self) -> Vec<ProtocolOutcome> {
        join_all(self.fetchers.iter().map(|fetcher| async move {
            let result = match timeout(self.fetch_timeout, fetcher.fetch()).await {
                Ok(result) => result,
                Err(_) => Err(MetricsError::Timeout(self.fetch_timeout.as_secs())),
            };
            ProtocolOutcome {
                key: fetcher.key(),
                label: fetcher.label(),
                result,
            }
        }))
        .await
    }

    /// Cached metrics if still fresh, otherwise a new round across all protocols.
    /// The cache lock is held through a refresh, so concurrent callers wait and then hit.
    pub async fn get_metrics(&self) -> Result<MetricsResponse, MetricsError> {
        let mut cache = self.cache.lock().await;
        if let Some(entry) = cache.as_ref() {
            if entry.stored_at.elapsed() < self.ttl {
                log::debug!(
                    "Serving cached metrics from {} ({}ms old)",
                    entry.payload.timestamp,
                    entry.stored_at.elapsed().as_millis()
                );
                return Ok(MetricsResponse {
                    payload: entry.payload.clone(),
                    cache_status: CacheStatus::Hit,
                    max_age: self.ttl,
                });
            }
        }

        let start = Instant::now();
        let outcomes = self.fetch_all().await;
        let response = merge_outcomes(&self.chain, Utc::now().timestamp(), outcomes)?;
        log::info!(
            "Fetched metrics for {} protocols with {} warnings after {}ms",
            response.present().count(),
            response.warnings.len(),
            start.elapsed().as_millis()
        );

        let payload = Arc::new(response);
        *cache = Some(CacheEntry {
            payload: payload.clone(),
            stored_at: Instant::now(),
        });
        Ok(MetricsResponse {
            payload,
            cache_status: CacheStatus::Miss,
            max_age: self.ttl,
        })
    }
}
