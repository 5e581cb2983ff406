//! Protocol fetchers turn the raw contract state of one lending market into `ProtocolMetrics`.
use async_trait::async_trait;
use ethers::types::U256;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::abi_words::decode_single_uint;
use crate::chain_reader::CallOutcome;
use crate::error::MetricsError;

pub mod aave;
pub mod compound;

/// Normalised view of a lending market. Amounts are whole tokens, rates are percentages.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtocolMetrics {
    pub total_supplied: Decimal,
    pub total_borrowed: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub supply_rate_pct: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub borrow_rate_pct: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub utilization_pct: Decimal,
}

#[async_trait]
pub trait ProtocolFetcher: Send + Sync {
    /// Key under which the metrics appear in an aggregated response, e.g. `aave`.
    fn key(&self) -> &'static str;

    /// Prefix for warnings, e.g. `AAVE`.
    fn label(&self) -> &'static str;

    async fn fetch(&self) -> Result<ProtocolMetrics, MetricsError>;
}

/// Value of a successful single-`uint256` sub-call. Reverted or undecodable entries degrade to
/// zero, the boolean reports whether the value is real.
pub(crate) fn uint_or_zero(outcome: &CallOutcome, what: &str) -> (U256, bool) {
    let decoded = match outcome {
        CallOutcome::Success(bytes) => decode_single_uint(bytes),
        CallOutcome::Failure(reason) => Err(MetricsError::CallFailed(reason.clone())),
    };
    match decoded {
        Ok(value) => (value, true),
        Err(e) => {
            log::warn!("{} unavailable, using zero: {}", what, e);
            (U256::zero(), false)
        }
    }
}
