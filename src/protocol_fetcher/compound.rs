//! Compound V3 (Comet) style market.
//! The rate curve takes utilization as an argument, so reading it is two round trips: market state
//! first, then both rates at the utilization that was just read.
use std::sync::Arc;

use async_trait::async_trait;
use ethers::types::{Address, U256};

use crate::chain_reader::{
    get_borrow_rate, get_supply_rate, get_utilization, total_borrow, total_supply, CallOutcome,
    ChainReader, ContractCall,
};
use crate::error::MetricsError;
use crate::fixed_point::{per_second_wad_to_annual_percent, token_amount, wad_ratio_to_percent};
use crate::protocol_fetcher::{uint_or_zero, ProtocolFetcher, ProtocolMetrics};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MarketState {
    /// WAD scaled.
    pub utilization: U256,
    pub total_supply: U256,
    pub total_borrow: U256,
    /// Sub-calls that returned a value.
    pub successes: usize,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RatePair {
    /// WAD scaled, per second.
    pub supply_per_second: U256,
    pub borrow_per_second: U256,
    pub successes: usize,
}

pub struct CompoundFetcher<R: ChainReader> {
    reader: Arc<R>,
    comet: Address,
    base_decimals: u32,
}

fn expect_outcomes<const N: usize>(
    outcomes: Vec<CallOutcome>,
) -> Result<[CallOutcome; N], MetricsError> {
    let len = outcomes.len();
    outcomes.try_into().map_err(|_| {
        MetricsError::MalformedResponse(format!("expected {} batch results, got {}", N, len))
    })
}

impl<R: ChainReader> CompoundFetcher<R> {
    pub fn new(reader: Arc<R>, comet: Address, base_decimals: u32) -> Self {
        Self {
            reader,
            comet,
            base_decimals,
        }
    }

    fn comet_call(&self, data: ethers::types::Bytes) -> ContractCall {
        ContractCall::new(self.comet, data)
    }

    pub async fn fetch_market_state(&self) -> Result<MarketState, MetricsError> {
        let outcomes = self
            .reader
            .batch_call(vec![
                self.comet_call(get_utilization()),
                self.comet_call(total_supply()),
                self.comet_call(total_borrow()),
            ])
            .await?;
        let [utilization, supply, borrow] = expect_outcomes::<3>(outcomes)?;

        let (utilization, utilization_ok) = uint_or_zero(&utilization, "Compound getUtilization");
        let (total_supply, supply_ok) = uint_or_zero(&supply, "Compound totalSupply");
        let (total_borrow, borrow_ok) = uint_or_zero(&borrow, "Compound totalBorrow");

        Ok(MarketState {
            utilization,
            total_supply,
            total_borrow,
            successes: [utilization_ok, supply_ok, borrow_ok]
                .iter()
                .filter(|ok| **ok)
                .count(),
        })
    }

    pub async fn fetch_rates(&self, utilization: U256) -> Result<RatePair, MetricsError> {
        let outcomes = self
            .reader
            .batch_call(vec![
                self.comet_call(get_supply_rate(utilization)),
                self.comet_call(get_borrow_rate(utilization)),
            ])
            .await?;
        let [supply, borrow] = expect_outcomes::<2>(outcomes)?;

        let (supply_per_second, supply_ok) = uint_or_zero(&supply, "Compound getSupplyRate");
        let (borrow_per_second, borrow_ok) = uint_or_zero(&borrow, "Compound getBorrowRate");

        Ok(RatePair {
            supply_per_second,
            borrow_per_second,
            successes: supply_ok as usize + borrow_ok as usize,
        })
    }
}

#[async_trait]
impl<R: ChainReader> ProtocolFetcher for CompoundFetcher<R> {
    fn key(&self) -> &'static str {
        "compound"
    }

    fn label(&self) -> &'static str {
        "Compound"
    }

    async fn fetch(&self) -> Result<ProtocolMetrics, MetricsError> {
        let state = self.fetch_market_state().await?;
        let rates = self.fetch_rates(state.utilization).await?;
        if state.successes + rates.successes == 0 {
            return Err(MetricsError::CallFailed(
                "every Comet call failed".to_string(),
            ));
        }

        Ok(ProtocolMetrics {
            total_supplied: token_amount(state.total_supply, self.base_decimals)?,
            total_borrowed: token_amount(state.total_borrow, self.base_decimals)?,
            supply_rate_pct: per_second_wad_to_annual_percent(rates.supply_per_second)?,
            borrow_rate_pct: per_second_wad_to_annual_percent(rates.borrow_per_second)?,
            utilization_pct: wad_ratio_to_percent(state.utilization)?,
        })
    }
}
