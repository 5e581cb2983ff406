//! AAVE V3 style pool: rates come from the reserve data struct, amounts from the supply and
//! variable debt token supplies.
use std::sync::Arc;

use async_trait::async_trait;
use ethers::types::{Address, U256};

use crate::abi_words::{decode_words, DecodedField, FieldKind};
use crate::chain_reader::{get_reserve_data, total_supply, ChainReader, ContractCall};
use crate::error::MetricsError;
use crate::fixed_point::{ray_to_percent, token_amount, utilization_from_amounts};
use crate::protocol_fetcher::{uint_or_zero, ProtocolFetcher, ProtocolMetrics};

/// Words in the `getReserveData` return struct.
pub const RESERVE_DATA_WORDS: usize = 13;

// Word 0 is the 256-bit configuration bitmap and is never decoded.
const RESERVE_DATA_LAYOUT: [(usize, FieldKind); RESERVE_DATA_WORDS] = [
    (0, FieldKind::Skip),     // configuration
    (1, FieldKind::Skip),     // liquidityIndex
    (2, FieldKind::Uint128),  // currentLiquidityRate
    (3, FieldKind::Skip),     // variableBorrowIndex
    (4, FieldKind::Uint128),  // currentVariableBorrowRate
    (5, FieldKind::Skip),     // lastUpdateTimestamp
    (6, FieldKind::Skip),     // id
    (7, FieldKind::Address),  // aTokenAddress
    (8, FieldKind::Address),  // variableDebtTokenAddress
    (9, FieldKind::Skip),     // interestRateStrategyAddress
    (10, FieldKind::Skip),    // accruedToTreasury
    (11, FieldKind::Skip),    // unbacked
    (12, FieldKind::Skip),    // isolationModeTotalDebt
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReserveData {
    pub current_liquidity_rate: u128,
    pub current_variable_borrow_rate: u128,
    pub a_token_address: Address,
    pub variable_debt_token_address: Address,
}

impl ReserveData {
    pub fn decode(raw: &[u8]) -> Result<ReserveData, MetricsError> {
        let fields = decode_words(raw, &RESERVE_DATA_LAYOUT)?;
        let uint = |index: usize| fields[index].as_u128();
        let address = |index: usize| fields[index].as_address();
        match (uint(2), uint(4), address(7), address(8)) {
            (
                Some(current_liquidity_rate),
                Some(current_variable_borrow_rate),
                Some(a_token_address),
                Some(variable_debt_token_address),
            ) => Ok(ReserveData {
                current_liquidity_rate,
                current_variable_borrow_rate,
                a_token_address,
                variable_debt_token_address,
            }),
            _ => Err(MetricsError::MalformedResponse(format!(
                "unexpected reserve data fields: {:?}",
                fields
                    .iter()
                    .filter(|field| **field != DecodedField::Skipped)
                    .collect::<Vec<_>>()
            ))),
        }
    }
}

pub struct AaveFetcher<R: ChainReader> {
    reader: Arc<R>,
    pool: Address,
    asset: Address,
    asset_decimals: u32,
}

impl<R: ChainReader> AaveFetcher<R> {
    pub fn new(reader: Arc<R>, pool: Address, asset: Address, asset_decimals: u32) -> Self {
        Self {
            reader,
            pool,
            asset,
            asset_decimals,
        }
    }

    pub async fn fetch_reserve_data(&self) -> Result<ReserveData, MetricsError> {
        let raw = self
            .reader
            .call(ContractCall::new(self.pool, get_reserve_data(self.asset)))
            .await?;
        if raw.is_empty() {
            return Err(MetricsError::MalformedResponse(
                "getReserveData returned empty data".to_string(),
            ));
        }
        ReserveData::decode(&raw)
    }

    /// Supplied and borrowed amounts in base units; a failed token read counts as zero.
    pub async fn fetch_token_supplies(
        &self,
        reserve: &ReserveData,
    ) -> Result<(U256, U256), MetricsError> {
        let outcomes = self
            .reader
            .batch_call(vec![
                ContractCall::new(reserve.a_token_address, total_supply()),
                ContractCall::new(reserve.variable_debt_token_address, total_supply()),
            ])
            .await?;
        match outcomes.as_slice() {
            [supplied, borrowed] => Ok((
                uint_or_zero(supplied, "AAVE aToken totalSupply").0,
                uint_or_zero(borrowed, "AAVE variable debt totalSupply").0,
            )),
            _ => Err(MetricsError::MalformedResponse(format!(
                "expected 2 token supplies, got {}",
                outcomes.len()
            ))),
        }
    }
}

#[async_trait]
impl<R: ChainReader> ProtocolFetcher for AaveFetcher<R> {
    fn key(&self) -> &'static str {
        "aave"
    }

    fn label(&self) -> &'static str {
        "AAVE"
    }

    async fn fetch(&self) -> Result<ProtocolMetrics, MetricsError> {
        let reserve = self.fetch_reserve_data().await?;
        log::debug!(
            "AAVE reserve aToken {:?}, debt token {:?}",
            reserve.a_token_address,
            reserve.variable_debt_token_address
        );
        let (supplied, borrowed) = self.fetch_token_supplies(&reserve).await?;

        Ok(ProtocolMetrics {
            total_supplied: token_amount(supplied, self.asset_decimals)?,
            total_borrowed: token_amount(borrowed, self.asset_decimals)?,
            supply_rate_pct: ray_to_percent(U256::from(reserve.current_liquidity_rate))?,
            borrow_rate_pct: ray_to_percent(U256::from(reserve.current_variable_borrow_rate))?,
            utilization_pct: utilization_from_amounts(borrowed, supplied)?,
        })
    }
}
