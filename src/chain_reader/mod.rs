//! Chain readers perform read-only contract calls, either one at a time or as an order-preserving
//! batch where every entry succeeds or fails on its own.
use async_trait::async_trait;
use ethers::abi::{self, Token};
use ethers::types::{Address, Bytes, U256};
use ethers::utils::id;

use crate::error::MetricsError;

#[cfg(test)]
pub mod mock;
pub mod rpc;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ContractCall {
    pub target: Address,
    pub data: Bytes,
}

impl ContractCall {
    pub fn new(target: Address, data: Bytes) -> Self {
        Self { target, data }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CallOutcome {
    Success(Bytes),
    Failure(String),
}

#[async_trait]
pub trait ChainReader: Send + Sync {
    async fn call(&self, call: ContractCall) -> Result<Bytes, MetricsError>;

    /// Outcomes are returned in the order of `calls`. An `Err` means the batch itself could not
    /// be executed.
    async fn batch_call(&self, calls: Vec<ContractCall>) -> Result<Vec<CallOutcome>, MetricsError>;
}

/// Selector of `signature` followed by the ABI encoded `args`.
pub fn encode_call(signature: &str, args: &[Token]) -> Bytes {
    let mut data = id(signature).to_vec();
    data.extend_from_slice(&abi::encode(args));
    Bytes::from(data)
}

pub fn get_reserve_data(asset: Address) -> Bytes {
    encode_call("getReserveData(address)", &[Token::Address(asset)])
}

pub fn total_supply() -> Bytes {
    encode_call("totalSupply()", &[])
}

pub fn total_borrow() -> Bytes {
    encode_call("totalBorrow()", &[])
}

pub fn get_utilization() -> Bytes {
    encode_call("getUtilization()", &[])
}

pub fn get_supply_rate(utilization: U256) -> Bytes {
    encode_call("getSupplyRate(uint256)", &[Token::Uint(utilization)])
}

pub fn get_borrow_rate(utilization: U256) -> Bytes {
    encode_call("getBorrowRate(uint256)", &[Token::Uint(utilization)])
}
