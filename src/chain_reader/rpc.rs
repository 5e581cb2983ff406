use async_trait::async_trait;
use ethers::abi::{self, ParamType, Token};
use ethers::providers::{Http, Middleware, Provider};
use ethers::types::{transaction::eip2718::TypedTransaction, Address, Bytes, TransactionRequest};
use eyre::Result;
use tokio::time::{timeout, Duration};

use crate::chain_reader::{encode_call, CallOutcome, ChainReader, ContractCall};
use crate::error::MetricsError;

const AGGREGATE3_SIGNATURE: &str = "aggregate3((address,bool,bytes)[])";

/// Reads through a JSON-RPC node. Batches go through a Multicall3 deployment so they cost a single
/// round trip.
pub struct RpcChainReader {
    provider: Provider<Http>,
    multicall: Address,
    call_timeout: Duration,
}

impl RpcChainReader {
    pub fn new(rpc_url: &str, multicall: Address, call_timeout: Duration) -> Result<Self> {
        let provider = Provider::<Http>::try_from(rpc_url)
            .map_err(|e| eyre::eyre!("Invalid RPC url {}: {}", rpc_url, e))?;
        Ok(Self {
            provider,
            multicall,
            call_timeout,
        })
    }

    async fn eth_call(&self, call: ContractCall) -> Result<Bytes, MetricsError> {
        let tx: TypedTransaction = TransactionRequest::new()
            .to(call.target)
            .data(call.data)
            .into();
        match timeout(self.call_timeout, self.provider.call(&tx, None)).await {
            Ok(result) => result.map_err(|e| MetricsError::CallFailed(e.to_string())),
            Err(_) => Err(MetricsError::Timeout(self.call_timeout.as_secs())),
        }
    }
}

fn encode_aggregate3(calls: &[ContractCall]) -> Bytes {
    let entries = calls
        .iter()
        .map(|call| {
            Token::Tuple(vec![
                Token::Address(call.target),
                Token::Bool(true),
                Token::Bytes(call.data.to_vec()),
            ])
        })
        .collect();
    encode_call(AGGREGATE3_SIGNATURE, &[Token::Array(entries)])
}

fn decode_aggregate3(raw: &[u8], expected: usize) -> Result<Vec<CallOutcome>, MetricsError> {
    let result_type = ParamType::Array(Box::new(ParamType::Tuple(vec![
        ParamType::Bool,
        ParamType::Bytes,
    ])));
    let malformed = |detail: String| MetricsError::MalformedResponse(format!("aggregate3: {}", detail));

    let entries = match abi::decode(&[result_type], raw)
        .map_err(|e| malformed(e.to_string()))?
        .pop()
    {
        Some(Token::Array(entries)) => entries,
        other => return Err(malformed(format!("unexpected return {:?}", other))),
    };
    if entries.len() != expected {
        return Err(malformed(format!(
            "expected {} results, got {}",
            expected,
            entries.len()
        )));
    }

    entries
        .into_iter()
        .map(|entry| match entry {
            Token::Tuple(fields) => match fields.as_slice() {
                [Token::Bool(true), Token::Bytes(data)] => {
                    Ok(CallOutcome::Success(Bytes::from(data.clone())))
                }
                [Token::Bool(false), _] => Ok(CallOutcome::Failure("call reverted".to_string())),
                _ => Err(malformed(format!("unexpected entry {:?}", fields))),
            },
            other => Err(malformed(format!("unexpected entry {:?}", other))),
        })
        .collect()
}

#[async_trait]
impl ChainReader for RpcChainReader {
    async fn call(&self, call: ContractCall) -> Result<Bytes, MetricsError> {
        log::debug!(
            "eth_call to {:?} with {} bytes of calldata",
            call.target,
            call.data.len()
        );
        self.eth_call(call).await
    }

    async fn batch_call(&self, calls: Vec<ContractCall>) -> Result<Vec<CallOutcome>, MetricsError> {
        log::debug!("Batching {} calls through multicall {:?}", calls.len(), self.multicall);
        let raw = self
            .eth_call(ContractCall::new(self.multicall, encode_aggregate3(&calls)))
            .await?;
        decode_aggregate3(&raw, calls.len())
    }
}
