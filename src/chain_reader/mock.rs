//! Scripted in-memory reader for tests.
use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use ethers::types::Bytes;

use crate::chain_reader::{CallOutcome, ChainReader, ContractCall};
use crate::error::MetricsError;

#[derive(Default)]
pub struct MockChainReader {
    responses: HashMap<ContractCall, CallOutcome>,
    failing_batches: bool,
    // Every call seen, batches flattened, in issue order.
    calls: Mutex<Vec<ContractCall>>,
    batch_sizes: Mutex<Vec<usize>>,
}

impl MockChainReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(mut self, call: ContractCall, data: Vec<u8>) -> Self {
        self.responses.insert(call, CallOutcome::Success(Bytes::from(data)));
        self
    }

    pub fn revert(mut self, call: ContractCall) -> Self {
        self.responses
            .insert(call, CallOutcome::Failure("execution reverted".to_string()));
        self
    }

    pub fn fail_batches(mut self) -> Self {
        self.failing_batches = true;
        self
    }

    pub fn calls(&self) -> Vec<ContractCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batch_sizes.lock().unwrap().clone()
    }

    fn outcome(&self, call: &ContractCall) -> CallOutcome {
        self.responses
            .get(call)
            .cloned()
            .unwrap_or_else(|| CallOutcome::Failure("no response scripted".to_string()))
    }
}

#[async_trait]
impl ChainReader for MockChainReader {
    async fn call(&self, call: ContractCall) -> Result<Bytes, MetricsError> {
        self.calls.lock().unwrap().push(call.clone());
        match self.outcome(&call) {
            CallOutcome::Success(bytes) => Ok(bytes),
            CallOutcome::Failure(reason) => Err(MetricsError::CallFailed(reason)),
        }
    }

    async fn batch_call(&self, calls: Vec<ContractCall>) -> Result<Vec<CallOutcome>, MetricsError> {
        self.batch_sizes.lock().unwrap().push(calls.len());
        self.calls.lock().unwrap().extend(calls.iter().cloned());
        if self.failing_batches {
            return Err(MetricsError::CallFailed("connection refused".to_string()));
        }
        Ok(calls.iter().map(|call| self.outcome(call)).collect())
    }
}
