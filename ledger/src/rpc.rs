//! JSON-RPC transport seam for the ledger.

use std::future::Future;

use alloy_primitives::{Address, Bytes, B256, U256};
use serde::Serialize;
use thiserror::Error;

/// Transport-level failure talking to the ledger node.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RpcError {
    /// The endpoint could not be reached or answered with a non-2xx status.
    #[error("transport error: {0}")]
    Transport(String),

    /// The node returned a JSON-RPC error object.
    #[error("server error {code}: {message}")]
    Server { code: i64, message: String },

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Arguments of `eth_call` / `eth_estimateGas`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<Address>,
    pub to: Address,
    pub data: Bytes,
}

/// The parts of a transaction receipt the client relies on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcReceipt {
    pub transaction_hash: B256,
    pub block_number: u64,
    pub gas_used: u64,
    /// `false` when the transaction reverted.
    pub success: bool,
}

/// The ledger node operations the client needs.
///
/// Every method is one round-trip; retries and timeouts are the client's
/// concern.
pub trait LedgerRpc: Send + Sync {
    /// Human-readable endpoint, for status reports.
    fn endpoint(&self) -> String;

    /// `eth_chainId`.
    fn chain_id(&self) -> impl Future<Output = Result<u64, RpcError>> + Send;

    /// `eth_blockNumber`.
    fn block_number(&self) -> impl Future<Output = Result<u64, RpcError>> + Send;

    /// `eth_getBalance` at `latest`.
    fn get_balance(&self, address: Address)
        -> impl Future<Output = Result<U256, RpcError>> + Send;

    /// `eth_getCode` at `latest`.
    fn get_code(&self, address: Address) -> impl Future<Output = Result<Bytes, RpcError>> + Send;

    /// `eth_getTransactionCount` at `pending`.
    fn get_transaction_count(
        &self,
        address: Address,
    ) -> impl Future<Output = Result<u64, RpcError>> + Send;

    /// `eth_estimateGas`.
    fn estimate_gas(
        &self,
        call: &CallRequest,
    ) -> impl Future<Output = Result<u64, RpcError>> + Send;

    /// `eth_call` at `latest`.
    fn call(&self, call: &CallRequest) -> impl Future<Output = Result<Bytes, RpcError>> + Send;

    /// `eth_sendRawTransaction`.
    fn send_raw_transaction(
        &self,
        raw: &[u8],
    ) -> impl Future<Output = Result<B256, RpcError>> + Send;

    /// `eth_getTransactionReceipt`; `None` while the transaction is unmined.
    fn get_transaction_receipt(
        &self,
        hash: B256,
    ) -> impl Future<Output = Result<Option<RpcReceipt>, RpcError>> + Send;
}
