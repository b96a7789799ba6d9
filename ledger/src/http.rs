//! JSON-RPC 2.0 over HTTP.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use alloy_primitives::{Address, Bytes, B256, U256, U64};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::rpc::{CallRequest, LedgerRpc, RpcError, RpcReceipt};
use crate::LedgerError;

/// Default connection timeout.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// [`LedgerRpc`] over a plain HTTP JSON-RPC endpoint.
pub struct HttpLedgerRpc {
    /// HTTP client (reusable connection pool).
    http_client: reqwest::Client,
    url: String,
    next_id: AtomicU64,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<JsonRpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcErrorObject {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReceiptResponse {
    transaction_hash: B256,
    block_number: U64,
    gas_used: U64,
    /// Absent on pre-Byzantium chains, where it is treated as success.
    #[serde(default)]
    status: Option<U64>,
}

impl From<ReceiptResponse> for RpcReceipt {
    fn from(r: ReceiptResponse) -> Self {
        Self {
            transaction_hash: r.transaction_hash,
            block_number: r.block_number.to::<u64>(),
            gas_used: r.gas_used.to::<u64>(),
            success: r.status.map_or(true, |s| s != U64::ZERO),
        }
    }
}

impl HttpLedgerRpc {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, LedgerError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .build()
            .map_err(|e| LedgerError::Config(format!("cannot build HTTP client: {e}")))?;
        Ok(Self {
            http_client,
            url: url.into(),
            next_id: AtomicU64::new(1),
        })
    }

    async fn request<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, RpcError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        let response = self
            .http_client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    RpcError::Transport(format!("{method} timed out: {e}"))
                } else if e.is_connect() {
                    RpcError::Transport(format!("connection failed: {e}"))
                } else {
                    RpcError::Transport(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            return Err(RpcError::Transport(format!(
                "{method}: HTTP status {}",
                response.status()
            )));
        }

        let envelope: JsonRpcResponse = response
            .json()
            .await
            .map_err(|e| RpcError::InvalidResponse(format!("{method}: {e}")))?;

        if let Some(err) = envelope.error {
            return Err(RpcError::Server {
                code: err.code,
                message: err.message,
            });
        }

        serde_json::from_value(envelope.result.unwrap_or(Value::Null))
            .map_err(|e| RpcError::InvalidResponse(format!("{method}: {e}")))
    }
}

impl LedgerRpc for HttpLedgerRpc {
    fn endpoint(&self) -> String {
        self.url.clone()
    }

    async fn chain_id(&self) -> Result<u64, RpcError> {
        let id: U64 = self.request("eth_chainId", json!([])).await?;
        Ok(id.to::<u64>())
    }

    async fn block_number(&self) -> Result<u64, RpcError> {
        let number: U64 = self.request("eth_blockNumber", json!([])).await?;
        Ok(number.to::<u64>())
    }

    async fn get_balance(&self, address: Address) -> Result<U256, RpcError> {
        self.request("eth_getBalance", json!([address, "latest"])).await
    }

    async fn get_code(&self, address: Address) -> Result<Bytes, RpcError> {
        self.request("eth_getCode", json!([address, "latest"])).await
    }

    async fn get_transaction_count(&self, address: Address) -> Result<u64, RpcError> {
        let count: U64 = self
            .request("eth_getTransactionCount", json!([address, "pending"]))
            .await?;
        Ok(count.to::<u64>())
    }

    async fn estimate_gas(&self, call: &CallRequest) -> Result<u64, RpcError> {
        let gas: U64 = self.request("eth_estimateGas", json!([call])).await?;
        Ok(gas.to::<u64>())
    }

    async fn call(&self, call: &CallRequest) -> Result<Bytes, RpcError> {
        self.request("eth_call", json!([call, "latest"])).await
    }

    async fn send_raw_transaction(&self, raw: &[u8]) -> Result<B256, RpcError> {
        let encoded = Bytes::copy_from_slice(raw);
        self.request("eth_sendRawTransaction", json!([encoded])).await
    }

    async fn get_transaction_receipt(&self, hash: B256) -> Result<Option<RpcReceipt>, RpcError> {
        let receipt: Option<ReceiptResponse> = self
            .request("eth_getTransactionReceipt", json!([hash]))
            .await?;
        Ok(receipt.map(RpcReceipt::from))
    }
}
