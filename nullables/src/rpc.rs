//! Nullable ledger node: an in-memory [`LedgerRpc`] for testing the ledger
//! client.
//!
//! The chain head advances by one block every time `block_number` is
//! queried, so confirmation polling makes progress without real time.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;

use alloy_primitives::{keccak256, Address, Bytes, B256, U256};

use certanchor_ledger::{CallRequest, LedgerRpc, RpcError, RpcReceipt};

/// Gas estimate returned unless overridden.
pub const DEFAULT_GAS_ESTIMATE: u64 = 100_000;

/// Chain id reported unless overridden.
pub const DEFAULT_CHAIN_ID: u64 = 420_420_422;

pub struct NullLedgerRpc {
    chain_id: u64,
    code: Mutex<Bytes>,
    balance: Mutex<U256>,
    gas_estimate: AtomicU64,
    nonce: AtomicU64,
    head: AtomicU64,
    /// When false, receipts are withheld as if transactions never mine.
    mining: AtomicBool,
    revert: AtomicBool,
    unreachable: AtomicBool,
    estimate_error: Mutex<Option<RpcError>>,
    send_error: Mutex<Option<RpcError>>,
    /// Inclusion block of every accepted transaction.
    mined: Mutex<HashMap<B256, u64>>,
    sent: Mutex<Vec<Vec<u8>>>,
    call_responses: Mutex<HashMap<[u8; 4], Bytes>>,
    chain_id_calls: AtomicUsize,
}

impl NullLedgerRpc {
    /// A healthy node: contract deployed, signer well funded, transactions
    /// mine in the block after they are sent.
    pub fn new() -> Self {
        Self {
            chain_id: DEFAULT_CHAIN_ID,
            code: Mutex::new(Bytes::from_static(&[0x60, 0x80, 0x60, 0x40])),
            // 100 native tokens
            balance: Mutex::new(U256::from(100u128 * 1_000_000_000_000_000_000)),
            gas_estimate: AtomicU64::new(DEFAULT_GAS_ESTIMATE),
            nonce: AtomicU64::new(0),
            head: AtomicU64::new(100),
            mining: AtomicBool::new(true),
            revert: AtomicBool::new(false),
            unreachable: AtomicBool::new(false),
            estimate_error: Mutex::new(None),
            send_error: Mutex::new(None),
            mined: Mutex::new(HashMap::new()),
            sent: Mutex::new(Vec::new()),
            call_responses: Mutex::new(HashMap::new()),
            chain_id_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_chain_id(mut self, chain_id: u64) -> Self {
        self.chain_id = chain_id;
        self
    }

    /// Report no code at the contract address.
    pub fn without_contract(self) -> Self {
        *self.code.lock().unwrap() = Bytes::new();
        self
    }

    pub fn set_balance(&self, wei: U256) {
        *self.balance.lock().unwrap() = wei;
    }

    pub fn set_gas_estimate(&self, gas: u64) {
        self.gas_estimate.store(gas, Ordering::SeqCst);
    }

    pub fn set_mining(&self, mining: bool) {
        self.mining.store(mining, Ordering::SeqCst);
    }

    /// Mine every following transaction with a failed status.
    pub fn set_revert(&self, revert: bool) {
        self.revert.store(revert, Ordering::SeqCst);
    }

    /// Fail every request with a transport error.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    pub fn fail_estimate(&self, error: RpcError) {
        *self.estimate_error.lock().unwrap() = Some(error);
    }

    pub fn fail_send(&self, error: RpcError) {
        *self.send_error.lock().unwrap() = Some(error);
    }

    /// Answer `eth_call`s whose calldata starts with `selector`.
    pub fn respond_to_call(&self, selector: [u8; 4], data: impl Into<Bytes>) {
        self.call_responses
            .lock()
            .unwrap()
            .insert(selector, data.into());
    }

    /// Raw transactions accepted by `send_raw_transaction`, in order.
    pub fn sent_transactions(&self) -> Vec<Vec<u8>> {
        self.sent.lock().unwrap().clone()
    }

    pub fn chain_id_calls(&self) -> usize {
        self.chain_id_calls.load(Ordering::SeqCst)
    }

    fn check_reachable(&self) -> Result<(), RpcError> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(RpcError::Transport("connection refused".into()));
        }
        Ok(())
    }
}

impl Default for NullLedgerRpc {
    fn default() -> Self {
        Self::new()
    }
}

impl LedgerRpc for NullLedgerRpc {
    fn endpoint(&self) -> String {
        "null://ledger-rpc".to_string()
    }

    async fn chain_id(&self) -> Result<u64, RpcError> {
        self.chain_id_calls.fetch_add(1, Ordering::SeqCst);
        self.check_reachable()?;
        Ok(self.chain_id)
    }

    async fn block_number(&self) -> Result<u64, RpcError> {
        self.check_reachable()?;
        Ok(self.head.fetch_add(1, Ordering::SeqCst) + 1)
    }

    async fn get_balance(&self, _address: Address) -> Result<U256, RpcError> {
        self.check_reachable()?;
        Ok(*self.balance.lock().unwrap())
    }

    async fn get_code(&self, _address: Address) -> Result<Bytes, RpcError> {
        self.check_reachable()?;
        Ok(self.code.lock().unwrap().clone())
    }

    async fn get_transaction_count(&self, _address: Address) -> Result<u64, RpcError> {
        self.check_reachable()?;
        Ok(self.nonce.load(Ordering::SeqCst))
    }

    async fn estimate_gas(&self, _call: &CallRequest) -> Result<u64, RpcError> {
        self.check_reachable()?;
        if let Some(error) = self.estimate_error.lock().unwrap().clone() {
            return Err(error);
        }
        Ok(self.gas_estimate.load(Ordering::SeqCst))
    }

    async fn call(&self, call: &CallRequest) -> Result<Bytes, RpcError> {
        self.check_reachable()?;
        let selector: Option<[u8; 4]> = call.data.get(..4).and_then(|s| s.try_into().ok());
        selector
            .and_then(|s| self.call_responses.lock().unwrap().get(&s).cloned())
            .ok_or_else(|| RpcError::Server {
                code: 3,
                message: "execution reverted".into(),
            })
    }

    async fn send_raw_transaction(&self, raw: &[u8]) -> Result<B256, RpcError> {
        self.check_reachable()?;
        if let Some(error) = self.send_error.lock().unwrap().clone() {
            return Err(error);
        }
        let hash = keccak256(raw);
        let inclusion = self.head.load(Ordering::SeqCst) + 1;
        self.mined.lock().unwrap().insert(hash, inclusion);
        self.sent.lock().unwrap().push(raw.to_vec());
        self.nonce.fetch_add(1, Ordering::SeqCst);
        Ok(hash)
    }

    async fn get_transaction_receipt(&self, hash: B256) -> Result<Option<RpcReceipt>, RpcError> {
        self.check_reachable()?;
        if !self.mining.load(Ordering::SeqCst) {
            return Ok(None);
        }
        let block_number = self.mined.lock().unwrap().get(&hash).copied();
        Ok(block_number.map(|block_number| RpcReceipt {
            transaction_hash: hash,
            block_number,
            gas_used: self.gas_estimate.load(Ordering::SeqCst),
            success: !self.revert.load(Ordering::SeqCst),
        }))
    }
}
