//! The ledger client: submits certificate writes and answers verification
//! reads.
//!
//! Signing capability is optional. Without a usable credential the client
//! stays in a degraded read-only mode: `read_verification` keeps working,
//! `submit_write` fails with `ServiceUnavailable`.

use std::future::Future;

use alloy_consensus::TxEip1559;
use alloy_primitives::{Address, TxKind, B256, U256};
use serde::Serialize;
use tokio::sync::{Mutex, OnceCell};

use certanchor_types::{
    CertificateId, LedgerAddress, LedgerReceipt, LedgerWriteRequest, OnChainRecord, TxHash,
};

use crate::config::{CredentialMode, LedgerConfig};
use crate::contract;
use crate::rpc::{CallRequest, LedgerRpc, RpcError};
use crate::signer::LedgerSigner;
use crate::{from_alloy_address, from_alloy_hash, to_alloy_address, to_alloy_hash, LedgerError};

/// Snapshot of the client's readiness, for health reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerHealth {
    pub initialized: bool,
    pub has_signer: bool,
    pub signer_address: Option<LedgerAddress>,
    pub contract_address: LedgerAddress,
    pub rpc_endpoint: String,
    pub chain_id: Option<u64>,
}

/// What the issuance layer needs from the ledger.
pub trait CertificateLedger: Send + Sync {
    /// Whether writes can be submitted right now.
    fn is_ready(&self) -> bool;

    /// Bring up write capability. Idempotent; returns readiness.
    fn initialize(&self) -> impl Future<Output = bool> + Send;

    /// Write one certificate and wait for it to be confirmed.
    fn submit_write(
        &self,
        request: &LedgerWriteRequest,
    ) -> impl Future<Output = Result<LedgerReceipt, LedgerError>> + Send;

    /// Look up a write broadcast earlier, e.g. one whose confirmation wait
    /// timed out. `Ok(None)` while it is unmined. Once mined, waits for the
    /// confirmation depth like `submit_write`.
    fn find_write(
        &self,
        tx_hash: &TxHash,
    ) -> impl Future<Output = Result<Option<LedgerReceipt>, LedgerError>> + Send;

    /// Read the on-chain record for a certificate. Needs no signer.
    fn read_verification(
        &self,
        id: &CertificateId,
    ) -> impl Future<Output = Result<OnChainRecord, LedgerError>> + Send;

    fn status(&self) -> LedgerHealth;
}

/// State established by a successful initialization.
#[derive(Debug)]
struct WriterState {
    chain_id: u64,
}

/// Ledger client over any [`LedgerRpc`] transport.
pub struct LedgerClient<R> {
    config: LedgerConfig,
    rpc: R,
    contract: Address,
    signer: Option<LedgerSigner>,
    /// Set once, by the first successful initialization. Concurrent
    /// `initialize` calls wait on the one in flight.
    writer: OnceCell<WriterState>,
    /// Held for the whole submit-and-confirm cycle so writes from this
    /// signer never race for a nonce.
    submit_lock: Mutex<()>,
}

impl<R: LedgerRpc> LedgerClient<R> {
    /// Build a client. Fails only on invalid configuration, or in
    /// [`CredentialMode::Strict`] when no usable signing key is configured.
    pub fn new(config: LedgerConfig, rpc: R) -> Result<Self, LedgerError> {
        config.validate()?;

        let signer = match config.signer_key.as_ref() {
            Some(key) => match LedgerSigner::from_key(key.expose()) {
                Ok(signer) => Some(signer),
                Err(e) if config.credential_mode == CredentialMode::Degraded => {
                    tracing::error!(error = %e, "signing key unusable, ledger writes disabled");
                    None
                }
                Err(e) => return Err(e),
            },
            None => None,
        };

        if signer.is_none() {
            match config.credential_mode {
                CredentialMode::Strict => return Err(LedgerError::MissingCredential),
                CredentialMode::Degraded => {
                    tracing::warn!("no signing credential configured, operating in read-only mode")
                }
            }
        }

        Ok(Self {
            contract: to_alloy_address(&config.contract_address),
            config,
            rpc,
            signer,
            writer: OnceCell::new(),
            submit_lock: Mutex::new(()),
        })
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn rpc(&self) -> &R {
        &self.rpc
    }

    pub fn signer_address(&self) -> Option<LedgerAddress> {
        self.signer.as_ref().map(|s| from_alloy_address(s.address()))
    }

    /// Check connectivity, chain id and contract deployment.
    async fn probe_provider(&self) -> Result<u64, LedgerError> {
        let chain_id = self.rpc.chain_id().await?;
        if let Some(expected) = self.config.chain_id {
            if expected != chain_id {
                return Err(LedgerError::ChainMismatch {
                    expected,
                    actual: chain_id,
                });
            }
        }
        tracing::info!(chain_id, endpoint = %self.rpc.endpoint(), "connected to ledger");

        let code = self.rpc.get_code(self.contract).await?;
        if code.is_empty() {
            return Err(LedgerError::ContractNotDeployed(self.config.contract_address));
        }
        tracing::info!(contract = %self.config.contract_address, "registry contract found");
        Ok(chain_id)
    }

    async fn connect_writer(&self, signer: &LedgerSigner) -> Result<WriterState, LedgerError> {
        let chain_id = self.probe_provider().await?;

        let address = signer.address();
        let balance = self.rpc.get_balance(address).await?;
        if balance < U256::from(self.config.low_balance_wei()) {
            tracing::warn!(
                signer = %from_alloy_address(address),
                balance_wei = %balance,
                "low signer balance, writes may fail"
            );
        } else {
            tracing::info!(signer = %from_alloy_address(address), balance_wei = %balance, "signer ready");
        }

        match self.onchain_certificate_count().await {
            Ok(count) => tracing::info!(%count, "certificates recorded on-chain"),
            Err(e) => tracing::debug!(error = %e, "could not read on-chain certificate count"),
        }

        Ok(WriterState { chain_id })
    }

    /// Number of certificates the registry contract holds.
    pub async fn onchain_certificate_count(&self) -> Result<U256, LedgerError> {
        let call = CallRequest {
            from: None,
            to: self.contract,
            data: contract::encode_count(),
        };
        let data = self.rpc.call(&call).await?;
        contract::decode_count(&data)
    }

    async fn wait_for_confirmations(&self, hash: B256) -> Result<LedgerReceipt, LedgerError> {
        let timeout = self.config.confirmation_timeout();
        match tokio::time::timeout(timeout, self.poll_receipt(hash)).await {
            Ok(result) => result,
            Err(_) => Err(LedgerError::ConfirmationTimeout {
                tx_hash: from_alloy_hash(hash),
                waited_secs: timeout.as_secs(),
            }),
        }
    }

    async fn poll_receipt(&self, hash: B256) -> Result<LedgerReceipt, LedgerError> {
        let tx_hash = from_alloy_hash(hash);
        let mut interval = tokio::time::interval(self.config.poll_interval());

        loop {
            interval.tick().await;

            let receipt = match self.rpc.get_transaction_receipt(hash).await {
                Ok(Some(receipt)) => receipt,
                Ok(None) => continue,
                Err(RpcError::Transport(msg)) => {
                    tracing::warn!(%tx_hash, error = %msg, "receipt poll failed, retrying");
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            if !receipt.success {
                return Err(LedgerError::Reverted { tx_hash });
            }

            let head = match self.rpc.block_number().await {
                Ok(head) => head,
                Err(RpcError::Transport(msg)) => {
                    tracing::warn!(%tx_hash, error = %msg, "block number poll failed, retrying");
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            let depth = head.saturating_sub(receipt.block_number) + 1;
            if depth >= self.config.confirmations {
                return Ok(LedgerReceipt {
                    tx_hash,
                    block_number: receipt.block_number,
                    gas_used: receipt.gas_used,
                });
            }
            tracing::debug!(%tx_hash, depth, needed = self.config.confirmations, "awaiting confirmations");
        }
    }
}

impl<R: LedgerRpc> CertificateLedger for LedgerClient<R> {
    fn is_ready(&self) -> bool {
        self.writer.initialized()
    }

    async fn initialize(&self) -> bool {
        let Some(signer) = self.signer.as_ref() else {
            if let Err(e) = self.probe_provider().await {
                tracing::warn!(error = %e, "ledger provider check failed");
            }
            tracing::info!("no signer configured, ledger client is read-only");
            return false;
        };

        match self.writer.get_or_try_init(|| self.connect_writer(signer)).await {
            Ok(_) => true,
            Err(e) => {
                tracing::error!(error = %e, "ledger client initialization failed, staying read-only");
                false
            }
        }
    }

    async fn submit_write(&self, request: &LedgerWriteRequest) -> Result<LedgerReceipt, LedgerError> {
        let writer = self.writer.get().ok_or_else(|| {
            LedgerError::ServiceUnavailable("ledger client not initialized".into())
        })?;
        let signer = self.signer.as_ref().ok_or(LedgerError::MissingCredential)?;

        let _guard = self.submit_lock.lock().await;

        let from = signer.address();
        let recipient = request
            .recipient
            .as_ref()
            .map(to_alloy_address)
            .unwrap_or(from);
        let input = contract::encode_issue(request, recipient);

        let call = CallRequest {
            from: Some(from),
            to: self.contract,
            data: input.clone(),
        };
        let estimate = self.rpc.estimate_gas(&call).await?;
        let gas_limit = self.config.apply_gas_margin(estimate);

        let max_fee = self.config.max_fee_per_gas_wei();
        let needed = U256::from(gas_limit) * U256::from(max_fee);
        let balance = self.rpc.get_balance(from).await?;
        if balance < needed {
            return Err(LedgerError::insufficient_balance(balance, needed));
        }

        let nonce = self.rpc.get_transaction_count(from).await?;
        let tx = TxEip1559 {
            chain_id: writer.chain_id,
            nonce,
            gas_limit,
            max_fee_per_gas: max_fee,
            max_priority_fee_per_gas: self.config.max_priority_fee_per_gas_wei(),
            to: TxKind::Call(self.contract),
            value: U256::ZERO,
            input,
            ..Default::default()
        };
        let signed = signer.sign_eip1559(tx)?;

        let hash = self.rpc.send_raw_transaction(&signed.raw).await?;
        if hash != signed.hash {
            tracing::warn!(
                returned = %hash,
                computed = %signed.hash,
                "node returned a different transaction hash"
            );
        }
        tracing::info!(
            certificate_id = %request.certificate_id,
            tx_hash = %from_alloy_hash(hash),
            nonce,
            gas_limit,
            "certificate write sent"
        );

        let receipt = self.wait_for_confirmations(hash).await?;
        tracing::info!(
            certificate_id = %request.certificate_id,
            tx_hash = %receipt.tx_hash,
            block_number = receipt.block_number,
            gas_used = receipt.gas_used,
            "certificate write confirmed"
        );
        Ok(receipt)
    }

    async fn find_write(&self, tx_hash: &TxHash) -> Result<Option<LedgerReceipt>, LedgerError> {
        let hash = to_alloy_hash(tx_hash);
        match self.rpc.get_transaction_receipt(hash).await? {
            None => Ok(None),
            Some(receipt) if !receipt.success => Err(LedgerError::Reverted { tx_hash: *tx_hash }),
            Some(receipt) => {
                tracing::info!(%tx_hash, block_number = receipt.block_number, "earlier write was mined");
                self.wait_for_confirmations(hash).await.map(Some)
            }
        }
    }

    async fn read_verification(&self, id: &CertificateId) -> Result<OnChainRecord, LedgerError> {
        let call = CallRequest {
            from: None,
            to: self.contract,
            data: contract::encode_verify(id),
        };
        let data = self.rpc.call(&call).await?;
        contract::decode_verify(&data)
    }

    fn status(&self) -> LedgerHealth {
        LedgerHealth {
            initialized: self.is_ready(),
            has_signer: self.signer.is_some(),
            signer_address: self.signer_address(),
            contract_address: self.config.contract_address,
            rpc_endpoint: self.rpc.endpoint(),
            chain_id: self.writer.get().map(|w| w.chain_id).or(self.config.chain_id),
        }
    }
}
