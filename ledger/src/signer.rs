//! Transaction signing for certificate writes.

use alloy_consensus::{SignableTransaction, TxEip1559, TxEnvelope};
use alloy_eips::eip2718::Encodable2718;
use alloy_primitives::{Address, B256};
use alloy_signer::SignerSync;
use alloy_signer_local::PrivateKeySigner;
use std::fmt;

use crate::LedgerError;

/// A signed, encoded transaction ready for `eth_sendRawTransaction`.
#[derive(Debug, Clone)]
pub struct SignedWrite {
    pub hash: B256,
    pub raw: Vec<u8>,
}

/// Holds the issuer's private key and signs EIP-1559 transactions.
pub struct LedgerSigner {
    inner: PrivateKeySigner,
}

impl LedgerSigner {
    /// Parse a hex private key, with or without `0x`.
    pub fn from_key(key: &str) -> Result<Self, LedgerError> {
        let inner: PrivateKeySigner = key
            .trim()
            .parse()
            .map_err(|e| LedgerError::Signing(format!("invalid signing key: {e}")))?;
        Ok(Self { inner })
    }

    pub fn address(&self) -> Address {
        self.inner.address()
    }

    pub fn sign_eip1559(&self, tx: TxEip1559) -> Result<SignedWrite, LedgerError> {
        let signature = self
            .inner
            .sign_hash_sync(&tx.signature_hash())
            .map_err(|e| LedgerError::Signing(e.to_string()))?;
        let signed = tx.into_signed(signature);
        let hash = *signed.hash();
        let raw = TxEnvelope::from(signed).encoded_2718();
        Ok(SignedWrite { hash, raw })
    }
}

impl fmt::Debug for LedgerSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LedgerSigner")
            .field("address", &self.address())
            .finish()
    }
}
