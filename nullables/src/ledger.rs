//! Nullable ledger: a scriptable [`CertificateLedger`] for testing the
//! issuance layer without a node.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;

use certanchor_ledger::{CertificateLedger, LedgerError, LedgerHealth};
use certanchor_types::{
    CertificateId, LedgerAddress, LedgerReceipt, LedgerWriteRequest, OnChainRecord, Timestamp,
    TxHash,
};

/// One `submit_write` call, as seen by the ledger.
#[derive(Clone, Debug)]
pub struct Submission {
    pub certificate_id: CertificateId,
    /// Tokio time, so paused-clock tests can assert on spacing.
    pub at: Instant,
}

/// In-memory ledger. Writes succeed unless scripted otherwise, and every
/// successful write becomes readable through `read_verification`.
pub struct NullLedger {
    ready: AtomicBool,
    init_succeeds: bool,
    initialize_calls: AtomicUsize,
    submissions: Mutex<Vec<Submission>>,
    /// Failures returned, in order, before a certificate's write succeeds.
    scripted: Mutex<HashMap<CertificateId, VecDeque<LedgerError>>>,
    /// Failures returned on every attempt.
    persistent: Mutex<HashMap<CertificateId, LedgerError>>,
    latency: Duration,
    records: Mutex<HashMap<CertificateId, OnChainRecord>>,
    read_failure: Mutex<Option<LedgerError>>,
    next_block: AtomicU64,
    /// Writes reported as failed that nevertheless made it into a block.
    landed: Mutex<HashMap<TxHash, LedgerReceipt>>,
    lookups: Mutex<Vec<TxHash>>,
}

impl NullLedger {
    /// A ledger that is initialized and accepts writes.
    pub fn new() -> Self {
        let ledger = Self::uninitialized();
        ledger.ready.store(true, Ordering::SeqCst);
        ledger
    }

    /// A ledger whose first `initialize` call succeeds.
    pub fn uninitialized() -> Self {
        Self::build(true)
    }

    /// A ledger that never becomes ready (no signer, unreachable node).
    pub fn unavailable() -> Self {
        Self::build(false)
    }

    fn build(init_succeeds: bool) -> Self {
        Self {
            ready: AtomicBool::new(false),
            init_succeeds,
            initialize_calls: AtomicUsize::new(0),
            submissions: Mutex::new(Vec::new()),
            scripted: Mutex::new(HashMap::new()),
            persistent: Mutex::new(HashMap::new()),
            latency: Duration::ZERO,
            records: Mutex::new(HashMap::new()),
            read_failure: Mutex::new(None),
            next_block: AtomicU64::new(1),
            landed: Mutex::new(HashMap::new()),
            lookups: Mutex::new(Vec::new()),
        }
    }

    /// Delay every write by `latency` before answering.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Fail the next write of `id` with `error`. Queued failures are used in
    /// order; once exhausted, writes succeed.
    pub fn fail_once(&self, id: &CertificateId, error: LedgerError) {
        self.scripted
            .lock()
            .unwrap()
            .entry(id.clone())
            .or_default()
            .push_back(error);
    }

    /// Fail every write of `id` with `error`.
    pub fn fail_always(&self, id: &CertificateId, error: LedgerError) {
        self.persistent.lock().unwrap().insert(id.clone(), error);
    }

    /// Fail every `read_verification` with `error`.
    pub fn fail_reads(&self, error: LedgerError) {
        *self.read_failure.lock().unwrap() = Some(error);
    }

    /// Record an on-chain certificate without going through `submit_write`.
    pub fn put_record(&self, id: &CertificateId, record: OnChainRecord) {
        self.records.lock().unwrap().insert(id.clone(), record);
    }

    /// Mine `tx_hash` at `block_number`, so `find_write` reports it. Use with
    /// a scripted `ConfirmationTimeout` carrying the same hash.
    pub fn land(&self, tx_hash: TxHash, block_number: u64) {
        self.landed.lock().unwrap().insert(
            tx_hash,
            LedgerReceipt {
                tx_hash,
                block_number,
                gas_used: 100_000,
            },
        );
    }

    /// Hashes passed to `find_write`, in call order.
    pub fn lookups(&self) -> Vec<TxHash> {
        self.lookups.lock().unwrap().clone()
    }

    /// Total `submit_write` calls, including failed ones.
    pub fn submit_count(&self) -> usize {
        self.submissions.lock().unwrap().len()
    }

    pub fn initialize_calls(&self) -> usize {
        self.initialize_calls.load(Ordering::SeqCst)
    }

    pub fn submissions(&self) -> Vec<Submission> {
        self.submissions.lock().unwrap().clone()
    }

    /// `submit_write` calls made for `id`.
    pub fn attempts_for(&self, id: &CertificateId) -> usize {
        self.submissions
            .lock()
            .unwrap()
            .iter()
            .filter(|s| &s.certificate_id == id)
            .count()
    }

    fn scripted_failure(&self, id: &CertificateId) -> Option<LedgerError> {
        if let Some(error) = self.persistent.lock().unwrap().get(id) {
            return Some(error.clone());
        }
        self.scripted
            .lock()
            .unwrap()
            .get_mut(id)
            .and_then(VecDeque::pop_front)
    }
}

impl Default for NullLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl CertificateLedger for NullLedger {
    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    async fn initialize(&self) -> bool {
        self.initialize_calls.fetch_add(1, Ordering::SeqCst);
        if self.init_succeeds {
            self.ready.store(true, Ordering::SeqCst);
        }
        self.is_ready()
    }

    async fn submit_write(&self, request: &LedgerWriteRequest) -> Result<LedgerReceipt, LedgerError> {
        if !self.is_ready() {
            return Err(LedgerError::ServiceUnavailable("null ledger not initialized".into()));
        }
        self.submissions.lock().unwrap().push(Submission {
            certificate_id: request.certificate_id.clone(),
            at: Instant::now(),
        });

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if let Some(error) = self.scripted_failure(&request.certificate_id) {
            return Err(error);
        }

        let block_number = self.next_block.fetch_add(1, Ordering::SeqCst);
        let mut hash = [0u8; 32];
        hash[24..].copy_from_slice(&block_number.to_be_bytes());
        let receipt = LedgerReceipt {
            tx_hash: TxHash::new(hash),
            block_number,
            gas_used: 100_000,
        };

        self.records.lock().unwrap().insert(
            request.certificate_id.clone(),
            OnChainRecord {
                exists: true,
                recipient: request.recipient.unwrap_or(LedgerAddress::ZERO),
                content_hash: request.content_hash.clone().unwrap_or_default(),
                timestamp: request.timestamp,
                issuer: LedgerAddress::ZERO,
            },
        );
        Ok(receipt)
    }

    async fn find_write(&self, tx_hash: &TxHash) -> Result<Option<LedgerReceipt>, LedgerError> {
        if !self.is_ready() {
            return Err(LedgerError::ServiceUnavailable("null ledger not initialized".into()));
        }
        self.lookups.lock().unwrap().push(*tx_hash);
        Ok(self.landed.lock().unwrap().get(tx_hash).cloned())
    }

    async fn read_verification(&self, id: &CertificateId) -> Result<OnChainRecord, LedgerError> {
        if let Some(error) = self.read_failure.lock().unwrap().clone() {
            return Err(error);
        }
        Ok(self
            .records
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .unwrap_or(OnChainRecord {
                exists: false,
                recipient: LedgerAddress::ZERO,
                content_hash: String::new(),
                timestamp: Timestamp::EPOCH,
                issuer: LedgerAddress::ZERO,
            }))
    }

    fn status(&self) -> LedgerHealth {
        LedgerHealth {
            initialized: self.is_ready(),
            has_signer: self.init_succeeds,
            signer_address: None,
            contract_address: LedgerAddress::ZERO,
            rpc_endpoint: "null://ledger".to_string(),
            chain_id: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(id: &str) -> LedgerWriteRequest {
        LedgerWriteRequest {
            certificate_id: CertificateId::new(id),
            recipient: None,
            content_hash: Some("QmHash".into()),
            timestamp: Timestamp::new(1_700_000_000),
        }
    }

    #[tokio::test]
    async fn scripted_failure_then_success() {
        let ledger = NullLedger::new();
        let id = CertificateId::new("a");
        ledger.fail_once(&id, LedgerError::Unreachable("down".into()));

        assert!(ledger.submit_write(&request("a")).await.is_err());
        let receipt = ledger.submit_write(&request("a")).await.unwrap();
        assert_eq!(receipt.block_number, 1);
        assert_eq!(ledger.attempts_for(&id), 2);

        let record = ledger.read_verification(&id).await.unwrap();
        assert!(record.exists);
        assert_eq!(record.content_hash, "QmHash");
    }

    #[tokio::test]
    async fn landed_write_is_found() {
        let ledger = NullLedger::new();
        let tx_hash = TxHash::new([7; 32]);
        assert_eq!(ledger.find_write(&tx_hash).await.unwrap(), None);

        ledger.land(tx_hash, 42);
        let receipt = ledger.find_write(&tx_hash).await.unwrap().unwrap();
        assert_eq!(receipt.block_number, 42);
        assert_eq!(ledger.lookups(), vec![tx_hash, tx_hash]);
        assert_eq!(ledger.submit_count(), 0);
    }

    #[tokio::test]
    async fn unavailable_ledger_never_becomes_ready() {
        let ledger = NullLedger::unavailable();
        assert!(!ledger.initialize().await);
        assert!(matches!(
            ledger.submit_write(&request("a")).await,
            Err(LedgerError::ServiceUnavailable(_))
        ));
        assert_eq!(ledger.submit_count(), 0);
    }

    #[tokio::test]
    async fn unknown_certificate_reads_as_absent() {
        let ledger = NullLedger::new();
        let record = ledger.read_verification(&CertificateId::new("nope")).await.unwrap();
        assert!(!record.exists);
    }
}
