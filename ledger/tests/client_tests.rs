//! Ledger client behavior against an in-memory node.

use alloy_consensus::{Transaction, TxEnvelope};
use alloy_eips::eip2718::Decodable2718;
use alloy_primitives::{Address, U256};
use alloy_sol_types::SolValue;

use certanchor_ledger::{
    contract, CertificateLedger, CredentialMode, LedgerClient, LedgerConfig, LedgerError,
    RpcError, SigningKey,
};
use certanchor_nullables::NullLedgerRpc;
use certanchor_types::{CertificateId, LedgerWriteRequest, Timestamp};

// Well-known development key (anvil account #0).
const DEV_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

fn signing_config() -> LedgerConfig {
    LedgerConfig::default().with_signer_key(SigningKey::new(DEV_KEY))
}

fn request(id: &str) -> LedgerWriteRequest {
    LedgerWriteRequest {
        certificate_id: CertificateId::new(id),
        recipient: None,
        content_hash: Some("bafybeigdyr".into()),
        timestamp: Timestamp::new(1_700_000_000),
    }
}

fn decode(raw: &[u8]) -> TxEnvelope {
    TxEnvelope::decode_2718(&mut &raw[..]).unwrap()
}

async fn ready_client(rpc: NullLedgerRpc) -> LedgerClient<NullLedgerRpc> {
    let client = LedgerClient::new(signing_config(), rpc).unwrap();
    assert!(client.initialize().await);
    client
}

#[tokio::test(start_paused = true)]
async fn degraded_mode_serves_reads_without_signer() {
    let rpc = NullLedgerRpc::new();
    let id = CertificateId::new("TECH-2024-00001");
    let selector: [u8; 4] = contract::encode_verify(&id)[..4].try_into().unwrap();
    rpc.respond_to_call(
        selector,
        (
            true,
            Address::repeat_byte(0x11),
            "bafybeigdyr".to_string(),
            U256::from(1_700_000_000u64),
            Address::repeat_byte(0x22),
        )
            .abi_encode_params(),
    );

    let client = LedgerClient::new(LedgerConfig::default(), rpc).unwrap();
    assert!(!client.initialize().await);
    assert!(!client.is_ready());

    let record = client.read_verification(&id).await.unwrap();
    assert!(record.exists);
    assert_eq!(record.content_hash, "bafybeigdyr");

    assert!(matches!(
        client.submit_write(&request("TECH-2024-00001")).await,
        Err(LedgerError::ServiceUnavailable(_))
    ));
    let health = client.status();
    assert!(!health.has_signer);
    assert!(!health.initialized);
}

#[tokio::test]
async fn strict_mode_requires_credential() {
    let config = LedgerConfig {
        credential_mode: CredentialMode::Strict,
        ..Default::default()
    };
    assert!(matches!(
        LedgerClient::new(config, NullLedgerRpc::new()),
        Err(LedgerError::MissingCredential)
    ));
}

#[tokio::test]
async fn malformed_key_is_fatal_only_in_strict_mode() {
    let strict = LedgerConfig {
        credential_mode: CredentialMode::Strict,
        ..Default::default()
    }
    .with_signer_key(SigningKey::new("0x1234"));
    assert!(matches!(
        LedgerClient::new(strict, NullLedgerRpc::new()),
        Err(LedgerError::Signing(_))
    ));

    let degraded = LedgerConfig::default().with_signer_key(SigningKey::new("0x1234"));
    let client = LedgerClient::new(degraded, NullLedgerRpc::new()).unwrap();
    assert!(client.signer_address().is_none());
}

#[tokio::test(start_paused = true)]
async fn write_is_confirmed_with_gas_margin() {
    let client = ready_client(NullLedgerRpc::new()).await;

    let receipt = client.submit_write(&request("TECH-2024-00002")).await.unwrap();
    assert_eq!(receipt.block_number, 101);

    let sent = client.rpc().sent_transactions();
    assert_eq!(sent.len(), 1);
    let tx = decode(&sent[0]);
    assert_eq!(tx.gas_limit(), 120_000);
    assert_eq!(tx.chain_id(), Some(420_420_422));
    assert_eq!(tx.nonce(), 0);
    assert_eq!(receipt.tx_hash.as_bytes(), tx.tx_hash().as_slice());

    let health = client.status();
    assert!(health.initialized);
    assert!(health.has_signer);
    assert_eq!(health.chain_id, Some(420_420_422));
}

#[tokio::test(start_paused = true)]
async fn serialized_writes_use_consecutive_nonces() {
    let client = ready_client(NullLedgerRpc::new()).await;

    let (req_a, req_b, req_c) = (request("a"), request("b"), request("c"));
    let (a, b, c) = tokio::join!(
        client.submit_write(&req_a),
        client.submit_write(&req_b),
        client.submit_write(&req_c),
    );
    assert!(a.is_ok() && b.is_ok() && c.is_ok());

    let mut nonces: Vec<u64> = client
        .rpc()
        .sent_transactions()
        .iter()
        .map(|raw| decode(raw).nonce())
        .collect();
    nonces.sort_unstable();
    assert_eq!(nonces, vec![0, 1, 2]);
}

#[tokio::test(start_paused = true)]
async fn balance_check_uses_padded_gas_limit() {
    let rpc = NullLedgerRpc::new();
    let client = ready_client(rpc).await;

    // 120_000 gas at 30 gwei
    let needed = U256::from(120_000u64) * U256::from(30_000_000_000u64);
    client.rpc().set_balance(needed - U256::from(1u64));
    let err = client.submit_write(&request("poor")).await.unwrap_err();
    assert!(matches!(err, LedgerError::InsufficientFunds { code: None, .. }));
    assert!(err.is_retryable());
    assert!(client.rpc().sent_transactions().is_empty());

    client.rpc().set_balance(needed);
    assert!(client.submit_write(&request("poor")).await.is_ok());
}

#[tokio::test(start_paused = true)]
async fn node_rejection_is_classified() {
    let client = ready_client(NullLedgerRpc::new()).await;
    client.rpc().fail_send(RpcError::Server {
        code: -32000,
        message: "nonce too low".into(),
    });

    let err = client.submit_write(&request("n")).await.unwrap_err();
    assert!(matches!(err, LedgerError::NonceConflict { code: -32000, .. }));
    assert_eq!(err.rpc_code(), Some(-32000));
    assert!(err.is_retryable());
}

#[tokio::test(start_paused = true)]
async fn reverted_write_is_terminal() {
    let client = ready_client(NullLedgerRpc::new()).await;
    client.rpc().set_revert(true);

    let err = client.submit_write(&request("r")).await.unwrap_err();
    assert!(matches!(err, LedgerError::Reverted { .. }));
    assert!(!err.is_retryable());
}

#[tokio::test(start_paused = true)]
async fn unmined_write_times_out() {
    let client = ready_client(NullLedgerRpc::new()).await;
    client.rpc().set_mining(false);

    let started = tokio::time::Instant::now();
    let err = client.submit_write(&request("slow")).await.unwrap_err();
    match err {
        LedgerError::ConfirmationTimeout { waited_secs, .. } => assert_eq!(waited_secs, 180),
        other => panic!("expected timeout, got {other:?}"),
    }
    assert!(started.elapsed() >= std::time::Duration::from_secs(180));
}

#[tokio::test(start_paused = true)]
async fn timed_out_write_is_found_once_mined() {
    let client = ready_client(NullLedgerRpc::new()).await;
    client.rpc().set_mining(false);

    let tx_hash = match client.submit_write(&request("late")).await.unwrap_err() {
        LedgerError::ConfirmationTimeout { tx_hash, .. } => tx_hash,
        other => panic!("expected timeout, got {other:?}"),
    };
    assert_eq!(client.find_write(&tx_hash).await.unwrap(), None);

    client.rpc().set_mining(true);
    let receipt = client.find_write(&tx_hash).await.unwrap().unwrap();
    assert_eq!(receipt.tx_hash, tx_hash);
    assert_eq!(client.rpc().sent_transactions().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn timed_out_write_that_reverted_is_terminal() {
    let client = ready_client(NullLedgerRpc::new()).await;
    client.rpc().set_mining(false);
    let tx_hash = match client.submit_write(&request("late")).await.unwrap_err() {
        LedgerError::ConfirmationTimeout { tx_hash, .. } => tx_hash,
        other => panic!("expected timeout, got {other:?}"),
    };

    client.rpc().set_revert(true);
    client.rpc().set_mining(true);
    let err = client.find_write(&tx_hash).await.unwrap_err();
    assert!(matches!(err, LedgerError::Reverted { tx_hash: h } if h == tx_hash));
    assert!(!err.is_retryable());
}

#[tokio::test(start_paused = true)]
async fn concurrent_initialize_probes_once() {
    let client = LedgerClient::new(signing_config(), NullLedgerRpc::new()).unwrap();

    let (a, b) = tokio::join!(client.initialize(), client.initialize());
    assert!(a && b);
    assert!(client.initialize().await);
    assert_eq!(client.rpc().chain_id_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn wrong_chain_stays_read_only() {
    let rpc = NullLedgerRpc::new().with_chain_id(1);
    let client = LedgerClient::new(signing_config(), rpc).unwrap();
    assert!(!client.initialize().await);
    assert!(matches!(
        client.submit_write(&request("x")).await,
        Err(LedgerError::ServiceUnavailable(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn missing_contract_stays_read_only() {
    let rpc = NullLedgerRpc::new().without_contract();
    let client = LedgerClient::new(signing_config(), rpc).unwrap();
    assert!(!client.initialize().await);
    assert!(!client.is_ready());
}

#[tokio::test(start_paused = true)]
async fn failed_initialize_can_be_retried() {
    let rpc = NullLedgerRpc::new();
    rpc.set_unreachable(true);
    let client = LedgerClient::new(signing_config(), rpc).unwrap();
    assert!(!client.initialize().await);

    client.rpc().set_unreachable(false);
    assert!(client.initialize().await);
}

#[tokio::test(start_paused = true)]
async fn unreachable_node_is_retryable() {
    let client = ready_client(NullLedgerRpc::new()).await;
    client.rpc().set_unreachable(true);

    let err = client.submit_write(&request("u")).await.unwrap_err();
    assert!(matches!(err, LedgerError::Unreachable(_)));
    assert!(err.is_retryable());
}
