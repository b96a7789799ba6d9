//! ABI of the certificate registry contract.

use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::{sol, SolCall};
use certanchor_types::{CertificateId, LedgerWriteRequest, OnChainRecord, Timestamp};

use crate::{from_alloy_address, LedgerError};

sol! {
    interface ICertificateRegistry {
        function issueCertificate(string certificateId, address recipient, string ipfsHash, uint256 timestamp) external;
        function verifyCertificate(string certificateId) external view returns (bool exists, address recipient, string ipfsHash, uint256 timestamp, address issuer);
        function getCertificateCount() external view returns (uint256);
    }
}

/// Calldata for `issueCertificate`, with the recipient already resolved.
pub fn encode_issue(request: &LedgerWriteRequest, recipient: Address) -> Bytes {
    ICertificateRegistry::issueCertificateCall {
        certificateId: request.certificate_id.to_string(),
        recipient,
        ipfsHash: request.content_hash.clone().unwrap_or_default(),
        timestamp: U256::from(request.timestamp.as_secs()),
    }
    .abi_encode()
    .into()
}

/// Calldata for `verifyCertificate`.
pub fn encode_verify(id: &CertificateId) -> Bytes {
    ICertificateRegistry::verifyCertificateCall {
        certificateId: id.to_string(),
    }
    .abi_encode()
    .into()
}

/// Calldata for `getCertificateCount`.
pub fn encode_count() -> Bytes {
    ICertificateRegistry::getCertificateCountCall {}.abi_encode().into()
}

pub fn decode_verify(data: &[u8]) -> Result<OnChainRecord, LedgerError> {
    let ret = ICertificateRegistry::verifyCertificateCall::abi_decode_returns(data)
        .map_err(|e| LedgerError::InvalidResponse(format!("verifyCertificate: {e}")))?;
    Ok(OnChainRecord {
        exists: ret.exists,
        recipient: from_alloy_address(ret.recipient),
        content_hash: ret.ipfsHash,
        timestamp: Timestamp::new(ret.timestamp.saturating_to::<u64>()),
        issuer: from_alloy_address(ret.issuer),
    })
}

pub fn decode_count(data: &[u8]) -> Result<U256, LedgerError> {
    ICertificateRegistry::getCertificateCountCall::abi_decode_returns(data)
        .map_err(|e| LedgerError::InvalidResponse(format!("getCertificateCount: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_sol_types::SolValue;
    use certanchor_types::LedgerAddress;

    #[test]
    fn issue_calldata_starts_with_selector() {
        let request = LedgerWriteRequest {
            certificate_id: CertificateId::new("TECH-2024-00042"),
            recipient: None,
            content_hash: None,
            timestamp: Timestamp::new(1_700_000_000),
        };
        let data = encode_issue(&request, Address::ZERO);
        assert_eq!(&data[..4], &ICertificateRegistry::issueCertificateCall::SELECTOR);
        // selector + 4 head words + two dynamic strings
        assert!(data.len() > 4 + 4 * 32);
    }

    #[test]
    fn decodes_verification_tuple() {
        let recipient = Address::repeat_byte(0x11);
        let issuer = Address::repeat_byte(0x22);
        let encoded = (
            true,
            recipient,
            "bafybeigdyr".to_string(),
            U256::from(1_700_000_000u64),
            issuer,
        )
            .abi_encode_params();
        let record = decode_verify(&encoded).unwrap();
        assert!(record.exists);
        assert_eq!(record.recipient, LedgerAddress::new([0x11; 20]));
        assert_eq!(record.issuer, LedgerAddress::new([0x22; 20]));
        assert_eq!(record.content_hash, "bafybeigdyr");
        assert_eq!(record.timestamp, Timestamp::new(1_700_000_000));
    }

    #[test]
    fn rejects_truncated_return_data() {
        assert!(matches!(
            decode_verify(&[0u8; 10]),
            Err(LedgerError::InvalidResponse(_))
        ));
    }

    #[test]
    fn decodes_count() {
        let encoded = U256::from(7u64).abi_encode();
        assert_eq!(decode_count(&encoded).unwrap(), U256::from(7u64));
    }
}
