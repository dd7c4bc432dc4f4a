// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Contract Binding
//!
//! Turns a contract payload into a digest and binds the policy holder's
//! proofs to it:
//!
//! 1. The payload is canonicalized and hashed ([`canonical`]).
//! 2. A client-supplied hash, if any, must equal the server's.
//! 3. The wallet signature is an EIP-191 `personal_sign` over the
//!    `0x`-prefixed hex digest and must recover to the policy wallet.
//! 4. An optional handwritten-signature image is stored through an
//!    [`ArtifactStore`] and its content hash recorded.
//!
//! The wallet signature and the handwritten image are independent proofs;
//! the image is only stored once the wallet signature checks out.

pub mod artifacts;
pub mod canonical;

use base64ct::{Base64, Encoding};
use serde::Deserialize;
use serde_json::{json, Value};
use utoipa::ToSchema;

pub use artifacts::{ArtifactError, ArtifactStore, FsArtifactStore, StoredArtifact};
pub use canonical::{canonical_json, contract_hash};

use crate::blockchain::{recover_personal_signer, SigningError};
use crate::models::WalletAddress;

/// Handwritten signature image as uploaded by the client.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct HandwrittenSignature {
    /// `image/png`, `image/jpeg` or `image/webp`
    pub content_type: String,
    /// Standard base64 image bytes
    pub data_base64: String,
}

/// Proofs bound to a contract digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedContract {
    pub contract_hash: String,
    pub wallet_signature: String,
    pub handwritten: Option<StoredArtifact>,
}

#[derive(Debug, thiserror::Error)]
pub enum ContractError {
    #[error("contract payload must be a JSON object")]
    InvalidPayload,

    #[error("contract payload could not be serialized: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("contract hash {actual} does not match canonical hash {expected}")]
    ContractHashMismatch { expected: String, actual: String },

    #[error("invalid wallet signature: {0}")]
    InvalidSignatureFormat(#[from] SigningError),

    #[error("contract signed by {actual}, expected {expected}")]
    SignatureAddressMismatch { expected: String, actual: String },

    #[error("handwritten signature is not valid base64")]
    InvalidHandwrittenEncoding,

    #[error("handwritten signature rejected: {0}")]
    Artifact(#[from] ArtifactError),
}

impl ContractError {
    pub fn error_code(&self) -> &'static str {
        match self {
            ContractError::InvalidPayload => "invalid_contract_payload",
            ContractError::Serialization(_) => "invalid_contract_payload",
            ContractError::ContractHashMismatch { .. } => "contract_hash_mismatch",
            ContractError::InvalidSignatureFormat(_) => "invalid_signature_format",
            ContractError::SignatureAddressMismatch { .. } => "signature_address_mismatch",
            ContractError::InvalidHandwrittenEncoding => "invalid_handwritten_signature",
            ContractError::Artifact(e) if e.is_client_error() => "invalid_handwritten_signature",
            ContractError::Artifact(_) => "artifact_store_error",
        }
    }

    pub fn details(&self) -> Option<Value> {
        match self {
            ContractError::ContractHashMismatch { expected, actual }
            | ContractError::SignatureAddressMismatch { expected, actual } => {
                Some(json!({ "expected": expected, "actual": actual }))
            }
            _ => None,
        }
    }
}

/// Verify the wallet signature over `payload` and store the optional image.
pub async fn bind_contract(
    payload: &Value,
    claimed_hash: Option<&str>,
    wallet_signature: &str,
    wallet: &WalletAddress,
    handwritten: Option<&HandwrittenSignature>,
    artifacts: &dyn ArtifactStore,
) -> Result<SignedContract, ContractError> {
    if !payload.is_object() {
        return Err(ContractError::InvalidPayload);
    }

    let digest = contract_hash(payload)?;

    if let Some(claimed) = claimed_hash {
        if !claimed.trim().eq_ignore_ascii_case(&digest) {
            return Err(ContractError::ContractHashMismatch {
                expected: digest,
                actual: claimed.trim().to_string(),
            });
        }
    }

    let signer = WalletAddress::from(recover_personal_signer(&digest, wallet_signature)?);
    if signer != *wallet {
        return Err(ContractError::SignatureAddressMismatch {
            expected: wallet.as_canonical(),
            actual: signer.as_canonical(),
        });
    }

    let handwritten = match handwritten {
        Some(image) => {
            let bytes = Base64::decode_vec(image.data_base64.trim())
                .map_err(|_| ContractError::InvalidHandwrittenEncoding)?;
            Some(artifacts.save(&bytes, &image.content_type).await?)
        }
        None => None,
    };

    Ok(SignedContract {
        contract_hash: digest,
        wallet_signature: wallet_signature.trim().to_string(),
        handwritten,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::signing::test_signers::{address, sign};
    use crate::contract::artifacts::TINY_PNG;

    fn payload() -> Value {
        json!({ "policy": "p-1", "terms": { "premium": "100", "days": 90 } })
    }

    fn store(dir: &tempfile::TempDir) -> FsArtifactStore {
        FsArtifactStore::new(dir.path(), "/artifacts")
    }

    #[tokio::test]
    async fn binds_signature_of_policy_wallet() {
        let dir = tempfile::tempdir().unwrap();
        let wallet = WalletAddress::from(address(1));
        let digest = contract_hash(&payload()).unwrap();
        let signature = sign(1, &digest);

        let signed = bind_contract(&payload(), Some(&digest), &signature, &wallet, None, &store(&dir))
            .await
            .unwrap();
        assert_eq!(signed.contract_hash, digest);
        assert!(signed.handwritten.is_none());
    }

    #[tokio::test]
    async fn signature_from_other_wallet_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let wallet = WalletAddress::from(address(1));
        let digest = contract_hash(&payload()).unwrap();
        let signature = sign(2, &digest);

        let err = bind_contract(&payload(), None, &signature, &wallet, None, &store(&dir))
            .await
            .unwrap_err();
        match err {
            ContractError::SignatureAddressMismatch { expected, actual } => {
                assert_eq!(expected, wallet.as_canonical());
                assert_eq!(actual, WalletAddress::from(address(2)).as_canonical());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn client_hash_must_match() {
        let dir = tempfile::tempdir().unwrap();
        let wallet = WalletAddress::from(address(1));
        let wrong = format!("0x{}", "00".repeat(32));
        let err = bind_contract(&payload(), Some(&wrong), &sign(1, &wrong), &wallet, None, &store(&dir))
            .await
            .unwrap_err();
        assert!(matches!(err, ContractError::ContractHashMismatch { .. }));
    }

    #[tokio::test]
    async fn stores_handwritten_image_after_signature_check() {
        let dir = tempfile::tempdir().unwrap();
        let wallet = WalletAddress::from(address(1));
        let digest = contract_hash(&payload()).unwrap();
        let image = HandwrittenSignature {
            content_type: "image/png".into(),
            data_base64: Base64::encode_string(TINY_PNG),
        };

        // Bad wallet signature: nothing stored.
        let err = bind_contract(&payload(), None, &sign(2, &digest), &wallet, Some(&image), &store(&dir))
            .await
            .unwrap_err();
        assert!(matches!(err, ContractError::SignatureAddressMismatch { .. }));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);

        let signed = bind_contract(&payload(), None, &sign(1, &digest), &wallet, Some(&image), &store(&dir))
            .await
            .unwrap();
        let artifact = signed.handwritten.unwrap();
        assert!(artifact.url.ends_with(".png"));
        assert_eq!(artifact.content_hash.len(), 64);
    }

    #[tokio::test]
    async fn non_object_payload_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let wallet = WalletAddress::from(address(1));
        let err = bind_contract(&json!([1, 2]), None, "0x", &wallet, None, &store(&dir))
            .await
            .unwrap_err();
        assert!(matches!(err, ContractError::InvalidPayload));
    }
}
