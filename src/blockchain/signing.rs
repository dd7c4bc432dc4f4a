// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Wallet signature recovery (EIP-191 `personal_sign`).

use alloy::primitives::{Address, Signature};

/// Errors decoding or recovering a wallet signature.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SigningError {
    #[error("signature is not valid hex")]
    InvalidHex,

    #[error("signature must be 65 bytes, got {0}")]
    InvalidLength(usize),

    #[error("malformed signature: {0}")]
    Malformed(String),

    #[error("signer recovery failed: {0}")]
    Recovery(String),
}

/// Decode a `0x`-prefixed 65-byte `r || s || v` signature.
pub fn parse_signature(signature_hex: &str) -> Result<Signature, SigningError> {
    let trimmed = signature_hex.trim();
    let hex = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    let bytes = alloy::hex::decode(hex).map_err(|_| SigningError::InvalidHex)?;
    if bytes.len() != 65 {
        return Err(SigningError::InvalidLength(bytes.len()));
    }
    Signature::from_raw(&bytes).map_err(|e| SigningError::Malformed(e.to_string()))
}

/// Recover the address that `personal_sign`ed `message`.
pub fn recover_personal_signer(message: &str, signature_hex: &str) -> Result<Address, SigningError> {
    let signature = parse_signature(signature_hex)?;
    signature
        .recover_address_from_msg(message.as_bytes())
        .map_err(|e| SigningError::Recovery(e.to_string()))
}

#[cfg(test)]
pub(crate) mod test_signers {
    use alloy::primitives::Address;
    use alloy::signers::{local::PrivateKeySigner, SignerSync};

    /// Deterministic signer for index `n` (n > 0).
    pub fn signer(n: u8) -> PrivateKeySigner {
        let mut key = [0u8; 32];
        key[31] = n;
        PrivateKeySigner::from_slice(&key).unwrap()
    }

    pub fn address(n: u8) -> Address {
        signer(n).address()
    }

    /// `personal_sign` a message and hex-encode the 65-byte signature.
    pub fn sign(n: u8, message: &str) -> String {
        let sig = signer(n).sign_message_sync(message.as_bytes()).unwrap();
        format!("0x{}", alloy::hex::encode(sig.as_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::test_signers::*;
    use super::*;

    #[test]
    fn recovers_signer_of_personal_message() {
        let sig = sign(1, "hello");
        assert_eq!(recover_personal_signer("hello", &sig).unwrap(), address(1));
    }

    #[test]
    fn different_message_recovers_different_address() {
        let sig = sign(1, "hello");
        let recovered = recover_personal_signer("hello!", &sig).unwrap();
        assert_ne!(recovered, address(1));
    }

    #[test]
    fn rejects_malformed_signatures() {
        assert_eq!(
            recover_personal_signer("hello", "0xzz").unwrap_err(),
            SigningError::InvalidHex
        );
        assert_eq!(
            recover_personal_signer("hello", "0xdeadbeef").unwrap_err(),
            SigningError::InvalidLength(4)
        );
    }
}
