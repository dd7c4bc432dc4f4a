// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Sign-in challenges: one single-use nonce per wallet.

use crate::audit_log;
use crate::models::WalletAddress;
use crate::storage::{AuditEvent, AuditEventType, CoverDatabase, IdentityRepository};

use super::AuthError;

/// Generate a fresh random nonce.
///
/// UUIDv4 in simple form: 32 alphanumeric characters, which satisfies the
/// EIP-4361 nonce grammar.
pub fn generate_nonce() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Issue a new nonce for `raw_address`, invalidating any previous one.
pub fn request_nonce(db: &CoverDatabase, raw_address: &str) -> Result<(WalletAddress, String), AuthError> {
    let wallet = WalletAddress::parse(raw_address)
        .map_err(|_| AuthError::InvalidAddress(raw_address.to_string()))?;

    let nonce = generate_nonce();
    IdentityRepository::new(db).issue_nonce(&wallet, &nonce)?;

    tracing::debug!(wallet = %wallet, "Issued sign-in nonce");
    audit_log!(
        db,
        AuditEvent::new(AuditEventType::NonceIssued)
            .with_actor(wallet.as_canonical())
            .with_resource("identity", wallet.as_canonical())
    );

    Ok((wallet, nonce))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::temp_db;

    #[test]
    fn nonces_are_alphanumeric_and_unique() {
        let a = generate_nonce();
        let b = generate_nonce();
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(a, b);
    }

    #[test]
    fn request_nonce_normalizes_and_rotates() {
        let (db, _dir) = temp_db();
        let raw = "0xABC0000000000000000000000000000000000001";

        let (wallet, first) = request_nonce(&db, raw).unwrap();
        let (_, second) = request_nonce(&db, raw).unwrap();

        assert_eq!(wallet.as_canonical(), raw.to_ascii_lowercase());
        assert_ne!(first, second);
        let stored = IdentityRepository::new(&db).get(&wallet).unwrap().unwrap();
        assert_eq!(stored.nonce, second);
    }

    #[test]
    fn request_nonce_rejects_bad_address() {
        let (db, _dir) = temp_db();
        assert!(matches!(
            request_nonce(&db, "not-an-address"),
            Err(AuthError::InvalidAddress(_))
        ));
    }
}
