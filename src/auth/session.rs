// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Session tokens and signature-based sign-in.
//!
//! ## Sign-in
//!
//! 1. Parse and validate the EIP-4361 message
//! 2. Look up the identity for the claimed address
//! 3. Compare the embedded nonce with the stored one (exact match)
//! 4. Recover the signer and compare with the claimed address
//! 5. Rotate the nonce with a compare-and-swap, so a challenge is redeemed once
//! 6. Mint an HS256 session token
//!
//! Session tokens are verified locally with the same secret; there is no
//! server-side session table.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};

use super::challenge::generate_nonce;
use super::claims::{AuthenticatedUser, SessionClaims};
use super::siwe::SiweMessage;
use super::{AuthError, Role};
use crate::audit_log;
use crate::blockchain::recover_personal_signer;
use crate::models::WalletAddress;
use crate::storage::{AuditEvent, AuditEventType, CoverDatabase, IdentityRepository, NonceConsumption};

/// Issuer claim for every session token.
pub const SESSION_ISSUER: &str = "relational-cover";

/// Clock skew tolerance (60 seconds).
const CLOCK_SKEW_LEEWAY: u64 = 60;

/// Result of a successful sign-in.
#[derive(Debug, Clone)]
pub struct SignIn {
    pub token: String,
    pub wallet: WalletAddress,
    pub role: Role,
    pub expires_at: i64,
}

/// Mints and verifies session tokens.
pub struct SessionIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl_secs: i64,
    admin_wallets: HashSet<WalletAddress>,
}

impl SessionIssuer {
    /// The secret length is checked when configuration loads.
    pub fn new(secret: &[u8], ttl_secs: i64, admin_wallets: HashSet<WalletAddress>) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            ttl_secs,
            admin_wallets,
        }
    }

    pub fn role_for(&self, wallet: &WalletAddress) -> Role {
        if self.admin_wallets.contains(wallet) {
            Role::Admin
        } else {
            Role::Client
        }
    }

    /// Mint a token for `wallet`, issued at `now`.
    pub fn issue(&self, wallet: &WalletAddress, now: DateTime<Utc>) -> Result<SignIn, AuthError> {
        let role = self.role_for(wallet);
        let iat = now.timestamp();
        let claims = SessionClaims {
            sub: wallet.as_canonical(),
            role,
            iat,
            exp: iat + self.ttl_secs,
            iss: SESSION_ISSUER.to_string(),
            sid: format!("sess_{}", uuid::Uuid::new_v4().simple()),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AuthError::InternalError(format!("token signing failed: {e}")))?;

        Ok(SignIn {
            token,
            wallet: *wallet,
            role,
            expires_at: claims.exp,
        })
    }

    /// Verify a bearer token and extract the user.
    pub fn verify(&self, token: &str) -> Result<AuthenticatedUser, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = CLOCK_SKEW_LEEWAY;
        validation.set_issuer(&[SESSION_ISSUER]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);

        let token_data = decode::<SessionClaims>(token, &self.decoding_key, &validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                ErrorKind::InvalidSignature => AuthError::InvalidTokenSignature,
                ErrorKind::InvalidIssuer => AuthError::InvalidIssuer,
                ErrorKind::ImmatureSignature => AuthError::TokenNotYetValid,
                _ => AuthError::MalformedToken,
            }
        })?;

        AuthenticatedUser::from_claims(token_data.claims)
    }

    /// Verify a signed sign-in message and mint a session token.
    pub fn verify_signature(
        &self,
        db: &CoverDatabase,
        message: &str,
        signature: &str,
        expected_domain: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<SignIn, AuthError> {
        let result = self.sign_in(db, message, signature, expected_domain, now);

        match &result {
            Ok(sign_in) => {
                tracing::info!(wallet = %sign_in.wallet, role = %sign_in.role, "Wallet signed in");
                audit_log!(
                    db,
                    AuditEvent::new(AuditEventType::LoginSucceeded)
                        .with_actor(sign_in.wallet.as_canonical())
                        .with_resource("identity", sign_in.wallet.as_canonical())
                );
            }
            Err(err) => {
                tracing::warn!(error = %err, code = err.error_code(), "Sign-in rejected");
                let mut event = AuditEvent::new(AuditEventType::LoginFailed).failed(err.error_code());
                if let Ok(parsed) = SiweMessage::parse(message) {
                    event = event
                        .with_actor(parsed.address.as_canonical())
                        .with_resource("identity", parsed.address.as_canonical());
                }
                audit_log!(db, event);
            }
        }

        result
    }

    fn sign_in(
        &self,
        db: &CoverDatabase,
        message: &str,
        signature: &str,
        expected_domain: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<SignIn, AuthError> {
        let parsed = SiweMessage::parse(message)?;
        parsed.validate(now, expected_domain)?;
        let wallet = parsed.address;

        let identities = IdentityRepository::new(db);
        let identity = identities
            .get(&wallet)?
            .ok_or_else(|| AuthError::IdentityNotFound(wallet.as_canonical()))?;

        if identity.nonce != parsed.nonce {
            return Err(AuthError::NonceMismatch);
        }

        let signer = recover_personal_signer(message, signature).map_err(|e| {
            tracing::debug!(error = %e, "Signature could not be decoded");
            AuthError::InvalidSignature
        })?;
        if signer != wallet.address() {
            return Err(AuthError::InvalidSignature);
        }

        // A concurrent verification or a new nonce request may have rotated
        // the nonce since the read above.
        match identities.consume_nonce(&wallet, &parsed.nonce, &generate_nonce(), now)? {
            NonceConsumption::Consumed(_) => {}
            NonceConsumption::Stale => return Err(AuthError::NonceMismatch),
            NonceConsumption::Missing => return Err(AuthError::IdentityNotFound(wallet.as_canonical())),
        }

        self.issue(&wallet, now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::challenge::request_nonce;
    use crate::auth::siwe::sample_message;
    use crate::blockchain::signing::test_signers;
    use crate::testing::temp_db;
    use std::sync::Arc;

    const SECRET: &[u8] = b"0123456789abcdef0123456789abcdef";
    const DOMAIN: &str = "cover.test";

    fn issuer_with_admin(admin: Option<u8>) -> SessionIssuer {
        let admins = admin
            .map(|n| WalletAddress::from(test_signers::address(n)))
            .into_iter()
            .collect();
        SessionIssuer::new(SECRET, 3600, admins)
    }

    fn signed_challenge(db: &CoverDatabase, signer: u8) -> (String, String) {
        let addr = format!("{}", test_signers::address(signer));
        let (_, nonce) = request_nonce(db, &addr).unwrap();
        let message = sample_message(DOMAIN, &addr, &nonce);
        let signature = test_signers::sign(signer, &message);
        (message, signature)
    }

    #[test]
    fn issued_token_round_trips() {
        let issuer = issuer_with_admin(None);
        let wallet = WalletAddress::from(test_signers::address(1));
        let sign_in = issuer.issue(&wallet, Utc::now()).unwrap();

        let user = issuer.verify(&sign_in.token).unwrap();
        assert_eq!(user.wallet, wallet);
        assert_eq!(user.role, Role::Client);
        assert!(user.session_id.starts_with("sess_"));
    }

    #[test]
    fn verify_rejects_foreign_and_expired_tokens() {
        let issuer = issuer_with_admin(None);
        let other = SessionIssuer::new(b"ffffffffffffffffffffffffffffffff", 3600, HashSet::new());
        let wallet = WalletAddress::from(test_signers::address(1));

        let foreign = other.issue(&wallet, Utc::now()).unwrap();
        assert!(matches!(
            issuer.verify(&foreign.token),
            Err(AuthError::InvalidTokenSignature)
        ));

        let stale = issuer
            .issue(&wallet, Utc::now() - chrono::Duration::hours(3))
            .unwrap();
        assert!(matches!(issuer.verify(&stale.token), Err(AuthError::TokenExpired)));

        assert!(matches!(issuer.verify("garbage"), Err(AuthError::MalformedToken)));
    }

    #[test]
    fn admin_wallets_get_admin_role() {
        let issuer = issuer_with_admin(Some(2));
        let admin = WalletAddress::from(test_signers::address(2));
        let sign_in = issuer.issue(&admin, Utc::now()).unwrap();
        assert_eq!(sign_in.role, Role::Admin);
        assert!(issuer.verify(&sign_in.token).unwrap().is_admin());
    }

    #[test]
    fn valid_signature_signs_in_and_rotates_nonce() {
        let (db, _dir) = temp_db();
        let issuer = issuer_with_admin(None);
        let (message, signature) = signed_challenge(&db, 1);

        let sign_in = issuer
            .verify_signature(&db, &message, &signature, Some(DOMAIN), Utc::now())
            .unwrap();
        assert_eq!(sign_in.wallet.address(), test_signers::address(1));

        let identity = IdentityRepository::new(&db).get(&sign_in.wallet).unwrap().unwrap();
        assert!(identity.last_login_at.is_some());

        // Replaying the same challenge fails.
        assert!(matches!(
            issuer.verify_signature(&db, &message, &signature, Some(DOMAIN), Utc::now()),
            Err(AuthError::NonceMismatch)
        ));
    }

    #[test]
    fn new_nonce_invalidates_previous_challenge() {
        let (db, _dir) = temp_db();
        let issuer = issuer_with_admin(None);
        let (message, signature) = signed_challenge(&db, 1);

        request_nonce(&db, &format!("{}", test_signers::address(1))).unwrap();

        assert!(matches!(
            issuer.verify_signature(&db, &message, &signature, None, Utc::now()),
            Err(AuthError::NonceMismatch)
        ));
    }

    #[test]
    fn signature_from_another_key_is_rejected() {
        let (db, _dir) = temp_db();
        let issuer = issuer_with_admin(None);
        let (message, _) = signed_challenge(&db, 1);
        let forged = test_signers::sign(2, &message);

        assert!(matches!(
            issuer.verify_signature(&db, &message, &forged, None, Utc::now()),
            Err(AuthError::InvalidSignature)
        ));
        assert!(matches!(
            issuer.verify_signature(&db, &message, "0x1234", None, Utc::now()),
            Err(AuthError::InvalidSignature)
        ));
    }

    #[test]
    fn unknown_wallet_and_bad_message_are_rejected() {
        let (db, _dir) = temp_db();
        let issuer = issuer_with_admin(None);
        let addr = format!("{}", test_signers::address(3));
        let message = sample_message(DOMAIN, &addr, "abcdEFGH1234");
        let signature = test_signers::sign(3, &message);

        assert!(matches!(
            issuer.verify_signature(&db, &message, &signature, None, Utc::now()),
            Err(AuthError::IdentityNotFound(_))
        ));
        assert!(matches!(
            issuer.verify_signature(&db, "hello", &signature, None, Utc::now()),
            Err(AuthError::MalformedChallenge(_))
        ));
        assert!(matches!(
            issuer.verify_signature(&db, &message, &signature, Some("other.test"), Utc::now()),
            Err(AuthError::MalformedChallenge(_))
        ));
    }

    #[tokio::test]
    async fn racing_verifications_redeem_challenge_once() {
        let (db, _dir) = temp_db();
        let db = Arc::new(db);
        let issuer = Arc::new(issuer_with_admin(None));
        let (message, signature) = signed_challenge(&db, 1);

        let attempt = || {
            let (db, issuer) = (db.clone(), issuer.clone());
            let (message, signature) = (message.clone(), signature.clone());
            tokio::task::spawn_blocking(move || {
                issuer.verify_signature(&db, &message, &signature, None, Utc::now())
            })
        };

        let (a, b) = tokio::join!(attempt(), attempt());
        let results = [a.unwrap(), b.unwrap()];

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results
            .iter()
            .any(|r| matches!(r, Err(AuthError::NonceMismatch))));
    }
}
