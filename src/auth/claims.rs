// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Session token claims and authenticated user representation.

use serde::{Deserialize, Serialize};

use super::roles::Role;
use super::AuthError;
use crate::models::WalletAddress;

/// Claims carried by a session token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionClaims {
    /// Subject: lower-case wallet address
    pub sub: String,
    /// Role granted at sign-in
    pub role: Role,
    /// Issued at (Unix seconds)
    pub iat: i64,
    /// Expiration (Unix seconds)
    pub exp: i64,
    /// Issuer
    pub iss: String,
    /// Session ID
    pub sid: String,
}

/// Authenticated user information extracted from a session token.
///
/// This is the primary type used throughout the application to represent
/// the wallet making a request.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    /// Wallet proven at sign-in
    pub wallet: WalletAddress,
    /// User's role
    pub role: Role,
    /// Session ID
    pub session_id: String,
    /// Token expiration (Unix timestamp)
    pub expires_at: i64,
}

impl AuthenticatedUser {
    /// Create from verified session claims.
    pub fn from_claims(claims: SessionClaims) -> Result<Self, AuthError> {
        let wallet = WalletAddress::parse(&claims.sub).map_err(|_| AuthError::MalformedToken)?;
        Ok(Self {
            wallet,
            role: claims.role,
            session_id: claims.sid,
            expires_at: claims.exp,
        })
    }

    /// Check if the user has the required role.
    pub fn has_role(&self, required: Role) -> bool {
        self.role.has_privilege(required)
    }

    /// Check if this user is an admin.
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_claims() -> SessionClaims {
        SessionClaims {
            sub: "0xabc0000000000000000000000000000000000001".to_string(),
            role: Role::Admin,
            iat: 1700000000,
            exp: 1700003600,
            iss: "relational-cover".to_string(),
            sid: "sess_abc".to_string(),
        }
    }

    #[test]
    fn from_claims_extracts_wallet_and_role() {
        let user = AuthenticatedUser::from_claims(sample_claims()).unwrap();
        assert_eq!(user.wallet.as_canonical(), sample_claims().sub);
        assert_eq!(user.role, Role::Admin);
        assert!(user.is_admin());
        assert!(user.has_role(Role::Client));
    }

    #[test]
    fn from_claims_rejects_non_address_subject() {
        let mut claims = sample_claims();
        claims.sub = "user_123".to_string();
        assert!(matches!(
            AuthenticatedUser::from_claims(claims),
            Err(AuthError::MalformedToken)
        ));
    }
}
