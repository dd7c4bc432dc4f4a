// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication errors.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use super::siwe::SiweError;
use crate::storage::StorageError;

/// Authentication error type.
///
/// Covers both halves of authentication: the wallet sign-in handshake
/// (challenge and signature) and bearer session tokens on later requests.
#[derive(Debug)]
pub enum AuthError {
    /// Wallet address is not `0x` + 40 hex characters
    InvalidAddress(String),
    /// Sign-in message could not be parsed or failed validation
    MalformedChallenge(String),
    /// No challenge was ever issued to this wallet
    IdentityNotFound(String),
    /// Nonce in the message is not the wallet's current nonce
    NonceMismatch,
    /// Wallet signature does not recover to the claimed address
    InvalidSignature,
    /// No authorization header present
    MissingAuthHeader,
    /// Invalid authorization header format
    InvalidAuthHeader,
    /// Token is malformed
    MalformedToken,
    /// Token signature is invalid
    InvalidTokenSignature,
    /// Token has expired
    TokenExpired,
    /// Token issuer is invalid
    InvalidIssuer,
    /// Token is not yet valid
    TokenNotYetValid,
    /// Insufficient permissions
    InsufficientPermissions,
    /// Storage failure
    Storage(String),
    /// Internal error
    InternalError(String),
}

#[derive(Serialize)]
struct AuthErrorBody {
    error: String,
    error_code: String,
}

impl AuthError {
    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::InvalidAddress(_) => "invalid_address",
            AuthError::MalformedChallenge(_) => "malformed_challenge",
            AuthError::IdentityNotFound(_) => "identity_not_found",
            AuthError::NonceMismatch => "nonce_mismatch",
            AuthError::InvalidSignature => "invalid_signature",
            AuthError::MissingAuthHeader => "missing_auth_header",
            AuthError::InvalidAuthHeader => "invalid_auth_header",
            AuthError::MalformedToken => "malformed_token",
            AuthError::InvalidTokenSignature => "invalid_token_signature",
            AuthError::TokenExpired => "token_expired",
            AuthError::InvalidIssuer => "invalid_issuer",
            AuthError::TokenNotYetValid => "token_not_yet_valid",
            AuthError::InsufficientPermissions => "insufficient_permissions",
            AuthError::Storage(_) => "storage_error",
            AuthError::InternalError(_) => "internal_error",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::InvalidAddress(_) | AuthError::MalformedChallenge(_) => {
                StatusCode::BAD_REQUEST
            }
            AuthError::IdentityNotFound(_)
            | AuthError::NonceMismatch
            | AuthError::InvalidSignature
            | AuthError::MissingAuthHeader
            | AuthError::InvalidAuthHeader
            | AuthError::MalformedToken
            | AuthError::InvalidTokenSignature
            | AuthError::TokenExpired
            | AuthError::InvalidIssuer
            | AuthError::TokenNotYetValid => StatusCode::UNAUTHORIZED,
            AuthError::InsufficientPermissions => StatusCode::FORBIDDEN,
            AuthError::Storage(_) | AuthError::InternalError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::InvalidAddress(addr) => write!(f, "Invalid wallet address: {addr}"),
            AuthError::MalformedChallenge(reason) => {
                write!(f, "Malformed sign-in message: {reason}")
            }
            AuthError::IdentityNotFound(addr) => {
                write!(f, "No sign-in challenge was issued to {addr}")
            }
            AuthError::NonceMismatch => {
                write!(f, "Nonce does not match the current challenge; request a new nonce")
            }
            AuthError::InvalidSignature => {
                write!(f, "Signature does not match the claimed address")
            }
            AuthError::MissingAuthHeader => write!(f, "Authorization header is required"),
            AuthError::InvalidAuthHeader => {
                write!(f, "Invalid authorization header format (expected 'Bearer <token>')")
            }
            AuthError::MalformedToken => write!(f, "Token is malformed"),
            AuthError::InvalidTokenSignature => write!(f, "Token signature is invalid"),
            AuthError::TokenExpired => write!(f, "Token has expired"),
            AuthError::InvalidIssuer => write!(f, "Token issuer is invalid"),
            AuthError::TokenNotYetValid => write!(f, "Token is not yet valid"),
            AuthError::InsufficientPermissions => {
                write!(f, "Insufficient permissions for this operation")
            }
            // Details stay in the logs
            AuthError::Storage(_) => write!(f, "Storage failure"),
            AuthError::InternalError(_) => write!(f, "Internal authentication error"),
        }
    }
}

impl std::error::Error for AuthError {}

impl From<SiweError> for AuthError {
    fn from(err: SiweError) -> Self {
        AuthError::MalformedChallenge(err.to_string())
    }
}

impl From<StorageError> for AuthError {
    fn from(err: StorageError) -> Self {
        AuthError::Storage(err.to_string())
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        match &self {
            AuthError::Storage(detail) | AuthError::InternalError(detail) => {
                tracing::error!(error = %detail, code = self.error_code(), "Authentication failure");
            }
            _ => {}
        }
        let body = Json(AuthErrorBody {
            error: self.to_string(),
            error_code: self.error_code().to_string(),
        });
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[tokio::test]
    async fn missing_auth_returns_401() {
        let response = AuthError::MissingAuthHeader.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let body_bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap();
        assert_eq!(body["error_code"], "missing_auth_header");
    }

    #[tokio::test]
    async fn insufficient_permissions_returns_403() {
        let response = AuthError::InsufficientPermissions.into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn handshake_errors_map_to_expected_statuses() {
        assert_eq!(
            AuthError::MalformedChallenge("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(AuthError::NonceMismatch.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(AuthError::InvalidSignature.error_code(), "invalid_signature");
    }

    #[tokio::test]
    async fn storage_details_are_not_returned() {
        let response = AuthError::Storage("/data/cover.redb locked".into()).into_response();
        let body_bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = String::from_utf8(body_bytes.to_vec()).unwrap();
        assert!(!body.contains("cover.redb"));
    }
}
