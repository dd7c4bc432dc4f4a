// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Wallet sign-in endpoints.
//!
//! `nonce` and `verify` are unauthenticated; `me` requires a session token.

use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    auth::{request_nonce, Auth, AuthError, Role},
    state::AppState,
    storage::IdentityRepository,
};

/// Request a sign-in challenge.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct NonceRequest {
    /// Wallet address (`0x` + 40 hex characters, any case)
    #[serde(alias = "walletAddress")]
    pub wallet_address: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct NonceResponse {
    /// Canonical lower-case wallet address
    pub wallet_address: String,
    /// Nonce to embed in the sign-in message
    pub nonce: String,
}

/// Signed sign-in message.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct VerifyRequest {
    /// EIP-4361 message text exactly as signed
    pub message: String,
    /// 65-byte `personal_sign` signature, `0x` hex
    pub signature: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct VerifyResponse {
    /// Bearer session token
    pub token: String,
    pub address: String,
    pub role: Role,
    /// Token expiry (Unix seconds)
    pub expires_at: i64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MeResponse {
    pub address: String,
    pub role: Role,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Issue a single-use sign-in nonce for a wallet.
///
/// Any nonce previously issued to the wallet stops being valid.
#[utoipa::path(
    post,
    path = "/v1/auth/nonce",
    tag = "Auth",
    request_body = NonceRequest,
    responses(
        (status = 200, description = "Nonce issued", body = NonceResponse),
        (status = 400, description = "Invalid wallet address")
    )
)]
pub async fn nonce(
    State(state): State<AppState>,
    Json(request): Json<NonceRequest>,
) -> Result<Json<NonceResponse>, AuthError> {
    let (wallet, nonce) = request_nonce(&state.db, &request.wallet_address)?;
    Ok(Json(NonceResponse {
        wallet_address: wallet.as_canonical(),
        nonce,
    }))
}

/// Verify a signed sign-in message and return a session token.
#[utoipa::path(
    post,
    path = "/v1/auth/verify",
    tag = "Auth",
    request_body = VerifyRequest,
    responses(
        (status = 200, description = "Signed in", body = VerifyResponse),
        (status = 400, description = "Malformed sign-in message"),
        (status = 401, description = "Unknown wallet, stale nonce or bad signature")
    )
)]
pub async fn verify(
    State(state): State<AppState>,
    Json(request): Json<VerifyRequest>,
) -> Result<Json<VerifyResponse>, AuthError> {
    let sign_in = state.sessions.verify_signature(
        &state.db,
        &request.message,
        &request.signature,
        state.options.siwe_domain.as_deref(),
        Utc::now(),
    )?;

    Ok(Json(VerifyResponse {
        token: sign_in.token,
        address: sign_in.wallet.as_canonical(),
        role: sign_in.role,
        expires_at: sign_in.expires_at,
    }))
}

/// The signed-in wallet.
#[utoipa::path(
    get,
    path = "/v1/auth/me",
    tag = "Auth",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Current identity", body = MeResponse),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn me(
    Auth(user): Auth,
    State(state): State<AppState>,
) -> Result<Json<MeResponse>, AuthError> {
    let identity = IdentityRepository::new(&state.db)
        .get(&user.wallet)?
        .ok_or_else(|| AuthError::IdentityNotFound(user.wallet.as_canonical()))?;

    Ok(Json(MeResponse {
        address: identity.address,
        role: user.role,
        last_login_at: identity.last_login_at,
        created_at: identity.created_at,
    }))
}
