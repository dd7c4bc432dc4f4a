// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Policy holder endpoints.
//!
//! Creation, reads and contract signing require a session and only ever
//! touch the caller's own policies. Payment confirmation is open: the
//! on-chain transfer itself is the proof.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use crate::{
    auth::Auth,
    contract::HandwrittenSignature,
    error::ApiError,
    policy::{ContractSubmission, PolicyManager},
    settlement::{PaymentConfirmation, PaymentConfirmer},
    state::AppState,
    storage::Policy,
};

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreatePolicyRequest {
    #[serde(alias = "productId")]
    pub product_id: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PolicyListResponse {
    pub policies: Vec<Policy>,
    pub total: usize,
}

/// Contract signature submission.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct SignContractRequest {
    #[serde(alias = "policyId")]
    pub policy_id: String,
    /// Contract document; hashed after canonicalization
    #[schema(value_type = Object)]
    pub payload: Value,
    /// `personal_sign` signature over the `0x` hex contract hash
    pub signature: String,
    /// Client-computed contract hash, checked against the server's
    #[serde(default, alias = "contractHash")]
    pub contract_hash: Option<String>,
    #[serde(default, alias = "handwrittenSignature")]
    pub handwritten_signature: Option<HandwrittenSignature>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct PaymentConfirmRequest {
    #[serde(alias = "policyId")]
    pub policy_id: String,
    /// Premium transfer transaction hash
    #[serde(alias = "txHash")]
    pub tx_hash: String,
}

/// Apply for a policy on a product.
#[utoipa::path(
    post,
    path = "/v1/policies",
    tag = "Policies",
    security(("bearer_auth" = [])),
    request_body = CreatePolicyRequest,
    responses(
        (status = 201, description = "Draft policy created", body = Policy),
        (status = 401, description = "Not authenticated"),
        (status = 409, description = "Wallet already holds a policy for this product"),
        (status = 422, description = "Product missing or inactive")
    )
)]
pub async fn create_policy(
    Auth(user): Auth,
    State(state): State<AppState>,
    Json(request): Json<CreatePolicyRequest>,
) -> Result<(StatusCode, Json<Policy>), ApiError> {
    let policy = PolicyManager::new(&state.db).create_policy(&request.product_id, &user.wallet)?;
    Ok((StatusCode::CREATED, Json(policy)))
}

/// List the caller's policies, newest first.
#[utoipa::path(
    get,
    path = "/v1/policies",
    tag = "Policies",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Caller's policies", body = PolicyListResponse),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn list_policies(
    Auth(user): Auth,
    State(state): State<AppState>,
) -> Result<Json<PolicyListResponse>, ApiError> {
    let policies = PolicyManager::new(&state.db).list_owned(&user.wallet)?;
    let total = policies.len();
    Ok(Json(PolicyListResponse { policies, total }))
}

/// Get one of the caller's policies.
#[utoipa::path(
    get,
    path = "/v1/policies/{policy_id}",
    tag = "Policies",
    security(("bearer_auth" = [])),
    params(("policy_id" = String, Path, description = "Policy identifier")),
    responses(
        (status = 200, description = "Policy", body = Policy),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "Not found or held by another wallet")
    )
)]
pub async fn get_policy(
    Auth(user): Auth,
    State(state): State<AppState>,
    Path(policy_id): Path<String>,
) -> Result<Json<Policy>, ApiError> {
    let policy = PolicyManager::new(&state.db).get_owned(&policy_id, &user.wallet)?;
    Ok(Json(policy))
}

/// Sign the policy contract and submit it for underwriting.
#[utoipa::path(
    post,
    path = "/v1/policies/contract-sign",
    tag = "Policies",
    security(("bearer_auth" = [])),
    request_body = SignContractRequest,
    responses(
        (status = 200, description = "Contract signed, policy pending underwriting", body = Policy),
        (status = 400, description = "Malformed payload, signature or image"),
        (status = 404, description = "Not found or held by another wallet"),
        (status = 409, description = "Policy is not a draft"),
        (status = 422, description = "Hash or signer mismatch")
    )
)]
pub async fn sign_contract(
    Auth(user): Auth,
    State(state): State<AppState>,
    Json(request): Json<SignContractRequest>,
) -> Result<Json<Policy>, ApiError> {
    let submission = ContractSubmission {
        payload: &request.payload,
        signature: &request.signature,
        contract_hash: request.contract_hash.as_deref(),
        handwritten: request.handwritten_signature.as_ref(),
    };

    let policy = PolicyManager::new(&state.db)
        .sign_contract(&request.policy_id, &user.wallet, submission, state.artifacts.as_ref())
        .await?;
    Ok(Json(policy))
}

/// Confirm the on-chain premium payment of an approved policy.
///
/// Repeating the call with the same transaction is a no-op success.
#[utoipa::path(
    post,
    path = "/v1/policies/payment-confirm",
    tag = "Policies",
    request_body = PaymentConfirmRequest,
    responses(
        (status = 200, description = "Payment confirmed, policy active", body = PaymentConfirmation),
        (status = 400, description = "Malformed transaction hash"),
        (status = 404, description = "Unknown policy or transaction not yet mined"),
        (status = 409, description = "Wrong state, deadline passed or transaction already used"),
        (status = 422, description = "Transfer does not match the premium"),
        (status = 502, description = "Chain RPC failure"),
        (status = 503, description = "Treasury not configured")
    )
)]
pub async fn confirm_payment(
    State(state): State<AppState>,
    Json(request): Json<PaymentConfirmRequest>,
) -> Result<Json<PaymentConfirmation>, ApiError> {
    let confirmation = PaymentConfirmer::new(&state.db, state.chain.as_ref())
        .confirm_payment(&request.policy_id, &request.tx_hash, Utc::now())
        .await?;
    Ok(Json(confirmation))
}
