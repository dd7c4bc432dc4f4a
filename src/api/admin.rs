// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Admin-only API endpoints.
//!
//! These endpoints require the Admin role and provide:
//! - Policy listing and inspection across all wallets
//! - Underwriting decisions
//! - The expiry sweep
//! - Audit log queries

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::{
    audit_log,
    auth::AdminOnly,
    error::ApiError,
    policy::{AdminReviewer, ExpirySummary, PolicyError, PolicyManager, PolicyStatus, ReviewDecision},
    state::AppState,
    storage::{
        AuditEvent, AuditEventType, AuditRepository, Policy, PolicyRepository, Product,
        ProductRepository, SettlementRecord, SettlementRepository,
    },
};

const DEFAULT_AUDIT_LIMIT: usize = 100;
const MAX_AUDIT_LIMIT: usize = 1000;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize, IntoParams)]
pub struct AdminPolicyQuery {
    /// Filter by lifecycle status (e.g. `PENDING_UNDERWRITING`).
    pub status: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AdminPolicyListResponse {
    pub policies: Vec<Policy>,
    pub total: usize,
}

/// A policy with the records it references.
#[derive(Debug, Serialize, ToSchema)]
pub struct AdminPolicyDetail {
    pub policy: Policy,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product: Option<Product>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settlement: Option<SettlementRecord>,
}

/// Underwriting decision.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ReviewRequest {
    pub decision: ReviewDecision,
    /// Reviewer note, recorded on the policy
    #[serde(default)]
    pub note: Option<String>,
    /// Days the holder has to pay after approval (service default if absent)
    #[serde(default)]
    pub payment_window_days: Option<u32>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct AuditQueryParams {
    /// Maximum number of results (default 100, at most 1000).
    pub limit: Option<usize>,
    /// Only events for this resource (policy id, wallet address, ...).
    pub resource_id: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AuditLogResponse {
    pub events: Vec<AuditEvent>,
    pub total: usize,
}

// ============================================================================
// Handlers
// ============================================================================

/// List all policies, optionally by status.
#[utoipa::path(
    get,
    path = "/v1/admin/policies",
    tag = "Admin",
    security(("bearer_auth" = [])),
    params(AdminPolicyQuery),
    responses(
        (status = 200, description = "Policies", body = AdminPolicyListResponse),
        (status = 400, description = "Unknown status"),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Not authorized (admin required)")
    )
)]
pub async fn list_policies(
    AdminOnly(admin): AdminOnly,
    State(state): State<AppState>,
    Query(params): Query<AdminPolicyQuery>,
) -> Result<Json<AdminPolicyListResponse>, ApiError> {
    let status = params
        .status
        .as_deref()
        .map(str::parse::<PolicyStatus>)
        .transpose()
        .map_err(ApiError::bad_request)?;

    let policies = PolicyRepository::new(&state.db).list_all(status)?;
    let total = policies.len();

    audit_log!(
        &state.db,
        AuditEvent::new(AuditEventType::AdminAccess)
            .with_actor(admin.wallet.as_canonical())
            .with_details(serde_json::json!({ "action": "list_policies", "status": params.status }))
    );

    Ok(Json(AdminPolicyListResponse { policies, total }))
}

/// Get any policy with its product and settlement.
#[utoipa::path(
    get,
    path = "/v1/admin/policies/{policy_id}",
    tag = "Admin",
    security(("bearer_auth" = [])),
    params(("policy_id" = String, Path, description = "Policy identifier")),
    responses(
        (status = 200, description = "Policy detail", body = AdminPolicyDetail),
        (status = 403, description = "Not authorized (admin required)"),
        (status = 404, description = "Unknown policy")
    )
)]
pub async fn get_policy(
    AdminOnly(_admin): AdminOnly,
    State(state): State<AppState>,
    Path(policy_id): Path<String>,
) -> Result<Json<AdminPolicyDetail>, ApiError> {
    let policy = PolicyRepository::new(&state.db)
        .get(&policy_id)?
        .ok_or_else(|| PolicyError::PolicyNotFound(policy_id.clone()))?;

    let product = ProductRepository::new(&state.db).get(&policy.product_id)?;
    let settlement = match &policy.settlement_tx_hash {
        Some(tx_hash) => SettlementRepository::new(&state.db).get(tx_hash)?,
        None => None,
    };

    Ok(Json(AdminPolicyDetail {
        policy,
        product,
        settlement,
    }))
}

/// Approve or reject a policy awaiting underwriting.
#[utoipa::path(
    patch,
    path = "/v1/admin/policies/{policy_id}",
    tag = "Admin",
    security(("bearer_auth" = [])),
    params(("policy_id" = String, Path, description = "Policy identifier")),
    request_body = ReviewRequest,
    responses(
        (status = 200, description = "Decision applied", body = Policy),
        (status = 400, description = "Invalid payment window"),
        (status = 403, description = "Not authorized (admin required)"),
        (status = 404, description = "Unknown policy"),
        (status = 409, description = "Policy is not pending underwriting")
    )
)]
pub async fn review_policy(
    AdminOnly(admin): AdminOnly,
    State(state): State<AppState>,
    Path(policy_id): Path<String>,
    Json(request): Json<ReviewRequest>,
) -> Result<Json<Policy>, ApiError> {
    let window = request
        .payment_window_days
        .unwrap_or(state.options.payment_window_days);

    let policy = AdminReviewer::new(&state.db).review(
        &policy_id,
        request.decision,
        request.note,
        window,
        &admin.wallet,
        Utc::now(),
    )?;
    Ok(Json(policy))
}

/// Expire unpaid approvals and ended coverage.
#[utoipa::path(
    post,
    path = "/v1/admin/policies/expire",
    tag = "Admin",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Sweep result", body = ExpirySummary),
        (status = 403, description = "Not authorized (admin required)")
    )
)]
pub async fn expire_policies(
    AdminOnly(admin): AdminOnly,
    State(state): State<AppState>,
) -> Result<Json<ExpirySummary>, ApiError> {
    let summary = PolicyManager::new(&state.db).expire_due(Utc::now())?;
    tracing::info!(
        admin = %admin.wallet,
        expired_unpaid = summary.expired_unpaid,
        expired = summary.expired,
        "Expiry sweep finished"
    );
    Ok(Json(summary))
}

/// Query the audit log, newest first.
#[utoipa::path(
    get,
    path = "/v1/admin/audit",
    tag = "Admin",
    security(("bearer_auth" = [])),
    params(AuditQueryParams),
    responses(
        (status = 200, description = "Audit events", body = AuditLogResponse),
        (status = 403, description = "Not authorized (admin required)")
    )
)]
pub async fn query_audit_logs(
    AdminOnly(_admin): AdminOnly,
    State(state): State<AppState>,
    Query(params): Query<AuditQueryParams>,
) -> Result<Json<AuditLogResponse>, ApiError> {
    let limit = params
        .limit
        .unwrap_or(DEFAULT_AUDIT_LIMIT)
        .clamp(1, MAX_AUDIT_LIMIT);

    let events = AuditRepository::new(&state.db).list_recent(limit, params.resource_id.as_deref())?;
    let total = events.len();
    Ok(Json(AuditLogResponse { events, total }))
}
