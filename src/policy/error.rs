// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Policy lifecycle errors.
//!
//! Every failure a caller can act on is its own variant, so handlers match on
//! the reason instead of on message text.

use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use super::PolicyStatus;
use crate::contract::ContractError;
use crate::error::ApiError;
use crate::models::ValueError;
use crate::settlement::SettlementError;
use crate::storage::StorageError;

#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    #[error("product {0} is unavailable")]
    ProductUnavailable(String),

    #[error("policy {0} not found")]
    PolicyNotFound(String),

    #[error("wallet {wallet} already holds a policy for product {product_id}")]
    DuplicatePolicy { wallet: String, product_id: String },

    #[error("policy {policy_id} is {current}, expected {expected}")]
    InvalidState {
        policy_id: String,
        current: PolicyStatus,
        expected: PolicyStatus,
    },

    #[error(transparent)]
    Contract(#[from] ContractError),

    #[error(transparent)]
    Settlement(#[from] SettlementError),

    #[error("transaction {tx_hash} already settled another policy")]
    DuplicateSettlement { tx_hash: String },

    #[error("payment deadline {deadline} has passed")]
    PaymentDeadlinePassed { deadline: DateTime<Utc> },

    #[error("RPC endpoint is on chain {actual}, product requires chain {expected}")]
    ChainMismatch { expected: u64, actual: u64 },

    #[error("treasury address is not configured")]
    TreasuryNotConfigured,

    #[error(transparent)]
    Validation(#[from] ValueError),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("storage error: {0}")]
    Storage(StorageError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<StorageError> for PolicyError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(id) => PolicyError::PolicyNotFound(id),
            other => PolicyError::Storage(other),
        }
    }
}

impl PolicyError {
    pub fn invalid_state(policy_id: &str, current: PolicyStatus, expected: PolicyStatus) -> Self {
        PolicyError::InvalidState {
            policy_id: policy_id.to_string(),
            current,
            expected,
        }
    }

    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            PolicyError::ProductUnavailable(_) => "product_unavailable",
            PolicyError::PolicyNotFound(_) => "policy_not_found",
            PolicyError::DuplicatePolicy { .. } => "duplicate_policy",
            PolicyError::InvalidState { .. } => "invalid_state",
            PolicyError::Contract(e) => e.error_code(),
            PolicyError::Settlement(e) => e.error_code(),
            PolicyError::DuplicateSettlement { .. } => "duplicate_settlement",
            PolicyError::PaymentDeadlinePassed { .. } => "payment_deadline_passed",
            PolicyError::ChainMismatch { .. } => "chain_mismatch",
            PolicyError::TreasuryNotConfigured => "treasury_not_configured",
            PolicyError::Validation(_) | PolicyError::InvalidRequest(_) => "validation_error",
            PolicyError::Storage(_) => "storage_error",
            PolicyError::Internal(_) => "internal_error",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            PolicyError::Validation(_) | PolicyError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            PolicyError::PolicyNotFound(_) => StatusCode::NOT_FOUND,
            PolicyError::DuplicatePolicy { .. }
            | PolicyError::InvalidState { .. }
            | PolicyError::DuplicateSettlement { .. }
            | PolicyError::PaymentDeadlinePassed { .. } => StatusCode::CONFLICT,
            PolicyError::ProductUnavailable(_) | PolicyError::ChainMismatch { .. } => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            PolicyError::Contract(e) => match e {
                ContractError::ContractHashMismatch { .. }
                | ContractError::SignatureAddressMismatch { .. } => {
                    StatusCode::UNPROCESSABLE_ENTITY
                }
                ContractError::Artifact(a) if !a.is_client_error() => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
                _ => StatusCode::BAD_REQUEST,
            },
            PolicyError::Settlement(e) => match e {
                SettlementError::TransactionNotFound(_) => StatusCode::NOT_FOUND,
                SettlementError::Rpc(_) => StatusCode::BAD_GATEWAY,
                _ => StatusCode::UNPROCESSABLE_ENTITY,
            },
            PolicyError::TreasuryNotConfigured => StatusCode::SERVICE_UNAVAILABLE,
            PolicyError::Storage(_) | PolicyError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn details(&self) -> Option<Value> {
        match self {
            PolicyError::InvalidState {
                current, expected, ..
            } => Some(json!({ "current": current, "expected": expected })),
            PolicyError::Contract(e) => e.details(),
            PolicyError::Settlement(e) => Some(e.details()),
            PolicyError::DuplicateSettlement { tx_hash } => Some(json!({ "tx_hash": tx_hash })),
            PolicyError::PaymentDeadlinePassed { deadline } => {
                Some(json!({ "deadline": deadline }))
            }
            PolicyError::ChainMismatch { expected, actual } => {
                Some(json!({ "expected": expected, "actual": actual }))
            }
            _ => None,
        }
    }
}

impl From<PolicyError> for ApiError {
    fn from(err: PolicyError) -> Self {
        let status = err.status_code();
        if status.is_server_error() {
            tracing::error!(error = %err, code = err.error_code(), "Policy operation failed");
        }

        // Infrastructure details stay in the logs.
        let message = match &err {
            PolicyError::Storage(_) | PolicyError::Internal(_) => "Internal error".to_string(),
            other => other.to_string(),
        };

        let api = ApiError::new(status, err.error_code(), message);
        match err.details() {
            Some(details) => api.with_details(details),
            None => api,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::ChainClientError;

    #[test]
    fn conflicts_map_to_409() {
        let dup = PolicyError::DuplicatePolicy {
            wallet: "0xabc".into(),
            product_id: "p1".into(),
        };
        assert_eq!(dup.status_code(), StatusCode::CONFLICT);
        assert_eq!(dup.error_code(), "duplicate_policy");

        let state = PolicyError::invalid_state("pol", PolicyStatus::Active, PolicyStatus::Draft);
        assert_eq!(state.status_code(), StatusCode::CONFLICT);
        assert_eq!(state.details().unwrap()["current"], "ACTIVE");
    }

    #[test]
    fn settlement_errors_keep_their_reason() {
        let err = PolicyError::from(SettlementError::AmountMismatch {
            expected: "100".into(),
            actual: "99".into(),
        });
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(err.error_code(), "amount_mismatch");
        let details = err.details().unwrap();
        assert_eq!(details["expected"], "100");
        assert_eq!(details["retryable"], false);

        let rpc = PolicyError::from(SettlementError::Rpc(ChainClientError::Rpc("down".into())));
        assert_eq!(rpc.status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(rpc.details().unwrap()["retryable"], true);
    }

    #[test]
    fn storage_not_found_becomes_policy_not_found() {
        let err = PolicyError::from(StorageError::NotFound("pol_1".into()));
        assert!(matches!(err, PolicyError::PolicyNotFound(ref id) if id == "pol_1"));
    }

    #[test]
    fn api_error_hides_storage_details() {
        let err = PolicyError::Internal("date overflow".into());
        let api: ApiError = err.into();
        assert_eq!(api.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(api.message, "Internal error");
    }
}
