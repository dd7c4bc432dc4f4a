// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Policy creation, contract signing and expiry.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use utoipa::ToSchema;

use super::{PolicyError, PolicyStatus};
use crate::audit_log;
use crate::contract::{bind_contract, ArtifactStore, HandwrittenSignature};
use crate::models::WalletAddress;
use crate::storage::{
    AuditEvent, AuditEventType, CoverDatabase, Policy, PolicyRepository, ProductRepository,
    StorageError,
};

/// Contract material submitted by the policy holder.
#[derive(Debug, Clone, Copy)]
pub struct ContractSubmission<'r> {
    pub payload: &'r Value,
    pub signature: &'r str,
    /// Client-computed digest, cross-checked when present
    pub contract_hash: Option<&'r str>,
    pub handwritten: Option<&'r HandwrittenSignature>,
}

/// Result of an expiry sweep.
#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct ExpirySummary {
    /// Approved policies whose payment deadline passed
    pub expired_unpaid: usize,
    /// Active policies whose coverage ended
    pub expired: usize,
    pub policy_ids: Vec<String>,
}

/// Owns the policy state machine for policy holders.
pub struct PolicyManager<'a> {
    db: &'a CoverDatabase,
}

impl<'a> PolicyManager<'a> {
    pub fn new(db: &'a CoverDatabase) -> Self {
        Self { db }
    }

    /// Create a `DRAFT` policy for an active product.
    pub fn create_policy(
        &self,
        product_id: &str,
        wallet: &WalletAddress,
    ) -> Result<Policy, PolicyError> {
        let product = ProductRepository::new(self.db)
            .get(product_id)?
            .filter(|p| p.active)
            .ok_or_else(|| PolicyError::ProductUnavailable(product_id.to_string()))?;

        let policy = Policy::draft(
            wallet,
            &product.id,
            &product.premium_amount,
            &product.coverage_amount,
            Utc::now(),
        );

        match PolicyRepository::new(self.db).create(&policy) {
            Ok(()) => {}
            Err(StorageError::AlreadyExists(_)) => {
                return Err(PolicyError::DuplicatePolicy {
                    wallet: wallet.as_canonical(),
                    product_id: product.id,
                });
            }
            Err(e) => return Err(e.into()),
        }

        tracing::info!(
            policy_id = %policy.id,
            wallet = %wallet,
            product_id = %policy.product_id,
            status = %policy.status,
            "Policy created"
        );
        audit_log!(
            self.db,
            AuditEventType::PolicyCreated,
            wallet.as_canonical(),
            "policy",
            &policy.id
        );

        Ok(policy)
    }

    /// Fetch a policy on behalf of its holder.
    ///
    /// Policies held by other wallets are reported as not found.
    pub fn get_owned(&self, policy_id: &str, wallet: &WalletAddress) -> Result<Policy, PolicyError> {
        PolicyRepository::new(self.db)
            .get(policy_id)?
            .filter(|p| p.is_owned_by(wallet))
            .ok_or_else(|| PolicyError::PolicyNotFound(policy_id.to_string()))
    }

    pub fn list_owned(&self, wallet: &WalletAddress) -> Result<Vec<Policy>, PolicyError> {
        Ok(PolicyRepository::new(self.db).list_by_wallet(wallet)?)
    }

    /// Bind the holder's signature to the contract and submit for underwriting.
    ///
    /// Only `DRAFT` policies can be signed; a signed contract is never
    /// overwritten.
    pub async fn sign_contract(
        &self,
        policy_id: &str,
        wallet: &WalletAddress,
        submission: ContractSubmission<'_>,
        artifacts: &dyn ArtifactStore,
    ) -> Result<Policy, PolicyError> {
        let policy = self.get_owned(policy_id, wallet)?;
        if policy.status != PolicyStatus::Draft {
            return Err(PolicyError::invalid_state(
                policy_id,
                policy.status,
                PolicyStatus::Draft,
            ));
        }

        let signed = bind_contract(
            submission.payload,
            submission.contract_hash,
            submission.signature,
            wallet,
            submission.handwritten,
            artifacts,
        )
        .await
        .inspect_err(|e| {
            tracing::warn!(policy_id = %policy_id, wallet = %wallet, error = %e, "Contract signature rejected");
        })?;

        let now = Utc::now();
        let updated = PolicyRepository::new(self.db).update(policy_id, |p| {
            // Re-checked inside the write transaction: a concurrent signer may have won.
            if p.status != PolicyStatus::Draft {
                return Err(PolicyError::invalid_state(
                    policy_id,
                    p.status,
                    PolicyStatus::Draft,
                ));
            }
            p.contract_hash = Some(signed.contract_hash.clone());
            p.wallet_signature = Some(signed.wallet_signature.clone());
            p.contract_signed_at = Some(now);
            if let Some(artifact) = &signed.handwritten {
                p.handwritten_signature_url = Some(artifact.url.clone());
                p.handwritten_signature_hash = Some(artifact.content_hash.clone());
            }
            p.status = PolicyStatus::PendingUnderwriting;
            p.updated_at = now;
            Ok(())
        })?;

        tracing::info!(
            policy_id = %policy_id,
            contract_hash = %signed.contract_hash,
            status = %updated.status,
            "Contract signed"
        );
        audit_log!(
            self.db,
            AuditEvent::new(AuditEventType::ContractSigned)
                .with_actor(wallet.as_canonical())
                .with_resource("policy", policy_id)
                .with_details(json!({
                    "contract_hash": signed.contract_hash,
                    "handwritten_signature_hash": signed.handwritten.as_ref().map(|a| &a.content_hash),
                }))
        );

        Ok(updated)
    }

    /// Move an unpaid approved policy past its deadline to `EXPIRED_UNPAID`.
    pub fn expire_unpaid(&self, policy_id: &str, now: DateTime<Utc>) -> Result<Policy, PolicyError> {
        let policy = PolicyRepository::new(self.db).update(policy_id, |p| {
            if p.status != PolicyStatus::ApprovedAwaitingPayment {
                return Err(PolicyError::invalid_state(
                    policy_id,
                    p.status,
                    PolicyStatus::ApprovedAwaitingPayment,
                ));
            }
            match p.payment_deadline {
                Some(deadline) if deadline < now => {}
                _ => {
                    return Err(PolicyError::InvalidRequest(
                        "payment deadline has not passed".to_string(),
                    ))
                }
            }
            p.status = PolicyStatus::ExpiredUnpaid;
            p.updated_at = now;
            Ok(())
        })?;

        tracing::info!(policy_id = %policy_id, status = %policy.status, "Policy expired unpaid");
        audit_log!(
            self.db,
            AuditEvent::new(AuditEventType::PolicyExpired)
                .with_resource("policy", policy_id)
                .with_details(json!({ "status": policy.status }))
        );
        Ok(policy)
    }

    fn expire_ended_coverage(
        &self,
        policy_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Policy, PolicyError> {
        let policy = PolicyRepository::new(self.db).update(policy_id, |p| {
            if p.status != PolicyStatus::Active {
                return Err(PolicyError::invalid_state(
                    policy_id,
                    p.status,
                    PolicyStatus::Active,
                ));
            }
            if !p.coverage_end_at.is_some_and(|end| end <= now) {
                return Err(PolicyError::InvalidRequest(
                    "coverage has not ended".to_string(),
                ));
            }
            p.status = PolicyStatus::Expired;
            p.updated_at = now;
            Ok(())
        })?;

        tracing::info!(policy_id = %policy_id, status = %policy.status, "Policy coverage expired");
        audit_log!(
            self.db,
            AuditEvent::new(AuditEventType::PolicyExpired)
                .with_resource("policy", policy_id)
                .with_details(json!({ "status": policy.status }))
        );
        Ok(policy)
    }

    /// Apply every time-driven transition that is due at `now`.
    ///
    /// Policies that changed state concurrently are skipped.
    pub fn expire_due(&self, now: DateTime<Utc>) -> Result<ExpirySummary, PolicyError> {
        let repo = PolicyRepository::new(self.db);
        let mut summary = ExpirySummary::default();

        for policy in repo.list_all(Some(PolicyStatus::ApprovedAwaitingPayment))? {
            if !policy.payment_deadline.is_some_and(|d| d < now) {
                continue;
            }
            match self.expire_unpaid(&policy.id, now) {
                Ok(_) => {
                    summary.expired_unpaid += 1;
                    summary.policy_ids.push(policy.id);
                }
                Err(PolicyError::InvalidState { .. } | PolicyError::InvalidRequest(_)) => {}
                Err(e) => return Err(e),
            }
        }

        for policy in repo.list_all(Some(PolicyStatus::Active))? {
            if !policy.coverage_end_at.is_some_and(|end| end <= now) {
                continue;
            }
            match self.expire_ended_coverage(&policy.id, now) {
                Ok(_) => {
                    summary.expired += 1;
                    summary.policy_ids.push(policy.id);
                }
                Err(PolicyError::InvalidState { .. } | PolicyError::InvalidRequest(_)) => {}
                Err(e) => return Err(e),
            }
        }

        Ok(summary)
    }
}
