// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Premium Settlement
//!
//! Reconciles an on-chain ERC-20 transfer with a policy awaiting payment.
//!
//! ## Exactly-once
//!
//! The settlement record is keyed by transaction hash and written in the same
//! storage transaction that activates the policy. A repeated confirmation of
//! the same transaction returns the stored result; a transaction already used
//! for another policy is refused with `DuplicateSettlement`.
//!
//! Verification failures are never retried here. Callers may retry
//! `TransactionNotFound` and RPC failures (`retryable: true`).

pub mod verifier;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use utoipa::ToSchema;

pub use verifier::{match_transfer, verify_transfer, SettlementError, TransferExpectation};

use crate::audit_log;
use crate::blockchain::ChainReader;
use crate::models::{parse_token_amount, TxHash, WalletAddress};
use crate::policy::{coverage_window, PolicyError, PolicyManager, PolicyStatus};
use crate::storage::{
    AuditEvent, AuditEventType, CoverDatabase, Policy, PolicyRepository, ProductRepository,
    SettingsRepository, SettlementRecord, SettlementRepository, SettlementWrite,
    TREASURY_ADDRESS_KEY,
};

/// Outcome of a payment confirmation.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PaymentConfirmation {
    pub settlement: SettlementRecord,
    pub policy: Policy,
    /// True when this transaction had already been confirmed for the policy
    pub already_confirmed: bool,
}

/// Confirms premium payments against the chain.
pub struct PaymentConfirmer<'a> {
    db: &'a CoverDatabase,
    chain: &'a dyn ChainReader,
}

impl<'a> PaymentConfirmer<'a> {
    pub fn new(db: &'a CoverDatabase, chain: &'a dyn ChainReader) -> Self {
        Self { db, chain }
    }

    fn treasury(&self) -> Result<WalletAddress, PolicyError> {
        let raw = SettingsRepository::new(self.db)
            .get(TREASURY_ADDRESS_KEY)?
            .ok_or(PolicyError::TreasuryNotConfigured)?;
        WalletAddress::parse(&raw).map_err(|e| {
            tracing::error!(error = %e, "Stored treasury address is invalid");
            PolicyError::TreasuryNotConfigured
        })
    }

    /// Expire a policy whose deadline passed. A concurrent sweep may already
    /// have moved it on; that is not an error for the late payer.
    fn expire_late(&self, policy_id: &str, now: DateTime<Utc>) -> Result<(), PolicyError> {
        match PolicyManager::new(self.db).expire_unpaid(policy_id, now) {
            Ok(_) | Err(PolicyError::InvalidState { .. }) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Verify `tx_hash` pays the premium of `policy_id` and activate it.
    pub async fn confirm_payment(
        &self,
        policy_id: &str,
        tx_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<PaymentConfirmation, PolicyError> {
        let tx_hash = TxHash::parse(tx_hash)?;
        let tx_key = tx_hash.to_string();

        let policies = PolicyRepository::new(self.db);
        let settlements = SettlementRepository::new(self.db);

        let policy = policies
            .get(policy_id)?
            .ok_or_else(|| PolicyError::PolicyNotFound(policy_id.to_string()))?;

        if let Some(existing) = settlements.get(&tx_key)? {
            if existing.policy_id != policy.id {
                return Err(PolicyError::DuplicateSettlement { tx_hash: tx_key });
            }
            tracing::debug!(policy_id = %policy_id, tx_hash = %tx_key, "Payment already confirmed");
            return Ok(PaymentConfirmation {
                settlement: existing,
                policy,
                already_confirmed: true,
            });
        }

        if policy.status != PolicyStatus::ApprovedAwaitingPayment {
            return Err(PolicyError::invalid_state(
                policy_id,
                policy.status,
                PolicyStatus::ApprovedAwaitingPayment,
            ));
        }

        if let Some(deadline) = policy.payment_deadline.filter(|d| *d < now) {
            self.expire_late(policy_id, now)?;
            return Err(PolicyError::PaymentDeadlinePassed { deadline });
        }

        let product = ProductRepository::new(self.db)
            .get(&policy.product_id)?
            .ok_or_else(|| PolicyError::ProductUnavailable(policy.product_id.clone()))?;
        let treasury = self.treasury()?;

        let actual_chain = self
            .chain
            .chain_id()
            .await
            .map_err(|e| PolicyError::Settlement(e.into()))?;
        if actual_chain != product.chain_id {
            return Err(PolicyError::ChainMismatch {
                expected: product.chain_id,
                actual: actual_chain,
            });
        }

        let expectation = TransferExpectation {
            token: product.token()?,
            from: WalletAddress::parse(&policy.wallet_address)?.address(),
            treasury: treasury.address(),
            amount: parse_token_amount(&policy.premium_amount)?,
        };

        let verified = match verify_transfer(self.chain, product.chain_id, tx_hash.hash(), &expectation)
            .await
        {
            Ok(verified) => verified,
            Err(e) => {
                tracing::warn!(
                    policy_id = %policy_id,
                    tx_hash = %tx_key,
                    code = e.error_code(),
                    error = %e,
                    "Payment verification failed"
                );
                audit_log!(
                    self.db,
                    AuditEvent::new(AuditEventType::PaymentRejected)
                        .with_resource("policy", policy_id)
                        .with_details(json!({ "tx_hash": tx_key, "reason": e.error_code() }))
                        .failed(e.to_string())
                );
                return Err(e.into());
            }
        };

        let record = SettlementRecord {
            id: uuid::Uuid::new_v4().to_string(),
            policy_id: policy.id.clone(),
            tx_hash: tx_key.clone(),
            chain_id: verified.chain_id,
            token_address: format!("{:#x}", verified.token),
            from_address: format!("{:#x}", verified.from),
            to_address: format!("{:#x}", verified.to),
            amount: verified.amount.to_string(),
            block_number: verified.block_number,
            confirmed: true,
            created_at: now,
            updated_at: now,
        };

        let (start, end) = coverage_window(now, product.term_days_or_default())?;
        let write = settlements.record_and_activate(record, |p| {
            if p.status != PolicyStatus::ApprovedAwaitingPayment {
                return Err(PolicyError::invalid_state(
                    &p.id,
                    p.status,
                    PolicyStatus::ApprovedAwaitingPayment,
                ));
            }
            p.status = PolicyStatus::Active;
            p.settlement_tx_hash = Some(tx_key.clone());
            // Coverage runs for the full term from confirmation.
            p.coverage_start_at = Some(start);
            p.coverage_end_at = Some(end);
            p.updated_at = now;
            Ok(())
        })?;

        match write {
            SettlementWrite::Recorded { settlement, policy } => {
                tracing::info!(
                    policy_id = %policy.id,
                    tx_hash = %settlement.tx_hash,
                    amount = %settlement.amount,
                    status = %policy.status,
                    "Premium settled, policy active"
                );
                audit_log!(
                    self.db,
                    AuditEvent::new(AuditEventType::PaymentConfirmed)
                        .with_actor(policy.wallet_address.clone())
                        .with_resource("policy", &policy.id)
                        .with_details(json!({
                            "tx_hash": settlement.tx_hash,
                            "amount": settlement.amount,
                            "block_number": settlement.block_number,
                        }))
                );
                Ok(PaymentConfirmation {
                    settlement,
                    policy,
                    already_confirmed: false,
                })
            }
            SettlementWrite::AlreadyRecorded { settlement, policy } => Ok(PaymentConfirmation {
                settlement,
                policy,
                already_confirmed: true,
            }),
            SettlementWrite::ClaimedByOtherPolicy(settlement) => {
                Err(PolicyError::DuplicateSettlement {
                    tx_hash: settlement.tx_hash,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::erc20::transfer_log;
    use crate::blockchain::{ChainReceipt, ReceiptLog};
    use crate::testing::{approved_policy, seed_product, set_treasury, temp_db, MockChain, TREASURY, USDT};
    use alloy::primitives::{Address, B256, U256};
    use chrono::Duration;

    const TX: &str = "0xdeadbeef00000000000000000000000000000000000000000000000000000000";

    fn tx_b256() -> B256 {
        TX.parse().unwrap()
    }

    fn receipt_paying(from: Address, amount: u64) -> ChainReceipt {
        ChainReceipt {
            tx_hash: tx_b256(),
            success: true,
            block_number: Some(100),
            logs: vec![transfer_log(USDT, from, TREASURY, U256::from(amount))],
        }
    }

    fn payer(policy: &Policy) -> Address {
        WalletAddress::parse(&policy.wallet_address).unwrap().address()
    }

    #[tokio::test]
    async fn exact_premium_activates_policy() {
        let (db, _dir) = temp_db();
        seed_product(&db, "p1", true);
        set_treasury(&db);
        let policy = approved_policy(&db, "p1", 1);
        let chain = MockChain::new(56);
        chain.insert_receipt(receipt_paying(payer(&policy), 100));

        let now = Utc::now();
        let confirmation = PaymentConfirmer::new(&db, &chain)
            .confirm_payment(&policy.id, TX, now)
            .await
            .unwrap();

        assert!(!confirmation.already_confirmed);
        assert!(confirmation.settlement.confirmed);
        assert_eq!(confirmation.settlement.amount, "100");
        assert_eq!(confirmation.policy.status, PolicyStatus::Active);
        assert_eq!(confirmation.policy.coverage_start_at, Some(now));
        assert_eq!(
            confirmation.policy.coverage_end_at,
            Some(now + Duration::days(90))
        );
        assert_eq!(
            confirmation.policy.settlement_tx_hash.as_deref(),
            Some(TX)
        );
    }

    #[tokio::test]
    async fn short_premium_is_amount_mismatch_and_state_unchanged() {
        let (db, _dir) = temp_db();
        seed_product(&db, "p1", true);
        set_treasury(&db);
        let policy = approved_policy(&db, "p1", 1);
        let chain = MockChain::new(56);
        chain.insert_receipt(receipt_paying(payer(&policy), 99));

        let err = PaymentConfirmer::new(&db, &chain)
            .confirm_payment(&policy.id, TX, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PolicyError::Settlement(SettlementError::AmountMismatch { .. })
        ));

        let stored = PolicyRepository::new(&db).get(&policy.id).unwrap().unwrap();
        assert_eq!(stored.status, PolicyStatus::ApprovedAwaitingPayment);
        assert!(SettlementRepository::new(&db).get(TX).unwrap().is_none());
    }

    #[tokio::test]
    async fn repeated_confirmation_is_idempotent() {
        let (db, _dir) = temp_db();
        seed_product(&db, "p1", true);
        set_treasury(&db);
        let policy = approved_policy(&db, "p1", 1);
        let chain = MockChain::new(56);
        chain.insert_receipt(receipt_paying(payer(&policy), 100));
        let confirmer = PaymentConfirmer::new(&db, &chain);

        let first = confirmer.confirm_payment(&policy.id, TX, Utc::now()).await.unwrap();
        let second = confirmer.confirm_payment(&policy.id, TX, Utc::now()).await.unwrap();

        assert!(!first.already_confirmed);
        assert!(second.already_confirmed);
        assert_eq!(first.settlement.id, second.settlement.id);
        assert_eq!(second.policy.status, PolicyStatus::Active);
    }

    #[tokio::test]
    async fn concurrent_confirmations_record_once() {
        let (db, _dir) = temp_db();
        seed_product(&db, "p1", true);
        set_treasury(&db);
        let policy = approved_policy(&db, "p1", 1);
        let chain = MockChain::new(56);
        chain.insert_receipt(receipt_paying(payer(&policy), 100));
        let confirmer = PaymentConfirmer::new(&db, &chain);

        let now = Utc::now();
        let (a, b) = tokio::join!(
            confirmer.confirm_payment(&policy.id, TX, now),
            confirmer.confirm_payment(&policy.id, TX, now)
        );
        let (a, b) = (a.unwrap(), b.unwrap());

        assert_eq!(a.settlement.id, b.settlement.id);
        assert_eq!(
            [a.already_confirmed, b.already_confirmed]
                .iter()
                .filter(|c| !**c)
                .count(),
            1
        );
    }

    #[tokio::test]
    async fn transaction_cannot_pay_two_policies() {
        let (db, _dir) = temp_db();
        seed_product(&db, "p1", true);
        seed_product(&db, "p2", true);
        set_treasury(&db);
        let first = approved_policy(&db, "p1", 1);
        let second = approved_policy(&db, "p2", 1);
        let chain = MockChain::new(56);
        chain.insert_receipt(receipt_paying(payer(&first), 100));
        let confirmer = PaymentConfirmer::new(&db, &chain);

        confirmer.confirm_payment(&first.id, TX, Utc::now()).await.unwrap();
        let err = confirmer
            .confirm_payment(&second.id, TX, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, PolicyError::DuplicateSettlement { .. }));
    }

    #[tokio::test]
    async fn late_payment_expires_policy() {
        let (db, _dir) = temp_db();
        seed_product(&db, "p1", true);
        set_treasury(&db);
        let policy = approved_policy(&db, "p1", 1);
        let chain = MockChain::new(56);
        chain.insert_receipt(receipt_paying(payer(&policy), 100));

        let after_deadline = policy.payment_deadline.unwrap() + Duration::seconds(1);
        let err = PaymentConfirmer::new(&db, &chain)
            .confirm_payment(&policy.id, TX, after_deadline)
            .await
            .unwrap_err();
        assert!(matches!(err, PolicyError::PaymentDeadlinePassed { .. }));

        let stored = PolicyRepository::new(&db).get(&policy.id).unwrap().unwrap();
        assert_eq!(stored.status, PolicyStatus::ExpiredUnpaid);
    }

    #[test]
    fn late_expiry_tolerates_a_concurrent_sweep() {
        let (db, _dir) = temp_db();
        seed_product(&db, "p1", true);
        let policy = approved_policy(&db, "p1", 1);
        let after_deadline = policy.payment_deadline.unwrap() + Duration::seconds(1);

        // The sweep wins the race and expires the policy first.
        let summary = PolicyManager::new(&db).expire_due(after_deadline).unwrap();
        assert_eq!(summary.expired_unpaid, 1);

        let chain = MockChain::new(56);
        PaymentConfirmer::new(&db, &chain)
            .expire_late(&policy.id, after_deadline)
            .unwrap();
        let stored = PolicyRepository::new(&db).get(&policy.id).unwrap().unwrap();
        assert_eq!(stored.status, PolicyStatus::ExpiredUnpaid);
    }

    #[tokio::test]
    async fn wrong_network_and_missing_treasury_are_reported() {
        let (db, _dir) = temp_db();
        seed_product(&db, "p1", true);
        let policy = approved_policy(&db, "p1", 1);
        let chain = MockChain::new(56);

        let err = PaymentConfirmer::new(&db, &chain)
            .confirm_payment(&policy.id, TX, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, PolicyError::TreasuryNotConfigured));

        set_treasury(&db);
        let other_chain = MockChain::new(1);
        let err = PaymentConfirmer::new(&db, &other_chain)
            .confirm_payment(&policy.id, TX, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PolicyError::ChainMismatch {
                expected: 56,
                actual: 1
            }
        ));
    }

    #[tokio::test]
    async fn unmined_transaction_is_retryable() {
        let (db, _dir) = temp_db();
        seed_product(&db, "p1", true);
        set_treasury(&db);
        let policy = approved_policy(&db, "p1", 1);
        let chain = MockChain::new(56);

        let err = PaymentConfirmer::new(&db, &chain)
            .confirm_payment(&policy.id, TX, Utc::now())
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "transaction_not_found");
        assert_eq!(err.details().unwrap()["retryable"], true);
    }

    #[tokio::test]
    async fn policy_not_awaiting_payment_is_invalid_state() {
        let (db, _dir) = temp_db();
        seed_product(&db, "p1", true);
        set_treasury(&db);
        let policy = crate::testing::pending_policy(&db, "p1", 1);
        let chain = MockChain::new(56);
        chain.insert_receipt(ChainReceipt {
            tx_hash: tx_b256(),
            success: true,
            block_number: None,
            logs: Vec::<ReceiptLog>::new(),
        });

        let err = PaymentConfirmer::new(&db, &chain)
            .confirm_payment(&policy.id, TX, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PolicyError::InvalidState {
                current: PolicyStatus::PendingUnderwriting,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn malformed_hash_is_rejected_before_storage() {
        let (db, _dir) = temp_db();
        let chain = MockChain::new(56);
        let err = PaymentConfirmer::new(&db, &chain)
            .confirm_payment("whatever", "0xdeadbeef", Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, PolicyError::Validation(_)));
    }
}
