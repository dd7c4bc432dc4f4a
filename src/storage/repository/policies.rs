// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Policy repository.
//!
//! Policies are never deleted. The `(wallet, product)` uniqueness constraint
//! lives in `policy_owner_index` and is checked inside the same write
//! transaction that inserts the policy.

use chrono::{DateTime, Utc};
use redb::{ReadableDatabase, ReadableTable};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::WalletAddress;
use crate::policy::PolicyStatus;
use crate::storage::database::{
    decode, CoverDatabase, StorageError, StorageResult, POLICIES, POLICY_OWNER_INDEX,
};

/// A policy record.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct Policy {
    /// Unique policy identifier
    pub id: String,
    /// Owning wallet (lower-case)
    pub wallet_address: String,
    /// Product the policy was written against
    pub product_id: String,
    /// Premium copied from the product at creation (smallest units)
    pub premium_amount: String,
    /// Coverage copied from the product at creation (smallest units)
    pub coverage_amount: String,
    /// Lifecycle status
    pub status: PolicyStatus,
    /// `0x`-prefixed keccak-256 of the canonical contract payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract_hash: Option<String>,
    /// Wallet signature over the contract hash
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wallet_signature: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract_signed_at: Option<DateTime<Utc>>,
    /// Where the handwritten signature image was stored
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handwritten_signature_url: Option<String>,
    /// SHA-256 of the handwritten signature image
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handwritten_signature_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewer_note: Option<String>,
    /// Admin wallet that made the underwriting decision
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewed_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewed_at: Option<DateTime<Utc>>,
    /// Latest time a premium payment is accepted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_deadline: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coverage_start_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coverage_end_at: Option<DateTime<Utc>>,
    /// Transaction that settled the premium
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settlement_tx_hash: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Policy {
    /// New draft for a wallet/product pair.
    pub fn draft(
        wallet: &WalletAddress,
        product_id: &str,
        premium_amount: &str,
        coverage_amount: &str,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            wallet_address: wallet.as_canonical(),
            product_id: product_id.to_string(),
            premium_amount: premium_amount.to_string(),
            coverage_amount: coverage_amount.to_string(),
            status: PolicyStatus::Draft,
            contract_hash: None,
            wallet_signature: None,
            contract_signed_at: None,
            handwritten_signature_url: None,
            handwritten_signature_hash: None,
            reviewer_note: None,
            reviewed_by: None,
            reviewed_at: None,
            payment_deadline: None,
            coverage_start_at: None,
            coverage_end_at: None,
            settlement_tx_hash: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_owned_by(&self, wallet: &WalletAddress) -> bool {
        self.wallet_address == wallet.as_canonical()
    }
}

fn owner_key(wallet: &str, product_id: &str) -> String {
    format!("{}|{}", wallet, product_id)
}

/// Repository for policy records.
pub struct PolicyRepository<'a> {
    db: &'a CoverDatabase,
}

impl<'a> PolicyRepository<'a> {
    pub fn new(db: &'a CoverDatabase) -> Self {
        Self { db }
    }

    /// Insert a new policy.
    ///
    /// Returns [`StorageError::AlreadyExists`] if the wallet already holds a
    /// policy for the same product.
    pub fn create(&self, policy: &Policy) -> StorageResult<()> {
        let key = owner_key(&policy.wallet_address, &policy.product_id);

        let write_txn = self.db.inner().begin_write()?;
        let duplicate = {
            let mut index = write_txn.open_table(POLICY_OWNER_INDEX)?;
            if index.get(key.as_str())?.is_some() {
                true
            } else {
                index.insert(key.as_str(), policy.id.as_str())?;

                let mut policies = write_txn.open_table(POLICIES)?;
                let json = serde_json::to_vec(policy)?;
                policies.insert(policy.id.as_str(), json.as_slice())?;
                false
            }
        };

        if duplicate {
            write_txn.abort()?;
            return Err(StorageError::AlreadyExists(key));
        }
        write_txn.commit()?;
        Ok(())
    }

    pub fn get(&self, policy_id: &str) -> StorageResult<Option<Policy>> {
        let read_txn = self.db.inner().begin_read()?;
        let table = read_txn.open_table(POLICIES)?;
        match table.get(policy_id)? {
            Some(value) => Ok(Some(decode(value.value())?)),
            None => Ok(None),
        }
    }

    /// All policies held by a wallet, newest first.
    pub fn list_by_wallet(&self, wallet: &WalletAddress) -> StorageResult<Vec<Policy>> {
        let owner = wallet.as_canonical();
        // '}' sorts right after '|', bounding every "owner|..." key.
        let start = format!("{}|", owner);
        let end = format!("{}}}", owner);

        let read_txn = self.db.inner().begin_read()?;
        let index = read_txn.open_table(POLICY_OWNER_INDEX)?;
        let policies = read_txn.open_table(POLICIES)?;

        let mut result = Vec::new();
        for entry in index.range(start.as_str()..end.as_str())? {
            let (_, policy_id) = entry?;
            if let Some(value) = policies.get(policy_id.value())? {
                result.push(decode::<Policy>(value.value())?);
            }
        }
        result.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(result)
    }

    /// All policies, optionally filtered by status, newest first.
    pub fn list_all(&self, status: Option<PolicyStatus>) -> StorageResult<Vec<Policy>> {
        let read_txn = self.db.inner().begin_read()?;
        let table = read_txn.open_table(POLICIES)?;

        let mut result = Vec::new();
        for entry in table.iter()? {
            let (_, value) = entry?;
            let policy: Policy = decode(value.value())?;
            if status.is_none_or(|s| s == policy.status) {
                result.push(policy);
            }
        }
        result.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(result)
    }

    /// Read-modify-write a policy inside one write transaction.
    ///
    /// The closure sees the committed state and may refuse the change by
    /// returning an error, in which case nothing is written.
    pub fn update<F, E>(&self, policy_id: &str, f: F) -> Result<Policy, E>
    where
        F: FnOnce(&mut Policy) -> Result<(), E>,
        E: From<StorageError>,
    {
        let write_txn = self.db.inner().begin_write().map_err(StorageError::from)?;
        let outcome = {
            let mut table = write_txn.open_table(POLICIES).map_err(StorageError::from)?;

            let current: Option<Policy> = match table.get(policy_id).map_err(StorageError::from)? {
                Some(value) => Some(decode(value.value())?),
                None => None,
            };

            match current {
                None => Err(E::from(StorageError::NotFound(policy_id.to_string()))),
                Some(mut policy) => match f(&mut policy) {
                    Ok(()) => {
                        let json = serde_json::to_vec(&policy).map_err(StorageError::from)?;
                        table
                            .insert(policy_id, json.as_slice())
                            .map_err(StorageError::from)?;
                        Ok(policy)
                    }
                    Err(e) => Err(e),
                },
            }
        };

        match outcome {
            Ok(policy) => {
                write_txn.commit().map_err(StorageError::from)?;
                Ok(policy)
            }
            Err(e) => {
                write_txn.abort().map_err(StorageError::from)?;
                Err(e)
            }
        }
    }
}
