// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Shared test fixtures: throwaway databases, an in-memory chain and
//! policies driven into each lifecycle state.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use alloy::primitives::{address, Address, B256};
use async_trait::async_trait;
use chrono::{Duration, Utc};

use crate::blockchain::signing::test_signers;
use crate::blockchain::{ChainClientError, ChainReader, ChainReceipt};
use crate::models::WalletAddress;
use crate::policy::PolicyStatus;
use crate::storage::{
    CoverDatabase, Policy, PolicyRepository, ProductRepository, ProductSeed, SettingsRepository,
    StorageError, TREASURY_ADDRESS_KEY,
};

/// BSC USDT, used as the payment token of seeded products.
pub const USDT: Address = address!("55d398326f99059ff775485246999027b3197955");

pub const TREASURY: Address = address!("00000000000000000000000000000000000000ff");

pub fn temp_db() -> (CoverDatabase, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let db = CoverDatabase::open(&dir.path().join("cover.redb")).unwrap();
    (db, dir)
}

/// Product on chain 56 with premium 100, coverage 10000 and the default term.
pub fn seed_product(db: &CoverDatabase, id: &str, active: bool) {
    let seed = ProductSeed {
        id: id.to_string(),
        name: format!("Cover {id}"),
        chain_id: 56,
        token_address: format!("{:#x}", USDT),
        token_symbol: "USDT".to_string(),
        token_decimals: 18,
        term_days: None,
        premium_amount: "100".to_string(),
        coverage_amount: "10000".to_string(),
        active,
    };
    ProductRepository::new(db)
        .upsert(&seed.into_product(Utc::now()).unwrap())
        .unwrap();
}

pub fn set_treasury(db: &CoverDatabase) {
    SettingsRepository::new(db)
        .set(TREASURY_ADDRESS_KEY, &format!("{:#x}", TREASURY))
        .unwrap();
}

fn policy_in_state(db: &CoverDatabase, product_id: &str, signer: u8, status: PolicyStatus) -> Policy {
    let wallet = WalletAddress::from(test_signers::address(signer));
    let policy = Policy::draft(&wallet, product_id, "100", "10000", Utc::now());
    let repo = PolicyRepository::new(db);
    repo.create(&policy).unwrap();

    let now = Utc::now();
    repo.update::<_, StorageError>(&policy.id, |p| {
        p.status = status;
        if status != PolicyStatus::Draft {
            p.contract_hash = Some(format!("0x{}", "11".repeat(32)));
            p.wallet_signature = Some("0x".to_string());
            p.contract_signed_at = Some(now);
        }
        if status == PolicyStatus::ApprovedAwaitingPayment {
            p.payment_deadline = Some(now + Duration::days(7));
            p.coverage_start_at = Some(now);
            p.coverage_end_at = Some(now + Duration::days(90));
        }
        Ok(())
    })
    .unwrap()
}

/// Signed policy awaiting the underwriting decision.
pub fn pending_policy(db: &CoverDatabase, product_id: &str, signer: u8) -> Policy {
    policy_in_state(db, product_id, signer, PolicyStatus::PendingUnderwriting)
}

/// Approved policy with a payment deadline seven days out.
pub fn approved_policy(db: &CoverDatabase, product_id: &str, signer: u8) -> Policy {
    policy_in_state(db, product_id, signer, PolicyStatus::ApprovedAwaitingPayment)
}

/// In-memory [`ChainReader`].
pub struct MockChain {
    chain_id: u64,
    receipts: Mutex<HashMap<B256, ChainReceipt>>,
    offline: AtomicBool,
}

impl MockChain {
    pub fn new(chain_id: u64) -> Self {
        Self {
            chain_id,
            receipts: Mutex::new(HashMap::new()),
            offline: AtomicBool::new(false),
        }
    }

    pub fn insert_receipt(&self, receipt: ChainReceipt) {
        self.receipts.lock().unwrap().insert(receipt.tx_hash, receipt);
    }

    /// Make every call fail with an RPC error.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn check_online(&self) -> Result<(), ChainClientError> {
        if self.offline.load(Ordering::SeqCst) {
            Err(ChainClientError::Rpc("connection refused".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ChainReader for MockChain {
    async fn transaction_receipt(
        &self,
        tx_hash: B256,
    ) -> Result<Option<ChainReceipt>, ChainClientError> {
        self.check_online()?;
        Ok(self.receipts.lock().unwrap().get(&tx_hash).cloned())
    }

    async fn chain_id(&self) -> Result<u64, ChainClientError> {
        self.check_online()?;
        Ok(self.chain_id)
    }
}
