// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Settlement records, keyed by transaction hash.
//!
//! The transaction hash is the primary key, so one on-chain transfer can
//! settle at most one policy. Recording a settlement and activating its
//! policy happen in a single write transaction.

use chrono::{DateTime, Utc};
use redb::{ReadableDatabase, ReadableTable};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::policies::Policy;
use crate::storage::database::{
    decode, CoverDatabase, StorageError, StorageResult, POLICIES, SETTLEMENTS,
};

/// A confirmed premium payment.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct SettlementRecord {
    pub id: String,
    /// Policy this payment settled
    pub policy_id: String,
    /// Lower-case `0x` transaction hash (unique)
    pub tx_hash: String,
    pub chain_id: u64,
    pub token_address: String,
    pub from_address: String,
    pub to_address: String,
    /// Transferred amount in the token's smallest unit
    pub amount: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_number: Option<u64>,
    pub confirmed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Outcome of [`SettlementRepository::record_and_activate`].
#[derive(Debug, Clone)]
pub enum SettlementWrite {
    /// New record stored and the policy transitioned.
    Recorded {
        settlement: SettlementRecord,
        policy: Policy,
    },
    /// The transaction was already recorded for this policy; nothing changed.
    AlreadyRecorded {
        settlement: SettlementRecord,
        policy: Policy,
    },
    /// The transaction already settled a different policy.
    ClaimedByOtherPolicy(SettlementRecord),
}

/// Repository for settlement records.
pub struct SettlementRepository<'a> {
    db: &'a CoverDatabase,
}

impl<'a> SettlementRepository<'a> {
    pub fn new(db: &'a CoverDatabase) -> Self {
        Self { db }
    }

    pub fn get(&self, tx_hash: &str) -> StorageResult<Option<SettlementRecord>> {
        let read_txn = self.db.inner().begin_read()?;
        let table = read_txn.open_table(SETTLEMENTS)?;
        match table.get(tx_hash)? {
            Some(value) => Ok(Some(decode(value.value())?)),
            None => Ok(None),
        }
    }

    /// Upsert the settlement and apply `activate` to its policy atomically.
    ///
    /// If a record for the same transaction exists, `activate` is not called
    /// and the stored state is returned unchanged. If `activate` fails, the
    /// settlement is not written either.
    pub fn record_and_activate<F, E>(
        &self,
        record: SettlementRecord,
        activate: F,
    ) -> Result<SettlementWrite, E>
    where
        F: FnOnce(&mut Policy) -> Result<(), E>,
        E: From<StorageError>,
    {
        let write_txn = self.db.inner().begin_write().map_err(StorageError::from)?;
        let outcome: Result<(SettlementWrite, bool), E> = {
            let mut settlements = write_txn
                .open_table(SETTLEMENTS)
                .map_err(StorageError::from)?;
            let mut policies = write_txn.open_table(POLICIES).map_err(StorageError::from)?;

            let existing: Option<SettlementRecord> =
                match settlements.get(record.tx_hash.as_str()).map_err(StorageError::from)? {
                    Some(value) => Some(decode(value.value())?),
                    None => None,
                };

            let current: Policy = match policies
                .get(record.policy_id.as_str())
                .map_err(StorageError::from)?
            {
                Some(value) => decode(value.value())?,
                None => return Err(StorageError::NotFound(record.policy_id.clone()).into()),
            };

            match existing {
                Some(settlement) if settlement.policy_id != record.policy_id => {
                    Ok((SettlementWrite::ClaimedByOtherPolicy(settlement), false))
                }
                Some(settlement) => Ok((
                    SettlementWrite::AlreadyRecorded {
                        settlement,
                        policy: current,
                    },
                    false,
                )),
                None => {
                    let mut policy = current;
                    match activate(&mut policy) {
                        Ok(()) => {
                            let settlement_json =
                                serde_json::to_vec(&record).map_err(StorageError::from)?;
                            settlements
                                .insert(record.tx_hash.as_str(), settlement_json.as_slice())
                                .map_err(StorageError::from)?;

                            let policy_json =
                                serde_json::to_vec(&policy).map_err(StorageError::from)?;
                            policies
                                .insert(policy.id.as_str(), policy_json.as_slice())
                                .map_err(StorageError::from)?;

                            Ok((
                                SettlementWrite::Recorded {
                                    settlement: record,
                                    policy,
                                },
                                true,
                            ))
                        }
                        Err(e) => Err(e),
                    }
                }
            }
        };

        match outcome {
            Ok((write, true)) => {
                write_txn.commit().map_err(StorageError::from)?;
                Ok(write)
            }
            Ok((write, false)) => {
                write_txn.abort().map_err(StorageError::from)?;
                Ok(write)
            }
            Err(e) => {
                write_txn.abort().map_err(StorageError::from)?;
                Err(e)
            }
        }
    }
}
