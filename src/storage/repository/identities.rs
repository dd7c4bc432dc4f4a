// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Identity repository: one row per wallet, holding the current sign-in nonce.
//!
//! Nonce writes are last-write-wins upserts. Consuming a nonce is a
//! compare-and-swap inside one write transaction, so a challenge can be
//! redeemed at most once even when verifications race.

use chrono::{DateTime, Utc};
use redb::{ReadableDatabase, ReadableTable};
use serde::{Deserialize, Serialize};

use crate::models::WalletAddress;
use crate::storage::database::{decode, CoverDatabase, StorageResult, IDENTITIES};

/// A wallet that has requested at least one sign-in challenge.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Identity {
    /// Lower-case wallet address (primary key)
    pub address: String,
    /// The only nonce currently accepted for this wallet
    pub nonce: String,
    /// Last successful signature verification
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Outcome of [`IdentityRepository::consume_nonce`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NonceConsumption {
    /// The expected nonce matched and has been replaced.
    Consumed(Identity),
    /// The identity exists but its nonce differs from the expected one.
    Stale,
    /// No identity exists for the address.
    Missing,
}

/// Repository for identity rows.
pub struct IdentityRepository<'a> {
    db: &'a CoverDatabase,
}

impl<'a> IdentityRepository<'a> {
    pub fn new(db: &'a CoverDatabase) -> Self {
        Self { db }
    }

    /// Look up an identity by wallet address.
    pub fn get(&self, address: &WalletAddress) -> StorageResult<Option<Identity>> {
        let key = address.as_canonical();
        let read_txn = self.db.inner().begin_read()?;
        let table = read_txn.open_table(IDENTITIES)?;
        match table.get(key.as_str())? {
            Some(value) => Ok(Some(decode(value.value())?)),
            None => Ok(None),
        }
    }

    /// Create the identity if needed and replace its nonce.
    ///
    /// Any previously issued nonce stops being valid once this commits.
    pub fn issue_nonce(&self, address: &WalletAddress, nonce: &str) -> StorageResult<Identity> {
        let key = address.as_canonical();
        let now = Utc::now();

        let write_txn = self.db.inner().begin_write()?;
        let identity = {
            let mut table = write_txn.open_table(IDENTITIES)?;

            let existing: Option<Identity> = match table.get(key.as_str())? {
                Some(value) => Some(decode(value.value())?),
                None => None,
            };

            let identity = match existing {
                Some(mut identity) => {
                    identity.nonce = nonce.to_string();
                    identity.updated_at = now;
                    identity
                }
                None => Identity {
                    address: key.clone(),
                    nonce: nonce.to_string(),
                    last_login_at: None,
                    created_at: now,
                    updated_at: now,
                },
            };

            let json = serde_json::to_vec(&identity)?;
            table.insert(key.as_str(), json.as_slice())?;
            identity
        };
        write_txn.commit()?;

        Ok(identity)
    }

    /// Atomically replace `expected` with `replacement` and stamp the login time.
    pub fn consume_nonce(
        &self,
        address: &WalletAddress,
        expected: &str,
        replacement: &str,
        now: DateTime<Utc>,
    ) -> StorageResult<NonceConsumption> {
        let key = address.as_canonical();

        let write_txn = self.db.inner().begin_write()?;
        let outcome = {
            let mut table = write_txn.open_table(IDENTITIES)?;

            let existing: Option<Identity> = match table.get(key.as_str())? {
                Some(value) => Some(decode(value.value())?),
                None => None,
            };

            match existing {
                None => NonceConsumption::Missing,
                Some(identity) if identity.nonce != expected => NonceConsumption::Stale,
                Some(mut identity) => {
                    identity.nonce = replacement.to_string();
                    identity.last_login_at = Some(now);
                    identity.updated_at = now;

                    let json = serde_json::to_vec(&identity)?;
                    table.insert(key.as_str(), json.as_slice())?;
                    NonceConsumption::Consumed(identity)
                }
            }
        };

        if matches!(outcome, NonceConsumption::Consumed(_)) {
            write_txn.commit()?;
        } else {
            write_txn.abort()?;
        }

        Ok(outcome)
    }
}
