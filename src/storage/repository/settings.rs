// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Key/value settings (treasury address and similar operator-managed values).

use redb::{ReadableDatabase, ReadableTable};

use crate::storage::database::{CoverDatabase, StorageResult, SETTINGS};

/// Wallet receiving premium payments.
pub const TREASURY_ADDRESS_KEY: &str = "treasury_address";

pub struct SettingsRepository<'a> {
    db: &'a CoverDatabase,
}

impl<'a> SettingsRepository<'a> {
    pub fn new(db: &'a CoverDatabase) -> Self {
        Self { db }
    }

    pub fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let read_txn = self.db.inner().begin_read()?;
        let table = read_txn.open_table(SETTINGS)?;
        Ok(table.get(key)?.map(|v| v.value().to_string()))
    }

    pub fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        let write_txn = self.db.inner().begin_write()?;
        {
            let mut table = write_txn.open_table(SETTINGS)?;
            table.insert(key, value)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Store `value` only when the key is absent. Returns whether it was written.
    pub fn set_if_absent(&self, key: &str, value: &str) -> StorageResult<bool> {
        let write_txn = self.db.inner().begin_write()?;
        let written = {
            let mut table = write_txn.open_table(SETTINGS)?;
            if table.get(key)?.is_some() {
                false
            } else {
                table.insert(key, value)?;
                true
            }
        };
        write_txn.commit()?;
        Ok(written)
    }
}
