// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Embedded policy database backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! - `identities`: wallet address → serialized Identity
//! - `products`: product_id → serialized Product
//! - `policies`: policy_id → serialized Policy
//! - `policy_owner_index`: `wallet|product_id` → policy_id (one policy per pair)
//! - `settlements`: tx_hash → serialized SettlementRecord (one record per tx)
//! - `settings`: key → value
//! - `audit_events`: `micros|event_id` → serialized AuditEvent
//!
//! redb admits a single write transaction at a time, so every
//! read-check-write sequence done inside one write transaction is atomic.
//! The uniqueness of `policy_owner_index` and `settlements` keys is enforced
//! that way rather than with in-process locks.

use std::path::Path;

use redb::{Database, TableDefinition};
use serde::de::DeserializeOwned;

// =============================================================================
// Table Definitions
// =============================================================================

pub(crate) const IDENTITIES: TableDefinition<&str, &[u8]> = TableDefinition::new("identities");

pub(crate) const PRODUCTS: TableDefinition<&str, &[u8]> = TableDefinition::new("products");

pub(crate) const POLICIES: TableDefinition<&str, &[u8]> = TableDefinition::new("policies");

/// Key format: `lowercase_wallet|product_id`.
pub(crate) const POLICY_OWNER_INDEX: TableDefinition<&str, &str> =
    TableDefinition::new("policy_owner_index");

pub(crate) const SETTLEMENTS: TableDefinition<&str, &[u8]> = TableDefinition::new("settlements");

pub(crate) const SETTINGS: TableDefinition<&str, &str> = TableDefinition::new("settings");

/// Key format: zero-padded microsecond timestamp, `|`, event id.
pub(crate) const AUDIT_EVENTS: TableDefinition<&str, &[u8]> = TableDefinition::new("audit_events");

// =============================================================================
// Error Type
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("redb error: {0}")]
    Redb(#[from] redb::Error),

    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

pub(crate) fn decode<T: DeserializeOwned>(bytes: &[u8]) -> StorageResult<T> {
    Ok(serde_json::from_slice(bytes)?)
}

// =============================================================================
// CoverDatabase
// =============================================================================

/// Embedded ACID database holding identities, policies and settlements.
pub struct CoverDatabase {
    db: Database,
}

impl CoverDatabase {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(path)?;

        // Pre-create all tables so later read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(IDENTITIES)?;
            let _ = write_txn.open_table(PRODUCTS)?;
            let _ = write_txn.open_table(POLICIES)?;
            let _ = write_txn.open_table(POLICY_OWNER_INDEX)?;
            let _ = write_txn.open_table(SETTLEMENTS)?;
            let _ = write_txn.open_table(SETTINGS)?;
            let _ = write_txn.open_table(AUDIT_EVENTS)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }

    pub(crate) fn inner(&self) -> &Database {
        &self.db
    }

    /// Cheap liveness probe: opens a read transaction and a table.
    pub fn health_check(&self) -> StorageResult<()> {
        use redb::ReadableDatabase;

        let read_txn = self.db.begin_read()?;
        let _ = read_txn.open_table(SETTINGS)?;
        Ok(())
    }
}
