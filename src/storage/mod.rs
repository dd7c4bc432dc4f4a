// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Storage Module
//!
//! Persistent state lives in a single embedded redb database at
//! `{DATA_DIR}/cover.redb`.
//!
//! ## Consistency Model
//!
//! - redb serializes write transactions; every read-check-write below runs
//!   inside one of them
//! - `(wallet, product)` uniqueness: `policy_owner_index`
//! - one settlement per transaction hash: `settlements` primary key
//! - nonce rotation: compare-and-swap on the `identities` row
//!
//! Running several service processes against one file is not supported by
//! redb; horizontal scaling needs a shared database with the same constraints.

pub mod audit;
pub mod database;
pub mod repository;

pub use audit::{AuditEvent, AuditEventType, AuditRepository};
pub use database::{CoverDatabase, StorageError, StorageResult};
pub use repository::{
    Identity, IdentityRepository, NonceConsumption, Policy, PolicyRepository, Product,
    ProductRepository, ProductSeed, SettingsRepository, SettlementRecord, SettlementRepository,
    SettlementWrite, DEFAULT_TERM_DAYS, TREASURY_ADDRESS_KEY,
};
