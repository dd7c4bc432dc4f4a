// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Repository layer providing typed access to the policy database.
//!
//! Each repository borrows the shared [`CoverDatabase`](super::CoverDatabase)
//! and owns the (de)serialization of one entity type.

pub mod identities;
pub mod policies;
pub mod products;
pub mod settings;
pub mod settlements;

pub use identities::{Identity, IdentityRepository, NonceConsumption};
pub use policies::{Policy, PolicyRepository};
pub use products::{Product, ProductRepository, ProductSeed, DEFAULT_TERM_DAYS};
pub use settings::{SettingsRepository, TREASURY_ADDRESS_KEY};
pub use settlements::{SettlementRecord, SettlementRepository, SettlementWrite};
