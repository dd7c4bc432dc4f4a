// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Product catalog repository.
//!
//! The catalog is owned by an external back-office; this service only reads
//! it. Rows are seeded at startup from `PRODUCTS_FILE` (see `config`).

use alloy::primitives::Address;
use chrono::{DateTime, Utc};
use redb::{ReadableDatabase, ReadableTable};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::{parse_token_amount, ValueError, WalletAddress};
use crate::storage::database::{decode, CoverDatabase, StorageResult, PRODUCTS};

/// Coverage term applied when a product does not define one.
pub const DEFAULT_TERM_DAYS: u32 = 90;

/// An insurance product (SKU) policies are written against.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct Product {
    /// Unique product identifier
    pub id: String,
    /// Display name
    pub name: String,
    /// EVM chain the premium must be paid on
    pub chain_id: u64,
    /// ERC-20 contract address of the payment token
    pub token_address: String,
    /// Payment token symbol (e.g. "USDT")
    pub token_symbol: String,
    /// Payment token decimals (display only; amounts are in smallest units)
    #[serde(default = "default_decimals")]
    pub token_decimals: u8,
    /// Coverage term in days
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub term_days: Option<u32>,
    /// Premium in the token's smallest unit (decimal integer string)
    pub premium_amount: String,
    /// Coverage in the token's smallest unit (decimal integer string)
    pub coverage_amount: String,
    /// Whether new policies may be written
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn default_decimals() -> u8 {
    18
}

impl Product {
    /// Payment token contract.
    pub fn token(&self) -> Result<Address, ValueError> {
        WalletAddress::parse(&self.token_address).map(|a| a.address())
    }

    pub fn term_days_or_default(&self) -> u32 {
        self.term_days.filter(|d| *d > 0).unwrap_or(DEFAULT_TERM_DAYS)
    }
}

/// Catalog entry as it appears in the seed file (timestamps are assigned on load).
#[derive(Debug, Clone, Deserialize)]
pub struct ProductSeed {
    pub id: String,
    pub name: String,
    pub chain_id: u64,
    pub token_address: String,
    pub token_symbol: String,
    #[serde(default = "default_decimals")]
    pub token_decimals: u8,
    #[serde(default)]
    pub term_days: Option<u32>,
    pub premium_amount: String,
    pub coverage_amount: String,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl ProductSeed {
    /// Validate amounts and addresses, then build a catalog row.
    pub fn into_product(self, now: DateTime<Utc>) -> Result<Product, ValueError> {
        let token = WalletAddress::parse(&self.token_address)?;
        parse_token_amount(&self.premium_amount)?;
        parse_token_amount(&self.coverage_amount)?;

        Ok(Product {
            id: self.id,
            name: self.name,
            chain_id: self.chain_id,
            token_address: token.as_canonical(),
            token_symbol: self.token_symbol,
            token_decimals: self.token_decimals,
            term_days: self.term_days,
            premium_amount: self.premium_amount.trim().to_string(),
            coverage_amount: self.coverage_amount.trim().to_string(),
            active: self.active,
            created_at: now,
            updated_at: now,
        })
    }
}

/// Repository for catalog rows.
pub struct ProductRepository<'a> {
    db: &'a CoverDatabase,
}

impl<'a> ProductRepository<'a> {
    pub fn new(db: &'a CoverDatabase) -> Self {
        Self { db }
    }

    pub fn get(&self, product_id: &str) -> StorageResult<Option<Product>> {
        let read_txn = self.db.inner().begin_read()?;
        let table = read_txn.open_table(PRODUCTS)?;
        match table.get(product_id)? {
            Some(value) => Ok(Some(decode(value.value())?)),
            None => Ok(None),
        }
    }

    /// Insert or replace a product, keeping the original `created_at`.
    pub fn upsert(&self, product: &Product) -> StorageResult<Product> {
        let write_txn = self.db.inner().begin_write()?;
        let stored = {
            let mut table = write_txn.open_table(PRODUCTS)?;

            let created_at = match table.get(product.id.as_str())? {
                Some(value) => decode::<Product>(value.value())?.created_at,
                None => product.created_at,
            };

            let mut stored = product.clone();
            stored.created_at = created_at;

            let json = serde_json::to_vec(&stored)?;
            table.insert(stored.id.as_str(), json.as_slice())?;
            stored
        };
        write_txn.commit()?;
        Ok(stored)
    }

    /// List the catalog, optionally only products open for new policies.
    pub fn list(&self, active_only: bool) -> StorageResult<Vec<Product>> {
        let read_txn = self.db.inner().begin_read()?;
        let table = read_txn.open_table(PRODUCTS)?;

        let mut products = Vec::new();
        for entry in table.iter()? {
            let (_, value) = entry?;
            let product: Product = decode(value.value())?;
            if !active_only || product.active {
                products.push(product);
            }
        }
        Ok(products)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::temp_db;

    fn seed(id: &str, active: bool) -> ProductSeed {
        ProductSeed {
            id: id.to_string(),
            name: "Smart contract cover".to_string(),
            chain_id: 56,
            token_address: "0x55d398326f99059fF775485246999027B3197955".to_string(),
            token_symbol: "USDT".to_string(),
            token_decimals: 18,
            term_days: None,
            premium_amount: "100".to_string(),
            coverage_amount: "10000".to_string(),
            active,
        }
    }

    #[test]
    fn seed_normalizes_token_address() {
        let product = seed("p1", true).into_product(Utc::now()).unwrap();
        assert_eq!(
            product.token_address,
            "0x55d398326f99059ff775485246999027b3197955"
        );
        assert_eq!(product.term_days_or_default(), DEFAULT_TERM_DAYS);
        assert_eq!(product.premium_amount, "100");
    }

    #[test]
    fn seed_rejects_fractional_premium() {
        let mut bad = seed("p1", true);
        bad.premium_amount = "1.5".to_string();
        assert!(bad.into_product(Utc::now()).is_err());
    }

    #[test]
    fn upsert_keeps_created_at_and_list_filters_inactive() {
        let (db, _dir) = temp_db();
        let repo = ProductRepository::new(&db);

        let first = repo
            .upsert(&seed("p1", true).into_product(Utc::now()).unwrap())
            .unwrap();
        let mut changed = seed("p1", true)
            .into_product(Utc::now() + chrono::Duration::seconds(10))
            .unwrap();
        changed.name = "Renamed".to_string();
        let second = repo.upsert(&changed).unwrap();
        assert_eq!(second.created_at, first.created_at);
        assert_eq!(repo.get("p1").unwrap().unwrap().name, "Renamed");

        repo.upsert(&seed("p2", false).into_product(Utc::now()).unwrap())
            .unwrap();
        assert_eq!(repo.list(false).unwrap().len(), 2);
        assert_eq!(repo.list(true).unwrap().len(), 1);
        assert!(repo.get("missing").unwrap().is_none());
    }
}
