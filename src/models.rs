// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Shared Value Types
//!
//! Validated wrappers for the on-chain identifiers that cross every trust
//! boundary in the service. Parsing happens once, at the edge, so storage and
//! chain code never see a malformed address or hash.
//!
//! ## Wallet Address Type
//!
//! [`WalletAddress`] wraps a 20-byte EVM address. Input may use any hex case
//! (including EIP-55 checksum case); the canonical rendering is always
//! lower-case `0x`-prefixed hex, which is also the storage key.

use std::fmt;
use std::str::FromStr;

use alloy::primitives::{Address, B256, U256};

/// Validation errors for on-chain identifiers and amounts.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValueError {
    #[error("invalid wallet address: {0}")]
    InvalidAddress(String),

    #[error("invalid transaction hash: {0}")]
    InvalidTxHash(String),

    #[error("invalid token amount: {0}")]
    InvalidAmount(String),
}

fn is_hex_of_len(raw: &str, len: usize) -> bool {
    let Some(hex) = raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) else {
        return false;
    };
    hex.len() == len && hex.chars().all(|c| c.is_ascii_hexdigit())
}

// =============================================================================
// Wallet Address Type
// =============================================================================

/// EVM wallet address, normalized to lower case.
///
/// # Example
///
/// ```rust,ignore
/// let addr = WalletAddress::parse("0x742d35Cc6634C0532925a3b844Bc9e7595f4aB12")?;
/// assert_eq!(addr.to_string(), "0x742d35cc6634c0532925a3b844bc9e7595f4ab12");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WalletAddress(Address);

impl WalletAddress {
    /// Parse a `0x` + 40 hex character address.
    pub fn parse(raw: &str) -> Result<Self, ValueError> {
        let trimmed = raw.trim();
        if !is_hex_of_len(trimmed, 40) {
            return Err(ValueError::InvalidAddress(raw.to_string()));
        }
        // Case-insensitive parse: checksum validation is not applied here.
        Address::from_str(&trimmed.to_ascii_lowercase())
            .map(Self)
            .map_err(|_| ValueError::InvalidAddress(raw.to_string()))
    }

    /// The underlying alloy address.
    pub fn address(&self) -> Address {
        self.0
    }

    /// Canonical lower-case string form.
    pub fn as_canonical(&self) -> String {
        format!("{:#x}", self.0)
    }
}

impl From<Address> for WalletAddress {
    fn from(value: Address) -> Self {
        Self(value)
    }
}

impl FromStr for WalletAddress {
    type Err = ValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for WalletAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

// =============================================================================
// Transaction Hash Type
// =============================================================================

/// 32-byte transaction hash, rendered lower-case with `0x` prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TxHash(B256);

impl TxHash {
    /// Parse a `0x` + 64 hex character hash.
    pub fn parse(raw: &str) -> Result<Self, ValueError> {
        let trimmed = raw.trim();
        if !is_hex_of_len(trimmed, 64) {
            return Err(ValueError::InvalidTxHash(raw.to_string()));
        }
        B256::from_str(&trimmed.to_ascii_lowercase())
            .map(Self)
            .map_err(|_| ValueError::InvalidTxHash(raw.to_string()))
    }

    pub fn hash(&self) -> B256 {
        self.0
    }
}

impl From<B256> for TxHash {
    fn from(value: B256) -> Self {
        Self(value)
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

// =============================================================================
// Token Amounts
// =============================================================================

/// Parse an integer amount in the token's smallest unit (no decimals, no sign).
pub fn parse_token_amount(raw: &str) -> Result<U256, ValueError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || !trimmed.chars().all(|c| c.is_ascii_digit()) {
        return Err(ValueError::InvalidAmount(raw.to_string()));
    }
    U256::from_str_radix(trimmed, 10).map_err(|_| ValueError::InvalidAmount(raw.to_string()))
}
