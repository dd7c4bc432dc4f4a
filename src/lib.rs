// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Relational Cover - Crypto-Collateralized Policy Service
//!
//! Issues, underwrites and settles insurance policies whose premiums are paid
//! in ERC-20 tokens. The service never holds funds or broadcasts
//! transactions; it only reads the chain to confirm payments.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `auth` - Wallet sign-in (EIP-4361) and session tokens
//! - `blockchain` - Read-only EVM RPC, ERC-20 events, signature recovery
//! - `contract` - Contract canonicalization and signature binding
//! - `policy` - Policy lifecycle state machine and underwriting
//! - `settlement` - On-chain premium verification
//! - `storage` - Embedded redb database and audit trail

pub mod api;
pub mod auth;
pub mod blockchain;
pub mod config;
pub mod contract;
pub mod error;
pub mod models;
pub mod policy;
pub mod settlement;
pub mod state;
pub mod storage;

#[cfg(test)]
mod testing;
