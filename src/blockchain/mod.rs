// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Blockchain integration module.
//!
//! This module provides functionality for:
//! - Fetching transaction receipts and the network id over JSON-RPC
//! - Decoding ERC-20 `Transfer` events
//! - Recovering the signer of wallet-signed messages

pub mod client;
pub mod erc20;
pub mod signing;
pub mod types;

pub use client::{ChainClient, ChainClientError, ChainReader};
pub use erc20::{decode_transfer, TRANSFER_TOPIC};
pub use signing::{recover_personal_signer, SigningError};
pub use types::*;
