// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Blockchain types and constants.

use alloy::primitives::{Address, B256, U256};

/// EVM network configuration.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Network name for display
    pub name: &'static str,
    /// Chain ID
    pub chain_id: u64,
    /// RPC endpoint URL
    pub rpc_url: &'static str,
}

/// Avalanche C-Chain Mainnet configuration.
pub const AVAX_MAINNET: NetworkConfig = NetworkConfig {
    name: "Avalanche C-Chain",
    chain_id: 43114,
    rpc_url: "https://api.avax.network/ext/bc/C/rpc",
};

/// Avalanche Fuji Testnet configuration.
pub const AVAX_FUJI: NetworkConfig = NetworkConfig {
    name: "Avalanche Fuji Testnet",
    chain_id: 43113,
    rpc_url: "https://api.avax-test.network/ext/bc/C/rpc",
};

/// A log entry of an execution receipt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiptLog {
    /// Emitting contract
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Vec<u8>,
}

/// The parts of a transaction receipt settlement verification needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainReceipt {
    pub tx_hash: B256,
    /// Execution status (false when the transaction reverted)
    pub success: bool,
    pub block_number: Option<u64>,
    pub logs: Vec<ReceiptLog>,
}

/// A decoded ERC-20 `Transfer` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenTransfer {
    /// Token contract that emitted the event
    pub token: Address,
    pub from: Address,
    pub to: Address,
    pub amount: U256,
}

/// A transfer that satisfied every settlement expectation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedTransfer {
    pub tx_hash: B256,
    pub chain_id: u64,
    pub token: Address,
    pub from: Address,
    pub to: Address,
    pub amount: U256,
    pub block_number: Option<u64>,
}
